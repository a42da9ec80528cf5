//! Index page fetching.
//!
//! [`LinkFetcher`] is the seam between candidate discovery and the network.
//! [`HttpIndex`] implements it for PEP 503 simple pages and flat find-links
//! pages served over HTTP(S) or from the local filesystem (`file://`).

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use regex::Regex;
use url::Url;

use crate::sources::link::Link;

/// Default HTTP timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches the artifact links listed on an index page.
///
/// A page that does not exist yields an empty list; only transport and I/O
/// failures are errors.
pub trait LinkFetcher: Send + Sync {
    fn fetch(&self, page: &Url) -> Result<Vec<Link>>;
}

/// Matches an anchor tag, capturing its attributes.
static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s([^>]*)>"#).expect("anchor pattern is valid")
});

/// Matches the href attribute inside an anchor.
static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("href pattern is valid")
});

/// Index pages fetched over HTTP or read from disk.
#[derive(Debug, Clone)]
pub struct HttpIndex {
    client: reqwest::blocking::Client,
    offline: bool,
}

impl HttpIndex {
    pub fn new(timeout: Duration, offline: bool) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ltt/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(HttpIndex { client, offline })
    }

    fn fetch_file(&self, page: &Url) -> Result<Option<String>> {
        let path = page
            .to_file_path()
            .map_err(|_| anyhow::anyhow!("invalid file URL {}", page))?;
        read_page(&path)
    }

    fn fetch_http(&self, page: &Url) -> Result<Option<String>> {
        if self.offline {
            bail!("cannot fetch {} in offline mode", page);
        }

        let response = self
            .client
            .get(page.clone())
            .header(reqwest::header::ACCEPT, "text/html")
            .send()
            .with_context(|| format!("failed to fetch {}", page))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            bail!("failed to fetch {}: HTTP {}", page, response.status());
        }

        let body = response
            .text()
            .with_context(|| format!("failed to read response body from {}", page))?;
        Ok(Some(body))
    }
}

impl LinkFetcher for HttpIndex {
    fn fetch(&self, page: &Url) -> Result<Vec<Link>> {
        let body = match page.scheme() {
            "file" => self.fetch_file(page)?,
            "http" | "https" => self.fetch_http(page)?,
            other => bail!("unsupported URL scheme `{}` in {}", other, page),
        };

        match body {
            Some(html) => {
                let links = parse_links(&html, page);
                tracing::debug!("{} links on {}", links.len(), page);
                Ok(links)
            }
            None => {
                tracing::debug!("no page at {}", page);
                Ok(Vec::new())
            }
        }
    }
}

fn read_page(path: &Path) -> Result<Option<String>> {
    let path = if path.is_dir() {
        path.join("index.html")
    } else {
        path.to_path_buf()
    };

    if !path.exists() {
        return Ok(None);
    }

    std::fs::read_to_string(&path)
        .map(Some)
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Extract the links of an index page, resolving hrefs against `page`.
///
/// Anchors marked `data-yanked` are skipped.
pub fn parse_links(html: &str, page: &Url) -> Vec<Link> {
    ANCHOR
        .captures_iter(html)
        .filter_map(|anchor| {
            let attrs = anchor.get(1)?.as_str();
            if attrs.to_lowercase().contains("data-yanked") {
                return None;
            }
            let href = HREF.captures(attrs)?;
            let raw = href.get(1).or_else(|| href.get(2))?.as_str();
            let url = page.join(&decode_entities(raw)).ok()?;
            let filename = link_filename(&url)?;
            Some(Link::new(filename, url))
        })
        .collect()
}

/// The percent-decoded last path segment of `url`; `None` when it is empty.
pub fn link_filename(url: &Url) -> Option<String> {
    let filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(percent_decode)?;
    (!filename.is_empty()).then_some(filename)
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&#43;", "+")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = |b: u8| (b as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<h1>Links for torch</h1>
<a href="/whl/cu111/torch-1.9.0%2Bcu111-cp39-cp39-linux_x86_64.whl#sha256=abc">torch-1.9.0+cu111-cp39-cp39-linux_x86_64.whl</a><br/>
<a href='torch-1.8.1-cp39-cp39-win_amd64.whl?x=1&amp;y=2'>torch-1.8.1-cp39-cp39-win_amd64.whl</a><br/>
<a data-yanked="" href="torch-1.8.0-cp39-cp39-linux_x86_64.whl">yanked</a>
</body></html>
"#;

    #[test]
    fn test_parse_links() {
        let page = Url::parse("https://download.pytorch.org/whl/cu111/torch/").unwrap();
        let links = parse_links(PAGE, &page);

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].filename, "torch-1.9.0+cu111-cp39-cp39-linux_x86_64.whl");
        assert_eq!(
            links[0].url.as_str(),
            "https://download.pytorch.org/whl/cu111/torch-1.9.0%2Bcu111-cp39-cp39-linux_x86_64.whl#sha256=abc"
        );
        assert_eq!(links[1].filename, "torch-1.8.1-cp39-cp39-win_amd64.whl");
        assert_eq!(links[1].url.query(), Some("x=1&y=2"));
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("a%2Bb"), "a+b");
        assert_eq!(percent_decode("trailing%2"), "trailing%2");
        assert_eq!(percent_decode("%zz"), "%zz");
    }

    #[test]
    fn test_fetch_file_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("cpu").join("torch");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("index.html"),
            r#"<a href="torch-2.0.1%2Bcpu-cp310-cp310-linux_x86_64.whl">x</a>"#,
        )
        .unwrap();

        let index = HttpIndex::new(DEFAULT_TIMEOUT, true).unwrap();
        let page = Url::from_directory_path(&dir).unwrap();
        let links = index.fetch(&page).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].filename, "torch-2.0.1+cpu-cp310-cp310-linux_x86_64.whl");
    }

    #[test]
    fn test_fetch_missing_file_page_is_empty() {
        let tmp = TempDir::new().unwrap();
        let index = HttpIndex::new(DEFAULT_TIMEOUT, true).unwrap();
        let page = Url::from_directory_path(tmp.path().join("nope")).unwrap();
        assert!(index.fetch(&page).unwrap().is_empty());
    }

    #[test]
    fn test_offline_refuses_http() {
        let index = HttpIndex::new(DEFAULT_TIMEOUT, true).unwrap();
        let page = Url::parse("https://pypi.org/simple/torch/").unwrap();
        let err = index.fetch(&page).unwrap_err();
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_link_filename() {
        let url = Url::parse("https://example.com/whl/torch-2.0.1%2Bcpu-cp310-cp310-linux%5Fx86_64.whl?x=1#sha256=00").unwrap();
        assert_eq!(
            link_filename(&url).as_deref(),
            Some("torch-2.0.1+cpu-cp310-cp310-linux_x86_64.whl")
        );
        assert_eq!(link_filename(&Url::parse("https://example.com/whl/").unwrap()), None);
    }
}
