//! `ltt find` command

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::json;

use crate::cli::FindArgs;
use ltt::ops::{FindOutcome, FindRequest};
use ltt::resolver::select_best;
use ltt::util::shell::{Shell, Status};
use ltt::util::GlobalContext;

pub fn execute(args: FindArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let all = args.all;

    let request = FindRequest {
        requests: args.requests,
        computation_backends: args.computation_backend,
        cpuonly: args.cpuonly,
        channel: args.channel,
        pre: args.pre,
        platform: args.platform,
        python_version: args.python_version,
        index_url: args.index_url,
    };

    shell.status(Status::Resolving, request.requests.join(" "));
    let spinner = shell.spinner("fetching index pages");
    let outcome = ltt::ops::find(&ctx, &request);
    spinner.finish_and_clear();
    let outcome = outcome?;

    shell.status(
        Status::Info,
        format!(
            "backends {} ({}), channel {}",
            outcome.backends.backends, outcome.backends.origin, outcome.channel
        ),
    );

    if shell.is_json() {
        shell.json(&to_json(&outcome));
        return Ok(());
    }

    if outcome.extraction.is_empty() {
        shell.warn("no PyTorch distribution is required");
        return Ok(());
    }

    for (name, candidates) in &outcome.candidates {
        if candidates.is_empty() {
            shell.warn(format!(
                "no `{}` wheels for {} on the {} channel",
                name, outcome.backends.backends, outcome.channel
            ));
        }
    }

    if all {
        for candidate in outcome.candidates.values().flatten() {
            shell.out(&candidate.url);
        }
    } else {
        for candidate in select_best(&outcome.candidates).values() {
            shell.out(&candidate.url);
        }
    }

    Ok(())
}

fn to_json(outcome: &FindOutcome) -> serde_json::Value {
    let candidates: BTreeMap<&String, Vec<serde_json::Value>> = outcome
        .candidates
        .iter()
        .map(|(name, candidates)| {
            let entries = candidates
                .iter()
                .map(|c| {
                    json!({
                        "version": c.version.to_string(),
                        "backend": c.backend.to_string(),
                        "url": c.url.as_str(),
                        "filename": c.filename,
                    })
                })
                .collect();
            (name, entries)
        })
        .collect();

    json!({
        "backends": outcome.backends.backends,
        "channel": outcome.channel,
        "requirements": outcome
            .extraction
            .requirements
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>(),
        "candidates": candidates,
    })
}
