//! `ltt detect` command

use anyhow::Result;
use serde_json::json;

use crate::cli::DetectArgs;
use ltt::ops::resolve_backends;
use ltt::util::shell::{Shell, Status};
use ltt::util::GlobalContext;

pub fn execute(_args: DetectArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let resolved = resolve_backends(&ctx, None, false)?;

    if shell.is_json() {
        shell.json(&json!({
            "backends": resolved.backends,
            "origin": resolved.origin.to_string(),
        }));
        return Ok(());
    }

    shell.status(
        Status::Detected,
        format!("{} computation backends ({})", resolved.backends.len(), resolved.origin),
    );
    for backend in resolved.backends.iter() {
        shell.out(backend);
    }

    Ok(())
}
