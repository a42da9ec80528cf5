//! `ltt extract` command

use anyhow::Result;
use serde_json::json;

use crate::cli::ExtractArgs;
use ltt::resolver::CorePin;
use ltt::util::shell::{Shell, Status};
use ltt::util::GlobalContext;

pub fn execute(args: ExtractArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;

    shell.status(Status::Resolving, args.requests.join(" "));
    let spinner = shell.spinner("walking dependencies");
    let extraction = ltt::ops::extract(&ctx, &args.requests);
    spinner.finish_and_clear();
    let extraction = extraction?;

    if let CorePin::Ambiguous(candidates) = &extraction.core_pin {
        shell.warn(format!(
            "companion pins map to several torch versions ({}); torch is left unpinned",
            candidates.join(", ")
        ));
    }

    let requirements: Vec<String> = extraction
        .requirements
        .iter()
        .map(|r| r.to_string())
        .collect();

    if shell.is_json() {
        shell.json(&json!({ "requirements": requirements }));
        return Ok(());
    }

    if requirements.is_empty() {
        shell.warn("no PyTorch distribution is required");
        return Ok(());
    }

    for requirement in &extraction.requirements {
        shell.out(requirement);
        if shell.is_verbose() {
            let chain = extraction.graph.chain(&requirement.canonical_name());
            if chain.len() > 1 {
                shell.status(Status::Info, format!("required via {}", chain.join(" -> ")));
            }
        }
    }

    shell.status(
        Status::Finished,
        format!("{} family requirements", requirements.len()),
    );
    Ok(())
}
