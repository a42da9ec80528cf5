//! ltt CLI - Backend-aware resolution of PyTorch distribution wheels

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ltt::core::{ParseBackendError, ParseChannelError};
use ltt::resolver::ResolveError;
use ltt::util::diagnostic::suggestions;
use ltt::util::shell::{ColorChoice, Shell};
use ltt::util::Diagnostic;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("ltt=debug")
    } else if cli.quiet {
        EnvFilter::new("ltt=error")
    } else {
        EnvFilter::new("ltt=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let color = cli.color;
    if let Err(e) = run(cli) {
        report(&e, color);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let (quiet, verbose, color) = (cli.quiet, cli.verbose, cli.color);
    let shell = |json: bool| Shell::from_flags(quiet, verbose, color, json);

    match cli.command {
        Commands::Detect(args) => {
            let shell = shell(args.json);
            commands::detect::execute(args, &shell)
        }
        Commands::Extract(args) => {
            let shell = shell(args.json);
            commands::extract::execute(args, &shell)
        }
        Commands::Find(args) => {
            let shell = shell(args.json);
            commands::find::execute(args, &shell)
        }
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Render an error, as a diagnostic when its root cause is one we know.
fn report(err: &anyhow::Error, color: ColorChoice) {
    let use_color = Shell::from_flags(false, false, color, false).use_color();

    let diagnostic = if let Some(e) = err.downcast_ref::<ResolveError>() {
        Some(e.to_diagnostic())
    } else if let Some(e) = err.downcast_ref::<ParseBackendError>() {
        Some(
            Diagnostic::error(e.to_string())
                .with_context(err.to_string())
                .with_suggestion(suggestions::BACKEND_FORMAT),
        )
    } else {
        err.downcast_ref::<ParseChannelError>().map(|e| {
            Diagnostic::error(e.to_string())
                .with_context(err.to_string())
                .with_suggestion(suggestions::CHANNEL_FORMAT)
        })
    };

    match diagnostic {
        Some(diagnostic) => eprint!("{}", diagnostic.format(use_color)),
        None => eprintln!("error: {:#}", err),
    }
}
