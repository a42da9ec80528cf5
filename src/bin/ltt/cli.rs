//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;

use ltt::util::shell::ColorChoice;

/// ltt - Backend-aware resolution of PyTorch distribution wheels
#[derive(Parser)]
#[command(name = "ltt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto", value_name = "WHEN")]
    pub color: ColorChoice,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the computation backends this machine supports
    Detect(DetectArgs),

    /// Print the PyTorch family requirements an install request needs
    Extract(ExtractArgs),

    /// Find the wheels of the needed family members
    Find(FindArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct DetectArgs {
    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Requirements, e.g. `torchvision==0.9.1` or `kornia`
    #[arg(required = true)]
    pub requests: Vec<String>,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct FindArgs {
    /// Requirements, e.g. `torchvision==0.9.1` or `kornia`
    #[arg(required = true)]
    pub requests: Vec<String>,

    /// Comma-separated computation backends, e.g. `cpu,cu118`
    #[arg(long = "computation-backend", value_name = "LIST")]
    pub computation_backend: Option<String>,

    /// Only consider CPU wheels
    #[arg(long, conflicts_with = "computation_backend")]
    pub cpuonly: bool,

    /// Release channel: stable, test, nightly, lts
    #[arg(long)]
    pub channel: Option<String>,

    /// Use the test channel unless another one is chosen
    #[arg(long)]
    pub pre: bool,

    /// Target platform tag, e.g. `linux_x86_64`
    #[arg(long)]
    pub platform: Option<String>,

    /// Target Python version, e.g. `3.10`
    #[arg(long)]
    pub python_version: Option<String>,

    /// Base URL of the backend-partitioned indices
    #[arg(long, value_name = "URL")]
    pub index_url: Option<String>,

    /// Print every candidate instead of the best one
    #[arg(long)]
    pub all: bool,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: CompletionShell,
}
