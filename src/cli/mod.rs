// CLI module
// Argument definitions and command entry points for the `bugrefine` binary

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use commands::{apply_overrides, build_controller, run_fetch, run_refine};

use crate::refinement::RequestKind;

#[derive(Parser, Debug)]
#[command(name = "bugrefine")]
#[command(about = "Iteratively critique and refine an LLM bug analysis", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: ~/.bugrefine/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the refinement loop over an initial analysis
    Refine(RefineArgs),

    /// Run a single data request and print the artifact
    Fetch {
        #[arg(value_enum)]
        kind: KindArg,

        /// File path or search query
        target: String,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct RefineArgs {
    /// Initial analysis (JSON object)
    #[arg(short, long)]
    pub analysis: PathBuf,

    /// Initial repository context (JSON)
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Run identifier used in logs and audit file names (default: random)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Write the run result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Convergence score threshold (1-10)
    #[arg(long)]
    pub threshold: Option<u8>,

    /// Directory for per-iteration audit files
    #[arg(long)]
    pub persist_dir: Option<PathBuf>,

    /// Local checkout to serve file reads and searches from
    #[arg(long)]
    pub repo_root: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    ReadFile,
    SearchCode,
}

impl From<KindArg> for RequestKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::ReadFile => RequestKind::ReadFile,
            KindArg::SearchCode => RequestKind::SearchCode,
        }
    }
}
