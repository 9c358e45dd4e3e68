// bugrefine - iterative critique-and-refine loop for LLM bug analyses
// Main entry point

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bugrefine::cli::{run_fetch, run_refine, Cli, Commands};
use bugrefine::config::load_config;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Refine(args) => {
            run_refine(config, args).await?;
        }
        Commands::Fetch { kind, target } => {
            run_fetch(config, kind.into(), target).await?;
        }
    }

    Ok(())
}
