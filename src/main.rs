use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gpupack::config::Config;
use gpupack::scheduler;

/// Decide whether a pod workload fits on a pool of GPUs and show how.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the workload configuration file.
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;
    scheduler::run(&cfg);
    Ok(())
}
