//! synopsysctl entry point

use anyhow::Result;
use clap::Parser;
use synopsysctl::commands::{Cli, CommandExecutor};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let executor = CommandExecutor::from_env();
    let result = executor.execute(cli.command)?;

    if !result.output.is_empty() {
        println!("{}", result.output.trim_end());
    }
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
