//! Synopsys operator entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use synopsys_operator::{OperatorBuilder, OperatorConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "synopsys-operator", version, about = "Provisions Black Duck and OpsSight")]
struct Args {
    /// Operator configuration file (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => OperatorConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => OperatorConfig::default().with_env_overrides(|key| std::env::var(key).ok()),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Watching namespace {:?}", config.namespace);
    let manager = OperatorBuilder::from_config(config).build().await?;
    manager.run().await?;
    Ok(())
}
