//! Command definitions and execution

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kube::CustomResourceExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use synopsys_operator::blackduck::BlackduckApp;
use synopsys_operator::opssight::OpsSightApp;
use synopsys_operator::size::{get_all_default_sizes, Tier};
use synopsys_operator::{Blackduck, OperatorConfig, OpsSight};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "synopsysctl", version, about = "Render and inspect Synopsys operator resources")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the Kubernetes objects a custom resource resolves to
    Render {
        /// Custom resource file (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Product the file describes
        #[arg(short, long, value_enum, default_value_t = Kind::Blackduck)]
        kind: Kind,

        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the supported versions, newest first
    Versions {
        #[arg(short, long, value_enum, default_value_t = Kind::Blackduck)]
        kind: Kind,
    },

    /// Print the Black Duck size table
    Sizes {
        /// Only this tier
        #[arg(short, long)]
        tier: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,
    },

    /// Print a custom resource definition
    Crd {
        #[arg(short, long, value_enum, default_value_t = Kind::Blackduck)]
        kind: Kind,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Blackduck,
    Opssight,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
    JsonPretty,
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub output: String,
}

impl CommandResult {
    fn ok(output: String) -> Self {
        Self {
            success: true,
            output,
        }
    }
}

/// Serializes `value` in the requested format
pub fn format_value<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    })
}

/// Manifests as one YAML stream or one JSON array
pub fn format_manifests(manifests: &[Value], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => {
            let mut out = String::new();
            for manifest in manifests {
                out.push_str("---\n");
                out.push_str(&serde_yaml::to_string(manifest)?);
            }
            Ok(out)
        }
        _ => format_value(&manifests, format),
    }
}

/// Runs commands against offline product apps
pub struct CommandExecutor {
    config: OperatorConfig,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::with_config(OperatorConfig {
            dry_run: true,
            ..Default::default()
        })
    }

    /// Offline executor picking up `SEAL_KEY` and the other operator
    /// environment overrides
    pub fn from_env() -> Self {
        let config = OperatorConfig {
            dry_run: true,
            ..Default::default()
        };
        Self::with_config(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn with_config(config: OperatorConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, command: Commands) -> Result<CommandResult> {
        match command {
            Commands::Render {
                file,
                kind,
                format,
                output,
            } => {
                let content = std::fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?;
                let rendered = self.render(&content, kind, format)?;
                match output {
                    Some(path) => {
                        write_output(&path, &rendered)?;
                        Ok(CommandResult::ok(String::new()))
                    }
                    None => Ok(CommandResult::ok(rendered)),
                }
            }
            Commands::Versions { kind } => Ok(CommandResult::ok(self.versions(kind)?.join("\n"))),
            Commands::Sizes { tier, format } => {
                Ok(CommandResult::ok(self.sizes(tier.as_deref(), format)?))
            }
            Commands::Crd { kind } => Ok(CommandResult::ok(crd(kind)?)),
        }
    }

    /// Manifests for the custom resource in `content`
    pub fn render(&self, content: &str, kind: Kind, format: OutputFormat) -> Result<String> {
        let list = match kind {
            Kind::Blackduck => {
                let cr: Blackduck =
                    serde_yaml::from_str(content).context("parsing Blackduck resource")?;
                BlackduckApp::offline(self.config.clone())?.ensure(&cr)?
            }
            Kind::Opssight => {
                let cr: OpsSight =
                    serde_yaml::from_str(content).context("parsing OpsSight resource")?;
                OpsSightApp::offline(self.config.clone())?.ensure(&cr)?
            }
        };
        info!("Rendering {} objects", list.len());
        format_manifests(&list.to_manifests()?, format)
    }

    pub fn versions(&self, kind: Kind) -> Result<Vec<String>> {
        Ok(match kind {
            Kind::Blackduck => BlackduckApp::offline(self.config.clone())?.versions(),
            Kind::Opssight => OpsSightApp::offline(self.config.clone())?.versions(),
        })
    }

    pub fn sizes(&self, tier: Option<&str>, format: OutputFormat) -> Result<String> {
        let all = get_all_default_sizes();
        let table: BTreeMap<_, BTreeMap<_, _>> = match tier {
            Some(name) => {
                let Some(tier) = Tier::parse(name) else {
                    bail!("size {} couldn't be found", name);
                };
                all.into_iter()
                    .filter(|(key, _)| *key == tier.as_str())
                    .map(|(key, sizes)| (key, sizes.into_iter().collect()))
                    .collect()
            }
            None => all
                .into_iter()
                .map(|(key, sizes)| (key, sizes.into_iter().collect()))
                .collect(),
        };
        debug!("Printing {} size tiers", table.len());
        format_value(&table, format)
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn crd(kind: Kind) -> Result<String> {
    let crd = match kind {
        Kind::Blackduck => Blackduck::crd(),
        Kind::Opssight => OpsSight::crd(),
    };
    Ok(serde_yaml::to_string(&crd)?)
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
