//! # Synopsys Kubernetes Operator
//!
//! Kubernetes operator that provisions Black Duck and OpsSight from custom
//! resources. A custom resource names a product version and a size tier; the
//! operator looks up the components that version declares in a
//! [`ComponentStore`], resolves sizing and images, runs every registered
//! generator and applies the resulting objects.

pub mod blackduck;
pub mod controller;
pub mod creater;
pub mod crds;
pub mod error;
pub mod manager;
pub mod opssight;
pub mod orchestrator;
pub mod reconciler;
pub mod size;
pub mod store;
pub mod types;
pub mod util;

pub use crds::*;
pub use error::{OperatorError, Result};
pub use manager::*;
pub use orchestrator::*;
pub use store::*;
pub use types::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Operator configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OperatorConfig {
    /// Namespace the operator runs in, empty to watch every namespace
    pub namespace: String,
    /// Log generated objects instead of applying them
    pub dry_run: bool,
    pub is_cluster_scoped: bool,
    pub is_openshift: bool,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    pub health_port: u16,
    /// Requeue interval after a successful reconciliation
    pub requeue_seconds: u64,
    /// Requeue interval after a failed reconciliation
    pub error_requeue_seconds: u64,
    /// 32 character key sealing upload cache master keys of resources that
    /// carry no key of their own
    #[serde(skip_serializing)]
    pub seal_key: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: "synopsys-operator".to_string(),
            dry_run: false,
            is_cluster_scoped: true,
            is_openshift: false,
            log_level: "info".to_string(),
            health_port: 8080,
            requeue_seconds: 300,
            error_requeue_seconds: 30,
            seal_key: String::new(),
        }
    }
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("namespace", &self.namespace)
            .field("dry_run", &self.dry_run)
            .field("is_cluster_scoped", &self.is_cluster_scoped)
            .field("is_openshift", &self.is_openshift)
            .field("log_level", &self.log_level)
            .field("health_port", &self.health_port)
            .field("requeue_seconds", &self.requeue_seconds)
            .field("error_requeue_seconds", &self.error_requeue_seconds)
            .field("seal_key", &if self.seal_key.is_empty() { "<unset>" } else { "<redacted>" })
            .finish()
    }
}

impl OperatorConfig {
    /// Load a YAML or JSON config file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: OperatorConfig = serde_yaml::from_str(&content)?;
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply `WATCH_NAMESPACE`, `DRY_RUN`, `LOG_LEVEL`, `HEALTH_PORT` and `SEAL_KEY`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(namespace) = lookup("WATCH_NAMESPACE") {
            self.namespace = namespace;
        }
        if let Some(dry_run) = lookup("DRY_RUN") {
            self.dry_run = matches!(dry_run.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(port) = lookup("HEALTH_PORT").and_then(|p| p.parse().ok()) {
            self.health_port = port;
        }
        if let Some(key) = lookup("SEAL_KEY") {
            self.seal_key = key;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_operator_config_default() {
        let config = OperatorConfig::default();
        assert_eq!(config.namespace, "synopsys-operator");
        assert_eq!(config.requeue_seconds, 300);
        assert_eq!(config.error_requeue_seconds, 30);
        assert!(config.is_cluster_scoped);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_operator_config_partial_yaml() {
        let config: OperatorConfig =
            serde_yaml::from_str("namespace: bd\ndryRun: true\nhealthPort: 9000\n").unwrap();
        assert_eq!(config.namespace, "bd");
        assert!(config.dry_run);
        assert_eq!(config.health_port, 9000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_operator_config_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("WATCH_NAMESPACE", "team-a"),
            ("DRY_RUN", "TRUE"),
            ("HEALTH_PORT", "not-a-port"),
        ]);
        let config = OperatorConfig::default()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.namespace, "team-a");
        assert!(config.dry_run);
        assert_eq!(config.health_port, 8080);
        assert!(config.seal_key.is_empty());

        let config = OperatorConfig::default()
            .with_env_overrides(|key| (key == "SEAL_KEY").then(|| "k".repeat(32)));
        assert_eq!(config.seal_key.len(), 32);
    }

    #[test]
    fn test_seal_key_not_serialized() {
        let config = OperatorConfig {
            seal_key: "k".repeat(32),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("sealKey"));
        assert!(!format!("{:?}", config).contains(&"k".repeat(32)));
    }
}
