//! Error types for the Synopsys operator

use crate::store::GeneratorKind;
use crate::types::ComponentName;
use thiserror::Error;

/// Errors raised while generating or applying components
#[derive(Error, Debug)]
pub enum OperatorError {
    /// A version manifest names a component the store does not hold
    #[error("{kind} {name} couldn't be found")]
    ComponentNotFound {
        kind: GeneratorKind,
        name: ComponentName,
    },

    /// The requested size tier is not in the size table
    #[error("size {0} couldn't be found")]
    SizeNotFound(String),

    /// The size table has no entry for a pod sub-component
    #[error("replication controller {component} couldn't be found in size [{size}]")]
    SizeComponentNotFound { component: String, size: String },

    /// Two generators registered under the same name
    #[error("{kind} {name} is already registered")]
    DuplicateRegistration {
        kind: GeneratorKind,
        name: ComponentName,
    },

    /// No creater handles the requested version
    #[error("version {0} is not supported")]
    VersionNotSupported(String),

    /// The requested version is not in the supported list
    #[error("version '{version}' is not supported.  Supported versions: {supported}")]
    UnsupportedVersion { version: String, supported: String },

    /// Invalid custom resource content
    #[error("Invalid custom resource: {0}")]
    InvalidSpec(String),

    /// Secret material that is not valid base64
    #[error("{0}")]
    Decode(String),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Adding or removing the cleanup finalizer failed
    #[error("Finalizer error: {0}")]
    Finalizer(String),
}

/// Result type for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Configuration errors fail the same way on every retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OperatorError::Kube(_) | OperatorError::Io(_) | OperatorError::Finalizer(_)
        )
    }

    pub fn component_not_found(kind: GeneratorKind, name: ComponentName) -> Self {
        OperatorError::ComponentNotFound { kind, name }
    }

    pub fn unsupported_version<I, S>(version: &str, supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let supported = supported
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        OperatorError::UnsupportedVersion {
            version: version.to_string(),
            supported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::names;

    #[test]
    fn test_component_not_found_message() {
        let err = OperatorError::component_not_found(GeneratorKind::Rc, names::BLACKDUCK_SCAN_RC_V1);
        assert_eq!(err.to_string(), "rc blackDuckScanRCV1 couldn't be found");
    }

    #[test]
    fn test_unsupported_version_message() {
        let err = OperatorError::unsupported_version("1.0.0", ["2019.6.0", "2019.6.1"]);
        assert_eq!(
            err.to_string(),
            "version '1.0.0' is not supported.  Supported versions: 2019.6.0, 2019.6.1"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_size_component_message() {
        let err = OperatorError::SizeComponentNotFound {
            component: "postgres".to_string(),
            size: "small".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "replication controller postgres couldn't be found in size [small]"
        );
    }
}
