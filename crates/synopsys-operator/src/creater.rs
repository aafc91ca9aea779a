//! # Version Selection
//!
//! A [`Creater`] turns a custom resource of the versions it declares into the
//! objects that realize it. Each product keeps a small fixed list of creaters,
//! one per API revision, and picks the one whose `versions()` contain the
//! requested version.

use crate::error::{OperatorError, Result};
use crate::orchestrator::{get_components, ComponentList, CustomResourceSpec};
use crate::store::{ComponentStore, GenerationContext};
use crate::types::PublicVersion;
use crate::OperatorConfig;
use kube::Client;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Version specific object generation strategy
pub trait Creater<R>: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Product versions this creater handles
    fn versions(&self) -> Vec<String>;

    /// Objects realizing `cr` at the version named in its spec
    fn ensure(&self, cr: &R) -> Result<ComponentList>;
}

/// Creater backed by a [`ComponentStore`] and a table of public versions
pub struct StoreCreater<R> {
    name: &'static str,
    versions: BTreeMap<String, PublicVersion>,
    store: Arc<ComponentStore<R>>,
    config: Arc<OperatorConfig>,
    client: Option<Client>,
}

impl<R> StoreCreater<R> {
    /// Fails when a version names a component the store does not hold
    pub fn new(
        name: &'static str,
        versions: BTreeMap<String, PublicVersion>,
        store: Arc<ComponentStore<R>>,
        config: Arc<OperatorConfig>,
        client: Option<Client>,
    ) -> Result<Self> {
        for (version, public) in &versions {
            store.validate(public).map_err(|e| {
                OperatorError::InvalidSpec(format!("{} version {}: {}", name, version, e))
            })?;
        }
        debug!("Creater {} handles {} versions", name, versions.len());
        Ok(Self {
            name,
            versions,
            store,
            config,
            client,
        })
    }

    pub fn public_version(&self, version: &str) -> Option<&PublicVersion> {
        self.versions.get(version)
    }
}

impl<R> Creater<R> for StoreCreater<R>
where
    R: CustomResourceSpec + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn versions(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }

    fn ensure(&self, cr: &R) -> Result<ComponentList> {
        let public = self
            .versions
            .get(cr.version())
            .ok_or_else(|| OperatorError::VersionNotSupported(cr.version().to_string()))?;
        let ctx = GenerationContext::new(&self.config, self.client.as_ref(), cr);
        get_components(&self.store, public, &ctx)
    }
}

fn numeric_parts(version: &str) -> Option<Vec<u64>> {
    if version.is_empty() {
        return None;
    }
    version.split('.').map(|part| part.parse().ok()).collect()
}

/// Compares dotted numeric versions; `2019.10.0` is newer than `2019.6.1`
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (numeric_parts(a), numeric_parts(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Newest numeric version; aliases such as `latest` are never picked
pub fn latest_version<I, S>(versions: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    versions
        .into_iter()
        .filter(|v| numeric_parts(v.as_ref()).is_some())
        .max_by(|a, b| compare_versions(a.as_ref(), b.as_ref()))
        .map(|v| v.as_ref().to_string())
}

/// The creaters of one product
pub struct CreaterSet<R> {
    creaters: Vec<Box<dyn Creater<R>>>,
}

impl<R> CreaterSet<R> {
    pub fn new(creaters: Vec<Box<dyn Creater<R>>>) -> Self {
        Self { creaters }
    }

    /// First creater whose versions contain `version`
    pub fn get_creater(&self, version: &str) -> Result<&dyn Creater<R>> {
        self.creaters
            .iter()
            .find(|creater| creater.versions().iter().any(|v| v == version))
            .map(|creater| creater.as_ref())
            .ok_or_else(|| OperatorError::VersionNotSupported(version.to_string()))
    }

    /// Every supported version, newest first
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self
            .creaters
            .iter()
            .flat_map(|creater| creater.versions())
            .collect();
        versions.sort_by(|a, b| compare_versions(b, a));
        versions.dedup();
        versions
    }

    /// Resolves an empty request to the newest version and rejects unknown ones
    pub fn resolve_version(&self, requested: &str) -> Result<String> {
        let versions = self.versions();
        if requested.is_empty() {
            let latest = latest_version(&versions)
                .ok_or_else(|| OperatorError::unsupported_version(requested, &versions))?;
            info!("No version requested, using latest {}", latest);
            return Ok(latest);
        }
        if versions.iter().any(|v| v == requested) {
            Ok(requested.to_string())
        } else {
            Err(OperatorError::unsupported_version(requested, &versions))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCreater(Vec<&'static str>);

    impl Creater<()> for FixedCreater {
        fn name(&self) -> &str {
            "fixed"
        }

        fn versions(&self) -> Vec<String> {
            self.0.iter().map(|v| v.to_string()).collect()
        }

        fn ensure(&self, _cr: &()) -> Result<ComponentList> {
            Ok(ComponentList::default())
        }
    }

    fn creaters() -> CreaterSet<()> {
        CreaterSet::new(vec![
            Box::new(FixedCreater(vec!["2018.12.0", "2019.2.2"])),
            Box::new(FixedCreater(vec!["2019.4.0", "2019.6.1"])),
        ])
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("2019.6.1", "2019.6.0"), Ordering::Greater);
        assert_eq!(compare_versions("2019.10.0", "2019.6.1"), Ordering::Greater);
        assert_eq!(compare_versions("2.2.4", "2.2.4"), Ordering::Equal);
        assert_eq!(compare_versions("latest", "2.2.4"), Ordering::Less);
    }

    #[test]
    fn test_latest_version_skips_aliases() {
        assert_eq!(
            latest_version(["2.2.3", "latest", "", "2.2.4"]),
            Some("2.2.4".to_string())
        );
        assert_eq!(latest_version(Vec::<String>::new()), None);
    }

    #[test]
    fn test_get_creater_linear_scan() {
        let set = creaters();
        assert!(set.get_creater("2019.2.2").is_ok());
        assert!(set.get_creater("2019.6.1").is_ok());
        let err = set.get_creater("1.0.0").err().unwrap();
        assert_eq!(err.to_string(), "version 1.0.0 is not supported");
    }

    #[test]
    fn test_resolve_version() {
        let set = creaters();
        assert_eq!(set.resolve_version("").unwrap(), "2019.6.1");
        assert_eq!(set.resolve_version("2019.4.0").unwrap(), "2019.4.0");

        let err = set.resolve_version("2020.1.0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "version '2020.1.0' is not supported.  Supported versions: 2019.6.1, 2019.4.0, 2019.2.2, 2018.12.0"
        );
    }
}
