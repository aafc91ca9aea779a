//! # OpsSight
//!
//! Generators and version selection for the `OpsSight` custom resource. The
//! pod and image processors, skyfire and metrics are optional; a disabled
//! generator yields nothing.

mod config;
mod rbac;
mod rc;
mod service;
pub mod versions;

use crate::creater::{Creater, CreaterSet, StoreCreater};
use crate::crds::{OpsSight, RegistryConfiguration};
use crate::error::Result;
use crate::orchestrator::{ComponentList, CustomResourceSpec, COMPONENT_LABEL};
use crate::size;
use crate::store::ComponentStore;
use crate::types::names;
use crate::util::get_resource_name;
use crate::OperatorConfig;
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Application name used in labels and resource names
pub const OPSSIGHT_NAME: &str = "opssight";

impl CustomResourceSpec for OpsSight {
    fn target_namespace(&self) -> String {
        if !self.spec.namespace.is_empty() {
            return self.spec.namespace.clone();
        }
        self.namespace().unwrap_or_default()
    }

    fn size(&self) -> &str {
        &self.spec.size
    }

    fn version(&self) -> &str {
        &self.spec.version
    }

    fn image_registries(&self) -> &[String] {
        &self.spec.image_registries
    }

    fn registry_configuration(&self) -> Option<&RegistryConfiguration> {
        self.spec.registry_configuration.as_ref()
    }
}

/// `{app, name, component}` labels
pub fn get_label(component: &str, name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), OPSSIGHT_NAME.to_string()),
        ("name".to_string(), name.to_string()),
        (COMPONENT_LABEL.to_string(), component.to_string()),
    ])
}

/// `<cr>-opssight-<component>`
pub fn resource_name(cr: &OpsSight, component: &str) -> String {
    get_resource_name(&cr.name_any(), OPSSIGHT_NAME, component)
}

/// Registers every OpsSight generator and the size table
pub fn register_components(store: &mut ComponentStore<OpsSight>) -> Result<()> {
    store.register_size(names::OPSSIGHT_SIZE_V1, size::get_opssight_size)?;
    rc::register(store)?;
    service::register(store)?;
    config::register(store)?;
    rbac::register(store)?;
    debug!("Registered {} OpsSight components", store.len());
    Ok(())
}

pub fn default_store() -> Result<ComponentStore<OpsSight>> {
    let mut store = ComponentStore::new();
    register_components(&mut store)?;
    Ok(store)
}

/// OpsSight version selection and component generation
pub struct OpsSightApp {
    creaters: CreaterSet<OpsSight>,
}

impl OpsSightApp {
    pub fn new(
        store: Arc<ComponentStore<OpsSight>>,
        config: Arc<OperatorConfig>,
        client: Option<Client>,
    ) -> Result<Self> {
        let creaters: Vec<Box<dyn Creater<OpsSight>>> = vec![Box::new(StoreCreater::new(
            "opssight-v1",
            versions::public_versions(),
            store,
            config,
            client,
        )?)];
        Ok(Self {
            creaters: CreaterSet::new(creaters),
        })
    }

    /// App backed by the default store and no cluster client
    pub fn offline(config: OperatorConfig) -> Result<Self> {
        Self::new(Arc::new(default_store()?), Arc::new(config), None)
    }

    /// Supported versions, newest first; the empty alias is left out
    pub fn versions(&self) -> Vec<String> {
        self.creaters
            .versions()
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn get_creater(&self, version: &str) -> Result<&dyn Creater<OpsSight>> {
        self.creaters.get_creater(version)
    }

    /// Copy of `cr` with an empty version replaced by the latest one
    pub fn ensure_version(&self, cr: &OpsSight) -> Result<OpsSight> {
        let version = self.creaters.resolve_version(&cr.spec.version)?;
        let mut resolved = cr.clone();
        resolved.spec.version = version;
        Ok(resolved)
    }

    /// Objects to keep; a stopped instance keeps nothing
    pub fn ensure(&self, cr: &OpsSight) -> Result<ComponentList> {
        let cr = self.ensure_version(cr)?;
        if cr.spec.desired_state.eq_ignore_ascii_case("STOP") {
            info!("OpsSight {} is stopped", cr.name_any());
            return Ok(ComponentList::default());
        }
        let creater = self.get_creater(&cr.spec.version)?;
        info!(
            "Generating OpsSight {} version {} with {}",
            cr.name_any(),
            cr.spec.version,
            creater.name()
        );
        creater.ensure(&cr)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::crds::{OpsSight, OpsSightSpec};

    pub fn opssight(name: &str, version: &str) -> OpsSight {
        let mut cr = OpsSight::new(
            name,
            OpsSightSpec {
                namespace: "ops".to_string(),
                version: version.to_string(),
                ..Default::default()
            },
        );
        cr.metadata.namespace = Some("ops".to_string());
        cr
    }
}
