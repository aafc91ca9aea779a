//! # Black Duck
//!
//! Generators, public versions and version selection for the `Blackduck`
//! custom resource.
//!
//! [`register_components`] fills a [`ComponentStore`] with every Black Duck
//! generator. [`BlackduckApp`] owns the creaters built on top of that store and
//! maps a custom resource to the objects that realize its desired state.

mod configmap;
mod pvc;
mod rc;
mod secret;
mod service;
pub mod versions;

pub use configmap::default_knobs;
pub use pvc::default_pvcs;

use crate::creater::{Creater, CreaterSet, StoreCreater};
use crate::crds::{Blackduck, RegistryConfiguration, CREATED_BY_ANNOTATION, PRE_2019_6_0};
use crate::error::Result;
use crate::orchestrator::{ComponentList, ComponentType, CustomResourceSpec, COMPONENT_LABEL};
use crate::size;
use crate::store::ComponentStore;
use crate::types::names;
use crate::util::{get_resource_name, parse_environs};
use crate::OperatorConfig;
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Application name used in labels and resource names
pub const BLACKDUCK_NAME: &str = "blackduck";

/// Environ that switches binary analysis on
pub const BINARY_UPLOADS_ENVIRON: &str = "USE_BINARY_UPLOADS";

impl CustomResourceSpec for Blackduck {
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

/// `{app, name, component}` selector labels
pub fn get_label(component: &str, name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), BLACKDUCK_NAME.to_string()),
        ("name".to_string(), name.to_string()),
        (COMPONENT_LABEL.to_string(), component.to_string()),
    ])
}

/// Selector labels plus the product version
pub fn get_version_label(component: &str, name: &str, version: &str) -> BTreeMap<String, String> {
    let mut labels = get_label(component, name);
    labels.insert("version".to_string(), version.to_string());
    labels
}

/// `<cr>-blackduck-<component>`
pub fn resource_name(cr: &Blackduck, component: &str) -> String {
    get_resource_name(&cr.name_any(), BLACKDUCK_NAME, component)
}

/// Claim name of a default volume.
///
/// Instances created before 2019.6.0 keep their legacy `blackduck-<name>` claims.
pub fn get_pvc_name(name: &str, cr: &Blackduck) -> String {
    let legacy = cr
        .annotations()
        .get(CREATED_BY_ANNOTATION)
        .map(|value| value == PRE_2019_6_0)
        .unwrap_or(false);
    if legacy {
        format!("{}-{}", BLACKDUCK_NAME, name)
    } else {
        resource_name(cr, name)
    }
}

/// Binary analysis runs when the environs carry `USE_BINARY_UPLOADS:1`
pub fn is_binary_analysis_enabled(cr: &Blackduck) -> bool {
    parse_environs(&cr.spec.environs)
        .get(BINARY_UPLOADS_ENVIRON)
        .map(|value| value == "1")
        .unwrap_or(false)
}

/// Registers every Black Duck generator and the size table
pub fn register_components(store: &mut ComponentStore<Blackduck>) -> Result<()> {
    store.register_size(names::BLACKDUCK_SIZE_V1, size::get_size)?;
    rc::register(store)?;
    service::register(store)?;
    configmap::register(store)?;
    secret::register(store)?;
    pvc::register(store)?;
    debug!("Registered {} Black Duck components", store.len());
    Ok(())
}

/// Store holding every Black Duck generator
pub fn default_store() -> Result<ComponentStore<Blackduck>> {
    let mut store = ComponentStore::new();
    register_components(&mut store)?;
    Ok(store)
}

/// What the custom resource asks the operator to keep running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    /// Keep only the volume claims
    Stop,
    /// Keep the database and the volume claims
    DbMigrate,
    Running,
}

impl DesiredState {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("STOP") {
            DesiredState::Stop
        } else if value.eq_ignore_ascii_case("DbMigrate") {
            DesiredState::DbMigrate
        } else {
            DesiredState::Running
        }
    }
}

/// Black Duck version selection and component generation
pub struct BlackduckApp {
    creaters: CreaterSet<Blackduck>,
}

impl BlackduckApp {
    /// One creater per API revision, all sharing `store`
    pub fn new(
        store: Arc<ComponentStore<Blackduck>>,
        config: Arc<OperatorConfig>,
        client: Option<Client>,
    ) -> Result<Self> {
        let creaters: Vec<Box<dyn Creater<Blackduck>>> = vec![
            Box::new(StoreCreater::new(
                "blackduck-v1",
                versions::v1_versions(),
                store.clone(),
                config.clone(),
                client.clone(),
            )?),
            Box::new(StoreCreater::new(
                "blackduck-v2",
                versions::v2_versions(),
                store,
                config,
                client,
            )?),
        ];
        Ok(Self {
            creaters: CreaterSet::new(creaters),
        })
    }

    /// App backed by the default store and no cluster client
    pub fn offline(config: OperatorConfig) -> Result<Self> {
        Self::new(Arc::new(default_store()?), Arc::new(config), None)
    }

    /// Supported versions, newest first
    pub fn versions(&self) -> Vec<String> {
        self.creaters.versions()
    }

    pub fn get_creater(&self, version: &str) -> Result<&dyn Creater<Blackduck>> {
        self.creaters.get_creater(version)
    }

    /// Copy of `cr` with an empty version replaced by the latest one
    pub fn ensure_version(&self, cr: &Blackduck) -> Result<Blackduck> {
        let version = self.creaters.resolve_version(&cr.spec.version)?;
        let mut resolved = cr.clone();
        resolved.spec.version = version;
        Ok(resolved)
    }

    /// Objects to keep for the custom resource's desired state
    pub fn ensure(&self, cr: &Blackduck) -> Result<ComponentList> {
        let cr = self.ensure_version(cr)?;
        let creater = self.get_creater(&cr.spec.version)?;
        info!(
            "Generating Black Duck {} version {} with {}",
            cr.name_any(),
            cr.spec.version,
            creater.name()
        );
        let components = creater.ensure(&cr)?;

        Ok(match DesiredState::parse(&cr.spec.desired_state) {
            DesiredState::Stop => components.filter(ComponentType::Pvc),
            DesiredState::DbMigrate => {
                let mut list = components.filter(ComponentType::Database);
                list.extend(components.filter(ComponentType::Pvc));
                list
            }
            DesiredState::Running => components,
        })
    }

    /// One subset of the generated objects
    pub fn get_components(&self, cr: &Blackduck, component_type: ComponentType) -> Result<ComponentList> {
        let cr = self.ensure_version(cr)?;
        let creater = self.get_creater(&cr.spec.version)?;
        Ok(creater.ensure(&cr)?.filter(component_type))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::crds::{Blackduck, BlackduckSpec};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    pub fn blackduck(name: &str, version: &str) -> Blackduck {
        let mut cr = Blackduck::new(
            name,
            BlackduckSpec {
                namespace: "bd-ns".to_string(),
                size: "small".to_string(),
                version: version.to_string(),
                admin_password: STANDARD.encode("admin"),
                user_password: STANDARD.encode("user"),
                postgres_password: STANDARD.encode("postgres"),
                seal_key: STANDARD.encode("0123456789abcdef0123456789abcdef"),
                ..Default::default()
            },
        );
        cr.metadata.namespace = Some("bd-ns".to_string());
        cr
    }
}
