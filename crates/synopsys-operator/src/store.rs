//! # Component Store
//!
//! Registry of typed generator functions keyed by [`ComponentName`].
//!
//! Each product builds its own store explicitly at startup through the typed
//! `register_*` calls. A store is never mutated once it is shared, so
//! concurrent reconciliations read it without locking. Registering a name
//! twice for the same kind is rejected.

use crate::error::{OperatorError, Result};
use crate::types::{ComponentName, PodResource, PublicVersion, Size};
use crate::OperatorConfig;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, PersistentVolumeClaim, ReplicationController, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::Client;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Kind of object a registered generator produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Rc,
    Deployment,
    Service,
    ConfigMap,
    Secret,
    Pvc,
    ServiceAccount,
    ClusterRole,
    ClusterRoleBinding,
    Size,
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeneratorKind::Rc => "rc",
            GeneratorKind::Deployment => "deployment",
            GeneratorKind::Service => "service",
            GeneratorKind::ConfigMap => "configmap",
            GeneratorKind::Secret => "secret",
            GeneratorKind::Pvc => "pvc",
            GeneratorKind::ServiceAccount => "service account",
            GeneratorKind::ClusterRole => "cluster role",
            GeneratorKind::ClusterRoleBinding => "cluster role binding",
            GeneratorKind::Size => "size",
        };
        f.write_str(name)
    }
}

/// Inputs shared by every generator call of one reconciliation pass
pub struct GenerationContext<'a, R> {
    pub config: &'a OperatorConfig,
    pub client: Option<&'a Client>,
    pub cr: &'a R,
}

impl<'a, R> GenerationContext<'a, R> {
    pub fn new(config: &'a OperatorConfig, client: Option<&'a Client>, cr: &'a R) -> Self {
        Self { config, client, cr }
    }
}

impl<R> Clone for GenerationContext<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for GenerationContext<'_, R> {}

/// Builds one pod controller from its resolved [`PodResource`]
pub type PodGenerator<R, T> =
    Arc<dyn Fn(&PodResource, &GenerationContext<'_, R>) -> Result<Option<T>> + Send + Sync>;

/// Builds zero or more objects of one kind
pub type Generator<R, T> = Arc<dyn Fn(&GenerationContext<'_, R>) -> Result<Vec<T>> + Send + Sync>;

/// Resolves a tier name into per sub-component sizes
pub type SizeProvider = Arc<dyn Fn(&str) -> Option<HashMap<String, Size>> + Send + Sync>;

/// Generator registry for custom resources of type `R`
pub struct ComponentStore<R> {
    rcs: HashMap<ComponentName, PodGenerator<R, ReplicationController>>,
    deployments: HashMap<ComponentName, PodGenerator<R, Deployment>>,
    services: HashMap<ComponentName, Generator<R, Service>>,
    config_maps: HashMap<ComponentName, Generator<R, ConfigMap>>,
    secrets: HashMap<ComponentName, Generator<R, Secret>>,
    pvcs: HashMap<ComponentName, Generator<R, PersistentVolumeClaim>>,
    service_accounts: HashMap<ComponentName, Generator<R, ServiceAccount>>,
    cluster_roles: HashMap<ComponentName, Generator<R, ClusterRole>>,
    cluster_role_bindings: HashMap<ComponentName, Generator<R, ClusterRoleBinding>>,
    sizes: HashMap<ComponentName, SizeProvider>,
}

impl<R> Default for ComponentStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn insert<G>(
    map: &mut HashMap<ComponentName, G>,
    kind: GeneratorKind,
    name: ComponentName,
    generator: G,
) -> Result<()> {
    if map.contains_key(&name) {
        warn!("Rejected duplicate registration of {} {}", kind, name);
        return Err(OperatorError::DuplicateRegistration { kind, name });
    }
    debug!("Registered {} {}", kind, name);
    map.insert(name, generator);
    Ok(())
}

fn lookup<G>(map: &HashMap<ComponentName, G>, kind: GeneratorKind, name: ComponentName) -> Result<&G> {
    map.get(&name)
        .ok_or_else(|| OperatorError::component_not_found(kind, name))
}

impl<R> ComponentStore<R> {
    pub fn new() -> Self {
        Self {
            rcs: HashMap::new(),
            deployments: HashMap::new(),
            services: HashMap::new(),
            config_maps: HashMap::new(),
            secrets: HashMap::new(),
            pvcs: HashMap::new(),
            service_accounts: HashMap::new(),
            cluster_roles: HashMap::new(),
            cluster_role_bindings: HashMap::new(),
            sizes: HashMap::new(),
        }
    }

    pub fn register_rc<F>(&mut self, name: ComponentName, generator: F) -> Result<()>
    where
        F: Fn(&PodResource, &GenerationContext<'_, R>) -> Result<Option<ReplicationController>>
            + Send
            + Sync
            + 'static,
    {
        insert(&mut self.rcs, GeneratorKind::Rc, name, Arc::new(generator))
    }

    pub fn register_deployment<F>(&mut self, name: ComponentName, generator: F) -> Result<()>
    where
        F: Fn(&PodResource, &GenerationContext<'_, R>) -> Result<Option<Deployment>>
            + Send
            + Sync
            + 'static,
    {
        insert(&mut self.deployments, GeneratorKind::Deployment, name, Arc::new(generator))
    }

    pub fn register_service<F>(&mut self, name: ComponentName, generator: F) -> Result<()>
    where
        F: Fn(&GenerationContext<'_, R>) -> Result<Vec<Service>> + Send + Sync + 'static,
    {
        insert(&mut self.services, GeneratorKind::Service, name, Arc::new(generator))
    }

    pub fn register_config_map<F>(&mut self, name: ComponentName, generator: F) -> Result<()>
    where
        F: Fn(&GenerationContext<'_, R>) -> Result<Vec<ConfigMap>> + Send + Sync + 'static,
    {
        insert(&mut self.config_maps, GeneratorKind::ConfigMap, name, Arc::new(generator))
    }

    pub fn register_secret<F>(&mut self, name: ComponentName, generator: F) -> Result<()>
    where
        F: Fn(&GenerationContext<'_, R>) -> Result<Vec<Secret>> + Send + Sync + 'static,
    {
        insert(&mut self.secrets, GeneratorKind::Secret, name, Arc::new(generator))
    }

    pub fn register_pvc<F>(&mut self, name: ComponentName, generator: F) -> Result<()>
    where
        F: Fn(&GenerationContext<'_, R>) -> Result<Vec<PersistentVolumeClaim>>
            + Send
            + Sync
            + 'static,
    {
        insert(&mut self.pvcs, GeneratorKind::Pvc, name, Arc::new(generator))
    }

    pub fn register_service_account<F>(&mut self, name: ComponentName, generator: F) -> Result<()>
    where
        F: Fn(&GenerationContext<'_, R>) -> Result<Vec<ServiceAccount>> + Send + Sync + 'static,
    {
        insert(
            &mut self.service_accounts,
            GeneratorKind::ServiceAccount,
            name,
            Arc::new(generator),
        )
    }

    pub fn register_cluster_role<F>(&mut self, name: ComponentName, generator: F) -> Result<()>
    where
        F: Fn(&GenerationContext<'_, R>) -> Result<Vec<ClusterRole>> + Send + Sync + 'static,
    {
        insert(&mut self.cluster_roles, GeneratorKind::ClusterRole, name, Arc::new(generator))
    }

    pub fn register_cluster_role_binding<F>(
        &mut self,
        name: ComponentName,
        generator: F,
    ) -> Result<()>
    where
        F: Fn(&GenerationContext<'_, R>) -> Result<Vec<ClusterRoleBinding>>
            + Send
            + Sync
            + 'static,
    {
        insert(
            &mut self.cluster_role_bindings,
            GeneratorKind::ClusterRoleBinding,
            name,
            Arc::new(generator),
        )
    }

    pub fn register_size<F>(&mut self, name: ComponentName, provider: F) -> Result<()>
    where
        F: Fn(&str) -> Option<HashMap<String, Size>> + Send + Sync + 'static,
    {
        insert(&mut self.sizes, GeneratorKind::Size, name, Arc::new(provider))
    }

    pub fn rc(&self, name: ComponentName) -> Result<&PodGenerator<R, ReplicationController>> {
        lookup(&self.rcs, GeneratorKind::Rc, name)
    }

    pub fn deployment(&self, name: ComponentName) -> Result<&PodGenerator<R, Deployment>> {
        lookup(&self.deployments, GeneratorKind::Deployment, name)
    }

    pub fn service(&self, name: ComponentName) -> Result<&Generator<R, Service>> {
        lookup(&self.services, GeneratorKind::Service, name)
    }

    pub fn config_map(&self, name: ComponentName) -> Result<&Generator<R, ConfigMap>> {
        lookup(&self.config_maps, GeneratorKind::ConfigMap, name)
    }

    pub fn secret(&self, name: ComponentName) -> Result<&Generator<R, Secret>> {
        lookup(&self.secrets, GeneratorKind::Secret, name)
    }

    pub fn pvc(&self, name: ComponentName) -> Result<&Generator<R, PersistentVolumeClaim>> {
        lookup(&self.pvcs, GeneratorKind::Pvc, name)
    }

    pub fn service_account(&self, name: ComponentName) -> Result<&Generator<R, ServiceAccount>> {
        lookup(&self.service_accounts, GeneratorKind::ServiceAccount, name)
    }

    pub fn cluster_role(&self, name: ComponentName) -> Result<&Generator<R, ClusterRole>> {
        lookup(&self.cluster_roles, GeneratorKind::ClusterRole, name)
    }

    pub fn cluster_role_binding(
        &self,
        name: ComponentName,
    ) -> Result<&Generator<R, ClusterRoleBinding>> {
        lookup(&self.cluster_role_bindings, GeneratorKind::ClusterRoleBinding, name)
    }

    pub fn size(&self, name: ComponentName) -> Result<&SizeProvider> {
        lookup(&self.sizes, GeneratorKind::Size, name)
    }

    pub fn contains(&self, kind: GeneratorKind, name: ComponentName) -> bool {
        match kind {
            GeneratorKind::Rc => self.rcs.contains_key(&name),
            GeneratorKind::Deployment => self.deployments.contains_key(&name),
            GeneratorKind::Service => self.services.contains_key(&name),
            GeneratorKind::ConfigMap => self.config_maps.contains_key(&name),
            GeneratorKind::Secret => self.secrets.contains_key(&name),
            GeneratorKind::Pvc => self.pvcs.contains_key(&name),
            GeneratorKind::ServiceAccount => self.service_accounts.contains_key(&name),
            GeneratorKind::ClusterRole => self.cluster_roles.contains_key(&name),
            GeneratorKind::ClusterRoleBinding => self.cluster_role_bindings.contains_key(&name),
            GeneratorKind::Size => self.sizes.contains_key(&name),
        }
    }

    /// Total number of registered generators
    pub fn len(&self) -> usize {
        self.rcs.len()
            + self.deployments.len()
            + self.services.len()
            + self.config_maps.len()
            + self.secrets.len()
            + self.pvcs.len()
            + self.service_accounts.len()
            + self.cluster_roles.len()
            + self.cluster_role_bindings.len()
            + self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Components a version names that have no registered generator
    pub fn missing(&self, version: &PublicVersion) -> Vec<(GeneratorKind, ComponentName)> {
        let mut wanted = vec![(GeneratorKind::Size, version.size)];
        wanted.extend(version.rcs.values().map(|rc| (GeneratorKind::Rc, rc.identifier)));
        wanted.extend(
            version
                .deployments
                .values()
                .map(|d| (GeneratorKind::Deployment, d.identifier)),
        );
        let lists = [
            (GeneratorKind::Service, &version.services),
            (GeneratorKind::ConfigMap, &version.config_maps),
            (GeneratorKind::Secret, &version.secrets),
            (GeneratorKind::Pvc, &version.pvcs),
            (GeneratorKind::ServiceAccount, &version.service_accounts),
            (GeneratorKind::ClusterRole, &version.cluster_roles),
            (GeneratorKind::ClusterRoleBinding, &version.cluster_role_bindings),
        ];
        for (kind, names) in lists {
            wanted.extend(names.iter().map(|name| (kind, *name)));
        }

        wanted
            .into_iter()
            .filter(|(kind, name)| !self.contains(*kind, *name))
            .collect()
    }

    /// Fails on the first component a version names but the store lacks
    pub fn validate(&self, version: &PublicVersion) -> Result<()> {
        match self.missing(version).into_iter().next() {
            Some((kind, name)) => Err(OperatorError::component_not_found(kind, name)),
            None => Ok(()),
        }
    }
}

impl<R> fmt::Debug for ComponentStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field("rcs", &self.rcs.len())
            .field("deployments", &self.deployments.len())
            .field("services", &self.services.len())
            .field("config_maps", &self.config_maps.len())
            .field("secrets", &self.secrets.len())
            .field("pvcs", &self.pvcs.len())
            .field("service_accounts", &self.service_accounts.len())
            .field("cluster_roles", &self.cluster_roles.len())
            .field("cluster_role_bindings", &self.cluster_role_bindings.len())
            .field("sizes", &self.sizes.len())
            .finish()
    }
}
