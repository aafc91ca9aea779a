//! # Component Orchestration
//!
//! Realizes one [`PublicVersion`] into the Kubernetes objects of one custom
//! resource. Every component the version names is resolved through the
//! [`ComponentStore`]; pod controllers additionally get their replica count,
//! container bounds and images merged in from the size table and the custom
//! resource. Any lookup or generator failure aborts the whole pass.

use crate::crds::RegistryConfiguration;
use crate::error::{OperatorError, Result};
use crate::store::{ComponentStore, GenerationContext, Generator, PodGenerator};
use crate::types::{ComponentName, Container, PodResource, PublicPodResource, PublicVersion, Size};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, PersistentVolumeClaim, ReplicationController, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Label that names the sub-component an object belongs to
pub const COMPONENT_LABEL: &str = "component";

/// Sub-component value that marks database objects
pub const DATABASE_COMPONENT: &str = "postgres";

/// Read access to the custom resource fields generation depends on
pub trait CustomResourceSpec {
    /// Namespace the generated objects live in
    fn target_namespace(&self) -> String;

    /// Requested size tier
    fn size(&self) -> &str;

    /// Requested product version, empty for the latest
    fn version(&self) -> &str {
        ""
    }

    fn image_registries(&self) -> &[String] {
        &[]
    }

    fn registry_configuration(&self) -> Option<&RegistryConfiguration> {
        None
    }
}

/// Subset of generated objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    /// Everything except the database and the volume claims
    Blackduck,
    /// Objects labelled as the postgres sub-component
    Database,
    /// Volume claims only
    Pvc,
}

/// Objects produced by one generation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentList {
    pub cluster_roles: Vec<ClusterRole>,
    pub cluster_role_bindings: Vec<ClusterRoleBinding>,
    pub config_maps: Vec<ConfigMap>,
    pub deployments: Vec<Deployment>,
    pub pvcs: Vec<PersistentVolumeClaim>,
    pub replication_controllers: Vec<ReplicationController>,
    pub secrets: Vec<Secret>,
    pub services: Vec<Service>,
    pub service_accounts: Vec<ServiceAccount>,
}

fn is_database(meta: &ObjectMeta) -> bool {
    meta.labels
        .as_ref()
        .and_then(|labels| labels.get(COMPONENT_LABEL))
        .map(|component| component == DATABASE_COMPONENT)
        .unwrap_or(false)
}

fn keep<T, F>(items: &[T], meta: F, wanted: bool) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> &ObjectMeta,
{
    items
        .iter()
        .filter(|item| is_database(meta(item)) == wanted)
        .cloned()
        .collect()
}

impl ComponentList {
    pub fn len(&self) -> usize {
        self.cluster_roles.len()
            + self.cluster_role_bindings.len()
            + self.config_maps.len()
            + self.deployments.len()
            + self.pvcs.len()
            + self.replication_controllers.len()
            + self.secrets.len()
            + self.services.len()
            + self.service_accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy holding only the objects of one [`ComponentType`]
    pub fn filter(&self, component_type: ComponentType) -> ComponentList {
        match component_type {
            ComponentType::Pvc => ComponentList {
                pvcs: self.pvcs.clone(),
                ..Default::default()
            },
            ComponentType::Database | ComponentType::Blackduck => {
                let db = component_type == ComponentType::Database;
                ComponentList {
                    cluster_roles: keep(&self.cluster_roles, |o| &o.metadata, db),
                    cluster_role_bindings: keep(&self.cluster_role_bindings, |o| &o.metadata, db),
                    config_maps: keep(&self.config_maps, |o| &o.metadata, db),
                    deployments: keep(&self.deployments, |o| &o.metadata, db),
                    pvcs: Vec::new(),
                    replication_controllers: keep(&self.replication_controllers, |o| &o.metadata, db),
                    secrets: keep(&self.secrets, |o| &o.metadata, db),
                    services: keep(&self.services, |o| &o.metadata, db),
                    service_accounts: keep(&self.service_accounts, |o| &o.metadata, db),
                }
            }
        }
    }

    /// Appends every object of `other`
    pub fn extend(&mut self, other: ComponentList) {
        self.cluster_roles.extend(other.cluster_roles);
        self.cluster_role_bindings.extend(other.cluster_role_bindings);
        self.config_maps.extend(other.config_maps);
        self.deployments.extend(other.deployments);
        self.pvcs.extend(other.pvcs);
        self.replication_controllers.extend(other.replication_controllers);
        self.secrets.extend(other.secrets);
        self.services.extend(other.services);
        self.service_accounts.extend(other.service_accounts);
    }

    /// Objects as JSON values, in apply order
    pub fn to_manifests(&self) -> Result<Vec<serde_json::Value>> {
        let mut manifests = Vec::with_capacity(self.len());
        macro_rules! push_all {
            ($($field:ident),*) => {
                $(for object in &self.$field {
                    manifests.push(serde_json::to_value(object)?);
                })*
            };
        }
        push_all!(
            service_accounts,
            cluster_roles,
            cluster_role_bindings,
            config_maps,
            secrets,
            pvcs,
            services,
            replication_controllers,
            deployments
        );
        Ok(manifests)
    }
}

/// Image name without registry path or tag, e.g. `blackduck-webapp`
pub fn get_image_name(image: &str) -> Option<&str> {
    let last = image.rsplit('/').next()?;
    let name = last.split(':').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Tag of an image reference, `None` when untagged
pub fn get_image_tag(image: &str) -> Option<&str> {
    let last = image.rsplit('/').next()?;
    last.split_once(':').map(|(_, tag)| tag).filter(|t| !t.is_empty())
}

/// Final image of a container.
///
/// An `image_registries` entry that contains the default image's name wins.
/// Otherwise a registry configuration with both registry and namespace set
/// rewrites the default to `registry/namespace/name:tag`.
pub fn generate_image_tag(
    default_image: &str,
    image_registries: &[String],
    registry_config: Option<&RegistryConfiguration>,
) -> String {
    let Some(name) = get_image_name(default_image) else {
        return default_image.to_string();
    };

    if let Some(image) = image_registries.iter().find(|image| image.contains(name)) {
        return image.clone();
    }

    if let Some(config) = registry_config {
        if !config.registry.is_empty() && !config.namespace.is_empty() {
            return match get_image_tag(default_image) {
                Some(tag) => format!("{}/{}/{}:{}", config.registry, config.namespace, name, tag),
                None => format!("{}/{}/{}", config.registry, config.namespace, name),
            };
        }
    }

    default_image.to_string()
}

fn generate<'s, R: 's, T: 's>(
    kind_label: &str,
    names: &[ComponentName],
    lookup: impl Fn(ComponentName) -> Result<&'s Generator<R, T>>,
    ctx: &GenerationContext<'_, R>,
) -> Result<Vec<T>> {
    let mut objects = Vec::new();
    for name in names {
        let generator = lookup(*name)?;
        let generated = generator(ctx)?;
        debug!("Generated {} {} {}", generated.len(), kind_label, name);
        objects.extend(generated);
    }
    Ok(objects)
}

fn pod_resource<R: CustomResourceSpec>(
    key: &str,
    public: &PublicPodResource,
    sizes: &HashMap<String, Size>,
    cr: &R,
) -> Result<PodResource> {
    let size = sizes
        .get(key)
        .ok_or_else(|| OperatorError::SizeComponentNotFound {
            component: key.to_string(),
            size: cr.size().to_string(),
        })?;

    let containers = public
        .containers
        .iter()
        .map(|(name, default_image)| {
            let image = generate_image_tag(
                default_image,
                cr.image_registries(),
                cr.registry_configuration(),
            );
            (*name, Container::with_size(image, size.containers.get(name)))
        })
        .collect();

    Ok(PodResource {
        namespace: cr.target_namespace(),
        replicas: size.replica,
        containers,
    })
}

fn generate_pods<'s, R: 's, T: 's>(
    pods: &BTreeMap<String, PublicPodResource>,
    sizes: &HashMap<String, Size>,
    lookup: impl Fn(ComponentName) -> Result<&'s PodGenerator<R, T>>,
    ctx: &GenerationContext<'_, R>,
) -> Result<Vec<T>>
where
    R: CustomResourceSpec,
{
    let mut objects = Vec::new();
    for (key, public) in pods {
        let pod = pod_resource(key, public, sizes, ctx.cr)?;
        let generator = lookup(public.identifier)?;
        if let Some(object) = generator(&pod, ctx)? {
            objects.push(object);
        }
    }
    Ok(objects)
}

/// Resolves the version's size provider and the custom resource's tier
fn resolve_sizes<R: CustomResourceSpec>(
    store: &ComponentStore<R>,
    version: &PublicVersion,
    cr: &R,
) -> Result<HashMap<String, Size>> {
    let provider = store.size(version.size)?;
    provider(cr.size()).ok_or_else(|| OperatorError::SizeNotFound(cr.size().to_string()))
}

/// Generates every object `version` declares for the custom resource in `ctx`.
///
/// Fails on the first missing registration, missing size entry or generator
/// error; no partial result is returned.
pub fn get_components<R: CustomResourceSpec>(
    store: &ComponentStore<R>,
    version: &PublicVersion,
    ctx: &GenerationContext<'_, R>,
) -> Result<ComponentList> {
    let mut list = ComponentList {
        cluster_roles: generate(
            "cluster roles for",
            &version.cluster_roles,
            |n| store.cluster_role(n),
            ctx,
        )?,
        cluster_role_bindings: generate(
            "cluster role bindings for",
            &version.cluster_role_bindings,
            |n| store.cluster_role_binding(n),
            ctx,
        )?,
        config_maps: generate("config maps for", &version.config_maps, |n| store.config_map(n), ctx)?,
        ..Default::default()
    };

    let sizes = if version.rcs.is_empty() && version.deployments.is_empty() {
        HashMap::new()
    } else {
        resolve_sizes(store, version, ctx.cr)?
    };

    list.deployments = generate_pods(&version.deployments, &sizes, |n| store.deployment(n), ctx)?;
    list.pvcs = generate("pvcs for", &version.pvcs, |n| store.pvc(n), ctx)?;
    list.replication_controllers = generate_pods(&version.rcs, &sizes, |n| store.rc(n), ctx)?;
    list.secrets = generate("secrets for", &version.secrets, |n| store.secret(n), ctx)?;
    list.services = generate("services for", &version.services, |n| store.service(n), ctx)?;
    list.service_accounts = generate(
        "service accounts for",
        &version.service_accounts,
        |n| store.service_account(n),
        ctx,
    )?;

    Ok(list)
}
