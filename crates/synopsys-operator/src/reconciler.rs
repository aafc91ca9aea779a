//! # Reconciler
//!
//! Applies the objects a custom resource resolves to and records the outcome
//! in its status.
//!
//! Objects go through a [`ResourceApplier`]. [`KubeApplier`] talks to the API
//! server: an existing object is replaced, a missing one created. Claims are
//! only ever created since their spec is immutable once bound. [`DryRunApplier`]
//! logs what would be applied.
//!
//! After a successful apply, objects labelled for the instance that the pass
//! no longer produces are pruned. Stopping, migrating the database or turning
//! a feature off therefore removes the pods it no longer needs. Claims survive
//! every prune, including the cleanup run when the resource is deleted.

use crate::blackduck::{BlackduckApp, DesiredState, BLACKDUCK_NAME};
use crate::crds::{Blackduck, OpsSight};
use crate::error::{OperatorError, Result};
use crate::opssight::{OpsSightApp, OPSSIGHT_NAME};
use crate::orchestrator::{ComponentList, ComponentType, CustomResourceSpec};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, Namespace, ReplicationController, Secret, Service, ServiceAccount,
};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Status states written to the custom resources
pub const STATE_RUNNING: &str = "Running";
pub const STATE_STOPPED: &str = "Stopped";
pub const STATE_DB_MIGRATE: &str = "DbMigrate";
pub const STATE_ERROR: &str = "Error";

/// Custom resource whose status subresource gets patched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTarget {
    Blackduck { namespace: String, name: String },
    OpsSight { namespace: String, name: String },
}

impl StatusTarget {
    pub fn blackduck(cr: &Blackduck) -> Self {
        StatusTarget::Blackduck {
            namespace: cr.namespace().unwrap_or_default(),
            name: cr.name_any(),
        }
    }

    pub fn opssight(cr: &OpsSight) -> Self {
        StatusTarget::OpsSight {
            namespace: cr.namespace().unwrap_or_default(),
            name: cr.name_any(),
        }
    }
}

/// Claims hold product data and are never pruned
const PRESERVED_KIND: &str = "PersistentVolumeClaim";

/// The objects of one product instance, found by their `app` and `name` labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub app: &'static str,
    pub name: String,
    pub namespace: String,
}

impl Instance {
    pub fn blackduck(cr: &Blackduck) -> Self {
        Instance {
            app: BLACKDUCK_NAME,
            name: cr.name_any(),
            namespace: cr.target_namespace(),
        }
    }

    pub fn opssight(cr: &OpsSight) -> Self {
        Instance {
            app: OPSSIGHT_NAME,
            name: cr.name_any(),
            namespace: cr.target_namespace(),
        }
    }

    /// Label selector matching every object of the instance
    pub fn selector(&self) -> String {
        format!("app={},name={}", self.app, self.name)
    }
}

/// `(kind, name)` of every object in `list`
fn object_keys(list: &ComponentList) -> Result<HashSet<(String, String)>> {
    Ok(list
        .to_manifests()?
        .iter()
        .map(|manifest| {
            (
                manifest["kind"].as_str().unwrap_or_default().to_string(),
                manifest["metadata"]["name"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect())
}

/// Destination of generated objects
#[async_trait]
pub trait ResourceApplier: Send + Sync {
    /// Creates the namespace when it does not exist
    async fn ensure_namespace(&self, namespace: &str) -> Result<()>;

    /// Applies every object of `list` in apply order, returning how many
    async fn apply(&self, list: &ComponentList) -> Result<usize>;

    /// Deletes the objects of `instance` missing from `keep`, returning how
    /// many. Claims are left alone.
    async fn prune(&self, instance: &Instance, keep: &ComponentList) -> Result<usize>;

    /// Merges `status` into the status subresource of `target`
    async fn update_status(&self, target: &StatusTarget, status: Value) -> Result<()>;
}

/// Applies objects to the cluster
pub struct KubeApplier {
    client: Client,
}

impl KubeApplier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, object: &K) -> Result<Api<K>>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        let namespace = object.namespace().ok_or_else(|| {
            OperatorError::InvalidSpec(format!("{} has no namespace", object.name_any()))
        })?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }
}

/// Replaces `object` keeping the server's resource version, or creates it
async fn replace_or_create<K, F>(api: Api<K>, object: &K, carry_over: F) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Debug,
    F: Fn(&K, &mut K),
{
    let name = object.name_any();
    match api.get(&name).await {
        Ok(existing) => {
            let mut desired = object.clone();
            desired.meta_mut().resource_version = existing.resource_version();
            carry_over(&existing, &mut desired);
            api.replace(&name, &PostParams::default(), &desired).await?;
            debug!("Replaced {} {}", K::kind(&()), name);
        }
        Err(kube::Error::Api(e)) if e.code == 404 => {
            api.create(&PostParams::default(), object).await?;
            info!("Created {} {}", K::kind(&()), name);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn create_if_missing<K>(api: Api<K>, object: &K) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Debug,
{
    let name = object.name_any();
    match api.get(&name).await {
        Ok(_) => debug!("{} {} already exists", K::kind(&()), name),
        Err(kube::Error::Api(e)) if e.code == 404 => {
            api.create(&PostParams::default(), object).await?;
            info!("Created {} {}", K::kind(&()), name);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Deletes the objects matching `selector` whose `(kind, name)` is not kept
async fn prune_kind<K>(
    api: Api<K>,
    selector: &str,
    keep: &HashSet<(String, String)>,
) -> Result<usize>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    let kind = K::kind(&()).to_string();
    let mut deleted = 0;
    for object in api.list(&ListParams::default().labels(selector)).await?.items {
        let name = object.name_any();
        if keep.contains(&(kind.clone(), name.clone())) {
            continue;
        }
        match api.delete(&name, &DeleteParams::background()).await {
            Ok(_) => {
                info!("Deleted {} {}", kind, name);
                deleted += 1;
            }
            Err(kube::Error::Api(e)) if e.code == 404 => debug!("{} {} already gone", kind, name),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(deleted)
}

fn keep_nothing<K>(_: &K, _: &mut K) {}

/// Cluster IPs are allocated by the server and immutable
fn keep_cluster_ip(existing: &Service, desired: &mut Service) {
    if let (Some(current), Some(spec)) = (existing.spec.as_ref(), desired.spec.as_mut()) {
        spec.cluster_ip = current.cluster_ip.clone();
        spec.cluster_ips = current.cluster_ips.clone();
    }
}

#[async_trait]
impl ResourceApplier for KubeApplier {
    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        if namespace.is_empty() {
            return Ok(());
        }
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.get(namespace).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                let ns = Namespace {
                    metadata: crate::util::cluster_meta(namespace, Default::default()),
                    ..Default::default()
                };
                api.create(&PostParams::default(), &ns).await?;
                info!("Created namespace {}", namespace);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply(&self, list: &ComponentList) -> Result<usize> {
        for object in &list.service_accounts {
            replace_or_create(self.namespaced(object)?, object, keep_nothing).await?;
        }
        for object in &list.cluster_roles {
            replace_or_create(Api::all(self.client.clone()), object, keep_nothing).await?;
        }
        for object in &list.cluster_role_bindings {
            replace_or_create(Api::all(self.client.clone()), object, keep_nothing).await?;
        }
        for object in &list.config_maps {
            replace_or_create(self.namespaced(object)?, object, keep_nothing).await?;
        }
        for object in &list.secrets {
            replace_or_create(self.namespaced(object)?, object, keep_nothing).await?;
        }
        for object in &list.pvcs {
            create_if_missing(self.namespaced(object)?, object).await?;
        }
        for object in &list.services {
            replace_or_create(self.namespaced(object)?, object, keep_cluster_ip).await?;
        }
        for object in &list.replication_controllers {
            replace_or_create(self.namespaced(object)?, object, keep_nothing).await?;
        }
        for object in &list.deployments {
            replace_or_create(self.namespaced(object)?, object, keep_nothing).await?;
        }
        Ok(list.len())
    }

    async fn prune(&self, instance: &Instance, keep: &ComponentList) -> Result<usize> {
        let keep = object_keys(keep)?;
        let selector = instance.selector();
        let cluster = || self.client.clone();
        let mut deleted = 0;

        // Reverse of apply order
        if instance.namespace.is_empty() {
            debug!("{} has no namespace, skipping namespaced objects", selector);
        } else {
            let ns = instance.namespace.as_str();
            let deployments: Api<Deployment> = Api::namespaced(cluster(), ns);
            let controllers: Api<ReplicationController> = Api::namespaced(cluster(), ns);
            let services: Api<Service> = Api::namespaced(cluster(), ns);
            let secrets: Api<Secret> = Api::namespaced(cluster(), ns);
            let config_maps: Api<ConfigMap> = Api::namespaced(cluster(), ns);
            deleted += prune_kind(deployments, &selector, &keep).await?;
            deleted += prune_kind(controllers, &selector, &keep).await?;
            deleted += prune_kind(services, &selector, &keep).await?;
            deleted += prune_kind(secrets, &selector, &keep).await?;
            deleted += prune_kind(config_maps, &selector, &keep).await?;
        }

        let bindings: Api<ClusterRoleBinding> = Api::all(cluster());
        let roles: Api<ClusterRole> = Api::all(cluster());
        deleted += prune_kind(bindings, &selector, &keep).await?;
        deleted += prune_kind(roles, &selector, &keep).await?;

        if !instance.namespace.is_empty() {
            let accounts: Api<ServiceAccount> = Api::namespaced(cluster(), &instance.namespace);
            deleted += prune_kind(accounts, &selector, &keep).await?;
        }
        Ok(deleted)
    }

    async fn update_status(&self, target: &StatusTarget, status: Value) -> Result<()> {
        let patch = json!({ "status": status });
        let params = PatchParams::default();
        match target {
            StatusTarget::Blackduck { namespace, name } => {
                let api: Api<Blackduck> = Api::namespaced(self.client.clone(), namespace);
                api.patch_status(name, &params, &Patch::Merge(&patch)).await?;
            }
            StatusTarget::OpsSight { namespace, name } => {
                let api: Api<OpsSight> = Api::namespaced(self.client.clone(), namespace);
                api.patch_status(name, &params, &Patch::Merge(&patch)).await?;
            }
        }
        Ok(())
    }
}

/// An object the dry-run applier has seen and not pruned
#[derive(Debug, Clone, PartialEq, Eq)]
struct LiveObject {
    app: String,
    instance: String,
    namespace: String,
    kind: String,
    name: String,
}

impl LiveObject {
    fn from_manifest(manifest: &Value) -> Self {
        let field = |value: &Value| value.as_str().unwrap_or_default().to_string();
        let metadata = &manifest["metadata"];
        LiveObject {
            app: field(&metadata["labels"]["app"]),
            instance: field(&metadata["labels"]["name"]),
            namespace: field(&metadata["namespace"]),
            kind: field(&manifest["kind"]),
            name: field(&metadata["name"]),
        }
    }

    fn key(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    fn same_object(&self, other: &LiveObject) -> bool {
        self.namespace == other.namespace && self.kind == other.kind && self.name == other.name
    }

    fn belongs_to(&self, instance: &Instance) -> bool {
        self.app == instance.app
            && self.instance == instance.name
            && (self.namespace.is_empty() || self.namespace == instance.namespace)
    }
}

/// Logs objects instead of applying them
#[derive(Default)]
pub struct DryRunApplier {
    applied: Mutex<Vec<String>>,
    live: Mutex<Vec<LiveObject>>,
    pruned: Mutex<Vec<String>>,
    statuses: Mutex<Vec<(StatusTarget, Value)>>,
}

impl DryRunApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Kind/name` of every object seen so far, in apply order
    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// `Kind/name` of the objects that would currently exist
    pub fn live(&self) -> Vec<String> {
        self.live
            .lock()
            .map(|live| live.iter().map(LiveObject::key).collect())
            .unwrap_or_default()
    }

    /// `Kind/name` of every object pruned so far
    pub fn pruned(&self) -> Vec<String> {
        self.pruned.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Every status update seen so far
    pub fn statuses(&self) -> Vec<(StatusTarget, Value)> {
        self.statuses.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ResourceApplier for DryRunApplier {
    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        debug!("Dry run: namespace {}", namespace);
        Ok(())
    }

    async fn apply(&self, list: &ComponentList) -> Result<usize> {
        let manifests = list.to_manifests()?;
        let objects: Vec<LiveObject> = manifests.iter().map(LiveObject::from_manifest).collect();
        for object in &objects {
            info!("Dry run: would apply {} {}", object.kind, object.name);
        }
        if let Ok(mut applied) = self.applied.lock() {
            applied.extend(objects.iter().map(LiveObject::key));
        }
        if let Ok(mut live) = self.live.lock() {
            for object in objects {
                if !live.iter().any(|existing| existing.same_object(&object)) {
                    live.push(object);
                }
            }
        }
        Ok(manifests.len())
    }

    async fn prune(&self, instance: &Instance, keep: &ComponentList) -> Result<usize> {
        let keep = object_keys(keep)?;
        let mut removed = Vec::new();
        if let Ok(mut live) = self.live.lock() {
            live.retain(|object| {
                let stale = object.belongs_to(instance)
                    && object.kind != PRESERVED_KIND
                    && !keep.contains(&(object.kind.clone(), object.name.clone()));
                if stale {
                    info!("Dry run: would delete {} {}", object.kind, object.name);
                    removed.push(object.key());
                }
                !stale
            });
        }
        let count = removed.len();
        if let Ok(mut pruned) = self.pruned.lock() {
            pruned.extend(removed);
        }
        Ok(count)
    }

    async fn update_status(&self, target: &StatusTarget, status: Value) -> Result<()> {
        info!("Dry run: status of {:?} would be {}", target, status);
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.push((target.clone(), status));
        }
        Ok(())
    }
}

fn status(state: &str, error_message: &str) -> Value {
    json!({
        "state": state,
        "errorMessage": error_message,
        "lastUpdate": chrono::Utc::now().to_rfc3339(),
    })
}

/// Records the outcome of a pass, keeping the pass error over a status error
async fn finish(
    applier: &dyn ResourceApplier,
    target: &StatusTarget,
    outcome: Result<usize>,
    running_state: &str,
) -> Result<usize> {
    let state = match &outcome {
        Ok(_) => status(running_state, ""),
        Err(e) => status(STATE_ERROR, &e.to_string()),
    };
    if let Err(e) = applier.update_status(target, state).await {
        warn!("Failed to update status of {:?}: {}", target, e);
        if outcome.is_ok() {
            return Err(e);
        }
    }
    outcome
}

async fn apply_blackduck(
    cr: &Blackduck,
    app: &BlackduckApp,
    applier: &dyn ResourceApplier,
) -> Result<usize> {
    let list = app.ensure(cr)?;
    applier.ensure_namespace(&cr.target_namespace()).await?;

    // Claims before the database before everything else
    let mut applied = applier.apply(&list.filter(ComponentType::Pvc)).await?;
    applied += applier.apply(&list.filter(ComponentType::Database)).await?;
    applied += applier.apply(&list.filter(ComponentType::Blackduck)).await?;

    let pruned = applier.prune(&Instance::blackduck(cr), &list).await?;
    if pruned > 0 {
        info!("Pruned {} objects of Blackduck {}", pruned, cr.name_any());
    }
    Ok(applied)
}

/// One reconciliation pass of a Black Duck instance
pub async fn reconcile_blackduck(
    cr: &Blackduck,
    app: &BlackduckApp,
    applier: &dyn ResourceApplier,
) -> Result<usize> {
    let name = cr.name_any();
    info!("Reconciling Blackduck {}/{}", cr.namespace().unwrap_or_default(), name);

    let outcome = apply_blackduck(cr, app, applier).await;
    match &outcome {
        Ok(applied) => info!("Applied {} objects for Blackduck {}", applied, name),
        Err(e) => error!("Reconciliation of Blackduck {} failed: {}", name, e),
    }

    let running_state = match DesiredState::parse(&cr.spec.desired_state) {
        DesiredState::Stop => STATE_STOPPED,
        DesiredState::DbMigrate => STATE_DB_MIGRATE,
        DesiredState::Running => STATE_RUNNING,
    };
    finish(applier, &StatusTarget::blackduck(cr), outcome, running_state).await
}

async fn apply_opssight(
    cr: &OpsSight,
    app: &OpsSightApp,
    applier: &dyn ResourceApplier,
) -> Result<usize> {
    let list = app.ensure(cr)?;
    applier.ensure_namespace(&cr.target_namespace()).await?;
    let applied = applier.apply(&list).await?;

    let pruned = applier.prune(&Instance::opssight(cr), &list).await?;
    if pruned > 0 {
        info!("Pruned {} objects of OpsSight {}", pruned, cr.name_any());
    }
    Ok(applied)
}

/// One reconciliation pass of an OpsSight instance
pub async fn reconcile_opssight(
    cr: &OpsSight,
    app: &OpsSightApp,
    applier: &dyn ResourceApplier,
) -> Result<usize> {
    let name = cr.name_any();
    info!("Reconciling OpsSight {}/{}", cr.namespace().unwrap_or_default(), name);

    let outcome = apply_opssight(cr, app, applier).await;
    match &outcome {
        Ok(applied) => info!("Applied {} objects for OpsSight {}", applied, name),
        Err(e) => error!("Reconciliation of OpsSight {} failed: {}", name, e),
    }

    let running_state = if cr.spec.desired_state.eq_ignore_ascii_case("STOP") {
        STATE_STOPPED
    } else {
        STATE_RUNNING
    };
    finish(applier, &StatusTarget::opssight(cr), outcome, running_state).await
}

/// Deletes every object of a removed Black Duck instance except its claims
pub async fn cleanup_blackduck(cr: &Blackduck, applier: &dyn ResourceApplier) -> Result<usize> {
    let deleted = applier
        .prune(&Instance::blackduck(cr), &ComponentList::default())
        .await?;
    info!("Cleaned up {} objects of Blackduck {}", deleted, cr.name_any());
    Ok(deleted)
}

/// Deletes every object of a removed OpsSight instance
pub async fn cleanup_opssight(cr: &OpsSight, applier: &dyn ResourceApplier) -> Result<usize> {
    let deleted = applier
        .prune(&Instance::opssight(cr), &ComponentList::default())
        .await?;
    info!("Cleaned up {} objects of OpsSight {}", deleted, cr.name_any());
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackduck::test_support::blackduck;
    use crate::opssight::test_support::opssight;
    use crate::OperatorConfig;

    fn position(applied: &[String], prefix: &str) -> usize {
        applied
            .iter()
            .position(|entry| entry.starts_with(prefix))
            .unwrap()
    }

    #[tokio::test]
    async fn test_blackduck_apply_order() {
        let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
        let applier = DryRunApplier::new();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.persistent_storage = true;

        let applied = reconcile_blackduck(&cr, &app, &applier).await.unwrap();
        let seen = applier.applied();
        assert_eq!(applied, seen.len());

        let first_pvc = position(&seen, "PersistentVolumeClaim/");
        let database = position(&seen, "ReplicationController/hub-blackduck-postgres");
        let webapp = position(&seen, "ReplicationController/hub-blackduck-webapp-logstash");
        assert_eq!(first_pvc, 0);
        assert!(database < webapp);

        let statuses = applier.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].1["state"], STATE_RUNNING);
        assert_eq!(statuses[0].1["errorMessage"], "");
    }

    #[tokio::test]
    async fn test_blackduck_stop_keeps_claims() {
        let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
        let applier = DryRunApplier::new();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.persistent_storage = true;
        cr.spec.desired_state = "STOP".to_string();

        reconcile_blackduck(&cr, &app, &applier).await.unwrap();
        assert!(applier
            .applied()
            .iter()
            .all(|entry| entry.starts_with("PersistentVolumeClaim/")));
        assert_eq!(applier.statuses()[0].1["state"], STATE_STOPPED);
    }

    #[tokio::test]
    async fn test_failure_recorded_in_status() {
        let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
        let applier = DryRunApplier::new();
        let cr = blackduck("hub", "1.0.0");

        let err = reconcile_blackduck(&cr, &app, &applier).await.unwrap_err();
        assert!(applier.applied().is_empty());
        let statuses = applier.statuses();
        assert_eq!(statuses[0].0, StatusTarget::blackduck(&cr));
        assert_eq!(statuses[0].1["state"], STATE_ERROR);
        assert_eq!(statuses[0].1["errorMessage"], err.to_string());
    }

    #[tokio::test]
    async fn test_opssight_reconcile() {
        let app = OpsSightApp::offline(OperatorConfig::default()).unwrap();
        let applier = DryRunApplier::new();
        let cr = opssight("ops", "");

        reconcile_opssight(&cr, &app, &applier).await.unwrap();
        let seen = applier.applied();
        assert!(position(&seen, "ServiceAccount/") < position(&seen, "ConfigMap/"));
        assert!(position(&seen, "Service/") < position(&seen, "ReplicationController/"));
        assert_eq!(seen.last().map(String::as_str), Some("Deployment/ops-opssight-prometheus"));
    }

    #[test]
    fn test_instance_selector() {
        let cr = blackduck("hub", "2019.6.0");
        let instance = Instance::blackduck(&cr);
        assert_eq!(instance.selector(), "app=blackduck,name=hub");
        assert_eq!(instance.namespace, "bd-ns");
        assert_eq!(Instance::opssight(&opssight("ops", "")).selector(), "app=opssight,name=ops");
    }

    #[tokio::test]
    async fn test_blackduck_stop_prunes_pods() {
        let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
        let applier = DryRunApplier::new();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.persistent_storage = true;

        reconcile_blackduck(&cr, &app, &applier).await.unwrap();
        assert!(applier.pruned().is_empty());
        let claims = applier
            .live()
            .iter()
            .filter(|key| key.starts_with("PersistentVolumeClaim/"))
            .count();
        assert!(claims > 0);

        cr.spec.desired_state = "STOP".to_string();
        reconcile_blackduck(&cr, &app, &applier).await.unwrap();
        let live = applier.live();
        assert_eq!(live.len(), claims);
        assert!(live.iter().all(|key| key.starts_with("PersistentVolumeClaim/")));

        let pruned = applier.pruned();
        assert!(pruned.contains(&"ReplicationController/hub-blackduck-webserver".to_string()));
        assert!(pruned.contains(&"ReplicationController/hub-blackduck-postgres".to_string()));
        assert!(!pruned.iter().any(|key| key.starts_with("PersistentVolumeClaim/")));
    }

    #[tokio::test]
    async fn test_blackduck_db_migrate_keeps_database() {
        let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
        let applier = DryRunApplier::new();
        let mut cr = blackduck("hub", "2019.6.0");

        reconcile_blackduck(&cr, &app, &applier).await.unwrap();
        cr.spec.desired_state = "DbMigrate".to_string();
        reconcile_blackduck(&cr, &app, &applier).await.unwrap();

        let live = applier.live();
        assert!(live.contains(&"ReplicationController/hub-blackduck-postgres".to_string()));
        assert!(!live.contains(&"ReplicationController/hub-blackduck-webserver".to_string()));
        assert_eq!(applier.statuses()[1].1["state"], STATE_DB_MIGRATE);
    }

    #[tokio::test]
    async fn test_prune_leaves_other_instances() {
        let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
        let applier = DryRunApplier::new();
        let other = blackduck("other", "2019.6.0");
        reconcile_blackduck(&other, &app, &applier).await.unwrap();
        let before = applier.live().len();

        let mut cr = blackduck("hub", "2019.6.0");
        reconcile_blackduck(&cr, &app, &applier).await.unwrap();
        cr.spec.desired_state = "STOP".to_string();
        reconcile_blackduck(&cr, &app, &applier).await.unwrap();

        assert_eq!(applier.live().len(), before);
        assert!(applier.pruned().iter().all(|key| key.contains("hub-")));
    }

    #[tokio::test]
    async fn test_opssight_disabled_feature_pruned() {
        let app = OpsSightApp::offline(OperatorConfig::default()).unwrap();
        let applier = DryRunApplier::new();
        let mut cr = opssight("ops", "");
        cr.spec.enable_metrics = true;

        reconcile_opssight(&cr, &app, &applier).await.unwrap();
        assert!(applier.live().contains(&"Deployment/ops-opssight-prometheus".to_string()));

        cr.spec.enable_metrics = false;
        reconcile_opssight(&cr, &app, &applier).await.unwrap();
        assert!(!applier.live().contains(&"Deployment/ops-opssight-prometheus".to_string()));
        assert!(applier.pruned().contains(&"Deployment/ops-opssight-prometheus".to_string()));
        assert!(applier.live().contains(&"ReplicationController/ops-opssight-opssight-core".to_string()));
    }

    #[tokio::test]
    async fn test_cleanup_keeps_claims() {
        let app = BlackduckApp::offline(OperatorConfig::default()).unwrap();
        let applier = DryRunApplier::new();
        let mut cr = blackduck("hub", "2019.6.0");
        cr.spec.persistent_storage = true;
        reconcile_blackduck(&cr, &app, &applier).await.unwrap();

        let deleted = cleanup_blackduck(&cr, &applier).await.unwrap();
        assert_eq!(deleted, applier.pruned().len());
        assert!(deleted > 0);
        let live = applier.live();
        assert!(!live.is_empty());
        assert!(live.iter().all(|key| key.starts_with("PersistentVolumeClaim/")));

        let ops = opssight("ops", "");
        reconcile_opssight(&ops, &OpsSightApp::offline(OperatorConfig::default()).unwrap(), &applier)
            .await
            .unwrap();
        cleanup_opssight(&ops, &applier).await.unwrap();
        assert!(applier.live().iter().all(|key| key.starts_with("PersistentVolumeClaim/")));
    }
}
