//! # Kubernetes Controller
//!
//! One `kube` runtime controller per custom resource kind. Both share a
//! [`Context`] holding the product apps and the applier.
//!
//! With a client in the context, resources carry [`FINALIZER_NAME`] and their
//! objects are cleaned up before the resource goes away.

use crate::blackduck::BlackduckApp;
use crate::crds::{Blackduck, OpsSight};
use crate::error::{OperatorError, Result};
use crate::opssight::OpsSightApp;
use crate::reconciler::{
    cleanup_blackduck, cleanup_opssight, reconcile_blackduck, reconcile_opssight, ResourceApplier,
};
use crate::OperatorConfig;
use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, PostParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::finalizer::{self, finalizer, Event as FinalizerEvent};
use kube::runtime::watcher::Config;
use kube::{Client, CustomResourceExt, ResourceExt};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Finalizer guarding the cleanup of a deleted resource's objects
pub const FINALIZER_NAME: &str = "synopsys.com/finalizer";

/// Shared state handed to every reconciliation
pub struct Context {
    pub applier: Arc<dyn ResourceApplier>,
    pub blackduck: BlackduckApp,
    pub opssight: OpsSightApp,
    pub config: Arc<OperatorConfig>,
    client: Option<Client>,
}

impl Context {
    pub fn new(
        applier: Arc<dyn ResourceApplier>,
        blackduck: BlackduckApp,
        opssight: OpsSightApp,
        config: Arc<OperatorConfig>,
    ) -> Self {
        Self {
            applier,
            blackduck,
            opssight,
            config,
            client: None,
        }
    }

    /// Manages the cleanup finalizer through `client`
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    fn requeue(&self) -> Action {
        Action::requeue(Duration::from_secs(self.config.requeue_seconds))
    }
}

/// Every CRD the operator serves
pub fn crds() -> Vec<CustomResourceDefinition> {
    vec![Blackduck::crd(), OpsSight::crd()]
}

/// Creates the CRDs that are not installed yet
pub async fn install_crds(client: Client) -> Result<()> {
    let api: Api<CustomResourceDefinition> = Api::all(client);
    for crd in crds() {
        let name = crd.name_any();
        match api.get(&name).await {
            Ok(_) => debug!("CRD {} already exists", name),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                info!("Installing CRD {}", name);
                api.create(&PostParams::default(), &crd).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn watched<K>(client: Client, config: &OperatorConfig) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <K as kube::Resource>::DynamicType: Default,
{
    if config.is_cluster_scoped || config.namespace.is_empty() {
        Api::all(client)
    } else {
        Api::namespaced(client, &config.namespace)
    }
}

/// Reconcile and cleanup failures pass through unchanged
fn finalizer_error(error: finalizer::Error<OperatorError>) -> OperatorError {
    match error {
        finalizer::Error::ApplyFailed(e) | finalizer::Error::CleanupFailed(e) => e,
        other => OperatorError::Finalizer(other.to_string()),
    }
}

async fn reconcile_blackduck_cr(
    cr: Arc<Blackduck>,
    ctx: Arc<Context>,
) -> std::result::Result<Action, OperatorError> {
    let Some(client) = ctx.client.clone() else {
        return apply_blackduck_cr(cr, ctx).await;
    };

    let api: Api<Blackduck> = Api::namespaced(client, &cr.namespace().unwrap_or_default());
    finalizer(&api, FINALIZER_NAME, cr, |event| async {
        match event {
            FinalizerEvent::Apply(cr) => apply_blackduck_cr(cr, ctx.clone()).await,
            FinalizerEvent::Cleanup(cr) => cleanup_blackduck_cr(cr, ctx.clone()).await,
        }
    })
    .await
    .map_err(finalizer_error)
}

async fn apply_blackduck_cr(cr: Arc<Blackduck>, ctx: Arc<Context>) -> Result<Action> {
    reconcile_blackduck(&cr, &ctx.blackduck, ctx.applier.as_ref()).await?;
    Ok(ctx.requeue())
}

async fn cleanup_blackduck_cr(cr: Arc<Blackduck>, ctx: Arc<Context>) -> Result<Action> {
    cleanup_blackduck(&cr, ctx.applier.as_ref()).await?;
    Ok(Action::await_change())
}

async fn reconcile_opssight_cr(
    cr: Arc<OpsSight>,
    ctx: Arc<Context>,
) -> std::result::Result<Action, OperatorError> {
    let Some(client) = ctx.client.clone() else {
        return apply_opssight_cr(cr, ctx).await;
    };

    let api: Api<OpsSight> = Api::namespaced(client, &cr.namespace().unwrap_or_default());
    finalizer(&api, FINALIZER_NAME, cr, |event| async {
        match event {
            FinalizerEvent::Apply(cr) => apply_opssight_cr(cr, ctx.clone()).await,
            FinalizerEvent::Cleanup(cr) => cleanup_opssight_cr(cr, ctx.clone()).await,
        }
    })
    .await
    .map_err(finalizer_error)
}

async fn apply_opssight_cr(cr: Arc<OpsSight>, ctx: Arc<Context>) -> Result<Action> {
    reconcile_opssight(&cr, &ctx.opssight, ctx.applier.as_ref()).await?;
    Ok(ctx.requeue())
}

async fn cleanup_opssight_cr(cr: Arc<OpsSight>, ctx: Arc<Context>) -> Result<Action> {
    cleanup_opssight(&cr, ctx.applier.as_ref()).await?;
    Ok(Action::await_change())
}

/// Requeues failed reconciliations after the configured back-off
pub fn error_policy<K: ResourceExt>(cr: Arc<K>, error: &OperatorError, ctx: Arc<Context>) -> Action {
    warn!(
        "Reconciliation of {} failed (retryable: {}): {}",
        cr.name_any(),
        error.is_retryable(),
        error
    );
    Action::requeue(Duration::from_secs(ctx.config.error_requeue_seconds))
}

/// Watches Blackduck resources until the stream ends
pub async fn run_blackduck(client: Client, ctx: Arc<Context>) {
    info!("Starting Blackduck controller");
    let api: Api<Blackduck> = watched(client, &ctx.config);
    Controller::new(api, Config::default())
        .run(reconcile_blackduck_cr, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!("Reconciled Blackduck {}", object.name),
                Err(e) => error!("Blackduck controller error: {}", e),
            }
        })
        .await;
    info!("Blackduck controller stopped");
}

/// Watches OpsSight resources until the stream ends
pub async fn run_opssight(client: Client, ctx: Arc<Context>) {
    info!("Starting OpsSight controller");
    let api: Api<OpsSight> = watched(client, &ctx.config);
    Controller::new(api, Config::default())
        .run(reconcile_opssight_cr, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!("Reconciled OpsSight {}", object.name),
                Err(e) => error!("OpsSight controller error: {}", e),
            }
        })
        .await;
    info!("OpsSight controller stopped");
}
