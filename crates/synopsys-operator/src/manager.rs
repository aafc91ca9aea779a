//! # Operator Manager
//!
//! Wires the Kubernetes client, product apps and controllers together and
//! keeps them running until a shutdown signal arrives.

use crate::blackduck::{self, BlackduckApp};
use crate::controller::{install_crds, run_blackduck, run_opssight, Context};
use crate::error::Result;
use crate::opssight::{self, OpsSightApp};
use crate::reconciler::{DryRunApplier, KubeApplier, ResourceApplier};
use crate::OperatorConfig;
use axum::{routing::get, Router};
use kube::Client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Main operator manager
pub struct OperatorManager {
    config: Arc<OperatorConfig>,
    client: Client,
    context: Arc<Context>,
    shutdown_tx: broadcast::Sender<()>,
}

impl OperatorManager {
    /// Connects to the cluster and builds both product apps
    pub async fn new(config: OperatorConfig) -> Result<Self> {
        let client = Client::try_default().await?;
        Self::with_client(config, client)
    }

    pub fn with_client(config: OperatorConfig, client: Client) -> Result<Self> {
        let config = Arc::new(config);
        let applier: Arc<dyn ResourceApplier> = if config.dry_run {
            info!("Dry run enabled, objects will only be logged");
            Arc::new(DryRunApplier::new())
        } else {
            Arc::new(KubeApplier::new(client.clone()))
        };

        let blackduck = BlackduckApp::new(
            Arc::new(blackduck::default_store()?),
            config.clone(),
            Some(client.clone()),
        )?;
        let opssight = OpsSightApp::new(
            Arc::new(opssight::default_store()?),
            config.clone(),
            Some(client.clone()),
        )?;
        let context = Context::new(applier, blackduck, opssight, config.clone());
        // Dry runs leave resources untouched, finalizer included
        let context = if config.dry_run {
            context
        } else {
            context.with_client(client.clone())
        };
        let context = Arc::new(context);
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            client,
            context,
            shutdown_tx,
        })
    }

    /// Runs until SIGINT, SIGTERM or [`OperatorManager::shutdown`]
    pub async fn run(&self) -> Result<()> {
        info!("Starting Synopsys operator v{}", env!("CARGO_PKG_VERSION"));
        info!("Configuration: {:?}", self.config);

        if self.config.dry_run {
            info!("Dry run, skipping CRD installation");
        } else {
            install_crds(self.client.clone()).await?;
        }

        let health_handle = self.start_health_server();
        let controllers = async {
            tokio::join!(
                run_blackduck(self.client.clone(), self.context.clone()),
                run_opssight(self.client.clone(), self.context.clone()),
            );
        };

        tokio::select! {
            _ = controllers => warn!("Controllers stopped on their own"),
            _ = self.wait_for_shutdown() => info!("Shutdown signal received, stopping operator"),
        }

        health_handle.abort();
        info!("Synopsys operator stopped");
        Ok(())
    }

    fn start_health_server(&self) -> tokio::task::JoinHandle<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.health_port));
        info!("Starting health check server on {}", addr);

        tokio::spawn(async move {
            let app = Router::new()
                .route("/health", get(|| async { "OK" }))
                .route("/ready", get(|| async { "OK" }));

            match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => {
                    if let Err(e) = axum::serve(listener, app).await {
                        error!("Health server failed: {}", e);
                    }
                }
                Err(e) => error!("Failed to bind health server on {}: {}", addr, e),
            }
        })
    }

    async fn wait_for_shutdown(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("Cannot listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => info!("Received SIGINT, shutting down"),
            _ = terminate => info!("Received SIGTERM, shutting down"),
            _ = shutdown_rx.recv() => info!("Received shutdown request"),
        }
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Asks a running [`OperatorManager::run`] to return
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Operator builder for fluent configuration
pub struct OperatorBuilder {
    config: OperatorConfig,
}

impl OperatorBuilder {
    pub fn new() -> Self {
        Self {
            config: OperatorConfig::default(),
        }
    }

    /// Starts from a loaded configuration
    pub fn from_config(config: OperatorConfig) -> Self {
        Self { config }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn cluster_scoped(mut self, cluster_scoped: bool) -> Self {
        self.config.is_cluster_scoped = cluster_scoped;
        self
    }

    pub fn openshift(mut self, openshift: bool) -> Self {
        self.config.is_openshift = openshift;
        self
    }

    pub fn health_port(mut self, port: u16) -> Self {
        self.config.health_port = port;
        self
    }

    pub fn requeue_seconds(mut self, seconds: u64) -> Self {
        self.config.requeue_seconds = seconds;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub async fn build(self) -> Result<OperatorManager> {
        OperatorManager::new(self.config).await
    }
}

impl Default for OperatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
