//! Endpoint pool daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!   endpoint-pool.toml ──▶ config::load_config ──▶ DynamicProxyPool
//!          │                                          ▲    ▲
//!          └── ConfigWatcher (notify) ── reconcile ───┘    │
//!                                                          │
//!   LeaseSweeper (tokio interval) ── sweep_expired ────────┤
//!                                                          │
//!   Admin API (axum, bearer key) ── snapshot / drain ──────┘
//!
//!   Prometheus exporter ◀── metrics facade
//! ```
//!
//! The config path is the first argument, else `ENDPOINT_POOL_CONFIG`,
//! else `endpoint-pool.toml`.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use endpoint_pool::admin::{setup_admin_router, AdminState};
use endpoint_pool::config::loader::load_config;
use endpoint_pool::config::watcher::ConfigWatcher;
use endpoint_pool::lifecycle::{shutdown_signal, Shutdown};
use endpoint_pool::observability::{logging, metrics};
use endpoint_pool::pool::{DynamicProxyPool, EnvCredentialResolver, LeaseSweeper};

const DEFAULT_CONFIG: &str = "endpoint-pool.toml";
const CREDENTIAL_PREFIX: &str = "POOL_CRED_";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path: PathBuf = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ENDPOINT_POOL_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string())
        .into();

    let config = load_config(&path)?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        path = ?path,
        endpoints = config.endpoints.len(),
        strategy = ?config.pool.strategy,
        "endpoint-pool starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pool = DynamicProxyPool::builder(config.pool.clone())
        .credentials(Arc::new(EnvCredentialResolver::new(CREDENTIAL_PREFIX)))
        .build();
    for endpoint in &config.endpoints {
        pool.register_endpoint(endpoint.clone())?;
    }
    let pool = Arc::new(pool);

    let shutdown = Shutdown::new();

    let sweeper = LeaseSweeper::from_settings(pool.clone());
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.subscribe()));

    // Hot reload of the endpoint list.
    let (watcher, mut updates) = ConfigWatcher::new(&path, config.endpoints.clone());
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
            None
        }
    };
    let reload_pool = pool.clone();
    let mut reload_shutdown = shutdown.subscribe();
    let reload_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(new_config) = updates.recv() => {
                    let report = reload_pool.reconcile(&new_config.endpoints);
                    tracing::info!(
                        added = report.added.len(),
                        updated = report.updated.len(),
                        removed = report.removed.len(),
                        retained = report.retained.len(),
                        rejected = report.rejected.len(),
                        "Endpoint list reconciled"
                    );
                }
                _ = reload_shutdown.recv() => break,
            }
        }
    });

    let admin_handle = if config.admin.enabled {
        if config.admin.api_key == "CHANGE_ME_IN_PRODUCTION" {
            tracing::warn!("Admin API is using the default key; set admin.api_key");
        }
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let app = setup_admin_router(AdminState {
            pool: pool.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let stop = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(stop.wait())
                .await
            {
                tracing::error!(error = %e, "Admin server error");
            }
        }))
    } else {
        None
    };

    shutdown_signal().await;
    shutdown.trigger();

    let _ = sweeper_handle.await;
    let _ = reload_handle.await;
    if let Some(handle) = admin_handle {
        let _ = handle.await;
    }

    tracing::info!(
        outstanding_leases = pool.outstanding_leases(),
        "Shutdown complete"
    );
    Ok(())
}
