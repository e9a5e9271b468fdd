//! Configuration file watcher for hot reload of the endpoint list.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::PoolConfig;
use crate::registry::ProxyEndpoint;

/// Watches the configuration file and forwards endpoint-list changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: Vec<ProxyEndpoint>,
    update_tx: mpsc::UnboundedSender<PoolConfig>,
}

impl ConfigWatcher {
    /// Create a watcher seeded with the endpoints already applied.
    ///
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path, current: Vec<ProxyEndpoint>) -> (Self, mpsc::UnboundedReceiver<PoolConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            current,
            update_tx,
        }, update_rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, mut current, update_tx } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = ?e, "Config watch error");
                    return;
                }
            };
            if !(event.kind.is_modify() || event.kind.is_create()) {
                return;
            }

            match load_config(&path) {
                Ok(new_config) => {
                    // Editors often emit several events per save.
                    if new_config.endpoints == current {
                        tracing::debug!(path = ?path, "Config touched but endpoint list unchanged");
                        return;
                    }
                    tracing::info!(
                        path = ?path,
                        endpoints = new_config.endpoints.len(),
                        "Endpoint list changed, reloading"
                    );
                    current = new_config.endpoints.clone();
                    let _ = update_tx.send(new_config);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to reload config, keeping current endpoints");
                }
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}
