//! # Connection Lifecycle Cache
//!
//! Process-wide registry mapping connection name to a live credential
//! backend. Backends are constructed lazily from stored configs, shared by
//! concurrent callers, and torn down on invalidation, explicit clears, or
//! sentinel shutdown signals from the backing process.
//!
//! One read-write lock guards the map: reads are shared once an entry is
//! cached, and construction runs under the exclusive lock with a re-check
//! after the upgrade so racing callers on the same uncached name produce
//! exactly one construction. A failed construction is never cached; the
//! next call retries from scratch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::capability::{self, BackendHandle};
use crate::errors::{KeyplaneError, Result};
use crate::storage::{connection_config_path, ConfigStore, CONNECTION_CONFIG_PREFIX};

/// A stored connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Backend implementation named by the config
    pub plugin_name: String,
    /// Opaque backend-specific connection details
    #[serde(default)]
    pub connection_details: Map<String, Value>,
}

/// Factory constructing uninitialized backend instances by plugin name.
///
/// Hosts override it to inject test doubles or alternative transports.
pub type BackendFactory = Arc<dyn Fn(&str) -> Result<BackendHandle> + Send + Sync>;

/// Name-keyed registry of live backend instances with lazy construction
pub struct ConnectionCache {
    connections: RwLock<HashMap<String, BackendHandle>>,
    factory: BackendFactory,
}

impl std::fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCache").finish_non_exhaustive()
    }
}

impl Default for ConnectionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionCache {
    /// Create a cache backed by the built-in backend factory
    pub fn new() -> Self {
        Self::with_factory(Arc::new(|plugin_name| capability::build_backend(plugin_name)))
    }

    /// Create a cache with a custom backend factory
    pub fn with_factory(factory: BackendFactory) -> Self {
        Self { connections: RwLock::new(HashMap::new()), factory }
    }

    /// Number of live cached connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Get the live backend for `name`, constructing it if absent.
    ///
    /// A construction that fails during `initialize` closes the partial
    /// instance and surfaces the error without caching anything.
    pub async fn get_connection(
        &self,
        store: &dyn ConfigStore,
        name: &str,
    ) -> Result<BackendHandle> {
        {
            let connections = self.connections.read().await;
            if let Some(backend) = connections.get(name) {
                return Ok(backend.clone());
            }
        }

        // Upgrade to the exclusive lock and re-check: a racing caller may
        // have finished constructing while we waited.
        let mut connections = self.connections.write().await;
        if let Some(backend) = connections.get(name) {
            return Ok(backend.clone());
        }

        let config = self.connection_config(store, name).await?;
        let backend = (self.factory)(&config.plugin_name)?;

        if let Err(error) = backend.initialize(config.connection_details, true).await {
            // Half-built instances must never be cached; release whatever
            // the backend already acquired and let the next call retry.
            let _ = backend.close().await;
            return Err(error);
        }

        info!(connection = %name, plugin = %config.plugin_name, "connection initialized");
        connections.insert(name.to_string(), backend.clone());
        Ok(backend)
    }

    /// Load the named connection config from the external store
    async fn connection_config(
        &self,
        store: &dyn ConfigStore,
        name: &str,
    ) -> Result<ConnectionConfig> {
        let path = connection_config_path(name);
        let entry = store.get(&path).await?.ok_or_else(|| {
            KeyplaneError::storage(format!(
                "failed to find entry for connection with name {:?}",
                name
            ))
        })?;
        entry.decode()
    }

    /// Close and evict the named connection.
    ///
    /// The entry is only removed once `close` reports success; a failing
    /// close leaves the stale entry cached and returns the error so the
    /// caller can decide whether to retry the clear.
    pub async fn clear_connection(&self, name: &str) -> Result<()> {
        let mut connections = self.connections.write().await;
        if let Some(backend) = connections.get(name) {
            backend.close().await?;
            connections.remove(name);
            debug!(connection = %name, "connection cleared");
        }
        Ok(())
    }

    /// React to a config-store change notification.
    ///
    /// Only keys under the connection-config namespace trigger an eviction;
    /// the next access reloads configuration and rebuilds.
    pub async fn invalidate(&self, key: &str) {
        if let Some(name) = key.strip_prefix(CONNECTION_CONFIG_PREFIX) {
            debug!(connection = %name, "config invalidated, clearing connection");
            if let Err(error) = self.clear_connection(name).await {
                warn!(connection = %name, error = %error, "failed to clear invalidated connection");
            }
        }
    }

    /// Evict the named connection when `error` is a sentinel shutdown
    /// signal, so the next access transparently reconnects instead of
    /// surfacing a stale handle.
    pub async fn close_if_shutdown(&self, name: &str, error: &KeyplaneError) {
        if error.is_shutdown() {
            info!(connection = %name, "backend shut down, clearing connection");
            if let Err(close_error) = self.clear_connection(name).await {
                warn!(connection = %name, error = %close_error, "failed to clear shut-down connection");
            }
        }
    }

    /// Close every cached connection best-effort and reset the map.
    /// Intended for backend teardown.
    pub async fn close_all(&self) {
        let mut connections = self.connections.write().await;
        for (name, backend) in connections.drain() {
            if let Err(error) = backend.close().await {
                warn!(connection = %name, error = %error, "error closing connection during teardown");
            }
        }
    }

    /// Periodic maintenance hook, run by the host on its own schedule.
    ///
    /// Takes the same exclusive lock as the mutating paths; currently an
    /// extension point for expiry/health-check policy.
    pub async fn run_maintenance(&self) {
        let connections = self.connections.write().await;
        debug!(live_connections = connections.len(), "connection cache maintenance pass");
    }
}
