//! Lazy, reused connections keyed by server name. Connection is established
//! lazily on first use per server and reused; failure during a call does
//! not poison the connection pool (a subsequent call may reconnect).
//! Grounded on the `moka`-cached client pattern.

use crate::config::{McpServerConfig, TransportKind};
use crate::connection::McpConnection;
use crate::rmcp_connection::StreamableHttpConnection;
use conflux_types::Result;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct McpPool {
    connections: Cache<String, Arc<dyn McpConnection>>,
    /// Per-server lock so concurrent callers for the same cold server don't
    /// both dial it.
    connect_locks: Cache<String, Arc<Mutex<()>>>,
}

impl McpPool {
    pub fn new() -> Self {
        Self {
            connections: Cache::builder()
                .time_to_idle(Duration::from_secs(30 * 60))
                .build(),
            connect_locks: Cache::builder()
                .time_to_idle(Duration::from_secs(60 * 60))
                .build(),
        }
    }

    /// Returns the cached connection for `server`, establishing one if
    /// absent. On a call failure the caller should invoke [`Self::evict`]
    /// so the *next* call reconnects rather than reusing a dead session.
    pub async fn get_or_connect(
        &self,
        config: &McpServerConfig,
    ) -> Result<Arc<dyn McpConnection>> {
        if let Some(existing) = self.connections.get(&config.name) {
            return Ok(existing);
        }

        let lock = self
            .connect_locks
            .get_with(config.name.clone(), || Arc::new(Mutex::new(())));
        let _guard = lock.lock().await;

        // Re-check: another caller may have connected while we waited.
        if let Some(existing) = self.connections.get(&config.name) {
            return Ok(existing);
        }

        let connection = connect(config).await?;
        self.connections.insert(config.name.clone(), connection.clone());
        Ok(connection)
    }

    pub fn evict(&self, server_name: &str) {
        self.connections.invalidate(server_name);
    }
}

impl Default for McpPool {
    fn default() -> Self {
        Self::new()
    }
}

async fn connect(config: &McpServerConfig) -> Result<Arc<dyn McpConnection>> {
    match config.transport {
        TransportKind::StreamableHttp => {
            let url = config.url.as_deref().ok_or_else(|| {
                conflux_types::Error::config(format!("server `{}` missing url", config.name))
            })?;
            let connection = StreamableHttpConnection::connect(url).await?;
            Ok(Arc::new(connection))
        }
        other => Err(conflux_types::Error::config(format!(
            "transport {other:?} not wired for server `{}` (only streamable_http is, per  scope)",
            config.name
        ))),
    }
}
