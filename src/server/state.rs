//! Shared application state for the agent's HTTPS listener.
//!
//! Grounded in the teacher's `state.rs` `AppState`/`SharedState` pattern,
//! generalized so the config snapshot can be atomically swapped on
//! SIGHUP (§5 "Shared state").

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::warn;

use crate::config::ServerConfig;

/// Type alias for shared application state, matching the teacher's
/// `SharedState` convention.
pub type SharedState = Arc<AppState>;

/// Global application state shared across every accepted connection.
pub struct AppState {
    config: RwLock<Arc<ServerConfig>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        AppState {
            config: RwLock::new(Arc::new(config)),
            start_time: Instant::now(),
        }
    }

    /// A cheap, tear-free snapshot of the currently active config. Readers
    /// take this once at the start of request handling and use it for the
    /// whole request.
    pub async fn config_snapshot(&self) -> Arc<ServerConfig> {
        self.config.read().await.clone()
    }

    /// Install a freshly loaded config, pinning the immutable subset
    /// (§3) to the values already running and logging a warning for any
    /// of them the new file tried to change.
    pub async fn reload(&self, new_config: ServerConfig) {
        let mut guard = self.config.write().await;
        let changed = guard.changed_immutable_fields(&new_config);
        for field in &changed {
            warn!(
                field = %field,
                "config option changed on reload but requires a restart; ignoring"
            );
        }
        let pinned = guard.reload_with_immutables_pinned(new_config);
        *guard = Arc::new(pinned);
    }
}
