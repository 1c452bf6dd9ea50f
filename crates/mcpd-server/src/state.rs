//! Dependency-injection root (§9 Design Notes: "replace singletons for
//! caches and I/O pools with ... one root object (`AppState`)").
//!
//! Grounded on the source's `McpCache::GetInstance()`/`PluginManager::GetInstance()`
//! lazy singletons, which §9 calls out explicitly for replacement: every
//! shared resource a handler needs is an `Arc`-held field here, constructed
//! once at startup by the CLI entry point and threaded through as a
//! parameter instead of reached for by a global accessor.

use std::sync::Arc;

use mcpd_core::SessionCache;
use mcpd_plugin::{AuthManager, NullAuthManager, ToolRegistry};
use tokio_util::sync::CancellationToken;

use crate::reaper::GeneratorRegistry;

/// Server identity echoed by `initialize` (§4.9).
#[derive(Debug, Clone)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
    /// Default protocol version offered when the client doesn't specify one.
    pub protocol_version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "mcpd".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: "2025-01-07".to_string(),
        }
    }
}

/// Everything a request handler or the stream coordinator needs, gathered
/// into one `Arc`-shared value (§9).
pub struct AppState {
    /// Dynamic tool registry (C4).
    pub registry: Arc<ToolRegistry>,
    /// Session/event cache façade (C2).
    pub sessions: SessionCache,
    /// Live stream generators, keyed by session id (C10/C11).
    pub generators: GeneratorRegistry,
    /// Optional request authentication hook (§9 Open Question 3).
    pub auth: Arc<dyn AuthManager>,
    /// Identity echoed by `initialize`.
    pub server_info: ServerInfo,
    /// Cancelled by the `exit` method handler (§4.9) or a signal handler in
    /// the CLI entry point; the listener's accept loop watches it to begin
    /// graceful shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build app state with a `NullAuthManager` and default server identity.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, sessions: SessionCache) -> Self {
        Self {
            registry,
            sessions,
            generators: GeneratorRegistry::new(),
            auth: Arc::new(NullAuthManager),
            server_info: ServerInfo::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Override the authentication hook.
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthManager>) -> Self {
        self.auth = auth;
        self
    }

    /// Override the server identity.
    #[must_use]
    pub fn with_server_info(mut self, server_info: ServerInfo) -> Self {
        self.server_info = server_info;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_server_info_has_expected_name() {
        let info = ServerInfo::default();
        assert_eq!(info.name, "mcpd");
        assert_eq!(info.protocol_version, "2025-01-07");
    }

    #[test]
    fn new_state_starts_with_no_active_shutdown() {
        let state = AppState::new(
            Arc::new(ToolRegistry::new()),
            SessionCache::new(10, 10, Duration::from_secs(60)),
        );
        assert!(!state.shutdown.is_cancelled());
    }
}
