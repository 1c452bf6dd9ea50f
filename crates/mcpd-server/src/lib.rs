//! RPC router (C8), method handlers (C9), stream coordinator (C10), and
//! expiry reaper (C11) for the MCP streamable-HTTP server, plus the
//! `/mcp`-endpoint dispatch glue (§4.7) that wires `mcpd-transport`'s
//! connection sessions into them.

pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod reaper;
pub mod router;
pub mod sse;
pub mod state;

pub use dispatch::McpDispatcher;
pub use error::ServerError;
pub use reaper::{reap_once, GeneratorRegistry, ReaperHandle, IDLE_TIMEOUT, REAP_INTERVAL};
pub use state::{AppState, ServerInfo};
