//! Core data structures for the MCP streamable-HTTP server: a generic LRU+TTL
//! cache (C1), a typed session-cache façade over it (C2), and the JSON-RPC
//! 2.0 codec (C3).

pub mod cache;
pub mod error;
pub mod jsonrpc;
pub mod session_cache;

pub use cache::{LruTtlCache, ReaperHandle};
pub use error::{CacheError, CacheResult, CodecError, CodecResult};
pub use jsonrpc::{Request, RequestId, Response, RpcError};
pub use session_cache::{SessionCache, SessionState};
