//! Error taxonomy for the router/handler/coordinator boundary (§7).
//!
//! Mirrors `mcpd_core::error::CodecError`'s shape: one `#[non_exhaustive]`
//! enum with a `code()` method mapping each kind to its JSON-RPC error code,
//! so handlers can propagate with `?` and convert to a wire response in one
//! place.

use mcpd_core::jsonrpc::error_code;
use mcpd_plugin::PluginError;

/// Errors raised while routing or executing a JSON-RPC method call.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// `tools/call` named a tool the registry has no entry for.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The method name has no registered handler.
    #[error("Method not supported: {0}")]
    MethodNotFound(String),

    /// Required parameters were missing or malformed.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The tool executor or generator reported an error.
    #[error("{0}")]
    Executor(#[from] PluginError),
}

impl ServerError {
    /// The JSON-RPC error code for this error kind (§7, §4.9).
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Self::ToolNotFound(_) | Self::MethodNotFound(_) => error_code::METHOD_NOT_FOUND,
            Self::InvalidParams(_) => error_code::INVALID_PARAMS,
            Self::Executor(e) => e.code,
        }
    }
}
