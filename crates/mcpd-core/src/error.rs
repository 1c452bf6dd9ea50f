//! Error types shared by the cache and codec layers.

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by [`crate::cache::LruTtlCache`] and the [`crate::session_cache::SessionCache`]
/// facade built on top of it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    /// `batch_put` was called with mismatched key/value slice lengths.
    #[error("batch_put requires equal-length key and value slices (got {keys} keys, {values} values)")]
    BatchLengthMismatch {
        /// Number of keys supplied.
        keys: usize,
        /// Number of values supplied.
        values: usize,
    },

    /// A cached value could not be encoded/decoded as JSON.
    #[error("cache value serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for JSON-RPC codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// JSON-RPC 2.0 error kinds, carrying enough detail to become both a wire error
/// object (§4.3) and a log line.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The request body was not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// The body was valid JSON but not a valid JSON-RPC 2.0 request object.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl CodecError {
    /// The JSON-RPC error code for this error kind.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => -32700,
            Self::InvalidRequest(_) => -32600,
        }
    }
}
