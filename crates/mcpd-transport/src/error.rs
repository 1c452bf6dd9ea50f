//! Transport-layer error types.

/// Errors raised while framing or parsing an HTTP request on a connection
/// session (§4.6).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The peer closed (or never opened) the connection.
    #[error("connection closed")]
    Closed,

    /// The request line or headers could not be parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// An I/O error occurred reading or writing the socket.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The TLS handshake failed.
    #[error("tls handshake failed: {0}")]
    TlsHandshake(String),
}
