//! Streamable-HTTP transport for the MCP server: request framing (§4.6), the
//! per-connection session and read loop (C6), and the HTTP/HTTPS accept loop
//! (C7).

pub mod conn;
pub mod error;
pub mod http;
pub mod listener;
pub mod session;

pub use conn::{serve_connection, RequestHandler};
pub use error::TransportError;
pub use http::HttpRequest;
pub use listener::{IoPool, Listener, TlsListener};
pub use session::{generate_session_id, BoxedStream, ConnectionSession};
