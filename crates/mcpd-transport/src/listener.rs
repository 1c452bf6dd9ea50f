//! HTTP/HTTPS accept loop (C7, §4.7).
//!
//! Grounded on `HttpTransport::start` (`src/transport/http_transport.cpp`,
//! plain TCP) and `SslSession::start` (`src/transport/ssl_session.cpp`, TLS
//! handshake awaited before the read loop starts), plus
//! `AsioIOServicePool::GetIOService` (`src/core/io_context_pool.hpp`) for the
//! round-robin "pin a connection to one lane" pool. The source's pool is a
//! singleton of dedicated `io_context`s each driven by its own `std::thread`;
//! here it is replaced by one shared `tokio` multi-thread runtime (worker
//! count taken from the same `io_pool_threads` setting, configured by the CLI
//! entry point's `Runtime::Builder`) plus [`IoPool`], which hands out lane
//! numbers round-robin purely for tracing/log correlation — Tokio's
//! work-stealing scheduler already gives every spawned task the properties
//! (no cross-thread sync needed on the session) the source's thread-pinning
//! existed to provide.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener as TokioTcpListener;
use tokio_rustls::TlsAcceptor;

use crate::conn::{serve_connection, RequestHandler};
use crate::error::TransportError;
use crate::session::BoxedStream;

/// Round-robin lane assignment for tracing correlation (§4.7 "sessions are
/// pinned to their pool slot for the connection's lifetime").
pub struct IoPool {
    size: usize,
    next: AtomicUsize,
}

impl IoPool {
    /// A pool reporting `size` lanes (clamped to at least 1).
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1), next: AtomicUsize::new(0) }
    }

    /// Assign the next connection to a lane, round-robin.
    pub fn assign(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % self.size
    }
}

/// A bound plain-TCP listener that spawns [`serve_connection`] per accepted
/// socket.
pub struct Listener {
    inner: TokioTcpListener,
    pool: IoPool,
}

impl Listener {
    /// Bind `addr` with `pool_size` tracing lanes.
    pub async fn bind(addr: SocketAddr, pool_size: usize) -> Result<Self, TransportError> {
        let inner = TokioTcpListener::bind(addr).await?;
        Ok(Self { inner, pool: IoPool::new(pool_size) })
    }

    /// The address actually bound (useful when port 0 was requested).
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept connections forever, spawning a task per connection that runs
    /// the read loop (§4.6) against `handler`. Returns only on a listener
    /// error (the caller's job to decide whether that's fatal).
    pub async fn serve<H: RequestHandler>(&self, handler: Arc<H>) -> TransportError {
        loop {
            let (socket, peer) = match self.inner.accept().await {
                Ok(pair) => pair,
                Err(e) => return TransportError::Io(e),
            };
            let lane = self.pool.assign();
            tracing::debug!(%peer, lane, "accepted tcp connection");
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let stream: BoxedStream = Box::new(socket);
                serve_connection(stream, handler).await;
            });
        }
    }
}

/// A bound TLS listener: accepts plain TCP, performs the handshake, then
/// hands the completed TLS stream into the same [`serve_connection`] path.
pub struct TlsListener {
    inner: TokioTcpListener,
    acceptor: TlsAcceptor,
    pool: IoPool,
}

impl TlsListener {
    /// Bind `addr` and wrap every accepted connection in `acceptor`'s TLS
    /// handshake.
    pub async fn bind(addr: SocketAddr, acceptor: TlsAcceptor, pool_size: usize) -> Result<Self, TransportError> {
        let inner = TokioTcpListener::bind(addr).await?;
        Ok(Self { inner, acceptor, pool: IoPool::new(pool_size) })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept connections forever; each gets its own handshake task so a
    /// slow or failing handshake never blocks the accept loop (§4.6 "Errors
    /// during the handshake are logged and the connection is dropped").
    pub async fn serve<H: RequestHandler>(&self, handler: Arc<H>) -> TransportError {
        loop {
            let (socket, peer) = match self.inner.accept().await {
                Ok(pair) => pair,
                Err(e) => return TransportError::Io(e),
            };
            let lane = self.pool.assign();
            let acceptor = self.acceptor.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let tls_stream = match acceptor.accept(socket).await {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(%peer, error = %e, "tls handshake failed");
                        return;
                    }
                };
                tracing::debug!(%peer, lane, "accepted tls connection");
                let stream: BoxedStream = Box::new(tls_stream);
                serve_connection(stream, handler).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_assigns_round_robin() {
        let pool = IoPool::new(3);
        let assignments: Vec<usize> = (0..7).map(|_| pool.assign()).collect();
        assert_eq!(assignments, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn pool_of_zero_clamps_to_one_lane() {
        let pool = IoPool::new(0);
        assert_eq!(pool.assign(), 0);
        assert_eq!(pool.assign(), 0);
    }
}
