//! Per-connection I/O session (C6, §4.6).
//!
//! Grounded on `mcp::transport::Session`/`TcpSession` (`src/transport/session.h`,
//! `src/transport/tcp_session.cpp`): a fixed read buffer, an `accept_header`
//! slot, a boolean `streaming_` flag gating `write_chunk`, and a `close()` that
//! flushes a terminating zero-chunk before shutting the socket down. The
//! `std::mutex`-free single-writer assumption in the source (one coroutine
//! writes at a time by convention) becomes an explicit `tokio::sync::Mutex`
//! guarding the write half here, since in this design a streaming task and the
//! connection's read task can both hold a handle to the same session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex as AsyncMutex;

/// Trait alias so the listener can box either a plain `TcpStream` or a
/// `tokio_rustls` server stream behind one concrete type.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// The boxed byte stream a [`ConnectionSession`] reads from and writes to —
/// a plain TCP socket or a completed TLS stream, indistinguishable past this
/// point (§4.6 "TLS variant (C6′) is identical except the byte source/sink").
pub type BoxedStream = Box<dyn AsyncStream>;

/// Per-connection session state: an immutable session id, a mutable accept
/// header slot, and a serialized write half (§3 "Connection session").
pub struct ConnectionSession {
    session_id: String,
    accept_header: parking_lot::Mutex<String>,
    write_half: AsyncMutex<Option<WriteHalf<BoxedStream>>>,
    closed: AtomicBool,
    streaming: AtomicBool,
    upgraded: AtomicBool,
}

impl ConnectionSession {
    /// Split `stream` into read/write halves, generate a fresh session id,
    /// and return the session (write side) paired with the read half the
    /// caller's read loop owns exclusively.
    #[must_use]
    pub fn new(stream: BoxedStream) -> (Arc<Self>, ReadHalf<BoxedStream>) {
        let (read_half, write_half) = tokio::io::split(stream);
        let session = Self {
            session_id: generate_session_id(),
            accept_header: parking_lot::Mutex::new(String::new()),
            write_half: AsyncMutex::new(Some(write_half)),
            closed: AtomicBool::new(false),
            streaming: AtomicBool::new(false),
            upgraded: AtomicBool::new(false),
        };
        (Arc::new(session), read_half)
    }

    /// This connection's generated session id (distinct from, and overridden
    /// by, any `Mcp-Session-Id` header a request carries — see §4.8).
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Record the `Accept` header of the most recently dispatched request,
    /// mirroring `Session::set_accept_header`.
    pub fn set_accept_header(&self, header: impl Into<String>) {
        *self.accept_header.lock() = header.into();
    }

    /// The last recorded `Accept` header value.
    #[must_use]
    pub fn accept_header(&self) -> String {
        self.accept_header.lock().clone()
    }

    /// Whether the underlying transport has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark this connection as upgraded to a long-lived SSE response — the
    /// read loop checks this after each dispatch and stops re-entering
    /// step 2 once it's set (§4.6 step 6, "on upgrade to SSE the read loop
    /// terminates for this connection").
    pub fn mark_upgraded(&self) {
        self.upgraded.store(true, Ordering::Release);
    }

    /// Whether [`Self::mark_upgraded`] has been called.
    #[must_use]
    pub fn is_upgraded(&self) -> bool {
        self.upgraded.load(Ordering::Acquire)
    }

    /// Write raw bytes. Cancellation-safe and serialized: at most one
    /// ongoing write per session. A write to a closed session is silently a
    /// no-op (§4.6 "a write to a closed session is a no-op").
    pub async fn write(&self, bytes: &[u8]) {
        if self.is_closed() {
            return;
        }
        let mut guard = self.write_half.lock().await;
        let Some(half) = guard.as_mut() else { return };
        if let Err(e) = half.write_all(bytes).await {
            tracing::warn!(session_id = %self.session_id, error = %e, "write failed, closing session");
            drop(guard);
            self.close().await;
        }
    }

    /// Begin a chunked-transfer-encoding streaming response: write the
    /// `200 OK` / `Transfer-Encoding: chunked` prelude and arm
    /// [`Self::write_chunk`] (§4.6 "only legal after `start_streaming`").
    pub async fn start_streaming(&self, content_type: &str) {
        let headers = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nTransfer-Encoding: chunked\r\nConnection: keep-alive\r\n\r\n"
        );
        self.write(headers.as_bytes()).await;
        self.streaming.store(true, Ordering::Release);
    }

    /// Frame `bytes` as one HTTP/1.1 chunked-transfer-encoding chunk and
    /// write it. A no-op (with a warning) if called before
    /// [`Self::start_streaming`].
    pub async fn write_chunk(&self, bytes: &[u8]) {
        if !self.streaming.load(Ordering::Acquire) {
            tracing::warn!(session_id = %self.session_id, "write_chunk before start_streaming, ignoring");
            return;
        }
        let mut framed = format!("{:x}\r\n", bytes.len()).into_bytes();
        framed.extend_from_slice(bytes);
        framed.extend_from_slice(b"\r\n");
        self.write(&framed).await;
    }

    /// Idempotent shutdown: if a chunked stream was in progress, append the
    /// terminating zero-length chunk, then shut the transport down.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut guard = self.write_half.lock().await;
        if let Some(mut half) = guard.take() {
            if self.streaming.load(Ordering::Acquire) {
                let _ = half.write_all(b"0\r\n\r\n").await;
            }
            let _ = half.shutdown().await;
        }
    }
}

/// 128 bits of randomness, hex-encoded to a 32-character session id (§3).
/// Grounded on `Session::generate_session_id` (`src/transport/session.cpp`),
/// swapping `std::random_device`/`std::mt19937` for `fastrand`'s thread-local
/// generator.
#[must_use]
pub fn generate_session_id() -> String {
    let hi = fastrand::u64(..);
    let lo = fastrand::u64(..);
    format!("{hi:016x}{lo:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    fn boxed_pair() -> (BoxedStream, tokio::io::DuplexStream) {
        let (a, b) = duplex(4096);
        (Box::new(a), b)
    }

    #[test]
    fn session_id_is_32_hex_chars() {
        let id = generate_session_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn write_delivers_bytes_to_peer() {
        let (stream, mut peer) = boxed_pair();
        let (session, _read_half) = ConnectionSession::new(stream);
        session.write(b"hello").await;
        let mut buf = [0u8; 5];
        tokio::io::AsyncReadExt::read_exact(&mut peer, &mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn write_chunk_before_start_streaming_is_ignored() {
        let (stream, mut peer) = boxed_pair();
        let (session, _read_half) = ConnectionSession::new(stream);
        session.write_chunk(b"x").await;
        session.write(b"sentinel").await;
        let mut buf = [0u8; 8];
        tokio::io::AsyncReadExt::read_exact(&mut peer, &mut buf).await.unwrap();
        assert_eq!(&buf, b"sentinel");
    }

    #[tokio::test]
    async fn start_streaming_then_chunk_frames_correctly() {
        let (stream, mut peer) = boxed_pair();
        let (session, _read_half) = ConnectionSession::new(stream);
        session.start_streaming("text/event-stream").await;
        session.write_chunk(b"hi").await;

        let mut buf = vec![0u8; 4096];
        let n = tokio::io::AsyncReadExt::read(&mut peer, &mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf[..n]);
        assert!(text.starts_with("HTTP/1.1 200 OK"));
        assert!(text.contains("Transfer-Encoding: chunked"));
        assert!(text.ends_with("2\r\nhi\r\n"));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (stream, _peer) = boxed_pair();
        let (session, _read_half) = ConnectionSession::new(stream);
        session.close().await;
        session.close().await;
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn write_after_close_is_a_noop() {
        let (stream, mut peer) = boxed_pair();
        let (session, _read_half) = ConnectionSession::new(stream);
        session.close().await;
        session.write(b"late").await;
        drop(session);

        let mut buf = Vec::new();
        let n = tokio::io::AsyncReadExt::read_to_end(&mut peer, &mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn close_during_streaming_appends_zero_chunk() {
        let (stream, mut peer) = boxed_pair();
        let (session, _read_half) = ConnectionSession::new(stream);
        session.start_streaming("text/event-stream").await;
        session.close().await;

        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut peer, &mut buf).await.unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.ends_with("0\r\n\r\n"));
    }
}
