//! `/mcp`-endpoint dispatch glue (§4.7, §6): implements `mcpd-transport`'s
//! [`RequestHandler`] seam, enforcing the path/method policy, the optional
//! authentication hook (§9 Open Question 3), and the decision between the
//! synchronous router (C8/C9) and the stream coordinator (C10) for a
//! streaming `tools/call`.
//!
//! Grounded on `HttpTransport::handle_request`/`SSETransport::handle_request`
//! (`src/transport/http_transport.cpp`, `src/transport/sse_transport.cpp`):
//! the source switches on request method and target inline inside the
//! connection's read callback. Here that switch is pulled out into its own
//! type so `mcpd-transport` never needs to know what `/mcp` or `tools/call`
//! mean — it only calls [`RequestHandler::handle`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use mcpd_core::jsonrpc::codec_error_response;
use mcpd_core::CodecError;
use mcpd_transport::{http, ConnectionSession, HttpRequest, RequestHandler};

use crate::coordinator;
use crate::router;
use crate::sse;
use crate::state::AppState;

/// The only path this server serves (§4.7 "Path policy: only `/mcp` is
/// served").
const MCP_PATH: &str = "/mcp";

/// Implements [`RequestHandler`] for the `/mcp` endpoint, translating parsed
/// HTTP requests into JSON-RPC dispatch or a stream-coordinator hand-off.
pub struct McpDispatcher {
    state: Arc<AppState>,
}

impl McpDispatcher {
    /// Build a dispatcher over shared application state.
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl RequestHandler for McpDispatcher {
    async fn handle(&self, session: Arc<ConnectionSession>, request: HttpRequest) {
        if request.target != MCP_PATH {
            session.write(&http::json_response(404, r#"{"error":"not found"}"#)).await;
            return;
        }

        if let Err(e) = self.state.auth.authenticate(request.headers()).await {
            tracing::debug!(error = %e, "request rejected by auth manager");
            session
                .write(&http::json_response(401, &json!({"error": e.0}).to_string()))
                .await;
            return;
        }

        match request.method.as_str() {
            "POST" => self.handle_post(&session, &request).await,
            "GET" => self.handle_get(&session, &request).await,
            "DELETE" => self.handle_delete(&session, &request).await,
            _ => {
                session
                    .write(&http::json_response(405, r#"{"error":"method not allowed"}"#))
                    .await;
            }
        }
    }
}

fn request_session_id(request: &HttpRequest, session: &ConnectionSession) -> String {
    request
        .session_id_header()
        .map(str::to_string)
        .unwrap_or_else(|| session.session_id().to_string())
}

impl McpDispatcher {
    /// `POST /mcp` (§6): the body is a single JSON-RPC message. A streaming
    /// `tools/call` whose client accepts SSE upgrades the connection and
    /// hands off to the stream coordinator; everything else goes through the
    /// synchronous router.
    async fn handle_post(&self, session: &Arc<ConnectionSession>, request: &HttpRequest) {
        let body = request.body_str();

        // §8 boundary: "Content-Length: 0 is a legitimate empty-body POST"
        // at the framing layer, but an empty JSON-RPC body is a -32600 at
        // the codec layer.
        if body.trim().is_empty() {
            let err = codec_error_response(&CodecError::InvalidRequest("empty request body".into()));
            session.write(&http::json_response(200, &err)).await;
            return;
        }

        let parsed = match mcpd_core::jsonrpc::parse_request(&body) {
            Ok(req) => req,
            Err(e) => {
                session.write(&http::json_response(200, &codec_error_response(&e))).await;
                return;
            }
        };

        let session_id = request_session_id(request, session);

        if parsed.method == "tools/call" && request.accepts_event_stream() {
            if let Some((tool_name, arguments)) = self.streaming_target(&session_id, &parsed.params).await {
                session.mark_upgraded();
                let request_id = parsed.response_id();
                let last_event_id = request.last_event_id();
                // The connection's own task becomes the stream coordinator
                // task from here (§4.6 step 6, §9 "a single stream-
                // coordinator task per streaming call"): the surrounding
                // read loop already stops re-entering once it sees
                // `is_upgraded`, so there is nothing else for this task to
                // do but drive the stream to completion.
                coordinator::run(
                    Arc::clone(&self.state),
                    Arc::clone(session),
                    session_id,
                    request_id,
                    tool_name,
                    arguments,
                    last_event_id,
                )
                .await;
                return;
            }
        }

        match router::dispatch(&self.state, &parsed).await {
            Some(response) => session.write(&http::json_response(200, &response.to_json_string())).await,
            // A notification produces no JSON-RPC response; reply with an
            // empty body rather than hold the connection waiting for one.
            None => session.write(&http::empty_response(204)).await,
        }
    }

    /// Resolve the `(tool_name, arguments)` pair a streaming `tools/call`
    /// should start or resume with, or `None` when the named tool isn't a
    /// streaming tool at all (in which case the caller falls back to the
    /// synchronous router, which itself knows how to drain a streaming
    /// tool's generator to completion for a non-SSE caller — see
    /// `handlers::tools_call`).
    ///
    /// A request that omits `name` entirely is treated as a bare reconnect:
    /// the tool name is recovered from the existing session state (§4.10
    /// step 4 "Reconnect"), matching a client that resumes a stream with
    /// only `Mcp-Session-Id` and `Last-Event-ID` and no fresh arguments.
    async fn streaming_target(&self, session_id: &str, params: &Value) -> Option<(String, Value)> {
        if let Some(name) = params.get("name").and_then(Value::as_str) {
            let descriptor = self.state.registry.get_tool_info(name)?;
            if !descriptor.is_streaming {
                return None;
            }
            let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            return Some((name.to_string(), arguments));
        }
        let state = self.state.sessions.get_session_state(session_id)?;
        Some((state.tool_name, json!({})))
    }

    /// `GET /mcp` with `Accept: text/event-stream` (§4.7): either resumes an
    /// existing session's stream (equivalent to the stream coordinator's
    /// reconnect branch, driven by `Last-Event-ID` rather than a fresh
    /// `tools/call`), or opens a bare listen channel that idles after its
    /// prelude — the "handler may attach future pushed events" capability
    /// is optional per §4.7, and this server does not generate server-
    /// initiated pushes outside of an active tool stream.
    async fn handle_get(&self, session: &Arc<ConnectionSession>, request: &HttpRequest) {
        if !request.accepts_event_stream() {
            session
                .write(&http::json_response(400, r#"{"error":"GET requires Accept: text/event-stream"}"#))
                .await;
            return;
        }

        let session_id = request_session_id(request, session);
        let last_event_id = request.last_event_id();
        let existing = self.state.sessions.get_session_state(&session_id);

        session.mark_upgraded();

        match existing {
            Some(state) if last_event_id.is_some() => {
                coordinator::run(
                    Arc::clone(&self.state),
                    Arc::clone(session),
                    session_id,
                    json!(null),
                    state.tool_name,
                    json!({}),
                    last_event_id,
                )
                .await;
            }
            _ => {
                session.write(sse::prelude(&session_id).as_bytes()).await;
                session.write(sse::session_init(&json!(null), &session_id).as_bytes()).await;
            }
        }
    }

    /// `DELETE /mcp` (§6): terminate the named session — free its
    /// generator (if one is still registered) and drop its cache state —
    /// then reply `204`.
    async fn handle_delete(&self, session: &Arc<ConnectionSession>, request: &HttpRequest) {
        let session_id = request_session_id(request, session);
        if let Some(generator) = self.state.generators.remove(&session_id) {
            generator.free().await;
        }
        self.state.sessions.cleanup_session(&session_id);
        session.write(&http::empty_response(204)).await;
    }
}
