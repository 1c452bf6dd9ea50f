//! SSE frame formatting (§4.10 "SSE framing", §6 "SSE frame vocabulary").
//!
//! Grounded on the commented-out `SSETransport::send_error_event`/
//! `handle_request` (`src/transport/sse_transport.cpp`), which builds each
//! frame as `"event: " + name + "\n" + json + "\n\n"` ad hoc at each call
//! site; centralised here into one formatter per frame kind so the `id:`
//! line's presence/absence (present on `message`/`complete`, omitted on
//! `error`) is enforced in one place rather than by convention at each call
//! site.

use serde_json::{json, Value};

/// The HTTP/1.1 response line and SSE headers that open a streaming
/// response on `/mcp` (§4.10 step 3, §6 "Headers emitted on SSE"). Shared by
/// the stream coordinator and the bare SSE-listen branch of the dispatch
/// glue so both speak the identical prelude.
#[must_use]
pub fn prelude(session_id: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache, no-transform\r\nConnection: keep-alive\r\nMcp-Session-Id: {session_id}\r\n\r\n"
    )
}

/// `event: session_init` — first frame of a new or resumed stream.
#[must_use]
pub fn session_init(id: &Value, session_id: &str) -> String {
    let data = json!({"jsonrpc": "2.0", "id": id, "session_id": session_id});
    format!("event: session_init\ndata: {data}\n\n")
}

/// `event: message` — one payload, carrying the monotonically increasing
/// event id in its `id:` field.
#[must_use]
pub fn message(event_id: u64, payload: &Value) -> String {
    format!("event: message\nid: {event_id}\ndata: {payload}\n\n")
}

/// `event: complete` — the generator ended normally.
#[must_use]
pub fn complete(event_id: u64) -> String {
    let data = json!({"message": "Stream completed"});
    format!("event: complete\nid: {event_id}\ndata: {data}\n\n")
}

/// `event: error` — any terminal stream error. No `id:` line (§4.10 "`id` is
/// omitted on `error` frames").
#[must_use]
pub fn error(code: i64, message: &str) -> String {
    let data = json!({"code": code, "message": message});
    format!("event: error\ndata: {data}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_frame_has_id_line() {
        let frame = message(3, &json!({"n": 3}));
        assert_eq!(frame, "event: message\nid: 3\ndata: {\"n\":3}\n\n");
    }

    #[test]
    fn error_frame_omits_id_line() {
        let frame = error(-32000, "boom");
        assert!(!frame.contains("\nid:"));
        assert_eq!(frame, "event: error\ndata: {\"code\":-32000,\"message\":\"boom\"}\n\n");
    }

    #[test]
    fn session_init_carries_jsonrpc_and_session_id() {
        let frame = session_init(&Value::from(7), "abc123");
        assert!(frame.starts_with("event: session_init\n"));
        assert!(frame.contains("\"session_id\":\"abc123\""));
        assert!(frame.contains("\"id\":7"));
    }

    #[test]
    fn complete_frame_has_fixed_message() {
        let frame = complete(9);
        assert_eq!(frame, "event: complete\nid: 9\ndata: {\"message\":\"Stream completed\"}\n\n");
    }

    #[test]
    fn prelude_carries_session_id_header() {
        let text = prelude("abc123");
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Mcp-Session-Id: abc123"));
        assert!(text.ends_with("\r\n\r\n"));
    }
}
