//! JSON-RPC 2.0 request/response codec (§4.3).
//!
//! Grounded on the source's `mcp::protocol::json_rpc` module (`Request`,
//! `Response`, `Error`, `parse_request`/`make_response`/`make_error`), adapted
//! to idiomatic `serde`-driven (de)serialization instead of manual
//! `nlohmann::json` field poking, and to return `Result` instead of printing
//! error responses to stdout as a side effect of parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;

/// Standard JSON-RPC 2.0 error codes (§4.3), plus the application range.
pub mod error_code {
    /// Invalid JSON was received by the server.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameter(s).
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// A JSON-RPC id: number, string, or `null`. Distinguished at the `Request`
/// level from "absent" (see [`Request::id`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id. JSON-RPC allows fractional numbers; we keep the raw
    /// `Value` form (`Number`) intact rather than narrowing to `i64` so that
    /// echoing it back is always lossless.
    Number(serde_json::Number),
    /// String id.
    String(String),
    /// Explicit JSON `null` id (distinct from an absent `id` field).
    Null,
}

/// A parsed JSON-RPC 2.0 request. `id: None` means the field was entirely
/// absent from the wire message, i.e. a notification.
#[derive(Debug, Clone)]
pub struct Request {
    /// The method name.
    pub method: String,
    /// Parameters, defaulting to an empty object when absent on the wire.
    pub params: Value,
    /// `None` when the request is a notification.
    pub id: Option<RequestId>,
}

impl Request {
    /// Whether this request is a notification (no response expected).
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// The id to echo in a response, or JSON `null` if this was a
    /// notification (per §4.3, "Error for a request of unknown id carries
    /// `id: null`").
    #[must_use]
    pub fn response_id(&self) -> Value {
        match &self.id {
            Some(RequestId::Number(n)) => Value::Number(n.clone()),
            Some(RequestId::String(s)) => Value::String(s.clone()),
            Some(RequestId::Null) | None => Value::Null,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Machine-readable error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl RpcError {
    /// Build an error with the given code and message.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A fully formed JSON-RPC 2.0 response, either a success or an error.
#[derive(Debug, Clone)]
pub enum Response {
    /// `{"jsonrpc":"2.0","result":…,"id":…}`
    Success { result: Value, id: Value },
    /// `{"jsonrpc":"2.0","error":{...},"id":…}`
    Error { error: RpcError, id: Value },
}

impl Response {
    /// Build a success response.
    #[must_use]
    pub const fn success(result: Value, id: Value) -> Self {
        Self::Success { result, id }
    }

    /// Build an error response.
    #[must_use]
    pub const fn error(error: RpcError, id: Value) -> Self {
        Self::Error { error, id }
    }

    /// Whether the request that produced this response was a notification —
    /// callers use this to suppress sending it (§4.8).
    #[must_use]
    pub fn id_value(&self) -> &Value {
        match self {
            Self::Success { id, .. } | Self::Error { id, .. } => id,
        }
    }

    /// Serialize this response to a compact JSON string.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.to_wire()).unwrap_or_else(|_| {
            r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"internal error"},"id":null}"#
                .to_string()
        })
    }

    fn to_wire(&self) -> Value {
        match self {
            Self::Success { result, id } => serde_json::json!({
                "jsonrpc": "2.0",
                "result": result,
                "id": id,
            }),
            Self::Error { error, id } => serde_json::json!({
                "jsonrpc": "2.0",
                "error": { "code": error.code, "message": error.message },
                "id": id,
            }),
        }
    }
}

/// Parse a JSON-RPC 2.0 request from raw text (§4.3).
///
/// Unlike the source, which prints an error response to stdout as a side
/// effect of a failed parse, this returns a [`CodecError`] so the caller (the
/// connection session) can send the error over the socket it actually owns.
pub fn parse_request(text: &str) -> Result<Request, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(|e| CodecError::Parse(e.to_string()))?;

    let obj = value
        .as_object()
        .ok_or_else(|| CodecError::InvalidRequest("request must be a JSON object".into()))?;

    match obj.get("jsonrpc").and_then(Value::as_str) {
        Some("2.0") => {}
        _ => return Err(CodecError::InvalidRequest("'jsonrpc' must be '2.0'".into())),
    }

    let method = obj
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| CodecError::InvalidRequest("'method' must be a string".into()))?
        .to_string();

    let params = obj.get("params").cloned().unwrap_or_else(|| serde_json::json!({}));

    let id = match obj.get("id") {
        None => None,
        Some(Value::Null) => Some(RequestId::Null),
        Some(Value::String(s)) => Some(RequestId::String(s.clone())),
        Some(Value::Number(n)) => Some(RequestId::Number(n.clone())),
        Some(_) => {
            return Err(CodecError::InvalidRequest(
                "'id' must be number, string, or null".into(),
            ));
        }
    };

    Ok(Request { method, params, id })
}

/// Build the JSON-RPC error response string for a codec-level failure
/// (parse/invalid-request), per §4.3's "error for unknown id carries
/// `id: null`" rule.
#[must_use]
pub fn codec_error_response(err: &CodecError) -> String {
    Response::error(RpcError::new(err.code(), err.to_string()), Value::Null).to_json_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_request_with_numeric_id() {
        let req = parse_request(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        assert_eq!(req.method, "tools/list");
        assert_eq!(req.params, serde_json::json!({}));
        assert!(!req.is_notification());
    }

    #[test]
    fn absent_id_is_notification() {
        let req = parse_request(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        assert!(req.is_notification());
        assert_eq!(req.response_id(), Value::Null);
    }

    #[test]
    fn null_id_is_not_a_notification() {
        let req = parse_request(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#).unwrap();
        assert!(!req.is_notification());
        assert_eq!(req.id, Some(RequestId::Null));
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let err = parse_request(r#"{"jsonrpc":"1.0","method":"x"}"#).unwrap_err();
        assert_eq!(err.code(), error_code::INVALID_REQUEST);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_request("{not json").unwrap_err();
        assert_eq!(err.code(), error_code::PARSE_ERROR);
    }

    #[test]
    fn rejects_invalid_id_type() {
        let err = parse_request(r#"{"jsonrpc":"2.0","id":true,"method":"x"}"#).unwrap_err();
        assert_eq!(err.code(), error_code::INVALID_REQUEST);
    }

    #[test]
    fn success_response_round_trips() {
        let resp = Response::success(serde_json::json!({"ok": true}), Value::from(1));
        let s = resp.to_json_string();
        let v: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["result"]["ok"], true);
        assert_eq!(v["id"], 1);
    }

    #[test]
    fn echo_scenario_s1() {
        let req = parse_request(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"echo","arguments":{"text":"hi"}}}"#,
        )
        .unwrap();
        assert_eq!(req.params["name"], "echo");
        let resp = Response::success(
            serde_json::json!({"content":[{"type":"text","text":"hi"}]}),
            req.response_id(),
        );
        assert_eq!(
            resp.to_json_string(),
            r#"{"jsonrpc":"2.0","result":{"content":[{"type":"text","text":"hi"}]},"id":1}"#
        );
    }
}
