//! RPC router (C8, §4.8).
//!
//! Grounded on `mcp::business::Router::Dispatch` (`src/business/router.cpp`):
//! a method-name lookup table that knows nothing about tool or cache
//! semantics, only how to turn "no such method" into a `-32601` response and
//! how to suppress a response for a notification.

use mcpd_core::jsonrpc::{Request, Response, RpcError};
use serde_json::Value;

use crate::error::ServerError;
use crate::handlers;
use crate::state::AppState;

/// Route `request` to its method handler and produce a response, or `None`
/// if this request is a notification (§4.8: "notifications whose handler
/// produces a response cause that response to be suppressed").
///
/// `tools/call` for a streaming tool with an SSE-capable client is handled
/// entirely by the stream coordinator before this function is ever called —
/// see `dispatch::handle_mcp_request`.
pub async fn dispatch(state: &AppState, request: &Request) -> Option<Response> {
    let response_id = request.response_id();

    let result: Result<Value, ServerError> = match request.method.as_str() {
        "initialize" => Ok(handlers::initialize(state, &request.params)),
        "tools/list" => Ok(handlers::tools_list(state)),
        "tools/call" => handlers::tools_call(state, &request.params).await,
        "exit" => Ok(handlers::exit(state)),
        other => Err(ServerError::MethodNotFound(other.to_string())),
    };

    let response = match result {
        Ok(value) => Response::success(value, response_id),
        Err(err) => Response::error(RpcError::new(err.code(), err.to_string()), response_id),
    };

    if request.is_notification() {
        None
    } else {
        Some(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpd_core::jsonrpc::parse_request;
    use pretty_assertions::assert_eq;
    use mcpd_plugin::ToolRegistry;
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> AppState {
        AppState::new(
            Arc::new(ToolRegistry::new()),
            mcpd_core::SessionCache::new(10, 10, Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn unknown_method_is_s2_scenario() {
        let state = state();
        let req = parse_request(r#"{"jsonrpc":"2.0","id":2,"method":"nope"}"#).unwrap();
        let response = dispatch(&state, &req).await.unwrap();
        assert_eq!(
            response.to_json_string(),
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not supported: nope"},"id":2}"#
        );
    }

    #[tokio::test]
    async fn notification_response_is_suppressed() {
        let state = state();
        let req = parse_request(r#"{"jsonrpc":"2.0","method":"nope"}"#).unwrap();
        assert!(dispatch(&state, &req).await.is_none());
    }

    #[tokio::test]
    async fn initialize_round_trip() {
        let state = state();
        let req = parse_request(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#).unwrap();
        let response = dispatch(&state, &req).await.unwrap();
        let wire: Value = serde_json::from_str(&response.to_json_string()).unwrap();
        assert_eq!(wire["result"]["serverInfo"]["name"], "mcpd");
    }
}
