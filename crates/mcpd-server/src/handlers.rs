//! JSON-RPC method handlers (C9, §4.9).
//!
//! Grounded on `mcp::business::MethodHandlers::Initialize/ListTools/CallTool`
//! (`src/business/method_handlers.cpp`): same three verbs plus `exit`,
//! rewritten to return `Result<Value, ServerError>` instead of writing a
//! response object directly, so the router (C8) owns the one place a
//! notification's response gets suppressed.

use serde_json::{json, Value};

use mcpd_plugin::ToolDescriptor;

use crate::error::ServerError;
use crate::state::AppState;

/// `initialize` (§4.9): echo the client's requested protocol version, or the
/// server's default when absent.
pub fn initialize(state: &AppState, params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(&state.server_info.protocol_version);

    json!({
        "protocolVersion": protocol_version,
        "capabilities": {
            "logging": {},
            "prompts": { "listChanged": true },
            "resources": { "listChanged": true, "subscribe": true },
            "tools": { "listChanged": true },
        },
        "serverInfo": {
            "name": state.server_info.name,
            "version": state.server_info.version,
        },
    })
}

fn tool_descriptor_json(descriptor: &ToolDescriptor) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("name".into(), Value::String(descriptor.name.clone()));
    obj.insert("description".into(), Value::String(descriptor.description.clone()));
    if !descriptor.has_empty_parameters() {
        obj.insert("inputSchema".into(), descriptor.parameters.clone());
    }
    if descriptor.is_streaming {
        obj.insert("isStreaming".into(), Value::Bool(true));
    }
    Value::Object(obj)
}

/// `tools/list` (§4.9): `inputSchema` omitted when empty, `isStreaming`
/// omitted when false.
pub fn tools_list(state: &AppState) -> Value {
    let tools: Vec<Value> = state.registry.get_all_tools().iter().map(tool_descriptor_json).collect();
    json!({ "tools": tools })
}

fn parse_tool_call_params(params: &Value) -> Result<(&str, Value), ServerError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::InvalidParams("'name' is required".into()))?;
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    Ok((name, arguments))
}

/// Normalise a tool's raw result to `{content: [{type:"text", text: …}]}`
/// (§4.9 `tools/call`'s result-shaping rule).
fn normalize_result(raw: Value) -> Value {
    if raw.get("content").is_some_and(Value::is_array) {
        return raw;
    }
    let text = match &raw {
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("text").and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => raw.to_string(),
        },
        other => other.to_string(),
    };
    json!({ "content": [{ "type": "text", "text": text }] })
}

/// `tools/call`, synchronous branch (§4.9). Callers that already know the
/// requested tool is streaming and the client accepts SSE route to the
/// stream coordinator instead of here; this function also serves the
/// "downgrade to the synchronous branch" path of §4.10 step 1 by draining a
/// streaming tool's generator to completion and collecting every payload.
pub async fn tools_call(state: &AppState, params: &Value) -> Result<Value, ServerError> {
    let (name, arguments) = parse_tool_call_params(params)?;

    let Some(descriptor) = state.registry.get_tool_info(name) else {
        return Err(ServerError::ToolNotFound(name.to_string()));
    };

    if descriptor.is_streaming {
        return drain_stream_synchronously(state, name, arguments).await;
    }

    match state.registry.execute(name, arguments).await {
        Some(Ok(value)) => Ok(normalize_result(value)),
        Some(Err(e)) => Err(ServerError::Executor(e)),
        None => Err(ServerError::ToolNotFound(name.to_string())),
    }
}

async fn drain_stream_synchronously(state: &AppState, name: &str, arguments: Value) -> Result<Value, ServerError> {
    use mcpd_plugin::GeneratorStep;

    let Some(started) = state.registry.start_stream(name, arguments).await else {
        return Err(ServerError::ToolNotFound(name.to_string()));
    };
    let mut generator = started.map_err(ServerError::Executor)?;

    let mut payloads = Vec::new();
    let result = loop {
        match generator.next().await {
            GeneratorStep::More(value) => payloads.push(value),
            GeneratorStep::End => break Ok(normalize_result(Value::Array(payloads))),
            GeneratorStep::Error(e) => break Err(ServerError::Executor(e)),
        }
    };
    generator.free().await;
    result
}

/// `exit` (§4.9, §4.14): signal the CLI entry point's shutdown sequence.
/// Returns an empty success result; the actual drain/return-from-`main`
/// behavior lives in the binary crate, which watches `state.shutdown`.
pub fn exit(state: &AppState) -> Value {
    state.shutdown.cancel();
    json!({})
}
