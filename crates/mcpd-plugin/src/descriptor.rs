//! Tool descriptor types (§3 "Tool descriptor").

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable metadata describing a registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Non-empty, registry-unique name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Opaque JSON-Schema for the tool's parameters. An empty object means
    /// "no declared schema".
    #[serde(default = "default_parameters")]
    pub parameters: Value,
    /// Whether this tool streams results via SSE.
    #[serde(default)]
    pub is_streaming: bool,
}

fn default_parameters() -> Value {
    serde_json::json!({})
}

impl ToolDescriptor {
    /// Build a synchronous tool descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            is_streaming: false,
        }
    }

    /// Mark this descriptor as streaming.
    #[must_use]
    pub const fn streaming(mut self) -> Self {
        self.is_streaming = true;
        self
    }

    /// `true` when the parameters schema carries no fields, per §4.9's
    /// `tools/list` "omit `inputSchema` when empty" rule.
    #[must_use]
    pub fn has_empty_parameters(&self) -> bool {
        self.parameters.as_object().is_some_and(serde_json::Map::is_empty)
    }
}
