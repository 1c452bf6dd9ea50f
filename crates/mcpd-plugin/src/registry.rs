//! Tool registry (C4, §4.4).
//!
//! Grounded on `mcp::business::ToolRegistry`: a name→(metadata, executor)
//! table with overwrite-with-warning semantics on duplicate registration, a
//! read-mostly access pattern (`parking_lot::RwLock` in place of the
//! source's implicit single-threaded assumption), and a hard split between
//! the synchronous and streaming entry points (§9 Open Question 2).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;

use crate::descriptor::ToolDescriptor;
use crate::provider::{Generator, PluginError};

/// A synchronous tool executor: arguments in, result JSON or error out.
pub type SyncExecutor = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, PluginError>> + Send + Sync>;

/// A streaming tool starter: arguments in, an owned generator out.
pub type StreamStarter =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Box<dyn Generator>, PluginError>> + Send + Sync>;

/// A registered tool is one or the other, never both (§3).
#[derive(Clone)]
enum Executor {
    Sync(SyncExecutor),
    Streaming(StreamStarter),
}

struct Entry {
    descriptor: ToolDescriptor,
    executor: Executor,
}

/// Name→(metadata, executor) table. Read-mostly: writes happen at startup,
/// reads happen concurrently from request-handling tasks.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Entry>>,
}

impl ToolRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built-in synchronous tool. Overwrites (with a warning) if
    /// `descriptor.name` already exists.
    pub fn register_builtin_sync(&self, descriptor: ToolDescriptor, executor: SyncExecutor) {
        self.insert(descriptor, Executor::Sync(executor));
    }

    /// Register a built-in streaming tool. Overwrites (with a warning) if
    /// `descriptor.name` already exists.
    pub fn register_builtin_streaming(&self, descriptor: ToolDescriptor, starter: StreamStarter) {
        self.insert(descriptor, Executor::Streaming(starter));
    }

    /// Register a tool supplied by a plugin adapter. `descriptor.parameters`
    /// is expected to already be parsed JSON (parse failures are the
    /// adapter's responsibility to log and skip, per §4.4).
    pub fn register_plugin_tool(&self, descriptor: ToolDescriptor, executor: SyncExecutor) {
        self.insert(descriptor, Executor::Sync(executor));
    }

    /// Register a streaming tool supplied by a plugin adapter.
    pub fn register_plugin_streaming_tool(&self, descriptor: ToolDescriptor, starter: StreamStarter) {
        self.insert(descriptor, Executor::Streaming(starter));
    }

    fn insert(&self, descriptor: ToolDescriptor, executor: Executor) {
        let mut guard = self.tools.write();
        if guard.contains_key(&descriptor.name) {
            tracing::warn!(tool = %descriptor.name, "tool already registered, overwriting");
        }
        let name = descriptor.name.clone();
        tracing::trace!(tool = %name, "registered tool");
        guard.insert(name, Entry { descriptor, executor });
    }

    /// Invoke a synchronous executor. Returns `None` if the tool is missing
    /// or is a streaming tool (use [`Self::start_stream`] instead — this is
    /// the point at which §9 Open Question 2's separation is enforced).
    pub async fn execute(&self, name: &str, args: Value) -> Option<Result<Value, PluginError>> {
        let executor = {
            let guard = self.tools.read();
            match &guard.get(name)?.executor {
                Executor::Sync(f) => f.clone(),
                Executor::Streaming(_) => return None,
            }
        };
        Some(executor(args).await)
    }

    /// Start a streaming tool's generator. Returns `None` if the tool is
    /// missing or is not a streaming tool.
    pub async fn start_stream(&self, name: &str, args: Value) -> Option<Result<Box<dyn Generator>, PluginError>> {
        let starter = {
            let guard = self.tools.read();
            match &guard.get(name)?.executor {
                Executor::Streaming(f) => f.clone(),
                Executor::Sync(_) => return None,
            }
        };
        Some(starter(args).await)
    }

    /// Read-only snapshot of every registered tool's descriptor.
    pub fn get_all_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.read().values().map(|e| e.descriptor.clone()).collect()
    }

    /// Look up a single tool's descriptor.
    pub fn get_tool_info(&self, name: &str) -> Option<ToolDescriptor> {
        self.tools.read().get(name).map(|e| e.descriptor.clone())
    }

    /// Every registered tool name.
    pub fn get_all_tool_names(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sync_echo() -> SyncExecutor {
        Arc::new(|args: Value| Box::pin(async move { Ok(args) }))
    }

    #[tokio::test]
    async fn registers_and_executes_sync_tool() {
        let registry = ToolRegistry::new();
        registry.register_builtin_sync(
            ToolDescriptor::new("echo", "echoes input", serde_json::json!({})),
            sync_echo(),
        );
        let result = registry.execute("echo", serde_json::json!({"text": "hi"})).await;
        assert_eq!(result.unwrap().unwrap(), serde_json::json!({"text": "hi"}));
    }

    #[tokio::test]
    async fn sync_tool_rejects_stream_entry_point() {
        let registry = ToolRegistry::new();
        registry.register_builtin_sync(ToolDescriptor::new("echo", "d", serde_json::json!({})), sync_echo());
        assert!(registry.start_stream("echo", serde_json::json!({})).await.is_none());
    }

    #[tokio::test]
    async fn unknown_tool_returns_none() {
        let registry = ToolRegistry::new();
        assert!(registry.execute("missing", serde_json::json!({})).await.is_none());
    }

    #[test]
    fn overwrite_keeps_latest_registration() {
        let registry = ToolRegistry::new();
        registry.register_builtin_sync(ToolDescriptor::new("echo", "first", serde_json::json!({})), sync_echo());
        registry.register_builtin_sync(ToolDescriptor::new("echo", "second", serde_json::json!({})), sync_echo());
        assert_eq!(registry.get_tool_info("echo").unwrap().description, "second");
        assert_eq!(registry.get_all_tool_names(), vec!["echo".to_string()]);
    }
}
