//! Built-in tools (§8 scenarios S1/S3-S6 reference `echo` and
//! `example_stream` directly; the plugin-packaging format itself is a
//! non-goal, so these are registered in-process rather than discovered from
//! a plugin directory).
//!
//! Grounded on `mcpd-server`'s own coordinator/registry test doubles
//! (`CountingGenerator` in `coordinator.rs`): a streaming tool is just a
//! closure returning a freshly constructed [`Generator`], registered the
//! same way a real plugin adapter would register one via
//! [`ToolRegistry::register_builtin_sync`]/[`ToolRegistry::register_builtin_streaming`].

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use mcpd_plugin::{Generator, GeneratorStep, PluginError, ToolDescriptor, ToolRegistry};

/// Number of ticks `example_stream` emits before ending (§8 S3/S4/S5 exercise
/// ids 1 through 6+, so five cached ticks leaves room for a live id 6).
const EXAMPLE_STREAM_TICKS: u32 = 5;

fn echo(args: Value) -> BoxFuture<'static, Result<Value, PluginError>> {
    Box::pin(async move {
        let text = args.get("text").cloned().unwrap_or(Value::Null);
        Ok(json!({ "text": text }))
    })
}

struct TickGenerator {
    remaining: u32,
    emitted: u32,
}

#[async_trait]
impl Generator for TickGenerator {
    async fn next(&mut self) -> GeneratorStep {
        if self.remaining == 0 {
            return GeneratorStep::End;
        }
        self.remaining -= 1;
        self.emitted += 1;
        GeneratorStep::More(json!({ "tick": self.emitted }))
    }

    async fn free(self: Box<Self>) {}
}

/// Register the tools every scenario in §8 exercises: a synchronous `echo`
/// and a streaming `example_stream`.
pub fn register_builtins(registry: &ToolRegistry) {
    registry.register_builtin_sync(
        ToolDescriptor::new("echo", "Echoes the `text` argument back unchanged.", json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
        })),
        Arc::new(echo),
    );

    registry.register_builtin_streaming(
        ToolDescriptor::new(
            "example_stream",
            "Emits a handful of incrementing ticks, then completes.",
            json!({}),
        )
        .streaming(),
        Arc::new(|_args: Value| {
            Box::pin(async move {
                let generator: Box<dyn Generator> = Box::new(TickGenerator {
                    remaining: EXAMPLE_STREAM_TICKS,
                    emitted: 0,
                });
                Ok(generator)
            })
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_text_argument_unchanged() {
        let registry = ToolRegistry::new();
        register_builtins(&registry);
        let result = registry.execute("echo", json!({"text": "hi"})).await.unwrap().unwrap();
        assert_eq!(result, json!({"text": "hi"}));
    }

    #[tokio::test]
    async fn example_stream_emits_five_ticks_then_ends() {
        let registry = ToolRegistry::new();
        register_builtins(&registry);
        let mut generator = registry.start_stream("example_stream", json!({})).await.unwrap().unwrap();
        for expected in 1..=EXAMPLE_STREAM_TICKS {
            match generator.next().await {
                GeneratorStep::More(payload) => assert_eq!(payload, json!({"tick": expected})),
                _ => panic!("expected a tick payload"),
            }
        }
        assert!(matches!(generator.next().await, GeneratorStep::End));
    }

    #[tokio::test]
    async fn example_stream_is_listed_as_streaming() {
        let registry = ToolRegistry::new();
        register_builtins(&registry);
        let descriptor = registry.get_tool_info("example_stream").unwrap();
        assert!(descriptor.is_streaming);
    }
}
