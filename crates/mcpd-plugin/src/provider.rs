//! Plugin adapter capability interface (C5, §4.5).
//!
//! The original project exposes this boundary as raw C function pointers
//! (`call_tool_func`, `StreamGeneratorNext`, `StreamGeneratorFree`, loaded via
//! `dlopen`/`dlsym` in `PluginManager`) with the generator tracked in a
//! `mutex<map<void*, Plugin*>>`. §9 Design Notes calls this out explicitly as
//! a pattern to replace: here the boundary is a pair of async traits, and a
//! generator is an owned `Box<dyn Generator>` rather than a raw pointer keyed
//! by address. Binding to an actual dynamic library (if any) is the job of a
//! concrete `ToolProvider` impl living outside this crate — out of scope per
//! the specification's plugin-packaging-format non-goal.

use async_trait::async_trait;
use serde_json::Value;

use crate::descriptor::ToolDescriptor;

/// Errors a plugin/tool provider can report back across the capability
/// boundary.
#[derive(Debug, Clone, thiserror::Error)]
#[error("plugin error {code}: {message}")]
pub struct PluginError {
    /// Application error code (§7 application range, or tool-specific).
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl PluginError {
    /// Build a plugin error.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// The result of one `next()` call on a [`Generator`] (§3 "Generator handle").
pub enum GeneratorStep {
    /// A payload is available; the stream continues.
    More(Value),
    /// The stream has ended normally.
    End,
    /// The stream ended with an error.
    Error(PluginError),
}

/// An opaque, single-consumer source of streaming payloads (§3, §4.5).
///
/// `free` is modeled as a consuming method (`self: Box<Self>`) rather than a
/// separate free-function pointer captured by address: ownership transfer at
/// the type level makes "free exactly once" (P3) a property the compiler
/// enforces on the coordinator's registry, not a convention callers must
/// remember.
#[async_trait]
pub trait Generator: Send {
    /// Advance the generator by one step.
    async fn next(&mut self) -> GeneratorStep;

    /// Release any resources held by the generator. Called exactly once,
    /// after the generator is removed from the coordinator's registry.
    async fn free(self: Box<Self>);
}

/// Supplies tool descriptors and executors to the tool registry (C4).
///
/// A registered tool is either synchronous (`call`) or streaming
/// (`start_stream`), never both — see §9 Open Question 2: these are kept as
/// two distinct entry points rather than unified behind one call whose return
/// shape is inspected to decide which happened.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// List every tool this provider supplies.
    async fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Invoke a synchronous tool.
    async fn call(&self, name: &str, args: Value) -> Result<Value, PluginError>;

    /// Start a streaming tool, returning its generator.
    async fn start_stream(&self, name: &str, args: Value) -> Result<Box<dyn Generator>, PluginError>;
}
