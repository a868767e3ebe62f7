//! Name-to-handler dispatch of a run's tool calls.
//!
//! [`ToolDispatcher::dispatch`] answers every call of a `requires_action`
//! batch with exactly one [`ToolOutput`], echoing the call ID. A call that
//! fails, for whatever reason, only affects its own output.
//!
//! Batches containing the morning-message toggle are single-flight: the
//! first toggle call executes and every other call in the batch is answered
//! with [`NEUTRAL_OUTPUT`] without running.

use crate::error::DATA_ERROR_OUTPUT;
use crate::tool::{ToolContext, ToolDefinition, ToolHandler};
use crate::tools::digest::MORNING_MESSAGE_TOOL;
use futures::future::join_all;
use serde_json::Value as JsonValue;
use sidekick_ai::{ToolCall, ToolOutput};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Output for calls answered without executing.
pub const NEUTRAL_OUTPUT: &str = "ok";

/// Output for calls to functions no enabled handler serves.
pub const UNKNOWN_FUNCTION_OUTPUT: &str = "unknown function";

/// Dispatch table of enabled tools.
#[derive(Clone, Default)]
pub struct ToolDispatcher {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolDispatcher {
    /// Creates a dispatcher with no tools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its definition's name.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(handler.definition().name, handler);
    }

    /// Registers a handler, builder style.
    #[must_use]
    pub fn with(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Definitions of every registered tool, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.handlers.values().map(|h| h.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Definitions in the provider's wire format.
    #[must_use]
    pub fn provider_tools(&self) -> Vec<JsonValue> {
        self.definitions()
            .iter()
            .map(ToolDefinition::to_provider_format)
            .collect()
    }

    /// Whether a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Executes a batch of calls, returning one output per call in input
    /// order.
    pub async fn dispatch(&self, calls: &[ToolCall], ctx: &ToolContext) -> Vec<ToolOutput> {
        let exclusive = calls.iter().position(|c| c.name == MORNING_MESSAGE_TOOL);

        let outputs = calls.iter().enumerate().map(|(index, call)| async move {
            let output = match exclusive {
                Some(chosen) if chosen != index => {
                    debug!(tool = %call.name, "skipped by single-flight toggle");
                    NEUTRAL_OUTPUT.to_string()
                }
                _ => self.execute(call, ctx).await,
            };
            ToolOutput::new(call.id.clone(), output)
        });

        join_all(outputs).await
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> String {
        let Some(handler) = self.handlers.get(&call.name) else {
            warn!(tool = %call.name, key = %ctx.key, "call to unknown function");
            return UNKNOWN_FUNCTION_OUTPUT.to_string();
        };

        let input: JsonValue = match serde_json::from_str(&call.arguments) {
            Ok(input) => input,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool arguments are not JSON");
                return DATA_ERROR_OUTPUT.to_string();
            }
        };

        match handler.execute(ctx, input).await {
            Ok(output) => {
                debug!(tool = %call.name, key = %ctx.key, "tool call succeeded");
                output
            }
            Err(e) => {
                warn!(tool = %call.name, key = %ctx.key, error = %e, "tool call failed");
                e.to_output()
            }
        }
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ToolDispatcher").field("tools", &names).finish()
    }
}
