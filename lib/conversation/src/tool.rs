//! Tools the model may call during a run.
//!
//! A tool is a [`ToolHandler`]: it publishes a [`ToolDefinition`] that is
//! sent to the provider with each run, and executes calls by name through the
//! [`ToolDispatcher`](crate::dispatcher::ToolDispatcher).

use crate::error::{RunError, ToolError};
use crate::gateway::ChatGateway;
use crate::session::SessionStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sidekick_ai::AssistantBackend;
use sidekick_core::ConversationKey;
use sidekick_scheduler::JobScheduler;
use std::sync::{Arc, Weak};

/// Definition of a tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique function name.
    pub name: String,
    /// Human-readable description the model uses to decide when to call it.
    pub description: String,
    /// JSON schema for the arguments.
    pub input_schema: JsonValue,
}

impl ToolDefinition {
    /// Creates a new tool definition with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: JsonValue) -> Self {
        self.input_schema = schema;
        self
    }

    /// Converts the definition to the provider's function-tool format.
    #[must_use]
    pub fn to_provider_format(&self) -> JsonValue {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

/// Runs the conversation flow on behalf of a scheduled job.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Sends `text` into the conversation and returns the assistant's reply.
    async fn respond(&self, key: &ConversationKey, text: &str) -> Result<String, RunError>;
}

/// Everything a tool call may touch.
#[derive(Clone)]
pub struct ToolContext {
    /// Conversation the call was made in.
    pub key: ConversationKey,
    /// Provider, for image generation.
    pub backend: Arc<dyn AssistantBackend>,
    /// Outbound messages.
    pub gateway: Arc<dyn ChatGateway>,
    /// Session flags.
    pub sessions: SessionStore,
    /// Deferred work.
    pub scheduler: JobScheduler,
    /// Conversation flow for jobs that outlive the call; weak so scheduled
    /// jobs do not keep the orchestrator alive.
    pub responder: Weak<dyn Responder>,
}

impl ToolContext {
    /// Returns a copy of this context for another conversation.
    #[must_use]
    pub fn for_key(&self, key: ConversationKey) -> Self {
        Self {
            key,
            ..self.clone()
        }
    }
}

/// Executes calls to one named tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Executes a call with already-parsed JSON arguments.
    async fn execute(&self, ctx: &ToolContext, input: JsonValue) -> Result<String, ToolError>;
}

/// Deserializes a tool's arguments into its own schema.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] if the input does not match.
pub fn parse_arguments<T: DeserializeOwned>(name: &str, input: JsonValue) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Args {
        location: String,
    }

    #[test]
    fn tool_definition_builder() {
        let tool = ToolDefinition::new("get_weather", "Current weather").with_input_schema(
            serde_json::json!({
                "type": "object",
                "properties": { "location": { "type": "string" } },
                "required": ["location"]
            }),
        );

        let wire = tool.to_provider_format();
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "get_weather");
        assert_eq!(wire["function"]["parameters"]["required"][0], "location");
    }

    #[test]
    fn parse_arguments_accepts_matching_input() {
        let args: Args =
            parse_arguments("get_weather", serde_json::json!({ "location": "Oslo" })).unwrap();
        assert_eq!(args.location, "Oslo");
    }

    #[test]
    fn parse_arguments_rejects_wrong_shape() {
        let result: Result<Args, _> =
            parse_arguments("get_weather", serde_json::json!({ "city": "Oslo" }));
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }
}
