//! Hosted assistant backend abstraction.
//!
//! The provider owns threads (durable transcripts) and runs (model
//! invocations). Locally a run is only an ID, a status and, while it waits
//! for us, the batch of tool calls it wants answered.

use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sidekick_core::{RunId, ThreadId, ToolCallId};
use std::fmt;

/// The role of a message author on a provider thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
}

impl MessageRole {
    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Lifecycle status of a provider run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Accepted, not yet started.
    Queued,
    /// The model is working.
    InProgress,
    /// The run is blocked on tool outputs.
    RequiresAction,
    /// Terminal success.
    Completed,
    /// Terminal failure.
    Failed,
    /// Anything the provider reports that we do not model.
    Unknown(String),
}

impl RunStatus {
    /// Maps a provider status string onto the local vocabulary.
    #[must_use]
    pub fn from_wire(status: &str) -> Self {
        match status {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "requires_action" => Self::RequiresAction,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns true if the run will not change state again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Unknown(_))
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("queued"),
            Self::InProgress => f.write_str("in_progress"),
            Self::RequiresAction => f.write_str("requires_action"),
            Self::Completed => f.write_str("completed"),
            Self::Failed => f.write_str("failed"),
            Self::Unknown(status) => write!(f, "unknown({status})"),
        }
    }
}

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-issued call ID; the matching output must echo it.
    pub id: ToolCallId,
    /// Declared function name.
    pub name: String,
    /// Raw JSON argument payload, unparsed.
    pub arguments: String,
}

impl ToolCall {
    /// Creates a tool call.
    #[must_use]
    pub fn new(
        id: impl Into<ToolCallId>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// The answer to one [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The call being answered.
    pub tool_call_id: ToolCallId,
    /// Free-form output handed back to the model.
    pub output: String,
}

impl ToolOutput {
    /// Creates a tool output for the given call.
    #[must_use]
    pub fn new(tool_call_id: ToolCallId, output: impl Into<String>) -> Self {
        Self {
            tool_call_id,
            output: output.into(),
        }
    }
}

/// Error detail reported by the provider for a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    /// Provider error code.
    pub code: String,
    /// Provider error message.
    pub message: String,
}

/// A snapshot of a provider run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    /// Run identifier.
    pub id: RunId,
    /// Current status.
    pub status: RunStatus,
    /// Tool calls awaiting outputs (only meaningful in `RequiresAction`).
    pub pending_tool_calls: Vec<ToolCall>,
    /// Failure detail (only meaningful in `Failed`).
    pub last_error: Option<ProviderFailure>,
}

impl Run {
    /// Creates a run snapshot with no pending calls or error.
    #[must_use]
    pub fn new(id: impl Into<RunId>, status: RunStatus) -> Self {
        Self {
            id: id.into(),
            status,
            pending_tool_calls: Vec::new(),
            last_error: None,
        }
    }

    /// Attaches pending tool calls.
    #[must_use]
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.pending_tool_calls = calls;
        self
    }

    /// Attaches a provider failure.
    #[must_use]
    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.last_error = Some(ProviderFailure {
            code: code.into(),
            message: message.into(),
        });
        self
    }
}

/// Options for creating a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOptions {
    /// Provider assistant that executes the run.
    pub assistant_id: String,
    /// Model override.
    pub model: Option<String>,
    /// Extra instructions appended for this run only.
    pub additional_instructions: Option<String>,
    /// Tool definitions in provider format.
    pub tools: Vec<JsonValue>,
    /// Forces the model to call this function.
    pub tool_choice: Option<String>,
}

impl RunOptions {
    /// Creates options for the given assistant.
    #[must_use]
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            ..Self::default()
        }
    }

    /// Sets the model override.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets per-run instructions.
    #[must_use]
    pub fn with_additional_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.additional_instructions = Some(instructions.into());
        self
    }

    /// Sets the tool definitions.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<JsonValue>) -> Self {
        self.tools = tools;
        self
    }

    /// Forces a single named function.
    #[must_use]
    pub fn with_tool_choice(mut self, name: impl Into<String>) -> Self {
        self.tool_choice = Some(name.into());
        self
    }
}

/// Capability surface of a hosted assistant provider.
///
/// Every method is a single request; none of them retry.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Creates an empty thread.
    async fn create_thread(&self) -> Result<ThreadId, BackendError>;

    /// Appends a message to a thread.
    async fn create_message(
        &self,
        thread: &ThreadId,
        role: MessageRole,
        text: &str,
    ) -> Result<(), BackendError>;

    /// Starts a run on a thread.
    async fn create_run(&self, thread: &ThreadId, options: &RunOptions)
    -> Result<Run, BackendError>;

    /// Fetches the current state of a run.
    async fn retrieve_run(&self, thread: &ThreadId, run: &RunId) -> Result<Run, BackendError>;

    /// Answers every pending tool call of a run in one acknowledgement.
    async fn submit_tool_outputs(
        &self,
        thread: &ThreadId,
        run: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<(), BackendError>;

    /// Returns the text of the most recent assistant message, if any.
    async fn latest_assistant_message(
        &self,
        thread: &ThreadId,
    ) -> Result<Option<String>, BackendError>;

    /// Generates an image and returns its URL.
    async fn generate_image(&self, prompt: &str) -> Result<String, BackendError>;
}
