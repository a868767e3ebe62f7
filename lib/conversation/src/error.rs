//! Error types for the conversation crate.
//!
//! - `GatewayError`: delivery and lookup failures on the chat platform
//! - `ServiceError`: failures of external lookup services (weather, price)
//! - `StoreError`: game-session persistence failures
//! - `ToolError`: a single tool call failed; rendered into its output string
//! - `RunError`: a model invocation did not produce a result

use sidekick_ai::BackendError;
use sidekick_scheduler::ScheduleError;

/// Output handed back to the model when a call's arguments cannot be parsed.
pub const DATA_ERROR_OUTPUT: &str = "error deserializing data";

/// Errors from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// A message could not be delivered.
    #[error("failed to deliver message to {key}: {reason}")]
    DeliveryFailed { key: String, reason: String },
    /// Member lookup failed.
    #[error("member lookup failed: {reason}")]
    LookupFailed { reason: String },
}

/// Errors from external lookup services.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service could not be reached or answered badly.
    #[error("service unavailable: {reason}")]
    Unavailable { reason: String },
    /// Nothing matched the query.
    #[error("no result for '{query}'")]
    NotFound { query: String },
}

/// Errors from game-session persistence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Storage operation failed.
    #[error("game session storage failed: {reason}")]
    StorageFailed { reason: String },
}

/// Errors from executing one tool call.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The call's arguments did not match the tool's schema.
    #[error("invalid arguments for '{name}': {reason}")]
    InvalidArguments { name: String, reason: String },
    /// A lookup service failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// The provider failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The chat platform failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// A schedule was rejected.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl ToolError {
    /// Renders the error as the output string returned to the model.
    #[must_use]
    pub fn to_output(&self) -> String {
        match self {
            Self::InvalidArguments { .. } => DATA_ERROR_OUTPUT.to_string(),
            other => format!("error: {other}"),
        }
    }
}

/// Errors from driving a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A provider request failed outright.
    #[error("provider request failed: {0}")]
    Backend(#[from] BackendError),
    /// The run ended in the `failed` state.
    #[error("run failed ({code}): {message}")]
    Failed { code: String, message: String },
    /// The run reported a status the state machine does not handle.
    #[error("unexpected run status: {status}")]
    UnexpectedStatus { status: String },
    /// The run completed without an assistant message.
    #[error("run completed without a reply")]
    EmptyReply,
    /// A forced tool was never called.
    #[error("run completed without calling '{name}'")]
    ToolNotCalled { name: String },
    /// A forced tool was called with arguments that are not usable.
    #[error("invalid arguments for '{name}': {reason}")]
    InvalidToolArguments { name: String, reason: String },
}
