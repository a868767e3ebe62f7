//! Hosted assistant provider capability for sidekick.
//!
//! This crate provides:
//!
//! - **Backend**: the create/poll/submit surface of a thread-and-run style
//!   assistant API, plus image generation
//! - **Run model**: run status vocabulary, tool calls and tool outputs
//! - **OpenAI**: an HTTP implementation over the Assistants v2 API

pub mod backend;
pub mod error;
pub mod openai;

pub use backend::{
    AssistantBackend, MessageRole, ProviderFailure, Run, RunOptions, RunStatus, ToolCall,
    ToolOutput,
};
pub use error::BackendError;
pub use openai::{OpenAiAssistants, OpenAiConfig};
