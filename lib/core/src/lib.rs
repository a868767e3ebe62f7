//! Core domain types and utilities for the sidekick assistant.
//!
//! This crate provides the identifiers, error aliases and clock seam shared
//! by the scheduler, provider and conversation crates.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Sleeper, TokioSleeper};
pub use error::{BoxError, Result};
pub use id::{ConversationKey, JobId, ParseIdError, RunId, ThreadId, ToolCallId, UserId};
