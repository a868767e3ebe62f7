//! Conversational session orchestration for sidekick.
//!
//! This crate provides:
//!
//! - **Session Store**: per-conversation thread handle, flags and turn lock
//! - **Run Orchestrator**: drives provider runs to completion, executing the
//!   tool calls they request
//! - **Tool Dispatcher**: name-to-handler table for tool calls, with the
//!   built-in price, weather, image, reminder and morning message tools
//! - **Assistant**: inbound message and interaction handling
//! - **Presence Tracker**: debounced game presence turned into recorded
//!   play sessions

pub mod assistant;
pub mod dispatcher;
pub mod error;
pub mod games;
pub mod gateway;
pub mod orchestrator;
pub mod presence;
pub mod services;
pub mod session;
pub mod tool;
pub mod tools;

#[cfg(test)]
mod testing;

pub use assistant::{APOLOGY, Assistant, Interaction};
pub use dispatcher::{NEUTRAL_OUTPUT, ToolDispatcher, UNKNOWN_FUNCTION_OUTPUT};
pub use error::{DATA_ERROR_OUTPUT, GatewayError, RunError, ServiceError, StoreError, ToolError};
pub use games::{GameSession, GameSessionStore, InMemoryGameSessionStore};
pub use gateway::{ChatGateway, DEFAULT_MAX_MESSAGE_CHARS, Member, chunk_message};
pub use orchestrator::{OrchestratorConfig, PollingConfig, RunOrchestrator};
pub use presence::{PresenceConfig, PresenceTracker};
pub use services::{PriceQuote, PriceService, WeatherReport, WeatherService};
pub use session::{Session, SessionStore};
pub use tool::{Responder, ToolContext, ToolDefinition, ToolHandler, parse_arguments};
