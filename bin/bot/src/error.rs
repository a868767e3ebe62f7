//! Error types for the bot binary.

use sidekick_ai::BackendError;
use sidekick_scheduler::ScheduleError;

/// Startup and runtime failures of the bot.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The provider client could not be built.
    #[error("provider setup failed: {0}")]
    Backend(#[from] BackendError),

    /// The morning message schedule is invalid.
    #[error("invalid morning message schedule: {0}")]
    Schedule(#[from] ScheduleError),

    /// An HTTP client could not be built.
    #[error("http client setup failed: {reason}")]
    HttpClient { reason: String },

    /// Reading stdin or writing stdout failed.
    #[error("console i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A console line that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// The line has no `channel:` prefix.
    #[error("expected 'channel: text'")]
    MissingChannel,

    /// The channel name is empty.
    #[error("channel name is empty")]
    EmptyChannel,

    /// The slash command is not known.
    #[error("unknown command '/{command}'")]
    UnknownCommand { command: String },

    /// A required argument is missing.
    #[error("/{command} needs {argument}")]
    MissingArgument { command: String, argument: String },

    /// A numeric argument did not parse.
    #[error("/{command}: '{value}' is not a number")]
    InvalidNumber { command: String, value: String },
}
