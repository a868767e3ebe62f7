//! Console front end for the sidekick assistant.
//!
//! Loads configuration, wires the provider, lookup services and tools into
//! an [`Assistant`](sidekick_conversation::Assistant), and exchanges
//! messages over stdin and stdout.

pub mod app;
pub mod config;
pub mod console;
pub mod error;
pub mod services;

pub use app::{Bot, tools};
pub use config::BotConfig;
pub use console::{ConsoleGateway, Inbound};
pub use error::{BotError, InputError};
pub use services::{CoinGeckoPrice, OpenMeteoWeather};
