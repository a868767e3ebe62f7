//! Centralized bot configuration.
//!
//! Loaded via the `config` crate from an optional `sidekick.toml` in the
//! working directory, overridden by environment variables prefixed with
//! `SIDEKICK_`; nested keys use `__`, e.g. `SIDEKICK_OPENAI__API_KEY`.

use serde::Deserialize;
use sidekick_conversation::{PollingConfig, PresenceConfig};
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "SIDEKICK";
const DEFAULT_FILE: &str = "sidekick";

/// Bot configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Provider access.
    pub openai: OpenAiSettings,

    /// Which tools the model may call.
    #[serde(default)]
    pub tools: ToolSettings,

    /// Reminder follow-ups.
    #[serde(default)]
    pub reminders: ReminderSettings,

    /// Game presence tracking.
    #[serde(default)]
    pub presence: PresenceSettings,

    /// Run polling and background checks.
    #[serde(default)]
    pub polling: PollingSettings,

    /// Chat platform limits.
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Daily morning message.
    #[serde(default)]
    pub digest: DigestSettings,

    /// Weather and price lookups.
    #[serde(default)]
    pub services: ServiceSettings,

    /// Console front end.
    #[serde(default)]
    pub console: ConsoleSettings,
}

/// Provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    /// API key.
    pub api_key: String,

    /// API base URL.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Assistant that executes runs.
    pub assistant_id: String,

    /// Model used for runs.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for image generation.
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

/// Per-tool switches; everything is on unless turned off.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "enabled")]
    pub price: bool,
    #[serde(default = "enabled")]
    pub weather: bool,
    #[serde(default = "enabled")]
    pub image: bool,
    #[serde(default = "enabled")]
    pub reminder: bool,
    #[serde(default = "enabled")]
    pub morning_message: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            price: true,
            weather: true,
            image: true,
            reminder: true,
            morning_message: true,
        }
    }
}

/// Reminder settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReminderSettings {
    /// Follow-up delays in seconds, measured from when the reminder fired.
    #[serde(default = "default_escalation_delays_secs")]
    pub escalation_delays_secs: Vec<u64>,
}

fn default_escalation_delays_secs() -> Vec<u64> {
    vec![300, 900, 3600]
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            escalation_delays_secs: default_escalation_delays_secs(),
        }
    }
}

impl ReminderSettings {
    /// Follow-up delays as durations.
    #[must_use]
    pub fn escalation_delays(&self) -> Vec<Duration> {
        self.escalation_delays_secs
            .iter()
            .copied()
            .map(Duration::from_secs)
            .collect()
    }
}

/// Presence settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceSettings {
    /// Shortest game session worth recording, in seconds.
    #[serde(default = "default_min_session_secs")]
    pub min_session_secs: u64,

    /// Quiet period before a presence update is applied, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_min_session_secs() -> u64 {
    300
}

fn default_debounce_ms() -> u64 {
    5000
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            min_session_secs: default_min_session_secs(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl PresenceSettings {
    /// Converts to the tracker's configuration.
    #[must_use]
    pub fn to_presence_config(&self) -> PresenceConfig {
        PresenceConfig {
            min_session: Duration::from_secs(self.min_session_secs),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}

/// Polling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingSettings {
    /// First poll delay in milliseconds; cycle `n` waits `n` times this.
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,

    /// Cap on a single poll delay, in milliseconds.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,

    /// Seconds of polling between activity indications.
    #[serde(default = "default_activity_every_secs")]
    pub activity_every_secs: u64,

    /// Interval of the periodic background check, in seconds.
    #[serde(default = "default_background_secs")]
    pub background_secs: u64,
}

fn default_base_ms() -> u64 {
    500
}

fn default_max_ms() -> u64 {
    5000
}

fn default_activity_every_secs() -> u64 {
    8
}

fn default_background_secs() -> u64 {
    60
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
            activity_every_secs: default_activity_every_secs(),
            background_secs: default_background_secs(),
        }
    }
}

impl PollingSettings {
    /// Converts to the orchestrator's poll pacing.
    #[must_use]
    pub fn to_polling_config(&self) -> PollingConfig {
        PollingConfig {
            base: Duration::from_millis(self.base_ms),
            max: Duration::from_millis(self.max_ms),
            activity_every: Duration::from_secs(self.activity_every_secs),
        }
    }

    /// Background check interval; never zero.
    #[must_use]
    pub fn background_interval(&self) -> Duration {
        Duration::from_secs(self.background_secs.max(1))
    }
}

/// Chat platform settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Longest message the platform accepts, in characters.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

fn default_max_message_chars() -> usize {
    2000
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
        }
    }
}

/// Morning message settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DigestSettings {
    /// Cron expression (5 fields, or 6 with leading seconds).
    #[serde(default = "default_digest_cron")]
    pub cron: String,

    /// IANA timezone the expression is evaluated in.
    #[serde(default = "default_digest_timezone")]
    pub timezone: String,

    /// What the assistant is asked each morning.
    #[serde(default = "default_digest_prompt")]
    pub prompt: String,
}

fn default_digest_cron() -> String {
    "0 8 * * *".to_string()
}

fn default_digest_timezone() -> String {
    "UTC".to_string()
}

fn default_digest_prompt() -> String {
    "Good morning! Write today's morning message: greet the channel, mention the weather \
     and anything worth knowing today. Keep it short."
        .to_string()
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            cron: default_digest_cron(),
            timezone: default_digest_timezone(),
            prompt: default_digest_prompt(),
        }
    }
}

/// Lookup service endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    /// Open-Meteo geocoding API base URL.
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    /// Open-Meteo forecast API base URL.
    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// CoinGecko API base URL.
    #[serde(default = "default_price_url")]
    pub price_url: String,

    /// Currency prices are quoted in.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_price_url() -> String {
    "https://api.coingecko.com".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            price_url: default_price_url(),
            currency: default_currency(),
        }
    }
}

/// Console front end settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleSettings {
    /// User ID console messages are attributed to.
    #[serde(default = "default_console_user")]
    pub user: String,

    /// Name that counts as mentioning the assistant.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
}

fn default_console_user() -> String {
    "console".to_string()
}

fn default_bot_name() -> String {
    "sidekick".to_string()
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            user: default_console_user(),
            bot_name: default_bot_name(),
        }
    }
}

impl BotConfig {
    /// Loads configuration from `sidekick.toml` (if present) and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_FILE).required(false))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Loads configuration from an explicit file, then the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or configuration is
    /// missing or invalid.
    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("reminders.escalation_delays_secs")
}
