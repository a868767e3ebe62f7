//! Wiring of the assistant from configuration, and console line handling.

use crate::config::BotConfig;
use crate::console::Inbound;
use crate::error::BotError;
use crate::services::{CoinGeckoPrice, OpenMeteoWeather};
use sidekick_ai::{AssistantBackend, OpenAiAssistants, OpenAiConfig};
use sidekick_conversation::{
    Assistant, ChatGateway, InMemoryGameSessionStore, OrchestratorConfig, PresenceTracker,
    PriceService, RunOrchestrator, SessionStore, ToolDispatcher, WeatherService,
    tools::{ImageTool, MorningMessageTool, PriceTool, ReminderTool, WeatherTool},
};
use sidekick_core::{TokioSleeper, UserId};
use sidekick_scheduler::{CronSchedule, JobScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The running assistant and its console-facing identity.
pub struct Bot {
    assistant: Assistant,
    presence: PresenceTracker,
    author: UserId,
    bot_name: String,
}

impl Bot {
    /// Builds the bot against the real provider and lookup services.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the
    /// configuration is invalid.
    pub fn from_config(
        config: &BotConfig,
        gateway: Arc<dyn ChatGateway>,
    ) -> Result<Self, BotError> {
        let backend = OpenAiAssistants::new(OpenAiConfig {
            api_key: config.openai.api_key.clone(),
            base_url: config.openai.base_url.clone(),
            image_model: config.openai.image_model.clone(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| BotError::HttpClient {
                reason: e.to_string(),
            })?;

        Self::new(
            config,
            Arc::new(backend),
            gateway,
            Arc::new(OpenMeteoWeather::new(client.clone(), &config.services)),
            Arc::new(CoinGeckoPrice::new(client, &config.services)),
        )
    }

    /// Builds the bot over the given capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the morning message schedule is invalid.
    pub fn new(
        config: &BotConfig,
        backend: Arc<dyn AssistantBackend>,
        gateway: Arc<dyn ChatGateway>,
        weather: Arc<dyn WeatherService>,
        price: Arc<dyn PriceService>,
    ) -> Result<Self, BotError> {
        let dispatcher = tools(config, weather, price)?;
        info!(tools = dispatcher.len(), "registered tools");

        let orchestrator = RunOrchestrator::new(
            OrchestratorConfig {
                assistant_id: config.openai.assistant_id.clone(),
                model: Some(config.openai.model.clone()),
                polling: config.polling.to_polling_config(),
            },
            backend,
            gateway,
            dispatcher,
            SessionStore::new(),
            JobScheduler::new(),
            Arc::new(TokioSleeper),
        );

        let games = Arc::new(InMemoryGameSessionStore::new());
        let assistant = Assistant::new(
            orchestrator,
            ReminderTool::new(config.reminders.escalation_delays()),
            games.clone(),
        );
        let presence = PresenceTracker::new(config.presence.to_presence_config(), games);

        Ok(Self {
            assistant,
            presence,
            author: UserId::new(config.console.user.as_str()),
            bot_name: config.console.bot_name.clone(),
        })
    }

    /// Handles one console line.
    #[instrument(skip(self))]
    pub async fn handle_line(&self, line: &str) {
        let inbound = match Inbound::parse(line, &self.bot_name) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "ignoring console input");
                return;
            }
        };

        match inbound {
            Inbound::Message {
                key,
                text,
                mentioned,
            } => {
                if let Err(e) = self
                    .assistant
                    .on_message(&key, &self.author, &text, mentioned)
                    .await
                {
                    warn!(key = %key, error = %e, "failed to deliver reply");
                }
            }
            Inbound::Interaction { key, interaction } => {
                let response = self.assistant.on_interaction(&key, interaction).await;
                let gateway = self.assistant.orchestrator().gateway();
                if let Err(e) = gateway.send_message(&key, &response).await {
                    warn!(key = %key, error = %e, "failed to deliver interaction response");
                }
            }
            Inbound::Presence { user, game } => self.presence.update(user, game),
        }
    }

    /// Number of conversations with session state.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.assistant.orchestrator().sessions().len()
    }

    /// Spawns the periodic background check.
    pub fn spawn_heartbeat(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let bot = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                info!(
                    sessions = bot.session_count(),
                    playing = bot.presence.playing_count(),
                    "heartbeat"
                );
            }
        })
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("assistant", &self.assistant)
            .field("author", &self.author)
            .finish_non_exhaustive()
    }
}

/// Registers the tools enabled in `config`.
///
/// # Errors
///
/// Returns an error if the morning message is enabled with an invalid
/// schedule.
pub fn tools(
    config: &BotConfig,
    weather: Arc<dyn WeatherService>,
    price: Arc<dyn PriceService>,
) -> Result<ToolDispatcher, BotError> {
    let enabled = &config.tools;
    let mut dispatcher = ToolDispatcher::new();

    if enabled.weather {
        dispatcher.register(Arc::new(WeatherTool::new(weather)));
    }
    if enabled.price {
        dispatcher.register(Arc::new(PriceTool::new(price)));
    }
    if enabled.image {
        dispatcher.register(Arc::new(ImageTool));
    }
    if enabled.reminder {
        dispatcher.register(Arc::new(ReminderTool::new(
            config.reminders.escalation_delays(),
        )));
    }
    if enabled.morning_message {
        let schedule =
            CronSchedule::new(config.digest.cron.as_str()).with_timezone(config.digest.timezone.as_str());
        schedule.validate()?;
        dispatcher.register(Arc::new(MorningMessageTool::new(
            schedule,
            config.digest.prompt.as_str(),
        )));
    }

    Ok(dispatcher)
}
