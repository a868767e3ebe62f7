//! Inbound message and interaction handling.

use crate::error::{GatewayError, RunError};
use crate::games::GameSessionStore;
use crate::orchestrator::RunOrchestrator;
use crate::tools::{REMINDER_JOB, REMINDER_TOOL, ReminderArgs, ReminderTool};
use serde::{Deserialize, Serialize};
use sidekick_core::{ConversationKey, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Sent in place of a reply whenever producing one failed.
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";

/// A slash-command style request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interaction {
    /// Start a fresh remote thread.
    Reset,
    /// Flip whether every message gets a reply.
    ToggleAlwaysRespond,
    /// Stop the session's background output.
    Stop,
    /// Create a reminder from free text.
    Remind { text: String },
    /// Report recent play time.
    Playtime { user: UserId, days: u32 },
}

/// Entry point for everything arriving from the chat platform.
pub struct Assistant {
    orchestrator: Arc<RunOrchestrator>,
    reminders: ReminderTool,
    games: Arc<dyn GameSessionStore>,
}

impl Assistant {
    /// Creates the handler.
    #[must_use]
    pub fn new(
        orchestrator: Arc<RunOrchestrator>,
        reminders: ReminderTool,
        games: Arc<dyn GameSessionStore>,
    ) -> Self {
        Self {
            orchestrator,
            reminders,
            games,
        }
    }

    /// The orchestrator replies go through.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<RunOrchestrator> {
        &self.orchestrator
    }

    /// Handles a message posted in a conversation.
    ///
    /// Any message answers a reminder that already fired: the awaiting flag
    /// is cleared and its pending follow-ups are cancelled. Reminders that
    /// have not fired yet are left alone. A reply is sent
    /// when always-respond is on, the assistant was mentioned, or the
    /// message answered a reminder.
    ///
    /// # Errors
    ///
    /// Returns an error only if the reply could not be delivered.
    #[instrument(skip(self, key, author, text), fields(key = %key, author = %author))]
    pub async fn on_message(
        &self,
        key: &ConversationKey,
        author: &UserId,
        text: &str,
        mentioned: bool,
    ) -> Result<(), GatewayError> {
        let sessions = self.orchestrator.sessions();
        let answered_reminder = sessions.take_awaits_response(key);
        let cancelled = self.orchestrator.scheduler().cancel(REMINDER_JOB, key);
        if cancelled > 0 {
            debug!(cancelled, "cancelled reminder follow-ups");
        }

        let always = sessions.get_or_create(key).always_respond();
        if !(always || mentioned || answered_reminder) {
            return Ok(());
        }

        let name = self.display_name(author).await;
        let reply = match self
            .orchestrator
            .respond(key, &format!("{name}: {text}"))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "failed to produce a reply");
                APOLOGY.to_string()
            }
        };
        self.orchestrator.gateway().send_message(key, &reply).await
    }

    /// Handles an interaction and returns the text to show its issuer.
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn on_interaction(&self, key: &ConversationKey, interaction: Interaction) -> String {
        let sessions = self.orchestrator.sessions();
        match interaction {
            Interaction::Reset => {
                sessions.reset_thread(key);
                info!("conversation reset");
                "Conversation reset. I've forgotten everything we talked about.".to_string()
            }
            Interaction::ToggleAlwaysRespond => {
                if sessions.toggle_always_respond(key) {
                    "I'll respond to every message in this channel.".to_string()
                } else {
                    "I'll only respond when mentioned.".to_string()
                }
            }
            Interaction::Stop => match sessions.cancel_handle(key) {
                Some(handle) if !handle.is_cancelled() => {
                    handle.cancel();
                    "Stopped.".to_string()
                }
                _ => "Nothing to stop.".to_string(),
            },
            Interaction::Remind { text } => match self.remind(key, &text).await {
                Ok(args) => format!(
                    "Okay, I'll remind you to {} in {}.",
                    args.message,
                    format_duration(Duration::from_secs(args.delay_seconds))
                ),
                Err(e) => {
                    error!(error = %e, "failed to create reminder");
                    APOLOGY.to_string()
                }
            },
            Interaction::Playtime { user, days } => {
                let name = self.display_name(&user).await;
                match self.games.sum_durations(&user, days).await {
                    Ok(total) => format!(
                        "{name} has played for {} in the last {days} days.",
                        format_duration(total)
                    ),
                    Err(e) => {
                        error!(error = %e, "failed to sum play time");
                        APOLOGY.to_string()
                    }
                }
            }
        }
    }

    async fn remind(&self, key: &ConversationKey, text: &str) -> Result<ReminderArgs, RunError> {
        let raw = self.orchestrator.extract(key, text, REMINDER_TOOL).await?;
        let args: ReminderArgs =
            serde_json::from_value(raw).map_err(|e| RunError::InvalidToolArguments {
                name: REMINDER_TOOL.to_string(),
                reason: e.to_string(),
            })?;
        self.reminders
            .schedule(&self.orchestrator.tool_context(key), args.clone());
        Ok(args)
    }

    async fn display_name(&self, user: &UserId) -> String {
        match self.orchestrator.gateway().lookup_member(user).await {
            Ok(Some(member)) => member.display_name,
            Ok(None) => user.to_string(),
            Err(e) => {
                debug!(user = %user, error = %e, "member lookup failed");
                user.to_string()
            }
        }
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("orchestrator", &self.orchestrator)
            .field("reminders", &self.reminders)
            .finish_non_exhaustive()
    }
}

fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m"),
        _ => format!("{hours}h {minutes}m"),
    }
}
