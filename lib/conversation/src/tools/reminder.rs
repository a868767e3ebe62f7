//! `create_reminder` tool.
//!
//! A reminder is a one-time job tagged [`PENDING_REMINDER_JOB`]. When it
//! fires it posts the reminder, marks the session as awaiting a response and
//! queues one follow-up per configured escalation delay, each measured from
//! the moment the reminder fired. A follow-up only posts if the session is
//! still awaiting a response. Follow-ups are tagged [`REMINDER_JOB`], so the
//! next user message cancels all of them at once while reminders that have
//! not fired yet stay scheduled.

use crate::error::ToolError;
use crate::tool::{ToolContext, ToolDefinition, ToolHandler, parse_arguments};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sidekick_core::JobId;
use std::time::Duration;
use tracing::{debug, info};

/// Function name of the reminder tool.
pub const REMINDER_TOOL: &str = "create_reminder";

/// Job tag of follow-ups to a reminder that already fired.
pub const REMINDER_JOB: &str = "reminder";

/// Job tag of reminders that have not fired yet.
pub const PENDING_REMINDER_JOB: &str = "reminder-pending";

/// Arguments of a reminder call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderArgs {
    /// What to remind about.
    pub message: String,
    /// Seconds from now until the reminder fires.
    pub delay_seconds: u64,
}

/// Schedules reminders with escalating follow-ups.
#[derive(Debug, Clone, Default)]
pub struct ReminderTool {
    escalation_delays: Vec<Duration>,
}

impl ReminderTool {
    /// Creates the tool with the given follow-up delays.
    #[must_use]
    pub fn new(escalation_delays: Vec<Duration>) -> Self {
        Self { escalation_delays }
    }

    /// Schedules a reminder in `ctx`'s conversation.
    pub fn schedule(&self, ctx: &ToolContext, args: ReminderArgs) -> JobId {
        let delay = Duration::from_secs(args.delay_seconds);
        let escalations = self.escalation_delays.clone();
        let job_ctx = ctx.clone();
        let message = args.message;

        info!(key = %ctx.key, ?delay, "scheduling reminder");
        ctx.scheduler
            .schedule_once(PENDING_REMINDER_JOB, ctx.key.clone(), delay, move || {
                async move {
                    let ctx = job_ctx;
                    ctx.gateway
                        .send_message(&ctx.key, &format!("Reminder: {message}"))
                        .await?;
                    ctx.sessions.set_awaits_response(&ctx.key, true);
                    for (attempt, delay) in escalations.into_iter().enumerate() {
                        schedule_follow_up(&ctx, message.clone(), delay, attempt + 1);
                    }
                    Ok(())
                }
                .boxed()
            })
    }
}

fn schedule_follow_up(ctx: &ToolContext, message: String, delay: Duration, attempt: usize) {
    let job_ctx = ctx.clone();
    ctx.scheduler
        .schedule_once(REMINDER_JOB, ctx.key.clone(), delay, move || {
            async move {
                let ctx = job_ctx;
                if !ctx.sessions.get_or_create(&ctx.key).awaits_response() {
                    debug!(key = %ctx.key, attempt, "reminder answered, skipping follow-up");
                    return Ok(());
                }
                ctx.gateway
                    .send_message(&ctx.key, &format!("Still waiting on you: {message}"))
                    .await?;
                Ok(())
            }
            .boxed()
        });
}

#[async_trait]
impl ToolHandler for ReminderTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(REMINDER_TOOL, "Remind the user about something after a delay")
            .with_input_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "What to remind the user about"
                    },
                    "delay_seconds": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Seconds from now until the reminder"
                    }
                },
                "required": ["message", "delay_seconds"]
            }))
    }

    async fn execute(&self, ctx: &ToolContext, input: JsonValue) -> Result<String, ToolError> {
        let args: ReminderArgs = parse_arguments(REMINDER_TOOL, input)?;
        let seconds = args.delay_seconds;
        self.schedule(ctx, args);
        Ok(format!("Reminder scheduled in {seconds} seconds."))
    }
}
