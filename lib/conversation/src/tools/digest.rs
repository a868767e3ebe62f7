//! `toggle_morning_message` tool.
//!
//! Enabling registers a recurring job under [`MORNING_MESSAGE_JOB`];
//! registering replaces any existing one, so enabling twice still leaves one
//! job. Disabling cancels it.
//!
//! Each occurrence asks the assistant for the digest and posts the reply
//! chunk by chunk. A fresh cancellation handle is stored on the session
//! before posting, and is checked between chunks. The handle is spent when
//! delivery ends, so a later stop has nothing to stop.

use crate::error::ToolError;
use crate::gateway::chunk_message;
use crate::tool::{ToolContext, ToolDefinition, ToolHandler, parse_arguments};
use async_trait::async_trait;
use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use sidekick_scheduler::CronSchedule;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Function name of the morning message toggle.
pub const MORNING_MESSAGE_TOOL: &str = "toggle_morning_message";

/// Job tag of the recurring morning message.
pub const MORNING_MESSAGE_JOB: &str = "morning-message";

#[derive(Debug, Deserialize)]
struct ToggleArgs {
    enabled: bool,
}

/// Turns the daily digest on or off for a conversation.
#[derive(Debug, Clone)]
pub struct MorningMessageTool {
    schedule: CronSchedule,
    prompt: String,
}

impl MorningMessageTool {
    /// Creates the tool for a schedule and digest prompt.
    #[must_use]
    pub fn new(schedule: CronSchedule, prompt: impl Into<String>) -> Self {
        Self {
            schedule,
            prompt: prompt.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for MorningMessageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            MORNING_MESSAGE_TOOL,
            "Turn the daily morning message in this channel on or off",
        )
        .with_input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "enabled": { "type": "boolean" }
            },
            "required": ["enabled"]
        }))
    }

    async fn execute(&self, ctx: &ToolContext, input: JsonValue) -> Result<String, ToolError> {
        let args: ToggleArgs = parse_arguments(MORNING_MESSAGE_TOOL, input)?;

        if !args.enabled {
            ctx.scheduler.cancel(MORNING_MESSAGE_JOB, &ctx.key);
            info!(key = %ctx.key, "morning message disabled");
            return Ok("Morning message disabled.".to_string());
        }

        let job_ctx = ctx.clone();
        let prompt = self.prompt.clone();
        ctx.scheduler.schedule_recurring(
            MORNING_MESSAGE_JOB,
            ctx.key.clone(),
            self.schedule.clone(),
            move || {
                let ctx = job_ctx.clone();
                let prompt = prompt.clone();
                async move { deliver(&ctx, &prompt).await }.boxed()
            },
        )?;
        info!(key = %ctx.key, cron = %self.schedule.expression, "morning message enabled");
        Ok("Morning message enabled.".to_string())
    }
}

async fn deliver(ctx: &ToolContext, prompt: &str) -> sidekick_core::Result<()> {
    let Some(responder) = ctx.responder.upgrade() else {
        warn!(key = %ctx.key, "orchestrator gone, skipping morning message");
        return Ok(());
    };

    let cancel = CancellationToken::new();
    ctx.sessions.set_cancel_handle(&ctx.key, cancel.clone());
    // Spent once delivery ends, however it ends.
    let _finished = cancel.clone().drop_guard();

    let text = responder.respond(&ctx.key, prompt).await?;
    for chunk in chunk_message(&text, ctx.gateway.max_message_chars()) {
        if cancel.is_cancelled() {
            info!(key = %ctx.key, "morning message stopped");
            break;
        }
        ctx.gateway.post_message(&ctx.key, &chunk).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::Interaction;
    use crate::orchestrator::RunOrchestrator;
    use crate::testing::{Harness, RecordingGateway};
    use sidekick_core::ConversationKey;
    use std::sync::Weak;

    fn key() -> ConversationKey {
        ConversationKey::new("general")
    }

    fn tool() -> MorningMessageTool {
        MorningMessageTool::new(CronSchedule::new("0 8 * * *"), "Write the digest.")
    }

    #[tokio::test(start_paused = true)]
    async fn enabling_twice_leaves_one_job() {
        let harness = Harness::new();
        let ctx = harness.orchestrator.tool_context(&key());

        for _ in 0..2 {
            let output = tool()
                .execute(&ctx, serde_json::json!({ "enabled": true }))
                .await
                .unwrap();
            assert_eq!(output, "Morning message enabled.");
        }

        assert_eq!(harness.orchestrator.scheduler().pending(MORNING_MESSAGE_JOB, &key()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_cancels_job() {
        let harness = Harness::new();
        let ctx = harness.orchestrator.tool_context(&key());

        tool()
            .execute(&ctx, serde_json::json!({ "enabled": true }))
            .await
            .unwrap();
        tool()
            .execute(&ctx, serde_json::json!({ "enabled": false }))
            .await
            .unwrap();

        assert!(!harness.orchestrator.scheduler().has(MORNING_MESSAGE_JOB, &key()));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_schedule_is_reported_to_the_model() {
        let harness = Harness::new();
        let ctx = harness.orchestrator.tool_context(&key());
        let broken = MorningMessageTool::new(CronSchedule::new("every morning"), "digest");

        let result = broken
            .execute(&ctx, serde_json::json!({ "enabled": true }))
            .await;

        assert!(matches!(result, Err(ToolError::Schedule(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn digest_is_posted_in_chunks() {
        let harness = Harness::with_gateway(RecordingGateway::with_max_chars(5));
        harness.backend.set_reply("aaaaabbbbbcc");
        let ctx = harness.orchestrator.tool_context(&key());

        deliver(&ctx, "Write the digest.").await.unwrap();

        assert_eq!(harness.gateway.posts(), vec!["aaaaa", "bbbbb", "cc"]);
        assert_eq!(harness.backend.messages(), vec!["Write the digest."]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_after_delivery_has_nothing_to_stop() {
        let harness = Harness::new();
        let ctx = harness.orchestrator.tool_context(&key());

        deliver(&ctx, "Write the digest.").await.unwrap();
        let response = harness
            .assistant
            .on_interaction(&key(), Interaction::Stop)
            .await;

        assert_eq!(harness.gateway.posts(), vec!["Hello!"]);
        assert_eq!(response, "Nothing to stop.");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_digest_between_chunks() {
        let harness = Harness::with_gateway(RecordingGateway::with_max_chars(5));
        harness.backend.set_reply("aaaaabbbbbcc");
        harness
            .gateway
            .stop_session_on_post(harness.orchestrator.sessions().clone(), key());
        let ctx = harness.orchestrator.tool_context(&key());

        deliver(&ctx, "Write the digest.").await.unwrap();

        assert_eq!(harness.gateway.posts(), vec!["aaaaa"]);
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_is_skipped_once_orchestrator_is_gone() {
        let harness = Harness::new();
        let ctx = ToolContext {
            responder: Weak::<RunOrchestrator>::new(),
            ..harness.orchestrator.tool_context(&key())
        };

        deliver(&ctx, "Write the digest.").await.unwrap();

        assert!(harness.gateway.posts().is_empty());
        assert!(harness.backend.messages().is_empty());
    }
}
