//! Drives one model invocation from submission to a terminal state.
//!
//! A run is polled through the provider's lifecycle:
//!
//! ```text
//! queued / in_progress -> poll again
//! requires_action      -> dispatch tool calls -> submit outputs -> poll again
//! completed            -> done
//! failed               -> RunError::Failed { code, message }
//! anything else        -> RunError::UnexpectedStatus
//! ```
//!
//! Each poll cycle sleeps `base * cycle`, capped at `max`, through the
//! injected [`Sleeper`]; the cycle counter restarts after every tool round
//! trip. While polling, an activity indicator is sent to the conversation
//! every `activity_every` of accumulated sleep.
//!
//! Two call shapes share the loop:
//!
//! - [`RunOrchestrator::respond`]: the conversation flow. Runs on the
//!   session's thread under the session's turn lock, executes tool calls and
//!   returns the assistant's reply.
//! - [`RunOrchestrator::extract`]: the tool-only flow. Forces one function on
//!   a throwaway thread, answers every call with a neutral output and returns
//!   the forced call's arguments. It touches no session state and takes no
//!   session lock.

use crate::dispatcher::{NEUTRAL_OUTPUT, ToolDispatcher};
use crate::error::RunError;
use crate::gateway::ChatGateway;
use crate::session::SessionStore;
use crate::tool::{Responder, ToolContext};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sidekick_ai::{AssistantBackend, MessageRole, Run, RunOptions, RunStatus, ToolCall, ToolOutput};
use sidekick_core::{ConversationKey, RunId, Sleeper, ThreadId};
use sidekick_scheduler::JobScheduler;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Poll pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Delay of the first poll cycle; cycle `n` waits `base * n`.
    pub base: Duration,
    /// Upper bound on a single poll delay.
    pub max: Duration,
    /// Accumulated wait between activity indications.
    pub activity_every: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(5),
            activity_every: Duration::from_secs(8),
        }
    }
}

impl PollingConfig {
    /// Delay before poll number `cycle` (1-based).
    #[must_use]
    pub fn backoff(&self, cycle: u32) -> Duration {
        self.base.saturating_mul(cycle).min(self.max)
    }
}

/// Settings applied to every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Provider assistant that executes runs.
    pub assistant_id: String,
    /// Model override; the assistant's own model when absent.
    pub model: Option<String>,
    /// Poll pacing.
    pub polling: PollingConfig,
}

/// What the loop does next, derived from one run snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Wait,
    Act(Vec<ToolCall>),
    Finish,
    Fail { code: String, message: String },
    Unexpected(String),
}

fn next_step(run: &Run) -> Step {
    match &run.status {
        RunStatus::Queued | RunStatus::InProgress => Step::Wait,
        RunStatus::RequiresAction => Step::Act(run.pending_tool_calls.clone()),
        RunStatus::Completed => Step::Finish,
        RunStatus::Failed => {
            let (code, message) = run.last_error.as_ref().map_or_else(
                || ("unknown".to_string(), "run failed without detail".to_string()),
                |e| (e.code.clone(), e.message.clone()),
            );
            Step::Fail { code, message }
        }
        RunStatus::Unknown(status) => Step::Unexpected(status.clone()),
    }
}

/// How `requires_action` batches are answered.
enum Mode<'a> {
    Converse,
    Extract { tool: &'a str },
}

/// Runs model invocations against a provider.
pub struct RunOrchestrator {
    me: Weak<RunOrchestrator>,
    config: OrchestratorConfig,
    backend: Arc<dyn AssistantBackend>,
    gateway: Arc<dyn ChatGateway>,
    dispatcher: ToolDispatcher,
    sessions: SessionStore,
    scheduler: JobScheduler,
    sleeper: Arc<dyn Sleeper>,
}

impl RunOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        config: OrchestratorConfig,
        backend: Arc<dyn AssistantBackend>,
        gateway: Arc<dyn ChatGateway>,
        dispatcher: ToolDispatcher,
        sessions: SessionStore,
        scheduler: JobScheduler,
        sleeper: Arc<dyn Sleeper>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            backend,
            gateway,
            dispatcher,
            sessions,
            scheduler,
            sleeper,
        })
    }

    /// Session state shared with the orchestrator.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Scheduler shared with the orchestrator.
    #[must_use]
    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Chat gateway replies are sent through.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn ChatGateway> {
        &self.gateway
    }

    /// Enabled tools.
    #[must_use]
    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Builds the context tool handlers run in for `key`.
    #[must_use]
    pub fn tool_context(&self, key: &ConversationKey) -> ToolContext {
        let responder: Weak<dyn Responder> = self.me.clone();
        ToolContext {
            key: key.clone(),
            backend: Arc::clone(&self.backend),
            gateway: Arc::clone(&self.gateway),
            sessions: self.sessions.clone(),
            scheduler: self.scheduler.clone(),
            responder,
        }
    }

    fn run_options(&self) -> RunOptions {
        let mut options =
            RunOptions::new(&self.config.assistant_id).with_tools(self.dispatcher.provider_tools());
        if let Some(model) = &self.config.model {
            options = options.with_model(model);
        }
        options
    }

    /// Sends `text` into the conversation and returns the assistant's reply.
    ///
    /// Holds the session's turn lock from message submission until the run
    /// is terminal. The session's thread is created on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider request outside polling fails, or the
    /// run fails, ends in an unexpected status or produces no reply.
    #[instrument(skip(self, key, text), fields(key = %key))]
    pub async fn respond(&self, key: &ConversationKey, text: &str) -> Result<String, RunError> {
        self.sessions
            .with_lock(key, |session| async move {
                let thread = match session.thread() {
                    Some(thread) => thread,
                    None => {
                        let thread = self.backend.create_thread().await?;
                        debug!(thread = %thread, "created thread");
                        session.set_thread(thread.clone());
                        thread
                    }
                };

                self.backend
                    .create_message(&thread, MessageRole::User, text)
                    .await?;
                let run = self.backend.create_run(&thread, &self.run_options()).await?;
                debug!(run = %run.id, "run created");

                self.drive(key, &thread, &run.id, Mode::Converse).await?;

                self.backend
                    .latest_assistant_message(&thread)
                    .await?
                    .filter(|reply| !reply.trim().is_empty())
                    .ok_or(RunError::EmptyReply)
            })
            .await
    }

    /// Forces the model to call `tool` for `text` and returns the call's
    /// arguments without executing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the run fails, the tool is never called, or its
    /// arguments are not JSON.
    #[instrument(skip(self, key, text), fields(key = %key))]
    pub async fn extract(
        &self,
        key: &ConversationKey,
        text: &str,
        tool: &str,
    ) -> Result<JsonValue, RunError> {
        let thread = self.backend.create_thread().await?;
        self.backend
            .create_message(&thread, MessageRole::User, text)
            .await?;
        let options = self.run_options().with_tool_choice(tool);
        let run = self.backend.create_run(&thread, &options).await?;
        debug!(run = %run.id, tool, "extraction run created");

        let raw = self
            .drive(key, &thread, &run.id, Mode::Extract { tool })
            .await?
            .ok_or_else(|| RunError::ToolNotCalled {
                name: tool.to_string(),
            })?;

        serde_json::from_str(&raw).map_err(|e| RunError::InvalidToolArguments {
            name: tool.to_string(),
            reason: e.to_string(),
        })
    }

    /// Polls until the run is terminal; returns the captured arguments in
    /// extraction mode.
    async fn drive(
        &self,
        key: &ConversationKey,
        thread: &ThreadId,
        run_id: &RunId,
        mode: Mode<'_>,
    ) -> Result<Option<String>, RunError> {
        let polling = &self.config.polling;
        let mut captured = None;
        let mut cycle: u32 = 0;
        let mut since_activity = polling.activity_every;

        loop {
            if since_activity >= polling.activity_every {
                if let Err(e) = self.gateway.indicate_activity(key).await {
                    debug!(error = %e, "activity indication failed");
                }
                since_activity = Duration::ZERO;
            }

            cycle = cycle.saturating_add(1);
            let delay = polling.backoff(cycle);
            self.sleeper.sleep(delay).await;
            since_activity += delay;

            let run = match self.backend.retrieve_run(thread, run_id).await {
                Ok(run) => run,
                Err(e) => {
                    warn!(run = %run_id, error = %e, "run retrieval failed, polling again");
                    continue;
                }
            };

            match next_step(&run) {
                Step::Wait => {}
                Step::Act(calls) => {
                    let outputs = match &mode {
                        Mode::Converse => {
                            self.dispatcher
                                .dispatch(&calls, &self.tool_context(key))
                                .await
                        }
                        Mode::Extract { tool } => {
                            if let Some(call) = calls.iter().find(|c| c.name == *tool) {
                                captured = Some(call.arguments.clone());
                            }
                            calls
                                .iter()
                                .map(|c| ToolOutput::new(c.id.clone(), NEUTRAL_OUTPUT))
                                .collect()
                        }
                    };
                    debug!(run = %run_id, count = outputs.len(), "submitting tool outputs");
                    self.backend
                        .submit_tool_outputs(thread, run_id, &outputs)
                        .await?;
                    cycle = 0;
                }
                Step::Finish => {
                    debug!(run = %run_id, "run completed");
                    return Ok(captured);
                }
                Step::Fail { code, message } => {
                    warn!(run = %run_id, %code, %message, "run failed");
                    return Err(RunError::Failed { code, message });
                }
                Step::Unexpected(status) => {
                    warn!(run = %run_id, %status, "run ended in unexpected status");
                    return Err(RunError::UnexpectedStatus { status });
                }
            }
        }
    }
}

#[async_trait]
impl Responder for RunOrchestrator {
    async fn respond(&self, key: &ConversationKey, text: &str) -> Result<String, RunError> {
        RunOrchestrator::respond(self, key, text).await
    }
}

impl std::fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
