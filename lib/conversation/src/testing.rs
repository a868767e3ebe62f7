//! In-memory fakes shared by this crate's tests.

use crate::assistant::Assistant;
use crate::dispatcher::ToolDispatcher;
use crate::error::{GatewayError, ServiceError};
use crate::games::InMemoryGameSessionStore;
use crate::gateway::{ChatGateway, DEFAULT_MAX_MESSAGE_CHARS, Member};
use crate::orchestrator::{OrchestratorConfig, RunOrchestrator};
use crate::services::{PriceQuote, PriceService, WeatherReport, WeatherService};
use crate::session::SessionStore;
use crate::tools::{ImageTool, MorningMessageTool, PriceTool, ReminderTool, WeatherTool};
use async_trait::async_trait;
use sidekick_ai::{
    AssistantBackend, BackendError, MessageRole, Run, RunOptions, RunStatus, ToolCall, ToolOutput,
};
use sidekick_core::{ConversationKey, RunId, Sleeper, ThreadId, TokioSleeper, UserId};
use sidekick_scheduler::{CronSchedule, JobScheduler};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn run(status: RunStatus) -> Run {
    Run::new("run_test", status)
}

pub fn requires_action(calls: &[(&str, &str, &str)]) -> Run {
    run(RunStatus::RequiresAction).with_tool_calls(
        calls
            .iter()
            .map(|(id, name, args)| ToolCall::new(*id, *name, *args))
            .collect(),
    )
}

/// Provider fake: retrievals play back a script, then report `completed`.
pub struct FakeBackend {
    script: Mutex<VecDeque<Run>>,
    reply: Mutex<Option<String>>,
    create_run_error: Mutex<Option<BackendError>>,
    failing_retrievals: AtomicUsize,
    submissions: Mutex<Vec<Vec<ToolOutput>>>,
    run_options: Mutex<Vec<RunOptions>>,
    messages: Mutex<Vec<String>>,
    pub threads_created: AtomicUsize,
    pub runs_created: AtomicUsize,
    pub retrievals: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            reply: Mutex::new(Some("Hello!".to_string())),
            create_run_error: Mutex::new(None),
            failing_retrievals: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            run_options: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            threads_created: AtomicUsize::new(0),
            runs_created: AtomicUsize::new(0),
            retrievals: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }
}

impl FakeBackend {
    pub fn script(&self, runs: impl IntoIterator<Item = Run>) {
        self.script.lock().unwrap().extend(runs);
    }

    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = Some(reply.to_string());
    }

    pub fn fail_create_run(&self, error: BackendError) {
        *self.create_run_error.lock().unwrap() = Some(error);
    }

    pub fn fail_retrievals(&self, count: usize) {
        self.failing_retrievals.store(count, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<Vec<ToolOutput>> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn last_run_options(&self) -> Option<RunOptions> {
        self.run_options.lock().unwrap().last().cloned()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssistantBackend for FakeBackend {
    async fn create_thread(&self) -> Result<ThreadId, BackendError> {
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ThreadId::new(format!("thread_{n}")))
    }

    async fn create_message(
        &self,
        _thread: &ThreadId,
        _role: MessageRole,
        text: &str,
    ) -> Result<(), BackendError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn create_run(
        &self,
        _thread: &ThreadId,
        options: &RunOptions,
    ) -> Result<Run, BackendError> {
        if let Some(error) = self.create_run_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.run_options.lock().unwrap().push(options.clone());
        let n = self.runs_created.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        Ok(Run::new(format!("run_{n}"), RunStatus::Queued))
    }

    async fn retrieve_run(&self, _thread: &ThreadId, run: &RunId) -> Result<Run, BackendError> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_retrievals.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_retrievals.store(failing - 1, Ordering::SeqCst);
            return Err(BackendError::RequestFailed {
                reason: "connection reset".to_string(),
            });
        }

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Run::new("run_test", RunStatus::Completed));
        if next.status.is_terminal() {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(Run {
            id: run.clone(),
            ..next
        })
    }

    async fn submit_tool_outputs(
        &self,
        _thread: &ThreadId,
        _run: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<(), BackendError> {
        self.submissions.lock().unwrap().push(outputs.to_vec());
        Ok(())
    }

    async fn latest_assistant_message(
        &self,
        _thread: &ThreadId,
    ) -> Result<Option<String>, BackendError> {
        Ok(self.reply.lock().unwrap().clone())
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, BackendError> {
        Ok(format!("https://images.test/{}.png", prompt.replace(' ', "-")))
    }
}

/// Gateway fake recording every post.
pub struct RecordingGateway {
    posts: Mutex<Vec<String>>,
    activity: AtomicUsize,
    members: HashMap<UserId, Member>,
    max_chars: usize,
    stop_on_post: Mutex<Option<(SessionStore, ConversationKey)>>,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        let ada = Member {
            id: UserId::new("ada"),
            display_name: "Ada Lovelace".to_string(),
        };
        Self {
            posts: Mutex::new(Vec::new()),
            activity: AtomicUsize::new(0),
            members: HashMap::from([(ada.id.clone(), ada)]),
            max_chars: DEFAULT_MAX_MESSAGE_CHARS,
            stop_on_post: Mutex::new(None),
        }
    }
}

impl RecordingGateway {
    pub fn with_max_chars(max_chars: usize) -> Self {
        Self {
            max_chars,
            ..Self::default()
        }
    }

    /// Fires the session's cancel handle right after the next post, as a
    /// user issuing stop mid-stream would.
    pub fn stop_session_on_post(&self, sessions: SessionStore, key: ConversationKey) {
        *self.stop_on_post.lock().unwrap() = Some((sessions, key));
    }

    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }

    pub fn activity_count(&self) -> usize {
        self.activity.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn post_message(&self, _key: &ConversationKey, text: &str) -> Result<(), GatewayError> {
        self.posts.lock().unwrap().push(text.to_string());
        let stop = self.stop_on_post.lock().unwrap().take();
        if let Some(handle) = stop.and_then(|(sessions, key)| sessions.cancel_handle(&key)) {
            handle.cancel();
        }
        Ok(())
    }

    async fn indicate_activity(&self, _key: &ConversationKey) -> Result<(), GatewayError> {
        self.activity.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn lookup_member(&self, user: &UserId) -> Result<Option<Member>, GatewayError> {
        Ok(self.members.get(user).cloned())
    }

    fn max_message_chars(&self) -> usize {
        self.max_chars
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

pub struct FakeWeather;

#[async_trait]
impl WeatherService for FakeWeather {
    async fn current(&self, location: &str) -> Result<WeatherReport, ServiceError> {
        if location == "Atlantis" {
            return Err(ServiceError::NotFound {
                query: location.to_string(),
            });
        }
        Ok(WeatherReport {
            location: location.to_string(),
            temperature_c: 12.0,
            wind_speed_kmh: 8.5,
            conditions: "partly cloudy".to_string(),
        })
    }
}

pub struct FakePrice;

#[async_trait]
impl PriceService for FakePrice {
    async fn quote(&self, symbol: &str) -> Result<PriceQuote, ServiceError> {
        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price: 101.5,
            currency: "usd".to_string(),
        })
    }
}

pub fn escalation_delays() -> Vec<Duration> {
    [300, 900, 3_600].map(Duration::from_secs).to_vec()
}

pub fn all_tools() -> ToolDispatcher {
    ToolDispatcher::new()
        .with(Arc::new(WeatherTool::new(Arc::new(FakeWeather))))
        .with(Arc::new(PriceTool::new(Arc::new(FakePrice))))
        .with(Arc::new(ImageTool))
        .with(Arc::new(ReminderTool::new(escalation_delays())))
        .with(Arc::new(MorningMessageTool::new(
            CronSchedule::new("0 8 * * *"),
            "Write the morning digest.",
        )))
}

/// Fully wired orchestrator and assistant over fakes.
pub struct Harness {
    pub backend: Arc<FakeBackend>,
    pub gateway: Arc<RecordingGateway>,
    pub games: Arc<InMemoryGameSessionStore>,
    pub orchestrator: Arc<RunOrchestrator>,
    pub assistant: Assistant,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_sleeper(Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(sleeper: Arc<dyn Sleeper>) -> Self {
        Self::build(sleeper, RecordingGateway::default())
    }

    pub fn with_gateway(gateway: RecordingGateway) -> Self {
        Self::build(Arc::new(TokioSleeper), gateway)
    }

    fn build(sleeper: Arc<dyn Sleeper>, gateway: RecordingGateway) -> Self {
        let backend = Arc::new(FakeBackend::default());
        let gateway = Arc::new(gateway);
        let games = Arc::new(InMemoryGameSessionStore::new());
        let orchestrator = RunOrchestrator::new(
            OrchestratorConfig {
                assistant_id: "asst_test".to_string(),
                ..OrchestratorConfig::default()
            },
            backend.clone(),
            gateway.clone(),
            all_tools(),
            SessionStore::new(),
            JobScheduler::new(),
            sleeper,
        );
        let assistant = Assistant::new(
            Arc::clone(&orchestrator),
            ReminderTool::new(escalation_delays()),
            games.clone(),
        );
        Self {
            backend,
            gateway,
            games,
            orchestrator,
            assistant,
        }
    }
}
