//! [`AssistantBackend`] over the OpenAI Assistants v2 REST API.

use crate::backend::{
    AssistantBackend, MessageRole, ProviderFailure, Run, RunOptions, RunStatus, ToolCall,
    ToolOutput,
};
use crate::error::BackendError;
use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sidekick_core::{RunId, ThreadId};
use tracing::{debug, instrument};

/// Connection settings for the OpenAI API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// API root, e.g. `https://api.openai.com/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used for image generation.
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

impl OpenAiConfig {
    /// Creates a configuration against the public endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: default_base_url(),
            image_model: default_image_model(),
        }
    }

    /// Points the client at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// HTTP client for threads, runs and image generation.
#[derive(Debug, Clone)]
pub struct OpenAiAssistants {
    client: reqwest::Client,
    config: OpenAiConfig,
}

#[derive(Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Deserialize)]
struct RunObject {
    id: String,
    status: String,
    #[serde(default)]
    required_action: Option<RequiredAction>,
    #[serde(default)]
    last_error: Option<ProviderFailure>,
}

#[derive(Deserialize)]
struct RequiredAction {
    submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Deserialize)]
struct SubmitToolOutputs {
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: Vec<WireContent>,
}

#[derive(Deserialize)]
struct WireContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<WireText>,
}

#[derive(Deserialize)]
struct WireText {
    value: String,
}

#[derive(Deserialize)]
struct ImageList {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

impl From<RunObject> for Run {
    fn from(wire: RunObject) -> Self {
        let pending_tool_calls = wire
            .required_action
            .map(|action| {
                action
                    .submit_tool_outputs
                    .tool_calls
                    .into_iter()
                    .map(|call| ToolCall::new(call.id, call.function.name, call.function.arguments))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: RunId::new(wire.id),
            status: RunStatus::from_wire(&wire.status),
            pending_tool_calls,
            last_error: wire.last_error,
        }
    }
}

impl OpenAiAssistants {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty.
    pub fn new(config: OpenAiConfig) -> Result<Self, BackendError> {
        if config.api_key.trim().is_empty() {
            return Err(BackendError::InvalidConfig {
                reason: "api key is empty".to_string(),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await
            .map_err(|e| BackendError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::ResponseParseFailed {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl AssistantBackend for OpenAiAssistants {
    async fn create_thread(&self) -> Result<ThreadId, BackendError> {
        let thread: IdObject = self
            .send(self.client.post(self.url("threads")).json(&json!({})))
            .await?;
        debug!(thread = %thread.id, "created thread");
        Ok(ThreadId::new(thread.id))
    }

    async fn create_message(
        &self,
        thread: &ThreadId,
        role: MessageRole,
        text: &str,
    ) -> Result<(), BackendError> {
        let body = json!({ "role": role.as_str(), "content": text });
        let _: IgnoredAny = self
            .send(
                self.client
                    .post(self.url(&format!("threads/{thread}/messages")))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, options), fields(thread = %thread))]
    async fn create_run(
        &self,
        thread: &ThreadId,
        options: &RunOptions,
    ) -> Result<Run, BackendError> {
        let mut body = json!({ "assistant_id": options.assistant_id });
        if let Some(model) = &options.model {
            body["model"] = json!(model);
        }
        if let Some(instructions) = &options.additional_instructions {
            body["additional_instructions"] = json!(instructions);
        }
        if !options.tools.is_empty() {
            body["tools"] = json!(options.tools);
        }
        if let Some(name) = &options.tool_choice {
            body["tool_choice"] = json!({ "type": "function", "function": { "name": name } });
        }

        let run: RunObject = self
            .send(
                self.client
                    .post(self.url(&format!("threads/{thread}/runs")))
                    .json(&body),
            )
            .await?;
        Ok(run.into())
    }

    async fn retrieve_run(&self, thread: &ThreadId, run: &RunId) -> Result<Run, BackendError> {
        let run: RunObject = self
            .send(self.client.get(self.url(&format!("threads/{thread}/runs/{run}"))))
            .await?;
        Ok(run.into())
    }

    async fn submit_tool_outputs(
        &self,
        thread: &ThreadId,
        run: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<(), BackendError> {
        let body = json!({ "tool_outputs": outputs });
        let _: IgnoredAny = self
            .send(
                self.client
                    .post(self.url(&format!(
                        "threads/{thread}/runs/{run}/submit_tool_outputs"
                    )))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn latest_assistant_message(
        &self,
        thread: &ThreadId,
    ) -> Result<Option<String>, BackendError> {
        let list: MessageList = self
            .send(
                self.client
                    .get(self.url(&format!("threads/{thread}/messages")))
                    .query(&[("order", "desc"), ("limit", "10")]),
            )
            .await?;

        let text = list
            .data
            .into_iter()
            .find(|message| message.role == MessageRole::Assistant.as_str())
            .map(|message| {
                message
                    .content
                    .into_iter()
                    .filter(|part| part.kind == "text")
                    .filter_map(|part| part.text.map(|t| t.value))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
        Ok(text)
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, BackendError> {
        let body = json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
        });
        let images: ImageList = self
            .send(self.client.post(self.url("images/generations")).json(&body))
            .await?;

        images
            .data
            .into_iter()
            .find_map(|image| image.url)
            .ok_or_else(|| BackendError::ResponseParseFailed {
                reason: "image response carried no url".to_string(),
            })
    }
}
