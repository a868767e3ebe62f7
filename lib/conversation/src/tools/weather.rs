//! `get_weather` tool.

use crate::error::{ServiceError, ToolError};
use crate::services::WeatherService;
use crate::tool::{ToolContext, ToolDefinition, ToolHandler, parse_arguments};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Function name of the weather tool.
pub const WEATHER_TOOL: &str = "get_weather";

#[derive(Debug, Deserialize)]
struct WeatherArgs {
    location: String,
}

/// Looks up current weather; the report is returned to the model as JSON.
pub struct WeatherTool {
    service: Arc<dyn WeatherService>,
}

impl WeatherTool {
    /// Creates the tool over a weather service.
    #[must_use]
    pub fn new(service: Arc<dyn WeatherService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(WEATHER_TOOL, "Get the current weather for a location")
            .with_input_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "City name, e.g. Oslo"
                    }
                },
                "required": ["location"]
            }))
    }

    async fn execute(&self, _ctx: &ToolContext, input: JsonValue) -> Result<String, ToolError> {
        let args: WeatherArgs = parse_arguments(WEATHER_TOOL, input)?;
        let report = self.service.current(&args.location).await?;
        serde_json::to_string(&report).map_err(|e| {
            ToolError::Service(ServiceError::Unavailable {
                reason: e.to_string(),
            })
        })
    }
}
