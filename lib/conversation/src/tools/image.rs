//! `generate_image` tool.
//!
//! The image URL goes straight to the conversation; the model only gets a
//! short status so it does not repeat the link.

use crate::error::ToolError;
use crate::tool::{ToolContext, ToolDefinition, ToolHandler, parse_arguments};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Function name of the image tool.
pub const IMAGE_TOOL: &str = "generate_image";

#[derive(Debug, Deserialize)]
struct ImageArgs {
    prompt: String,
}

/// Generates an image through the provider and posts it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageTool;

#[async_trait]
impl ToolHandler for ImageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(IMAGE_TOOL, "Generate an image from a description and post it")
            .with_input_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "prompt": {
                        "type": "string",
                        "description": "What the image should show"
                    }
                },
                "required": ["prompt"]
            }))
    }

    async fn execute(&self, ctx: &ToolContext, input: JsonValue) -> Result<String, ToolError> {
        let args: ImageArgs = parse_arguments(IMAGE_TOOL, input)?;
        let url = ctx.backend.generate_image(&args.prompt).await?;
        ctx.gateway.send_message(&ctx.key, &url).await?;
        Ok("Image generated and posted to the channel.".to_string())
    }
}
