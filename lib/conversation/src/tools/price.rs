//! `get_price` tool.

use crate::error::ToolError;
use crate::services::PriceService;
use crate::tool::{ToolContext, ToolDefinition, ToolHandler, parse_arguments};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Function name of the price tool.
pub const PRICE_TOOL: &str = "get_price";

#[derive(Debug, Deserialize)]
struct PriceArgs {
    symbol: String,
}

/// Looks up the latest price of a stock or coin.
pub struct PriceTool {
    service: Arc<dyn PriceService>,
}

impl PriceTool {
    /// Creates the tool over a price service.
    #[must_use]
    pub fn new(service: Arc<dyn PriceService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHandler for PriceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(PRICE_TOOL, "Get the latest price of a stock or cryptocurrency")
            .with_input_schema(serde_json::json!({
                "type": "object",
                "properties": {
                    "symbol": {
                        "type": "string",
                        "description": "Ticker or coin id, e.g. bitcoin"
                    }
                },
                "required": ["symbol"]
            }))
    }

    async fn execute(&self, _ctx: &ToolContext, input: JsonValue) -> Result<String, ToolError> {
        let args: PriceArgs = parse_arguments(PRICE_TOOL, input)?;
        let quote = self.service.quote(&args.symbol).await?;
        Ok(format!(
            "{} is trading at {:.2} {}",
            quote.symbol,
            quote.price,
            quote.currency.to_uppercase()
        ))
    }
}
