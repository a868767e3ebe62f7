//! External lookup services used by the price and weather tools.

use crate::error::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Current conditions at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Resolved location name.
    pub location: String,
    /// Air temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Wind speed in km/h.
    pub wind_speed_kmh: f64,
    /// Short human description, e.g. "light rain".
    pub conditions: String,
}

/// A quoted price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Symbol as requested.
    pub symbol: String,
    /// Price in `currency`.
    pub price: f64,
    /// Quote currency, e.g. "usd".
    pub currency: String,
}

/// Weather lookup.
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Returns current conditions for a free-form location.
    async fn current(&self, location: &str) -> Result<WeatherReport, ServiceError>;
}

/// Price lookup.
#[async_trait]
pub trait PriceService: Send + Sync {
    /// Returns the latest price of `symbol`.
    async fn quote(&self, symbol: &str) -> Result<PriceQuote, ServiceError>;
}
