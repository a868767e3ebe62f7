//! HTTP implementations of the lookup services.
//!
//! Weather comes from Open-Meteo (geocoding, then current conditions);
//! prices come from CoinGecko's simple price endpoint. Neither needs an API
//! key.

use crate::config::ServiceSettings;
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sidekick_conversation::{PriceQuote, PriceService, ServiceError, WeatherReport, WeatherService};
use std::collections::HashMap;
use tracing::{debug, instrument};

async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, ServiceError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| ServiceError::Unavailable {
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::Unavailable {
            reason: format!("{url} returned {status}"),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ServiceError::Unavailable {
            reason: format!("unreadable response from {url}: {e}"),
        })
}

fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

#[derive(Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

#[derive(Deserialize)]
struct Place {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    wind_speed_10m: f64,
    weather_code: u8,
}

/// Weather over the Open-Meteo APIs.
#[derive(Debug, Clone)]
pub struct OpenMeteoWeather {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl OpenMeteoWeather {
    /// Creates the service.
    #[must_use]
    pub fn new(client: reqwest::Client, settings: &ServiceSettings) -> Self {
        Self {
            client,
            geocoding_url: settings.geocoding_url.clone(),
            forecast_url: settings.forecast_url.clone(),
        }
    }
}

#[async_trait]
impl WeatherService for OpenMeteoWeather {
    #[instrument(skip(self))]
    async fn current(&self, location: &str) -> Result<WeatherReport, ServiceError> {
        let places: GeocodingResponse = get_json(
            &self.client,
            &join(&self.geocoding_url, "v1/search"),
            &[("name", location), ("count", "1"), ("format", "json")],
        )
        .await?;
        let Some(place) = places.results.into_iter().next() else {
            return Err(ServiceError::NotFound {
                query: location.to_string(),
            });
        };
        debug!(place = %place.name, "resolved location");

        let (latitude, longitude) = (place.latitude.to_string(), place.longitude.to_string());
        let forecast: ForecastResponse = get_json(
            &self.client,
            &join(&self.forecast_url, "v1/forecast"),
            &[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", "temperature_2m,wind_speed_10m,weather_code"),
            ],
        )
        .await?;

        let location = match place.country {
            Some(country) => format!("{}, {country}", place.name),
            None => place.name,
        };
        Ok(WeatherReport {
            location,
            temperature_c: forecast.current.temperature_2m,
            wind_speed_kmh: forecast.current.wind_speed_10m,
            conditions: describe_weather_code(forecast.current.weather_code).to_string(),
        })
    }
}

/// Describes a WMO weather interpretation code.
fn describe_weather_code(code: u8) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61 | 80 => "light rain",
        63 | 81 => "rain",
        65 | 82 => "heavy rain",
        66 | 67 => "freezing rain",
        71 | 85 => "light snow",
        73 => "snow",
        75 | 86 => "heavy snow",
        77 => "snow grains",
        95 => "thunderstorm",
        96 | 99 => "thunderstorm with hail",
        _ => "unknown",
    }
}

/// Prices over the CoinGecko API.
#[derive(Debug, Clone)]
pub struct CoinGeckoPrice {
    client: reqwest::Client,
    base_url: String,
    currency: String,
}

impl CoinGeckoPrice {
    /// Creates the service.
    #[must_use]
    pub fn new(client: reqwest::Client, settings: &ServiceSettings) -> Self {
        Self {
            client,
            base_url: settings.price_url.clone(),
            currency: settings.currency.to_lowercase(),
        }
    }
}

#[async_trait]
impl PriceService for CoinGeckoPrice {
    #[instrument(skip(self))]
    async fn quote(&self, symbol: &str) -> Result<PriceQuote, ServiceError> {
        let id = symbol.trim().to_lowercase();
        let prices: HashMap<String, HashMap<String, f64>> = get_json(
            &self.client,
            &join(&self.base_url, "api/v3/simple/price"),
            &[("ids", id.as_str()), ("vs_currencies", self.currency.as_str())],
        )
        .await?;

        prices
            .get(&id)
            .and_then(|quotes| quotes.get(&self.currency))
            .map(|price| PriceQuote {
                symbol: symbol.to_string(),
                price: *price,
                currency: self.currency.clone(),
            })
            .ok_or_else(|| ServiceError::NotFound {
                query: symbol.to_string(),
            })
    }
}
