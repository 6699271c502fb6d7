//! Location and weather providers backing the local answerer.
//!
//! Both are trait seams so tests can answer from fixtures; the shipped
//! implementations call ipapi.co (IP geolocation) and OpenWeatherMap.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ParlaError, Result};

/// Where the user appears to be, per IP geolocation.
#[derive(Debug, Clone)]
pub struct GeoLocation {
    pub city: String,
    pub region: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Current conditions for one city.
#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub city: String,
    /// Rounded to the nearest whole degree for speech.
    pub temperature_c: i32,
    pub condition: String,
    pub humidity: u32,
    pub wind_speed_ms: f64,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Resolve the caller's location.
    ///
    /// # Errors
    /// `ParlaError::Location` when the lookup fails or the response is
    /// unusable.
    async fn locate(&self) -> Result<GeoLocation>;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current weather for `city`.
    ///
    /// # Errors
    /// `ParlaError::Weather` when the lookup fails.
    async fn current(&self, city: &str) -> Result<WeatherReport>;
}

// ---------------------------------------------------------------------------
// ipapi.co geolocation
// ---------------------------------------------------------------------------

const IPAPI_ENDPOINT: &str = "https://ipapi.co/json/";

#[derive(Debug, Deserialize)]
struct IpApiPayload {
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// IP-based locator backed by ipapi.co. No API key required.
#[derive(Debug, Clone)]
pub struct IpApiLocator {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for IpApiLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IpApiLocator {
    pub fn new() -> Self {
        Self::with_endpoint(IPAPI_ENDPOINT)
    }

    /// Endpoint override, used by tests against a local stub server.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl LocationProvider for IpApiLocator {
    async fn locate(&self) -> Result<GeoLocation> {
        let payload: IpApiPayload = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| ParlaError::Location(e.to_string()))?
            .error_for_status()
            .map_err(|e| ParlaError::Location(e.to_string()))?
            .json()
            .await
            .map_err(|e| ParlaError::Location(e.to_string()))?;

        let city = payload
            .city
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ParlaError::Location("geolocation response had no city".into()))?;

        debug!(city = %city, "resolved location via IP geolocation");
        Ok(GeoLocation {
            city,
            region: payload.region.unwrap_or_default(),
            country: payload.country_name.unwrap_or_default(),
            latitude: payload.latitude.unwrap_or_default(),
            longitude: payload.longitude.unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// OpenWeatherMap current conditions
// ---------------------------------------------------------------------------

const OPENWEATHER_ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Deserialize)]
struct OwmPayload {
    name: String,
    main: OwmMain,
    weather: Vec<OwmCondition>,
    wind: OwmWind,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: u32,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
}

/// OpenWeatherMap client. Queries metric units, so temperatures arrive
/// in Celsius.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(OPENWEATHER_ENDPOINT, api_key)
    }

    /// Endpoint override, used by tests against a local stub server.
    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn current(&self, city: &str) -> Result<WeatherReport> {
        let payload: OwmPayload = self
            .client
            .get(&self.endpoint)
            .query(&[("q", city), ("units", "metric"), ("appid", &self.api_key)])
            .send()
            .await
            .map_err(|e| ParlaError::Weather(e.to_string()))?
            .error_for_status()
            .map_err(|e| ParlaError::Weather(e.to_string()))?
            .json()
            .await
            .map_err(|e| ParlaError::Weather(e.to_string()))?;

        let condition = payload
            .weather
            .first()
            .map(|c| c.description.clone())
            .unwrap_or_else(|| "unknown conditions".to_string());

        debug!(city = %payload.name, temp = payload.main.temp, "weather lookup completed");
        Ok(WeatherReport {
            city: payload.name,
            temperature_c: payload.main.temp.round() as i32,
            condition,
            humidity: payload.main.humidity,
            wind_speed_ms: payload.wind.speed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipapi_payload_deserializes_from_sample_response() {
        let payload: IpApiPayload = serde_json::from_str(
            r#"{
                "city": "Lisbon",
                "region": "Lisbon",
                "country_name": "Portugal",
                "latitude": 38.7223,
                "longitude": -9.1393,
                "org": "Example ISP"
            }"#,
        )
        .expect("deserialize ipapi payload");

        assert_eq!(payload.city.as_deref(), Some("Lisbon"));
        assert_eq!(payload.country_name.as_deref(), Some("Portugal"));
        assert!((payload.latitude.expect("latitude") - 38.7223).abs() < 1e-6);
    }

    #[test]
    fn ipapi_payload_tolerates_missing_fields() {
        let payload: IpApiPayload = serde_json::from_str("{}").expect("deserialize empty payload");
        assert!(payload.city.is_none());
        assert!(payload.latitude.is_none());
    }

    #[test]
    fn openweather_payload_deserializes_and_rounds_like_the_report() {
        let payload: OwmPayload = serde_json::from_str(
            r#"{
                "name": "Lisbon",
                "main": { "temp": 21.6, "humidity": 62, "pressure": 1015 },
                "weather": [ { "id": 801, "description": "few clouds" } ],
                "wind": { "speed": 4.1, "deg": 270 }
            }"#,
        )
        .expect("deserialize owm payload");

        assert_eq!(payload.name, "Lisbon");
        assert_eq!(payload.main.temp.round() as i32, 22);
        assert_eq!(payload.main.humidity, 62);
        assert_eq!(payload.weather[0].description, "few clouds");
        assert!((payload.wind.speed - 4.1).abs() < 1e-9);
    }
}
