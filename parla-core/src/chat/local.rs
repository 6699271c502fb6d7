//! Local answers for time, date, and weather questions.
//!
//! Time and date come from the host clock via `chrono`; weather composes
//! the `LocationProvider` and `WeatherProvider` seams. Provider failures
//! degrade to an apologetic sentence instead of erroring out, so a flaky
//! network never breaks the conversation.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, Timelike};
use tracing::warn;

use crate::chat::providers::{LocationProvider, WeatherProvider};
use crate::chat::router::LocalTopics;

const LOCATION_FALLBACK: &str =
    "I'm having trouble determining your location. Could you specify a city for the weather?";
const WEATHER_FALLBACK: &str =
    "I'm sorry, I couldn't retrieve the weather information right now.";

/// Answers time/date/weather questions without a remote language model.
pub struct LocalAnswerer {
    location: Arc<dyn LocationProvider>,
    weather: Arc<dyn WeatherProvider>,
}

impl LocalAnswerer {
    pub fn new(location: Arc<dyn LocationProvider>, weather: Arc<dyn WeatherProvider>) -> Self {
        Self { location, weather }
    }

    /// Compose the answer for the requested topics, in the fixed order
    /// time, date, weather.
    pub async fn answer(&self, topics: LocalTopics) -> String {
        let now = Local::now();
        let mut sentences = Vec::new();

        if topics.time {
            sentences.push(format!("The current time is {}.", format_clock(&now)));
        }
        if topics.date {
            sentences.push(format!("Today is {}.", format_date(&now)));
        }
        if topics.weather {
            sentences.push(self.weather_sentence().await);
        }

        sentences.join(" ")
    }

    async fn weather_sentence(&self) -> String {
        let city = match self.location.locate().await {
            Ok(location) => location.city,
            Err(e) => {
                warn!(error = %e, "location lookup failed");
                return LOCATION_FALLBACK.to_string();
            }
        };

        match self.weather.current(&city).await {
            Ok(report) => format!(
                "The current weather in {} is {}°C with {}. \
                 The humidity is {}% and wind speed is {} m/s.",
                report.city,
                report.temperature_c,
                report.condition,
                report.humidity,
                report.wind_speed_ms
            ),
            Err(e) => {
                warn!(error = %e, city = %city, "weather lookup failed");
                WEATHER_FALLBACK.to_string()
            }
        }
    }
}

/// 12-hour clock, e.g. `2:05 PM`.
fn format_clock<Tz: chrono::TimeZone>(now: &DateTime<Tz>) -> String {
    let (is_pm, hour) = now.hour12();
    let meridiem = if is_pm { "PM" } else { "AM" };
    format!("{}:{:02} {}", hour, now.minute(), meridiem)
}

/// Spoken-style date, e.g. `Tuesday, August 26, 2025`.
fn format_date<Tz: chrono::TimeZone>(now: &DateTime<Tz>) -> String {
    let weekday = match now.weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    };
    let month = match now.month() {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    };
    format!("{}, {} {}, {}", weekday, month, now.day(), now.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;

    use crate::chat::providers::{GeoLocation, WeatherReport};
    use crate::error::{ParlaError, Result};

    struct FixedLocation(Option<GeoLocation>);

    #[async_trait]
    impl LocationProvider for FixedLocation {
        async fn locate(&self) -> Result<GeoLocation> {
            self.0
                .clone()
                .ok_or_else(|| ParlaError::Location("no route".into()))
        }
    }

    struct FixedWeather(Option<WeatherReport>);

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        async fn current(&self, _city: &str) -> Result<WeatherReport> {
            self.0
                .clone()
                .ok_or_else(|| ParlaError::Weather("service down".into()))
        }
    }

    fn lisbon() -> GeoLocation {
        GeoLocation {
            city: "Lisbon".into(),
            region: "Lisbon".into(),
            country: "Portugal".into(),
            latitude: 38.7223,
            longitude: -9.1393,
        }
    }

    fn mild_day() -> WeatherReport {
        WeatherReport {
            city: "Lisbon".into(),
            temperature_c: 22,
            condition: "few clouds".into(),
            humidity: 62,
            wind_speed_ms: 4.1,
        }
    }

    fn answerer(
        location: Option<GeoLocation>,
        weather: Option<WeatherReport>,
    ) -> LocalAnswerer {
        LocalAnswerer::new(
            Arc::new(FixedLocation(location)),
            Arc::new(FixedWeather(weather)),
        )
    }

    #[test]
    fn clock_formats_as_twelve_hour_time() {
        let afternoon = chrono::Utc.with_ymd_and_hms(2025, 8, 26, 14, 5, 0).unwrap();
        assert_eq!(format_clock(&afternoon), "2:05 PM");

        let midnight = chrono::Utc.with_ymd_and_hms(2025, 8, 26, 0, 30, 0).unwrap();
        assert_eq!(format_clock(&midnight), "12:30 AM");

        let noon = chrono::Utc.with_ymd_and_hms(2025, 8, 26, 12, 0, 0).unwrap();
        assert_eq!(format_clock(&noon), "12:00 PM");
    }

    #[test]
    fn date_formats_with_full_weekday_and_month() {
        let day = chrono::Utc.with_ymd_and_hms(2025, 8, 26, 9, 0, 0).unwrap();
        assert_eq!(format_date(&day), "Tuesday, August 26, 2025");
    }

    #[tokio::test]
    async fn weather_answer_includes_every_reported_figure() {
        let answerer = answerer(Some(lisbon()), Some(mild_day()));
        let answer = answerer.answer(LocalTopics::weather_only()).await;
        assert_eq!(
            answer,
            "The current weather in Lisbon is 22°C with few clouds. \
             The humidity is 62% and wind speed is 4.1 m/s."
        );
    }

    #[tokio::test]
    async fn location_failure_degrades_to_the_city_prompt() {
        let answerer = answerer(None, Some(mild_day()));
        let answer = answerer.answer(LocalTopics::weather_only()).await;
        assert_eq!(answer, LOCATION_FALLBACK);
    }

    #[tokio::test]
    async fn weather_failure_degrades_to_an_apology() {
        let answerer = answerer(Some(lisbon()), None);
        let answer = answerer.answer(LocalTopics::weather_only()).await;
        assert_eq!(answer, WEATHER_FALLBACK);
    }

    #[tokio::test]
    async fn combined_topics_compose_time_then_date_then_weather() {
        let answerer = answerer(Some(lisbon()), Some(mild_day()));
        let answer = answerer.answer(LocalTopics::all()).await;
        assert!(answer.starts_with("The current time is "));
        let date_at = answer.find("Today is ").expect("date sentence present");
        let weather_at = answer
            .find("The current weather in ")
            .expect("weather sentence present");
        assert!(date_at < weather_at);
    }
}
