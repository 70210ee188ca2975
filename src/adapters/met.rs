//! Forecasts from the Norwegian Meteorological Institute's
//! `locationforecast` API, plus an offline stand-in.

use std::f64::consts::PI;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use reqwest::Client;
use serde_json::{Value, json};

use crate::ports::{self, BoxFuture, WeatherError};

const DEFAULT_BASE_URL: &str = "https://api.met.no";

#[derive(Debug, Clone)]
pub struct MetNoClient {
    client: Client,
    base_url: String,
}

impl MetNoClient {
    /// met.no rejects requests without an identifying User-Agent.
    pub fn new(user_agent: &str) -> Result<Self, WeatherError> {
        Self::with_base_url(user_agent, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(user_agent: &str, base_url: &str) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, latitude: f64, longitude: f64) -> Result<Vec<u8>, WeatherError> {
        let response = self
            .client
            .get(format!(
                "{}/weatherapi/locationforecast/2.0/compact",
                self.base_url
            ))
            // met.no asks for at most four decimals
            .query(&[
                ("lat", format!("{latitude:.4}")),
                ("lon", format!("{longitude:.4}")),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl ports::WeatherProvider for MetNoClient {
    type Fut<'a>
        = BoxFuture<'a, Result<Vec<u8>, WeatherError>>
    where
        Self: 'a;

    fn fetch_forecast<'a>(&'a self, latitude: f64, longitude: f64) -> Self::Fut<'a> {
        Box::pin(self.fetch(latitude, longitude))
    }
}

/// Synthesizes a plausible compact forecast so the service can run without
/// network access or API quota.
#[derive(Debug, Clone)]
pub struct PlaceholderWeather<T> {
    time: T,
}

impl<T: ports::TimeProvider> PlaceholderWeather<T> {
    pub fn new(time: T) -> Self {
        Self { time }
    }
}

/// Hourly entries from a day before `now` to two days after, so the current
/// date everywhere is covered.
fn placeholder_forecast(now: DateTime<Utc>, latitude: f64, longitude: f64) -> Value {
    let start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    let base = 28.0 - latitude.abs() * 0.35;
    let timeseries: Vec<Value> = (-24..48)
        .map(|offset| {
            let time = start + chrono::Duration::hours(offset);
            let solar_hour = (f64::from(time.hour()) + longitude / 15.0).rem_euclid(24.0);
            let temperature = base + 5.0 * ((solar_hour - 15.0) / 24.0 * 2.0 * PI).cos();
            let daytime = (6.0..20.0).contains(&solar_hour);
            json!({
                "time": time.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                "data": {
                    "instant": {"details": {
                        "air_temperature": (temperature * 10.0).round() / 10.0,
                        "relative_humidity": 60.0,
                        "wind_speed": 3.2,
                    }},
                    "next_1_hours": {
                        "summary": {"symbol_code": if daytime { "partlycloudy_day" } else { "clearsky_night" }},
                        "details": {"precipitation_amount": 0.0},
                    },
                },
            })
        })
        .collect();
    json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [longitude, latitude]},
        "properties": {
            "meta": {
                "updated_at": start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                "units": {
                    "air_temperature": "celsius",
                    "precipitation_amount": "mm",
                    "relative_humidity": "%",
                    "wind_speed": "m/s",
                },
            },
            "timeseries": timeseries,
        },
    })
}

impl<T: ports::TimeProvider> ports::WeatherProvider for PlaceholderWeather<T> {
    type Fut<'a>
        = std::future::Ready<Result<Vec<u8>, WeatherError>>
    where
        Self: 'a;

    fn fetch_forecast<'a>(&'a self, latitude: f64, longitude: f64) -> Self::Fut<'a> {
        let document = placeholder_forecast(self.time.now(), latitude, longitude);
        std::future::ready(
            serde_json::to_vec(&document).map_err(|err| WeatherError::Unavailable(err.to_string())),
        )
    }
}
