use crate::types::push::VapidConfig;

use chrono::NaiveTime;
use std::path::PathBuf;

/// Where forecasts come from.
#[derive(Clone, Debug)]
pub enum WeatherSource {
    MetNo { user_agent: String },
    Placeholder,
}

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub weather: WeatherSource,
    pub gemini: GeminiConfig,
    pub vapid: VapidConfig,
    /// Local time of day at which each location's summary is refreshed.
    pub update_at: NaiveTime,
    pub fanout_limit: usize,
    pub push_ttl: u32,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 0,
            data_dir: "data".into(),
            weather: WeatherSource::Placeholder,
            gemini: GeminiConfig {
                api_key: "test-key".to_string(),
                model: "gemini-2.0-flash".to_string(),
            },
            vapid: VapidConfig {
                private_key: "private".to_string(),
                public_key: "public-key".to_string(),
                subject: "mailto:ops@example.com".to_string(),
            },
            update_at: NaiveTime::from_hms_opt(7, 0, 0).expect("time"),
            fanout_limit: 32,
            push_ttl: 30,
        }
    }
}
