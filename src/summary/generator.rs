use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::ports::{
    SubscriptionStore, SummarizeError, Summarizer, SummaryStore, TimeProvider, WeatherError,
    WeatherProvider,
};
use crate::push::UpdateSignal;
use crate::state::CoreState;
use crate::summary::forecast::{ForecastError, filter_to_local_day};
use crate::summary::prompt::build_prompt;
use crate::types::summary::Summary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Scheduled run; subscribers are notified.
    Live,
    /// Startup run that only fills the cache.
    Warmup,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("unknown location '{0}'")]
    UnknownLocation(String),
    #[error("a summary run for '{0}' is already in progress")]
    Busy(String),
    #[error(transparent)]
    Weather(#[from] WeatherError),
    #[error(transparent)]
    Forecast(#[from] ForecastError),
    #[error(transparent)]
    Summarize(#[from] SummarizeError),
}

/// Turns a raw forecast into a cached summary and tells the location's
/// dispatcher about it.
pub struct SummaryGenerator<T, W, M, S, R> {
    time: T,
    weather: W,
    summarizer: M,
    store: S,
    core: CoreState<R>,
    signals: HashMap<String, mpsc::Sender<UpdateSignal>>,
    running: HashMap<String, Mutex<()>>,
}

impl<T, W, M, S, R> SummaryGenerator<T, W, M, S, R>
where
    T: TimeProvider,
    W: WeatherProvider,
    M: Summarizer,
    S: SummaryStore,
    R: SubscriptionStore,
{
    pub fn new(
        time: T,
        weather: W,
        summarizer: M,
        store: S,
        core: CoreState<R>,
        signals: HashMap<String, mpsc::Sender<UpdateSignal>>,
    ) -> Self {
        let running = core
            .locations
            .keys()
            .map(|key| (key.to_string(), Mutex::new(())))
            .collect();
        Self {
            time,
            weather,
            summarizer,
            store,
            core,
            signals,
            running,
        }
    }

    /// One generation for `key`. Nothing in the cache changes and no signal
    /// goes out unless every upstream step succeeds. Refuses to start while
    /// another run for the same location is in flight.
    pub async fn run(&self, key: &str, mode: RunMode) -> Result<Summary, GenerateError> {
        let location = self
            .core
            .locations
            .get(key)
            .ok_or_else(|| GenerateError::UnknownLocation(key.to_string()))?;
        let _running = self
            .running
            .get(key)
            .and_then(|lock| lock.try_lock().ok())
            .ok_or_else(|| GenerateError::Busy(key.to_string()))?;

        info!(location = key, ?mode, "updating weather summary");

        let raw = self
            .weather
            .fetch_forecast(location.latitude, location.longitude)
            .await?;
        let date = location.local_date(self.time.now());
        let forecast = filter_to_local_day(&raw, location.tz, date)?;
        let prompt = build_prompt(location, date, forecast);
        let text = self.summarizer.generate(&prompt).await?;

        let summary = Summary {
            location: key.to_string(),
            text: text.trim().to_string(),
            generated_at: self.time.now(),
        };
        self.core.cache.store(summary.clone());

        if let Err(err) = self.store.cache_summary(&summary).await {
            warn!(location = key, error = %err, "failed to persist weather summary");
        }

        if mode == RunMode::Live {
            self.signal(key);
        }

        info!(location = key, "updated weather summary");
        Ok(summary)
    }

    fn signal(&self, key: &str) {
        if self.core.registry.subscriber_count(key) == 0 {
            debug!(location = key, "no subscribers; skipping push");
            return;
        }
        let Some(sender) = self.signals.get(key) else {
            warn!(location = key, "no dispatcher registered for location");
            return;
        };
        match sender.try_send(UpdateSignal) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!(location = key, "push already pending; coalescing");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(location = key, "dispatcher stopped; summary not pushed");
            }
        }
    }
}
