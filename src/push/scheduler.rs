use crate::locations::Location;
use crate::ports;
use crate::summary::{GenerateError, RunMode, SummaryGenerator};

use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub(crate) struct ScheduledUpdateHandle {
    pub(crate) location: String,
    handle: JoinHandle<()>,
}

impl ScheduledUpdateHandle {
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub(crate) async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.handle.await
    }
}

/// Fires one live summary run per location each day at `at`, local time.
#[derive(Debug, Clone)]
pub(crate) struct UpdateScheduler<T> {
    time: T,
    at: NaiveTime,
}

impl<T> UpdateScheduler<T>
where
    T: ports::TimeProvider,
{
    pub(crate) fn new(time: T, at: NaiveTime) -> Self {
        Self { time, at }
    }

    pub(crate) fn spawn_all<W, M, S, R>(
        &self,
        generator: Arc<SummaryGenerator<T, W, M, S, R>>,
        locations: impl IntoIterator<Item = Location>,
        shutdown: CancellationToken,
    ) -> Vec<ScheduledUpdateHandle>
    where
        W: ports::WeatherProvider,
        M: ports::Summarizer,
        S: ports::SummaryStore,
        R: ports::SubscriptionStore,
    {
        locations
            .into_iter()
            .map(|location| {
                let key = location.key.clone();
                let time = self.time.clone();
                let at = self.at;
                let generator = Arc::clone(&generator);
                let shutdown = shutdown.clone();
                let handle = tokio::spawn(async move {
                    run_daily(time, at, generator, location, shutdown).await;
                });
                info!(location = %key, at = %self.at, "update job scheduled");
                ScheduledUpdateHandle {
                    location: key,
                    handle,
                }
            })
            .collect()
    }
}

fn compute_delay(now: DateTime<Utc>, at: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

async fn run_daily<T, W, M, S, R>(
    time: T,
    at: NaiveTime,
    generator: Arc<SummaryGenerator<T, W, M, S, R>>,
    location: Location,
    shutdown: CancellationToken,
) where
    T: ports::TimeProvider,
    W: ports::WeatherProvider,
    M: ports::Summarizer,
    S: ports::SummaryStore,
    R: ports::SubscriptionStore,
{
    loop {
        let now = time.now();
        let fire_at = location.next_occurrence(now, at);
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = time.sleep(compute_delay(now, fire_at)) => {}
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = generator.run(&location.key, RunMode::Live) => match result {
                Ok(_) => {}
                Err(GenerateError::Busy(_)) => {
                    warn!(location = %location.key, "previous summary run still in progress; dropping tick");
                }
                Err(err) => {
                    error!(location = %location.key, error = %err, "failed to update weather summary");
                }
            },
        }
    }
}
