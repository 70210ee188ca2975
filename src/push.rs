use crate::ports;
use crate::state::CoreState;
use crate::summary::{RunMode, SummaryGenerator};

mod dispatcher;
mod scheduler;
pub(crate) mod vapid;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveTime;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

pub use dispatcher::{Dispatcher, RoundReport, UpdateSignal, update_channel};
use scheduler::{ScheduledUpdateHandle, UpdateScheduler};
pub use vapid::{VapidCredentials, generate_vapid_credentials, public_key_for};

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub update_at: NaiveTime,
    pub fanout_limit: usize,
}

/// External collaborators the background workers talk to.
pub struct Collaborators<T, W, M, P, S> {
    pub time: T,
    pub weather: W,
    pub summarizer: M,
    pub sender: P,
    pub store: S,
}

/// The long-lived background tasks: one update job and one dispatcher per
/// location, plus the startup warm-up.
pub struct Workers {
    shutdown: CancellationToken,
    schedules: Vec<ScheduledUpdateHandle>,
    tracker: TaskTracker,
}

impl Workers {
    /// Cancels every worker and waits for them. Dispatch rounds already in
    /// progress finish first.
    pub async fn shutdown(self) {
        for schedule in &self.schedules {
            if schedule.is_finished() {
                warn!(location = %schedule.location, "update job exited before shutdown");
            }
        }
        self.shutdown.cancel();
        for schedule in self.schedules {
            let location = schedule.location.clone();
            if let Err(err) = schedule.join().await {
                error!(location = %location, error = %err, "update job panicked");
            }
        }
        self.tracker.close();
        self.tracker.wait().await;
        info!("background workers stopped");
    }
}

pub fn start_workers<T, W, M, P, S>(
    collaborators: Collaborators<T, W, M, P, S>,
    core: CoreState<S>,
    settings: WorkerSettings,
    shutdown: CancellationToken,
) -> Workers
where
    T: ports::TimeProvider,
    W: ports::WeatherProvider,
    M: ports::Summarizer,
    P: ports::PushSender,
    S: ports::SubscriptionStore + ports::SummaryStore,
{
    let Collaborators {
        time,
        weather,
        summarizer,
        sender,
        store,
    } = collaborators;
    let tracker = TaskTracker::new();

    let mut signals = HashMap::new();
    let dispatcher = Arc::new(Dispatcher::new(
        sender,
        core.clone(),
        settings.fanout_limit,
    ));
    for key in core.locations.keys() {
        let (tx, rx) = update_channel();
        signals.insert(key.to_string(), tx);
        tracker.spawn(Arc::clone(&dispatcher).run(key.to_string(), rx, shutdown.clone()));
    }

    let generator = Arc::new(SummaryGenerator::new(
        time.clone(),
        weather,
        summarizer,
        store,
        core.clone(),
        signals,
    ));

    let cold: Vec<String> = core
        .locations
        .keys()
        .filter(|key| !core.cache.contains(key))
        .map(str::to_string)
        .collect();
    tracker.spawn(warm_up(Arc::clone(&generator), cold, shutdown.clone()));

    let scheduler = UpdateScheduler::new(time, settings.update_at);
    let schedules = scheduler.spawn_all(
        generator,
        core.locations.iter().cloned().collect::<Vec<_>>(),
        shutdown.clone(),
    );

    Workers {
        shutdown,
        schedules,
        tracker,
    }
}

/// Fills the cache for locations that have never had a summary, all at
/// once and without notifying anyone.
async fn warm_up<T, W, M, S, R>(
    generator: Arc<SummaryGenerator<T, W, M, S, R>>,
    locations: Vec<String>,
    shutdown: CancellationToken,
) where
    T: ports::TimeProvider,
    W: ports::WeatherProvider,
    M: ports::Summarizer,
    S: ports::SummaryStore,
    R: ports::SubscriptionStore,
{
    if locations.is_empty() {
        return;
    }
    info!(count = locations.len(), "warming summary cache");

    let mut runs = JoinSet::new();
    for key in locations {
        let generator = Arc::clone(&generator);
        runs.spawn(async move {
            let result = generator.run(&key, RunMode::Warmup).await;
            (key, result)
        });
    }

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                runs.abort_all();
                break;
            }
            joined = runs.join_next() => match joined {
                Some(Ok((_, Ok(_)))) => {}
                Some(Ok((key, Err(err)))) => {
                    error!(location = %key, error = %err, "failed to warm weather summary");
                }
                Some(Err(err)) => {
                    error!(error = %err, "warm-up task failed");
                }
                None => break,
            },
        }
    }
}
