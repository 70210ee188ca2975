use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ports::{DeliveryError, PushSender, SubscriptionStore};
use crate::state::CoreState;
use crate::types::push::NotificationPayload;

/// "The cached summary for this location changed."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSignal;

/// Holds at most one pending signal; a second one sent while the first is
/// still unread is redundant because rounds always push the latest summary.
pub fn update_channel() -> (mpsc::Sender<UpdateSignal>, mpsc::Receiver<UpdateSignal>) {
    mpsc::channel(1)
}

/// Outcome of one fan-out round.
#[derive(Debug, Default)]
pub struct RoundReport {
    pub delivered: usize,
    pub failed: Vec<(Uuid, DeliveryError)>,
}

pub struct Dispatcher<P, R> {
    sender: P,
    core: CoreState<R>,
    fanout_limit: usize,
}

impl<P, R> Dispatcher<P, R>
where
    P: PushSender,
    R: SubscriptionStore,
{
    pub fn new(sender: P, core: CoreState<R>, fanout_limit: usize) -> Self {
        Self {
            sender,
            core,
            fanout_limit: fanout_limit.max(1),
        }
    }

    /// Serves one location until `shutdown` fires or every signal sender is
    /// gone. A round that has started always runs to completion.
    pub async fn run(
        self: Arc<Self>,
        location: String,
        mut signals: mpsc::Receiver<UpdateSignal>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                signal = signals.recv() => match signal {
                    Some(UpdateSignal) => {
                        self.deliver_round(&location).await;
                    }
                    None => break,
                },
            }
        }
        debug!(location, "dispatcher stopped");
    }

    /// Pushes the current summary for `location` to every subscriber in a
    /// snapshot of the registry. Each delivery runs as its own task; a failed
    /// delivery is logged and leaves the others alone.
    pub async fn deliver_round(&self, location: &str) -> RoundReport {
        let mut report = RoundReport::default();

        let Some(summary) = self.core.cache.load(location) else {
            warn!(location, "no summary cached; nothing to push");
            return report;
        };
        let subscribers = self.core.registry.subscribers_of(location);
        if subscribers.is_empty() {
            debug!(location, "no subscribers");
            return report;
        }

        let payload = NotificationPayload {
            summary: summary.text.clone(),
            location: location.to_string(),
        };
        let payload: Arc<[u8]> = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes.into(),
            Err(err) => {
                error!(location, error = %err, "failed to create web push notification payload");
                return report;
            }
        };

        info!(count = subscribers.len(), location, "pushing weather summary to subscribers");

        let limit = Arc::new(Semaphore::new(self.fanout_limit));
        let mut tasks = JoinSet::new();
        for subscriber in subscribers.iter() {
            let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
                break;
            };
            let sender = self.sender.clone();
            let subscriber = Arc::clone(subscriber);
            let payload = Arc::clone(&payload);
            tasks.spawn(async move {
                let result = sender.send(&subscriber.capability, &payload).await;
                drop(permit);
                (subscriber.id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.delivered += 1,
                Ok((id, Err(err))) => {
                    warn!(
                        %id,
                        location,
                        permanent = err.is_permanent(),
                        error = %err,
                        "unable to send web push to subscription"
                    );
                    report.failed.push((id, err));
                }
                Err(err) => {
                    error!(location, error = %err, "web push delivery task failed");
                }
            }
        }

        info!(
            delivered = report.delivered,
            failed = report.failed.len(),
            location,
            "pushed weather summary to subscribers"
        );
        report
    }
}
