//! Test doubles for the collaborator ports.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::{Semaphore, oneshot};
use uuid::Uuid;

use crate::ports::{
    self, BoxFuture, DeliveryError, StoreError, SummarizeError, WeatherError,
};
use crate::types::push::{NotificationPayload, PushCapability, PushKeys};
use crate::types::subscription::Subscription;
use crate::types::summary::Summary;

pub(crate) fn utc(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("parse timestamp")
        .with_timezone(&Utc)
}

pub(crate) fn capability(tag: &str) -> PushCapability {
    PushCapability {
        endpoint: format!("https://push.example/{tag}"),
        keys: PushKeys {
            p256dh: format!("p256-{tag}"),
            auth: format!("auth-{tag}"),
        },
    }
}

/// A met.no-shaped forecast with hourly entries from a day before `now` to
/// two days after, so every time zone's current date is covered.
pub(crate) fn forecast_around(now: DateTime<Utc>) -> Vec<u8> {
    let timeseries: Vec<Value> = (-24..48)
        .map(|hour| {
            let time = now + chrono::Duration::hours(hour);
            json!({
                "time": time.to_rfc3339(),
                "data": {"instant": {"details": {"air_temperature": 20.0}}},
            })
        })
        .collect();
    serde_json::to_vec(&json!({
        "type": "Feature",
        "properties": {"meta": {"updated_at": now.to_rfc3339()}, "timeseries": timeseries},
    }))
    .expect("encode forecast")
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    if waited.is_err() {
        panic!("timed out waiting for {what}");
    }
}

#[derive(Clone)]
pub(crate) struct ManualTime {
    now: Arc<Mutex<DateTime<Utc>>>,
    sleeps: Arc<Mutex<Vec<oneshot::Sender<()>>>>,
    durations: Arc<Mutex<Vec<Duration>>>,
}

impl ManualTime {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
            durations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn set_now(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("now lock") = now;
    }

    pub(crate) fn sleep_durations(&self) -> Vec<Duration> {
        self.durations.lock().expect("durations lock").clone()
    }

    pub(crate) fn trigger_all(&self) {
        let mut sends = self.sleeps.lock().expect("sleeps lock");
        for sender in sends.drain(..) {
            let _ = sender.send(());
        }
    }

    pub(crate) async fn wait_for_sleeps(&self, count: usize) {
        wait_until("sleeps", || self.sleep_durations().len() >= count).await;
    }
}

pub(crate) struct ManualSleep {
    receiver: oneshot::Receiver<()>,
}

impl Future for ManualSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl ports::TimeProvider for ManualTime {
    type Sleep<'a>
        = ManualSleep
    where
        Self: 'a;

    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("now lock")
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        let (sender, receiver) = oneshot::channel();
        self.durations
            .lock()
            .expect("durations lock")
            .push(duration);
        self.sleeps.lock().expect("sleeps lock").push(sender);
        ManualSleep { receiver }
    }
}

/// Records successful deliveries as `(endpoint, payload)`.
#[derive(Clone, Default)]
pub(crate) struct RecordingSender {
    sent: Arc<Mutex<Vec<(String, NotificationPayload)>>>,
    failures: Arc<Mutex<HashMap<String, DeliveryError>>>,
    latency: Option<Duration>,
    started: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl RecordingSender {
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub(crate) fn fail_for(&self, endpoint: &str, err: DeliveryError) {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(endpoint.to_string(), err);
    }

    pub(crate) fn sent(&self) -> Vec<(String, NotificationPayload)> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_sent(&self, count: usize) {
        wait_until("deliveries", || self.sent().len() >= count).await;
    }

    pub(crate) async fn wait_for_started(&self, count: usize) {
        wait_until("delivery attempts", || {
            self.started.load(Ordering::SeqCst) >= count
        })
        .await;
    }
}

impl ports::PushSender for RecordingSender {
    type Fut<'a>
        = BoxFuture<'a, Result<(), DeliveryError>>
    where
        Self: 'a;

    fn send<'a>(&'a self, capability: &'a PushCapability, payload: &'a [u8]) -> Self::Fut<'a> {
        Box::pin(async move {
            self.started.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let failure = self
                .failures
                .lock()
                .expect("failures lock")
                .get(&capability.endpoint)
                .cloned();
            if let Some(err) = failure {
                return Err(err);
            }
            let payload: NotificationPayload = serde_json::from_slice(payload)
                .map_err(|err| DeliveryError::Malformed(err.to_string()))?;
            self.sent
                .lock()
                .expect("sent lock")
                .push((capability.endpoint.clone(), payload));
            Ok(())
        })
    }
}

#[derive(Clone)]
pub(crate) struct ScriptedWeather {
    response: Arc<Mutex<Result<Vec<u8>, u16>>>,
    calls: Arc<AtomicUsize>,
    gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl ScriptedWeather {
    pub(crate) fn ok(body: Vec<u8>) -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok(body))),
            calls: Arc::new(AtomicUsize::new(0)),
            gate: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn respond(&self, body: Vec<u8>) {
        *self.response.lock().expect("response lock") = Ok(body);
    }

    pub(crate) fn fail(&self, status: u16) {
        *self.response.lock().expect("response lock") = Err(status);
    }

    /// Holds every later fetch until a permit is added to the returned gate.
    pub(crate) fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().expect("gate lock") = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        wait_until("forecast fetches", || {
            self.calls.load(Ordering::SeqCst) >= count
        })
        .await;
    }
}

impl ports::WeatherProvider for ScriptedWeather {
    type Fut<'a>
        = BoxFuture<'a, Result<Vec<u8>, WeatherError>>
    where
        Self: 'a;

    fn fetch_forecast<'a>(&'a self, _latitude: f64, _longitude: f64) -> Self::Fut<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().expect("gate lock").clone();
            if let Some(gate) = gate
                && let Ok(permit) = gate.acquire().await
            {
                permit.forget();
            }
            self.response
                .lock()
                .expect("response lock")
                .clone()
                .map_err(WeatherError::Status)
        })
    }
}

#[derive(Clone)]
pub(crate) struct ScriptedSummarizer {
    reply: Arc<Mutex<Option<String>>>,
    prompts: Arc<Mutex<Vec<Vec<String>>>>,
}

impl ScriptedSummarizer {
    pub(crate) fn ok(text: &str) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Some(text.to_string()))),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn fail(&self) {
        *self.reply.lock().expect("reply lock") = None;
    }

    pub(crate) fn prompts(&self) -> Vec<Vec<String>> {
        self.prompts.lock().expect("prompts lock").clone()
    }

    pub(crate) async fn wait_for_prompts(&self, count: usize) {
        wait_until("summaries", || self.prompts().len() >= count).await;
    }
}

impl ports::Summarizer for ScriptedSummarizer {
    type Fut<'a>
        = BoxFuture<'a, Result<String, SummarizeError>>
    where
        Self: 'a;

    fn generate<'a>(&'a self, prompt_parts: &'a [String]) -> Self::Fut<'a> {
        Box::pin(async move {
            self.prompts
                .lock()
                .expect("prompts lock")
                .push(prompt_parts.to_vec());
            self.reply
                .lock()
                .expect("reply lock")
                .clone()
                .ok_or(SummarizeError::Empty)
        })
    }
}

/// A store whose every call fails as if the database went away.
#[derive(Clone, Copy)]
pub(crate) struct FailingStore;

fn closed() -> StoreError {
    StoreError::Database(tokio_rusqlite::Error::ConnectionClosed)
}

impl ports::SubscriptionStore for FailingStore {
    fn upsert_subscription<'a>(
        &'a self,
        _subscription: &'a Subscription,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async { Err(closed()) })
    }

    fn delete_subscription(&self, _id: Uuid) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async { Err(closed()) })
    }

    fn load_subscription(&self, _id: Uuid) -> BoxFuture<'_, Result<Option<Subscription>, StoreError>> {
        Box::pin(async { Err(closed()) })
    }

    fn list_subscriptions(&self) -> BoxFuture<'_, Result<Vec<Subscription>, StoreError>> {
        Box::pin(async { Err(closed()) })
    }
}

impl ports::SummaryStore for FailingStore {
    fn cache_summary<'a>(&'a self, _summary: &'a Summary) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async { Err(closed()) })
    }

    fn load_cached_summary<'a>(
        &'a self,
        _location: &'a str,
    ) -> BoxFuture<'a, Result<Option<Summary>, StoreError>> {
        Box::pin(async { Err(closed()) })
    }
}

/// Wraps a store so that the next `load_subscription` call stops after
/// reading and waits for a permit on the returned gate.
#[derive(Clone)]
pub(crate) struct GatedStore<S> {
    inner: S,
    gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
    parked: Arc<AtomicUsize>,
}

impl<S> GatedStore<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            gate: Arc::new(Mutex::new(None)),
            parked: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn gate_next_load(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().expect("gate lock") = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) async fn wait_for_parked(&self, count: usize) {
        wait_until("parked loads", || {
            self.parked.load(Ordering::SeqCst) >= count
        })
        .await;
    }
}

impl<S: ports::SubscriptionStore> ports::SubscriptionStore for GatedStore<S> {
    fn upsert_subscription<'a>(
        &'a self,
        subscription: &'a Subscription,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.upsert_subscription(subscription)
    }

    fn delete_subscription(&self, id: Uuid) -> BoxFuture<'_, Result<bool, StoreError>> {
        self.inner.delete_subscription(id)
    }

    fn load_subscription(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Subscription>, StoreError>> {
        Box::pin(async move {
            let loaded = self.inner.load_subscription(id).await;
            let gate = self.gate.lock().expect("gate lock").take();
            if let Some(gate) = gate {
                self.parked.fetch_add(1, Ordering::SeqCst);
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            loaded
        })
    }

    fn list_subscriptions(&self) -> BoxFuture<'_, Result<Vec<Subscription>, StoreError>> {
        self.inner.list_subscriptions()
    }
}
