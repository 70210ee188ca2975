use uuid::Uuid;

use crate::ports::BoxFuture;
use crate::types::subscription::Subscription;
use crate::types::summary::Summary;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("uuid parse error: {0}")]
    Uuid(#[from] uuid::Error),
    #[error("date/time parse error: {0}")]
    DateParse(String),
}

/// Durable mirror of the subscription registry.
pub trait SubscriptionStore: Clone + Send + Sync + 'static {
    fn upsert_subscription<'a>(
        &'a self,
        subscription: &'a Subscription,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Returns `false` when no subscription had this id.
    fn delete_subscription(&self, id: Uuid) -> BoxFuture<'_, Result<bool, StoreError>>;

    fn load_subscription(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Subscription>, StoreError>>;

    fn list_subscriptions(&self) -> BoxFuture<'_, Result<Vec<Subscription>, StoreError>>;
}

/// Durable copy of the latest summary per location.
pub trait SummaryStore: Clone + Send + Sync + 'static {
    fn cache_summary<'a>(&'a self, summary: &'a Summary) -> BoxFuture<'a, Result<(), StoreError>>;

    fn load_cached_summary<'a>(
        &'a self,
        location: &'a str,
    ) -> BoxFuture<'a, Result<Option<Summary>, StoreError>>;
}
