use crate::config::AppConfig;
use crate::locations::Locations;
use crate::registry::SubscriptionRegistry;
use crate::store::SqliteStore;
use crate::summary::SummaryCache;

use std::sync::Arc;

/// Services shared by the HTTP surface and the background workers.
pub struct CoreState<R> {
    pub locations: Arc<Locations>,
    pub cache: Arc<SummaryCache>,
    pub registry: Arc<SubscriptionRegistry<R>>,
}

impl<R> Clone for CoreState<R> {
    fn clone(&self) -> Self {
        Self {
            locations: Arc::clone(&self.locations),
            cache: Arc::clone(&self.cache),
            registry: Arc::clone(&self.registry),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub core: CoreState<SqliteStore>,
}
