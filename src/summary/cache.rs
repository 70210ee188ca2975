use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::ports::SummaryStore;
use crate::types::summary::Summary;

/// Latest summary per location. Each location has its own slot, so a write
/// for one location never waits on readers of another.
#[derive(Debug, Default)]
pub struct SummaryCache {
    slots: HashMap<String, RwLock<Option<Arc<Summary>>>>,
}

impl SummaryCache {
    pub fn new<'a>(locations: impl IntoIterator<Item = &'a str>) -> Self {
        let slots = locations
            .into_iter()
            .map(|key| (key.to_string(), RwLock::new(None)))
            .collect();
        Self { slots }
    }

    /// Replaces whatever was stored for the summary's location.
    pub fn store(&self, summary: Summary) {
        let Some(slot) = self.slots.get(&summary.location) else {
            warn!(location = %summary.location, "dropping summary for unknown location");
            return;
        };
        *slot.write().expect("summary slot lock") = Some(Arc::new(summary));
    }

    pub fn load(&self, location: &str) -> Option<Arc<Summary>> {
        self.slots
            .get(location)
            .and_then(|slot| slot.read().expect("summary slot lock").clone())
    }

    pub fn contains(&self, location: &str) -> bool {
        self.load(location).is_some()
    }

    /// Seeds empty slots from persisted summaries. Unreadable entries are
    /// logged and left empty so the startup warm-up regenerates them.
    pub async fn hydrate<S: SummaryStore>(&self, store: &S) {
        let mut loaded = 0usize;
        for location in self.slots.keys() {
            if self.contains(location) {
                continue;
            }
            match store.load_cached_summary(location).await {
                Ok(Some(summary)) => {
                    self.store(summary);
                    loaded += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(location = %location, error = %err, "failed to load cached summary");
                }
            }
        }
        info!(loaded, "loaded cached summaries");
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary(location: &str, text: &str) -> Summary {
        Summary {
            location: location.to_string(),
            text: text.to_string(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn store__should_overwrite_not_merge() {
        // Given
        let cache = SummaryCache::new(["la"]);

        // When
        cache.store(summary("la", "A"));
        cache.store(summary("la", "B"));

        // Then
        assert_eq!(cache.load("la").expect("summary").text, "B");
    }

    #[test]
    fn load__should_return_none_before_first_store() {
        let cache = SummaryCache::new(["la", "nyc"]);
        cache.store(summary("la", "A"));

        assert!(cache.load("nyc").is_none());
        assert!(!cache.contains("nyc"));
        assert!(cache.contains("la"));
    }

    #[tokio::test]
    async fn hydrate__should_fill_empty_slots_from_store() {
        // Given
        let store = crate::store::SqliteStore::open_in_memory()
            .await
            .expect("store");
        store
            .cache_summary(&summary("la", "persisted"))
            .await
            .expect("persist");
        let cache = SummaryCache::new(["la", "nyc"]);

        // When
        cache.hydrate(&store).await;

        // Then
        assert_eq!(cache.load("la").expect("la").text, "persisted");
        assert!(cache.load("nyc").is_none());
    }

    #[tokio::test]
    async fn hydrate__should_tolerate_store_errors() {
        let cache = SummaryCache::new(["la"]);

        cache.hydrate(&crate::testing::FailingStore).await;

        assert!(cache.load("la").is_none());
    }

    #[test]
    fn store__should_ignore_unknown_location() {
        let cache = SummaryCache::new(["la"]);

        cache.store(summary("mars", "dusty"));

        assert!(cache.load("mars").is_none());
    }
}
