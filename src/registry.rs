//! In-memory index from location key to subscribers, mirrored to a
//! [`SubscriptionStore`].
//!
//! Each location owns one bucket behind its own lock. A bucket holds an
//! `Arc<Vec<..>>` that is replaced wholesale on every mutation, so a reader
//! that cloned the `Arc` keeps a consistent list for as long as it needs it
//! while writers carry on. Locks are only held to swap or clone the `Arc`.
//!
//! Mutations run one at a time: each one reads the store, writes it, then
//! adjusts the buckets, and that sequence must not interleave with another
//! mutation. Readers never take that lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};
use uuid::Uuid;

use crate::ports::{StoreError, SubscriptionStore};
use crate::types::push::PushCapability;
use crate::types::subscription::{Subscription, merge_locations, normalize_locations};

pub type Snapshot = Arc<Vec<Arc<Subscription>>>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("subscription {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Location-set changes requested by an update call.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionUpdate {
    pub capability: Option<PushCapability>,
    pub add_locations: Vec<String>,
    pub remove_locations: Vec<String>,
}

pub struct SubscriptionRegistry<S> {
    store: S,
    buckets: HashMap<String, RwLock<Snapshot>>,
    writes: tokio::sync::Mutex<()>,
}

impl<S: SubscriptionStore> SubscriptionRegistry<S> {
    /// An empty registry with one bucket per configured location.
    pub fn new<'a>(store: S, locations: impl IntoIterator<Item = &'a str>) -> Self {
        let buckets = locations
            .into_iter()
            .map(|key| (key.to_string(), RwLock::new(Arc::new(Vec::new()))))
            .collect();
        Self {
            store,
            buckets,
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Builds the registry and fills the index from every persisted
    /// subscription.
    pub async fn load<'a>(
        store: S,
        locations: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, RegistryError> {
        let registry = Self::new(store, locations);
        let persisted = registry.store.list_subscriptions().await?;
        let count = persisted.len();
        for subscription in persisted {
            let subscription = Arc::new(subscription);
            for location in &subscription.locations {
                registry.upsert_into(location, &subscription);
            }
        }
        info!(count, "loaded subscriptions");
        Ok(registry)
    }

    pub async fn register(
        &self,
        capability: PushCapability,
        locations: Vec<String>,
    ) -> Result<Subscription, RegistryError> {
        let _writing = self.writes.lock().await;
        let subscription = Subscription {
            id: Uuid::now_v7(),
            capability,
            locations: normalize_locations(locations),
        };
        self.store.upsert_subscription(&subscription).await?;

        let shared = Arc::new(subscription.clone());
        for location in &shared.locations {
            self.upsert_into(location, &shared);
        }
        Ok(subscription)
    }

    /// Read-modify-write against the persisted record. Concurrent updates of
    /// the same id apply one after the other, each on top of the last.
    ///
    /// A subscription whose location set ends up empty is deleted; the
    /// returned value then carries an empty `locations`.
    pub async fn update(
        &self,
        id: Uuid,
        update: SubscriptionUpdate,
    ) -> Result<Subscription, RegistryError> {
        let _writing = self.writes.lock().await;
        let existing = self
            .store
            .load_subscription(id)
            .await?
            .ok_or(RegistryError::NotFound(id))?;

        let locations = merge_locations(
            &existing.locations,
            &update.add_locations,
            &update.remove_locations,
        );
        let updated = Subscription {
            id,
            capability: update.capability.unwrap_or(existing.capability),
            locations,
        };

        if updated.locations.is_empty() {
            self.store.delete_subscription(id).await?;
            info!(%id, "subscription left without locations; deleted");
        } else {
            self.store.upsert_subscription(&updated).await?;
        }

        let shared = Arc::new(updated.clone());
        for location in &existing.locations {
            if !shared.covers(location) {
                self.remove_from(location, id);
            }
        }
        for location in &shared.locations {
            self.upsert_into(location, &shared);
        }
        Ok(updated)
    }

    pub async fn remove(&self, id: Uuid) -> Result<(), RegistryError> {
        let _writing = self.writes.lock().await;
        let existing = self.store.load_subscription(id).await?;
        if !self.store.delete_subscription(id).await? {
            return Err(RegistryError::NotFound(id));
        }

        match existing {
            Some(existing) => {
                for location in &existing.locations {
                    self.remove_from(location, id);
                }
            }
            None => {
                for location in self.buckets.keys() {
                    self.remove_from(location, id);
                }
            }
        }
        Ok(())
    }

    /// The subscribers of `location` as of this call. The snapshot is never
    /// mutated afterwards.
    pub fn subscribers_of(&self, location: &str) -> Snapshot {
        match self.buckets.get(location) {
            Some(bucket) => Arc::clone(&bucket.read().expect("registry bucket lock")),
            None => Arc::new(Vec::new()),
        }
    }

    pub fn subscriber_count(&self, location: &str) -> usize {
        self.buckets
            .get(location)
            .map(|bucket| bucket.read().expect("registry bucket lock").len())
            .unwrap_or(0)
    }

    fn upsert_into(&self, location: &str, subscription: &Arc<Subscription>) {
        let Some(bucket) = self.buckets.get(location) else {
            warn!(location, id = %subscription.id, "ignoring unknown location");
            return;
        };
        let mut guard = bucket.write().expect("registry bucket lock");
        let mut next: Vec<Arc<Subscription>> = guard.as_ref().clone();
        match next.iter_mut().find(|s| s.id == subscription.id) {
            Some(slot) => *slot = Arc::clone(subscription),
            None => next.push(Arc::clone(subscription)),
        }
        *guard = Arc::new(next);
    }

    fn remove_from(&self, location: &str, id: Uuid) {
        let Some(bucket) = self.buckets.get(location) else {
            return;
        };
        let mut guard = bucket.write().expect("registry bucket lock");
        if guard.iter().any(|s| s.id == id) {
            let next: Vec<Arc<Subscription>> =
                guard.iter().filter(|s| s.id != id).cloned().collect();
            *guard = Arc::new(next);
        }
    }
}
