//! SQLite persistence for subscriptions and summaries.
//!
//! All database access goes through [`tokio_rusqlite`] so queries run on its
//! own thread instead of blocking the async runtime.

mod schema;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tracing::warn;
use uuid::Uuid;

use crate::ports::{BoxFuture, StoreError, SubscriptionStore, SummaryStore};
use crate::types::push::PushCapability;
use crate::types::subscription::Subscription;
use crate::types::summary::Summary;

use schema::SCHEMA;

/// Cloning is cheap; the connection handle is shared.
#[derive(Clone)]
pub struct SqliteStore {
    conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open(path).await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

type RawSubscription = (String, String, String);

fn encode_locations(locations: &[String]) -> String {
    locations.join(",")
}

fn decode_locations(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|location| !location.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode_subscription(raw: RawSubscription) -> Result<Subscription, StoreError> {
    let (id, locations, capability_json) = raw;
    let capability: PushCapability = serde_json::from_str(&capability_json)?;
    Ok(Subscription {
        id: Uuid::parse_str(&id)?,
        capability,
        locations: decode_locations(&locations),
    })
}

impl SubscriptionStore for SqliteStore {
    fn upsert_subscription<'a>(
        &'a self,
        subscription: &'a Subscription,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let id = subscription.id.to_string();
            let locations = encode_locations(&subscription.locations);
            let capability_json = serde_json::to_string(&subscription.capability)?;
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO subscriptions (id, locations, subscription_json)
                         VALUES (?1, ?2, ?3)
                         ON CONFLICT(id) DO UPDATE SET
                           locations = excluded.locations,
                           subscription_json = excluded.subscription_json",
                        rusqlite::params![id, locations, capability_json],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn delete_subscription(&self, id: Uuid) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move {
            let id = id.to_string();
            let deleted = self
                .conn
                .call(move |conn| {
                    let rows = conn.execute(
                        "DELETE FROM subscriptions WHERE id = ?1",
                        rusqlite::params![id],
                    )?;
                    Ok(rows)
                })
                .await?;
            Ok(deleted > 0)
        })
    }

    fn load_subscription(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Subscription>, StoreError>> {
        Box::pin(async move {
            let id = id.to_string();
            let raw: Option<RawSubscription> = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT id, locations, subscription_json
                             FROM subscriptions WHERE id = ?1",
                            rusqlite::params![id],
                            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;
            raw.map(decode_subscription).transpose()
        })
    }

    fn list_subscriptions(&self) -> BoxFuture<'_, Result<Vec<Subscription>, StoreError>> {
        Box::pin(async move {
            let rows: Vec<RawSubscription> = self
                .conn
                .call(|conn| {
                    let mut stmt =
                        conn.prepare("SELECT id, locations, subscription_json FROM subscriptions")?;
                    let rows = stmt
                        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;

            let mut subscriptions = Vec::with_capacity(rows.len());
            for raw in rows {
                let id = raw.0.clone();
                match decode_subscription(raw) {
                    Ok(subscription) => subscriptions.push(subscription),
                    Err(err) => warn!(%id, error = %err, "skipping unreadable subscription"),
                }
            }
            Ok(subscriptions)
        })
    }
}

impl SummaryStore for SqliteStore {
    fn cache_summary<'a>(&'a self, summary: &'a Summary) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let location = summary.location.clone();
            let text = summary.text.clone();
            let generated_at = summary.generated_at.to_rfc3339();
            self.conn
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO summaries (location, summary, generated_at)
                         VALUES (?1, ?2, ?3)
                         ON CONFLICT(location) DO UPDATE SET
                           summary = excluded.summary,
                           generated_at = excluded.generated_at",
                        rusqlite::params![location, text, generated_at],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn load_cached_summary<'a>(
        &'a self,
        location: &'a str,
    ) -> BoxFuture<'a, Result<Option<Summary>, StoreError>> {
        Box::pin(async move {
            let key = location.to_string();
            let row: Option<(String, String)> = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            "SELECT summary, generated_at FROM summaries WHERE location = ?1",
                            rusqlite::params![key],
                            |r| Ok((r.get(0)?, r.get(1)?)),
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            let Some((text, generated_at)) = row else {
                return Ok(None);
            };
            let generated_at = DateTime::parse_from_rfc3339(&generated_at)
                .map_err(|err| StoreError::DateParse(err.to_string()))?
                .with_timezone(&Utc);
            Ok(Some(Summary {
                location: location.to_string(),
                text,
                generated_at,
            }))
        })
    }
}
