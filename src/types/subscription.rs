use serde::Serialize;
use uuid::Uuid;

use crate::types::push::PushCapability;

/// A browser registered for summaries of one or more locations.
///
/// Serializes to the public shape `{id, locations}`; the push capability is
/// never echoed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    #[serde(skip)]
    pub capability: PushCapability,
    pub locations: Vec<String>,
}

impl Subscription {
    pub fn covers(&self, location: &str) -> bool {
        self.locations.iter().any(|l| l == location)
    }
}

/// Deduplicates location keys, keeping the order in which they first appear.
pub fn normalize_locations<I, S>(locations: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut normalized: Vec<String> = Vec::new();
    for location in locations {
        let location = location.into();
        if !normalized.contains(&location) {
            normalized.push(location);
        }
    }
    normalized
}

/// `(existing ∪ add) \ remove`, deduplicated in order of first appearance.
pub fn merge_locations(existing: &[String], add: &[String], remove: &[String]) -> Vec<String> {
    normalize_locations(
        existing
            .iter()
            .chain(add.iter())
            .filter(|location| !remove.contains(location))
            .cloned(),
    )
}
