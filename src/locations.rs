use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Location {
    pub key: String,
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub tz: Tz,
}

impl Location {
    /// The civil date at `now` in this location's time zone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// First instant strictly after `now` at which the local wall clock shows
    /// `at`. Wall-clock times skipped by a DST jump fire at the first valid
    /// instant after the gap.
    pub fn next_occurrence(&self, now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
        let mut date = self.local_date(now);
        loop {
            if let Some(fire_at) = resolve_local(&self.tz, date, at)
                && fire_at > now
            {
                return fire_at;
            }
            date = date.succ_opt().unwrap_or(date);
        }
    }
}

fn resolve_local(tz: &Tz, date: NaiveDate, at: NaiveTime) -> Option<DateTime<Utc>> {
    let mut wall = date.and_time(at);
    // DST gaps are at most a couple of hours; step forward until the wall
    // clock exists again.
    for _ in 0..4 {
        if let Some(local) = tz.from_local_datetime(&wall).earliest() {
            return Some(local.with_timezone(&Utc));
        }
        wall += Duration::minutes(30);
    }
    None
}

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("unknown time zone '{zone}' for location '{key}'")]
    TimeZone { key: String, zone: String },
}

/// The configured set of locations, keyed by their stable key.
#[derive(Debug, Clone, Default)]
pub struct Locations {
    by_key: BTreeMap<String, Location>,
}

const SUPPORTED: &[(&str, f64, f64, &str, &str)] = &[
    ("london", 51.507351, -0.127758, "Europe/London", "London"),
    ("sf", 37.774929, -122.419418, "America/Los_Angeles", "San Francisco"),
    ("sj", 37.338207, -121.886330, "America/Los_Angeles", "San Jose"),
    ("la", 34.052235, -118.243683, "America/Los_Angeles", "Los Angeles"),
    ("nyc", 40.712776, -74.005974, "America/New_York", "New York City"),
    ("tokyo", 35.689487, 139.691711, "Asia/Tokyo", "Tokyo"),
    ("warsaw", 52.229675, 21.012230, "Europe/Warsaw", "Warsaw"),
    ("zurich", 47.369019, 8.538030, "Europe/Zurich", "Zurich"),
    ("berlin", 52.520008, 13.404954, "Europe/Berlin", "Berlin"),
    ("dubai", 25.204849, 55.270782, "Asia/Dubai", "Dubai"),
    ("paris", 48.864716, 2.349014, "Europe/Paris", "Paris"),
];

impl Locations {
    pub fn supported() -> Result<Self, LocationError> {
        Self::from_entries(SUPPORTED.iter().copied())
    }

    pub fn from_entries<'a, I>(entries: I) -> Result<Self, LocationError>
    where
        I: IntoIterator<Item = (&'a str, f64, f64, &'a str, &'a str)>,
    {
        let mut by_key = BTreeMap::new();
        for (key, latitude, longitude, zone, display_name) in entries {
            let tz: Tz = zone.parse().map_err(|_| LocationError::TimeZone {
                key: key.to_string(),
                zone: zone.to_string(),
            })?;
            by_key.insert(
                key.to_string(),
                Location {
                    key: key.to_string(),
                    display_name: display_name.to_string(),
                    latitude,
                    longitude,
                    tz,
                },
            );
        }
        Ok(Self { by_key })
    }

    pub fn get(&self, key: &str) -> Option<&Location> {
        self.by_key.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_key.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.by_key.values()
    }
}
