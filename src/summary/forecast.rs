//! Trimming a met.no `locationforecast` document down to one civil day.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("forecast is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("forecast has no properties.timeseries array")]
    MissingTimeseries,
    #[error("forecast has no entries for {0}")]
    NoEntries(NaiveDate),
}

/// Keeps only the timeseries entries whose timestamp falls on `date` in
/// `tz`. Everything outside `properties.timeseries` is passed through.
pub fn filter_to_local_day(raw: &[u8], tz: Tz, date: NaiveDate) -> Result<String, ForecastError> {
    let mut document: Value = serde_json::from_slice(raw)?;
    let timeseries = document
        .pointer_mut("/properties/timeseries")
        .and_then(Value::as_array_mut)
        .ok_or(ForecastError::MissingTimeseries)?;

    timeseries.retain(|entry| entry_date(entry, tz) == Some(date));
    if timeseries.is_empty() {
        return Err(ForecastError::NoEntries(date));
    }

    Ok(serde_json::to_string(&document)?)
}

fn entry_date(entry: &Value, tz: Tz) -> Option<NaiveDate> {
    let time = entry.get("time")?.as_str()?;
    let instant = DateTime::parse_from_rfc3339(time).ok()?;
    Some(instant.with_timezone(&tz).date_naive())
}
