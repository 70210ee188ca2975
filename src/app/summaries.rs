use crate::state;
use crate::templates;

use axum::extract::Path as AxumPath;
use axum::extract::State;
use axum::http::StatusCode;

pub(crate) async fn index(State(state): State<state::AppState>) -> templates::IndexTemplate {
    let core = &state.core;
    let locations = core
        .locations
        .iter()
        .map(|location| templates::LocationLink {
            key: location.key.clone(),
            display_name: location.display_name.clone(),
            ready: core.cache.contains(&location.key),
        })
        .collect();
    templates::IndexTemplate { locations }
}

pub(crate) async fn summary_page(
    State(state): State<state::AppState>,
    AxumPath(key): AxumPath<String>,
) -> Result<templates::SummaryTemplate, (StatusCode, &'static str)> {
    let location = state
        .core
        .locations
        .get(&key)
        .ok_or((StatusCode::NOT_FOUND, "unknown location"))?;
    let summary = state
        .core
        .cache
        .load(&key)
        .ok_or((StatusCode::NOT_FOUND, "no summary yet"))?;

    let generated_at = summary
        .generated_at
        .with_timezone(&location.tz)
        .format("%B %-d, %H:%M %Z")
        .to_string();
    Ok(templates::SummaryTemplate {
        location_name: location.display_name.clone(),
        summary: summary.text.clone(),
        generated_at,
    })
}

pub(crate) async fn vapid_public_key(State(state): State<state::AppState>) -> String {
    state.config.vapid.public_key
}
