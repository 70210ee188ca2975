use crate::registry::{RegistryError, SubscriptionUpdate};
use crate::state;
use crate::types::push::PushCapability;
use crate::types::subscription::{Subscription, normalize_locations};

use axum::Json;
use axum::extract::Path as AxumPath;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

/// Body of both registration calls. On update `subscription` is optional and
/// replaces the stored capability when present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegistrationRequest {
    pub(crate) subscription: Option<PushCapability>,
    #[serde(default)]
    pub(crate) locations: Vec<String>,
    #[serde(default)]
    pub(crate) remove_locations: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn registry_error(err: RegistryError) -> ApiError {
    match err {
        RegistryError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "registration not found"),
        RegistryError::Store(err) => {
            error!(error = %err, "registration store failure");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| api_error(StatusCode::BAD_REQUEST, "invalid registration id"))
}

fn ensure_known(state: &state::AppState, locations: &[String]) -> Result<(), ApiError> {
    match locations
        .iter()
        .find(|key| !state.core.locations.contains(key))
    {
        Some(unknown) => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("unsupported location '{unknown}'"),
        )),
        None => Ok(()),
    }
}

pub(crate) async fn create_registration(
    State(state): State<state::AppState>,
    body: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Json<Subscription>, ApiError> {
    let Json(request) = body.map_err(|err| api_error(StatusCode::BAD_REQUEST, err.body_text()))?;
    let capability = request
        .subscription
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing subscription"))?;
    let locations = normalize_locations(request.locations);
    if locations.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "at least one location is required",
        ));
    }
    ensure_known(&state, &locations)?;

    let subscription = state
        .core
        .registry
        .register(capability, locations)
        .await
        .map_err(registry_error)?;
    info!(id = %subscription.id, locations = %subscription.locations.join(","), "new registration");
    Ok(Json(subscription))
}

pub(crate) async fn update_registration(
    State(state): State<state::AppState>,
    AxumPath(raw_id): AxumPath<String>,
    body: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Json<Subscription>, ApiError> {
    let id = parse_id(&raw_id)?;
    let Json(request) = body.map_err(|err| api_error(StatusCode::BAD_REQUEST, err.body_text()))?;
    ensure_known(&state, &request.locations)?;

    let update = SubscriptionUpdate {
        capability: request.subscription,
        add_locations: request.locations,
        remove_locations: request.remove_locations,
    };
    let subscription = state
        .core
        .registry
        .update(id, update)
        .await
        .map_err(registry_error)?;
    info!(%id, locations = %subscription.locations.join(","), "registration updated");
    Ok(Json(subscription))
}

pub(crate) async fn delete_registration(
    State(state): State<state::AppState>,
    AxumPath(raw_id): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&raw_id)?;
    state
        .core
        .registry
        .remove(id)
        .await
        .map_err(registry_error)?;
    info!(%id, "registration deleted");
    Ok(StatusCode::NO_CONTENT)
}
