use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::AppState;
use crate::api::ApiResponse;
use crate::error::AppError;
use crate::ingest::TriggerError;

pub fn status_routes() -> Router<AppState> {
    Router::new().route("/", get(update_status))
}

pub fn trigger_routes() -> Router<AppState> {
    Router::new().route("/update", post(trigger_update))
}

async fn update_status(State(state): State<AppState>) -> Response {
    let last_run = state.scheduler.last_run().await;
    ApiResponse::success(json!({
        "phase": state.scheduler.phase(),
        "running": state.scheduler.is_running(),
        "last_run": last_run,
    }))
    .into_response()
}

/// Compare without short-circuiting on the first differing byte
fn same_secret(given: &str, expected: &str) -> bool {
    given.len() == expected.len()
        && given
            .bytes()
            .zip(expected.bytes())
            .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// `Authorization: Token <secret>` matching the configured token
fn authorized(headers: &HeaderMap, token: Option<&str>) -> bool {
    let Some(expected) = token else {
        return false;
    };

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Token "))
        .is_some_and(|given| same_secret(given.trim(), expected))
}

async fn trigger_update(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if !authorized(&headers, state.update_token.as_deref()) {
        tracing::warn!("Rejected update trigger with missing or wrong token");
        return Err(AppError::Forbidden);
    }

    match state.scheduler.dispatch(state.shutdown.clone()) {
        Ok(_) => {
            tracing::info!("Update run dispatched over HTTP");
            Ok(ApiResponse::success(json!({ "status": "started" })).with_status(StatusCode::ACCEPTED))
        },
        Err(e @ TriggerError::AlreadyRunning) => Err(AppError::Conflict(e.to_string())),
        Err(TriggerError::Update(e)) => {
            tracing::error!(error = %e, "Update trigger failed");
            Err(AppError::Conflict(e.to_string()))
        },
    }
}
