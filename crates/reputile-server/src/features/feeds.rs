use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;

use super::{AppState, DOWNLOADS_KEY, SIZE_KEY};
use crate::api::ApiResponse;
use crate::error::AppError;

pub fn feeds_routes() -> Router<AppState> {
    Router::new().route("/", get(list_feeds))
}

#[derive(Debug, Serialize)]
struct FeedSummary<'a> {
    key: &'a str,
    name: &'a str,
    info_url: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct FeedStats {
    entries: i64,
    sources: i64,
    downloads: i64,
    /// Bytes in the most recently built list
    size: i64,
}

#[tracing::instrument(skip(state))]
async fn list_feeds(State(state): State<AppState>) -> Result<Response, AppError> {
    let entries: i64 = state
        .cache
        .get_or_compute("stats:entries", || async {
            state.store.count_entries().await.map_err(AppError::from)
        })
        .await?;

    let sources: i64 = state
        .cache
        .get_or_compute("stats:sources", || async {
            state.store.count_sources().await.map_err(AppError::from)
        })
        .await?;

    let downloads = state.cache.counter(DOWNLOADS_KEY).await?;
    let size = state.cache.counter(SIZE_KEY).await?;

    let feeds: Vec<FeedSummary<'_>> = state
        .registry
        .iter()
        .map(|feed| FeedSummary {
            key: &feed.key,
            name: &feed.name,
            info_url: &feed.info_url,
            description: &feed.description,
        })
        .collect();

    let stats = FeedStats {
        entries,
        sources,
        downloads,
        size,
    };

    Ok(ApiResponse::success_with_meta(feeds, json!({ "stats": stats })).into_response())
}
