use axum::{
    extract::{RawQuery, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::{AppState, DOWNLOADS_KEY, SIZE_KEY};
use crate::error::AppError;
use crate::export::{first_values, write_csv};
use crate::store::EntryFilter;

pub fn lists_routes() -> Router<AppState> {
    Router::new().route("/database.txt", get(database_list))
}

/// Stored entries matching the query string, as CSV
#[tracing::instrument(skip(state, query))]
async fn database_list(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let query = query.unwrap_or_default();
    let filter = EntryFilter::from_map(&first_values(&query))?;

    let body: String = state
        .cache
        .get_or_compute(&format!("list:{}", query), || async {
            let body = write_csv(state.store.find(&filter)).await?;
            if let Err(e) = state.cache.set_counter(SIZE_KEY, body.len() as i64).await {
                tracing::warn!(error = %e, "Failed to record list size");
            }
            Ok::<_, AppError>(body)
        })
        .await?;

    if let Err(e) = state.cache.increment(DOWNLOADS_KEY).await {
        tracing::warn!(error = %e, "Failed to count download");
    }

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}
