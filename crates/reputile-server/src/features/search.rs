use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::TryStreamExt;
use reputile_ingest::Entry;
use serde::Deserialize;
use serde_json::json;

use super::AppState;
use crate::api::ApiResponse;
use crate::error::AppError;
use crate::store::{EntryFilter, IpNet};

pub fn search_routes() -> Router<AppState> {
    Router::new().route("/", get(search))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Interpret a search term as an address, a network or a domain
pub fn search_filter(term: &str) -> Option<(&'static str, EntryFilter)> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }

    let parsed = match term.parse::<IpNet>() {
        Ok(net) if term.contains('/') => ("network", EntryFilter::new().with_ip(net)),
        Ok(net) => ("ip", EntryFilter::new().with_ip(net)),
        Err(_) => ("domain", EntryFilter::new().with_domain(term)),
    };
    Some(parsed)
}

#[tracing::instrument(skip(state, query), fields(q = %query.q))]
async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let (kind, filter) = search_filter(&query.q)
        .ok_or_else(|| AppError::BadRequest("Query parameter 'q' is required".to_string()))?;

    let entries: Vec<Entry> = state.store.find(&filter).try_collect().await?;
    tracing::debug!(kind, count = entries.len(), "Search completed");

    let meta = json!({ "query": query.q.trim(), "kind": kind, "count": entries.len() });
    Ok(ApiResponse::success_with_meta(entries, meta).into_response())
}
