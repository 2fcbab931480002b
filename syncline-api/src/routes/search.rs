//! Catalog Search Endpoint
//!
//! `GET /v1/search?q&type&page&size` runs a paged catalog search. `q` is
//! required and non-empty; `type` optionally narrows to one collection;
//! `size` is capped at 100. Like every other read route, the response
//! carries a weak ETag over its body and honors `If-None-Match`.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;

use syncline_core::{weak_etag_from, EntityType};

use crate::conditional::conditional_json;
use crate::error::{ApiError, ApiResult};
use crate::fetch::{guarded_fetch, CIRCUIT_SEARCH};
use crate::state::AppState;
use crate::types::{SearchParams, SearchResponse, SearchResult};

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// GET /v1/search - paged catalog search.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::missing_parameter("q"))?
        .to_string();

    let entity_type = match params.entity_type.as_deref() {
        Some(raw) => Some(raw.parse::<EntityType>().map_err(|_| {
            ApiError::invalid_input(format!("Unknown entity type '{}'", raw))
        })?),
        None => None,
    };

    let page = params.page.unwrap_or(0);
    let size = params.size.unwrap_or(DEFAULT_PAGE_SIZE);
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(ApiError::invalid_range("size", 1, MAX_PAGE_SIZE));
    }

    let catalog = Arc::clone(&state.catalog);
    let needle = query.clone();
    let entities = guarded_fetch(&state, CIRCUIT_SEARCH, "search", move || {
        let catalog = Arc::clone(&catalog);
        let needle = needle.clone();
        async move { catalog.search(&needle, entity_type, page, size).await }
    })
    .await?;

    let body = SearchResponse {
        q: query,
        entity_type,
        page,
        size,
        results: entities.iter().map(SearchResult::from).collect(),
    };

    let etag = weak_etag_from(&serde_json::to_value(&body)?);
    Ok(conditional_json(&headers, &etag, &body))
}

/// Create the search router.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/search", get(search))
}
