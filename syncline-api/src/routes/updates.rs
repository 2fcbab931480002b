//! Change Feed Endpoint
//!
//! `GET /v1/updates?since&until&limit` serves a page of update events for
//! the half-open window `[since, until)`. The response carries
//! `next_since = until`, which clients feed back as `since` on their next
//! poll; replaying the same window against an unchanged catalog yields a
//! byte-identical response (and therefore the same ETag).

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use syncline_core::{weak_etag_from, SyncCursor};

use crate::conditional::conditional_json;
use crate::error::{ApiError, ApiResult};
use crate::fetch::{guarded_fetch, CIRCUIT_UPDATES};
use crate::state::AppState;
use crate::types::{UpdatesParams, UpdatesResponse};

fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    raw.parse().map_err(|_| {
        ApiError::invalid_input(format!(
            "Invalid '{}' timestamp: expected RFC 3339, got '{}'",
            name, raw
        ))
    })
}

/// GET /v1/updates - page of the incremental change feed.
pub async fn get_updates(
    State(state): State<AppState>,
    Query(params): Query<UpdatesParams>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let since = match params.since.as_deref() {
        Some(raw) => parse_timestamp("since", raw)?,
        None => return Err(ApiError::missing_parameter("since")),
    };
    let until = match params.until.as_deref() {
        Some(raw) => parse_timestamp("until", raw)?,
        None => Utc::now(),
    };

    let cursor = SyncCursor::new(since, until, params.limit)?;

    let catalog = Arc::clone(&state.catalog);
    let events = guarded_fetch(&state, CIRCUIT_UPDATES, "update_events", move || {
        let catalog = Arc::clone(&catalog);
        async move { catalog.update_events(&cursor).await }
    })
    .await?;

    let body = UpdatesResponse {
        since: cursor.since,
        until: cursor.until,
        events,
        next_since: cursor.next_since(),
    };

    let etag = weak_etag_from(&serde_json::to_value(&body)?);
    Ok(conditional_json(&headers, &etag, &body))
}

/// Create the change-feed router.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/updates", get(get_updates))
}
