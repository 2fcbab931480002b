//! Single-Entity Lookup Endpoints
//!
//! `GET /v1/{tracks|videos|podcasts|episodes|audiobooks|books|images}/:id`
//! serves the latest state of one entity. The body's `etag` field is a weak
//! hash of the entity payload alone; the `ETag` header (and `If-None-Match`
//! comparison) covers the full response body, so a version bump with
//! unchanged payload still invalidates the client's copy. Responses are
//! cached by (collection, id) with a TTL; a cache hit skips the catalog
//! call. Misses and 404s are never cached.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;

use syncline_core::{weak_etag_from, EntityType, ETag};

use crate::conditional::conditional_json;
use crate::error::{ApiError, ApiResult};
use crate::fetch::{guarded_fetch, CIRCUIT_ENTITY};
use crate::state::AppState;
use crate::telemetry::metrics;
use crate::types::EntityResponse;

fn cache_key(entity_type: EntityType, id: &str) -> String {
    format!("{}:{}", entity_type.path_segment(), id)
}

/// Validator for the conditional-response handshake: hashes the full body,
/// `etag` field included, so any visible change (version, updated_at, data)
/// produces a fresh token.
fn response_token(body: &EntityResponse) -> ApiResult<ETag> {
    Ok(weak_etag_from(&serde_json::to_value(body)?))
}

/// GET /v1/{collection}/:id - latest state of one catalog entity.
pub async fn get_entity(
    entity_type: EntityType,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let key = cache_key(entity_type, &id);

    if let Some(cached) = state.entity_cache.get(&key) {
        metrics::record_cache_lookup(true);
        let etag = response_token(&cached)?;
        return Ok(conditional_json(&headers, &etag, &cached));
    }
    metrics::record_cache_lookup(false);

    let catalog = Arc::clone(&state.catalog);
    let lookup_id = id.clone();
    let entity = guarded_fetch(&state, CIRCUIT_ENTITY, "entity_get", move || {
        let catalog = Arc::clone(&catalog);
        let id = lookup_id.clone();
        async move { catalog.entity(entity_type, &id).await }
    })
    .await?
    .ok_or_else(|| ApiError::entity_not_found(entity_type, &id))?;

    let data_etag = weak_etag_from(&entity.data);
    let body = EntityResponse::from_entity(&entity, data_etag.as_str().to_string());
    let etag = response_token(&body)?;

    state
        .entity_cache
        .set(key, body.clone(), state.config.cache_entity_ttl);

    Ok(conditional_json(&headers, &etag, &body))
}

/// Create the entity lookup router: one literal route per collection, so
/// unknown collections fall through to the router's 404.
pub fn create_router() -> Router<AppState> {
    let mut router = Router::new();
    for entity_type in EntityType::ALL {
        let path = format!("/{}/:id", entity_type.path_segment());
        router = router.route(
            &path,
            get(
                move |state: State<AppState>, id: Path<String>, headers: HeaderMap| {
                    get_entity(entity_type, state, id, headers)
                },
            ),
        );
    }
    router
}
