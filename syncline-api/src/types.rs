//! Response body shapes for the sync gateway routes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use syncline_core::{CatalogEntity, EntityType, UpdateEvent};

// ============================================================================
// /v1/updates
// ============================================================================

/// Response body for `GET /v1/updates`.
///
/// `next_since` is always the window's `until`: the client feeds it back as
/// its next `since`, making the half-open windows chain without overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesResponse {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub events: Vec<UpdateEvent>,
    pub next_since: DateTime<Utc>,
}

// ============================================================================
// /v1/{entities}/:id
// ============================================================================

/// Response body for single-entity lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityResponse {
    pub id: String,
    pub version: i64,
    /// Weak ETag of `data`, duplicated in the `ETag` response header.
    pub etag: String,
    pub updated_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl EntityResponse {
    pub fn from_entity(entity: &CatalogEntity, etag: String) -> Self {
        Self {
            id: entity.id.clone(),
            version: entity.version,
            etag,
            updated_at: entity.updated_at,
            data: entity.data.clone(),
        }
    }
}

// ============================================================================
// /v1/search
// ============================================================================

/// Query parameters for `GET /v1/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

/// Response body for `GET /v1/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub q: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    pub page: usize,
    pub size: usize,
    pub results: Vec<SearchResult>,
}

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl From<&CatalogEntity> for SearchResult {
    fn from(entity: &CatalogEntity) -> Self {
        Self {
            id: entity.id.clone(),
            entity_type: entity.entity_type,
            version: entity.version,
            updated_at: entity.updated_at,
            data: entity.data.clone(),
        }
    }
}

// ============================================================================
// Query parameters for /v1/updates
// ============================================================================

/// Query parameters for `GET /v1/updates`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatesParams {
    pub since: Option<String>,
    pub until: Option<String>,
    pub limit: Option<usize>,
}
