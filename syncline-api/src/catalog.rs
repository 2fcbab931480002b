//! Catalog collaborator
//!
//! The gateway does not own catalog storage; it consumes it through the
//! narrow [`CatalogSource`] trait. The in-memory implementation here backs
//! development and tests, and doubles as the change-feed source: every
//! mutation keeps the entity's latest state, and the feed walks entities in
//! a stable order so identical windows replay identically.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use thiserror::Error;

use syncline_core::{CatalogEntity, EntityType, SyncCursor, UpdateEvent};

// ============================================================================
// ERRORS
// ============================================================================

/// Faults raised by a catalog backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("catalog query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("catalog state lock poisoned")]
    LockPoisoned,
}

/// Result type alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

// ============================================================================
// CATALOG SOURCE TRAIT
// ============================================================================

/// Read-only view of the catalog consumed by the gateway.
///
/// `update_events` must be deterministic: replaying an identical
/// `(since, until, limit)` window against an unchanged source yields an
/// identical event list, which is what makes client retries safe.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the live (non-deleted) entity with the given type and id.
    async fn entity(
        &self,
        entity_type: EntityType,
        id: &str,
    ) -> CatalogResult<Option<CatalogEntity>>;

    /// Case-insensitive substring search over entity payloads, optionally
    /// narrowed to one entity type, paged by `(page, size)`.
    async fn search(
        &self,
        query: &str,
        entity_type: Option<EntityType>,
        page: usize,
        size: usize,
    ) -> CatalogResult<Vec<CatalogEntity>>;

    /// Latest state of entities last modified inside the cursor window,
    /// in stable source order, truncated at `cursor.limit`.
    ///
    /// Truncation caveat: when more than `limit` entities qualify, events
    /// past the cap are not represented by any cursor value; the protocol's
    /// `next_since` still advances to `until`.
    async fn update_events(&self, cursor: &SyncCursor) -> CatalogResult<Vec<UpdateEvent>>;

    /// Connectivity probe for readiness checks.
    async fn health_check(&self) -> CatalogResult<()>;
}

// ============================================================================
// IN-MEMORY CATALOG
// ============================================================================

/// Process-local catalog used for development and tests.
///
/// Entities live in an ordered map keyed by (type, id): iteration order is
/// the key order, which is stable across calls and therefore satisfies the
/// feed's deterministic-replay requirement.
#[derive(Default)]
pub struct InMemoryCatalog {
    entities: RwLock<BTreeMap<(EntityType, String), CatalogEntity>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity, recording its latest state.
    pub fn upsert(&self, entity: CatalogEntity) {
        if let Ok(mut entities) = self.entities.write() {
            entities.insert((entity.entity_type, entity.id.clone()), entity);
        }
    }

    /// Tombstone an entity: bump version, stamp `updated_at`, keep it in
    /// the map so the change feed can emit the delete event.
    pub fn delete(&self, entity_type: EntityType, id: &str, at: DateTime<Utc>) {
        if let Ok(mut entities) = self.entities.write() {
            if let Some(entity) = entities.get_mut(&(entity_type, id.to_string())) {
                entity.deleted = true;
                entity.version += 1;
                entity.updated_at = at;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entities.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seed a small demo catalog: 20 entities with update times spread
    /// evenly across one hour starting at 2024-01-01T00:00:00Z.
    pub fn seed_demo(&self) {
        let base: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().expect("seed timestamp");
        for i in 0..20i64 {
            let entity_type = EntityType::ALL[(i % EntityType::ALL.len() as i64) as usize];
            self.upsert(CatalogEntity::new(
                format!("{}-{:03}", entity_type, i),
                entity_type,
                1,
                base + ChronoDuration::minutes(i * 3),
                serde_json::json!({
                    "title": format!("Demo {} {}", entity_type, i),
                    "position": i,
                }),
            ));
        }
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn entity(
        &self,
        entity_type: EntityType,
        id: &str,
    ) -> CatalogResult<Option<CatalogEntity>> {
        let entities = self.entities.read().map_err(|_| CatalogError::LockPoisoned)?;
        Ok(entities
            .get(&(entity_type, id.to_string()))
            .filter(|entity| !entity.deleted)
            .cloned())
    }

    async fn search(
        &self,
        query: &str,
        entity_type: Option<EntityType>,
        page: usize,
        size: usize,
    ) -> CatalogResult<Vec<CatalogEntity>> {
        let needle = query.to_lowercase();
        let entities = self.entities.read().map_err(|_| CatalogError::LockPoisoned)?;

        Ok(entities
            .values()
            .filter(|entity| !entity.deleted)
            .filter(|entity| entity_type.map_or(true, |t| entity.entity_type == t))
            .filter(|entity| entity.data.to_string().to_lowercase().contains(&needle))
            .skip(page.saturating_mul(size))
            .take(size)
            .cloned()
            .collect())
    }

    async fn update_events(&self, cursor: &SyncCursor) -> CatalogResult<Vec<UpdateEvent>> {
        let entities = self.entities.read().map_err(|_| CatalogError::LockPoisoned)?;

        Ok(entities
            .values()
            .filter(|entity| cursor.contains(entity.updated_at))
            .take(cursor.limit)
            .map(UpdateEvent::from_entity)
            .collect())
    }

    async fn health_check(&self) -> CatalogResult<()> {
        self.entities.read().map_err(|_| CatalogError::LockPoisoned)?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use syncline_core::UpdateOp;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("timestamp")
    }

    fn catalog_with_demo() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.seed_demo();
        catalog
    }

    fn hour_cursor(limit: usize) -> SyncCursor {
        SyncCursor::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T01:00:00Z"),
            Some(limit),
        )
        .expect("cursor")
    }

    #[tokio::test]
    async fn test_entity_lookup_hit_and_miss() {
        let catalog = catalog_with_demo();

        let found = catalog
            .entity(EntityType::Track, "track-000")
            .await
            .expect("catalog ok");
        assert!(found.is_some());

        let missing = catalog
            .entity(EntityType::Track, "track-999")
            .await
            .expect("catalog ok");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_deleted_entity_hidden_from_lookup_but_feeds_delete_event() {
        let catalog = catalog_with_demo();
        catalog.delete(EntityType::Track, "track-000", ts("2024-01-01T00:30:00Z"));

        let found = catalog
            .entity(EntityType::Track, "track-000")
            .await
            .expect("catalog ok");
        assert!(found.is_none());

        let events = catalog
            .update_events(&hour_cursor(500))
            .await
            .expect("catalog ok");
        let delete = events
            .iter()
            .find(|e| e.id == "track-000")
            .expect("delete event present");
        assert_eq!(delete.op, UpdateOp::Delete);
        assert_eq!(delete.version, 2);
    }

    #[tokio::test]
    async fn test_update_events_windowed_and_limited() {
        let catalog = catalog_with_demo();
        let events = catalog
            .update_events(&hour_cursor(10))
            .await
            .expect("catalog ok");

        assert_eq!(events.len(), 10);
        let cursor = hour_cursor(10);
        for event in &events {
            assert!(cursor.contains(event.updated_at));
        }
    }

    #[tokio::test]
    async fn test_update_events_replay_is_identical() {
        let catalog = catalog_with_demo();
        let cursor = hour_cursor(10);

        let first = catalog.update_events(&cursor).await.expect("catalog ok");
        let second = catalog.update_events(&cursor).await.expect("catalog ok");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_update_events_excludes_out_of_window() {
        let catalog = catalog_with_demo();
        let cursor = SyncCursor::new(
            ts("2024-01-01T01:00:00Z"),
            ts("2024-01-01T02:00:00Z"),
            Some(500),
        )
        .expect("cursor");

        // Seed spreads all 20 entities across [00:00, 01:00).
        let events = catalog.update_events(&cursor).await.expect("catalog ok");
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_search_filters_type_and_pages() {
        let catalog = catalog_with_demo();

        let all = catalog
            .search("demo", None, 0, 50)
            .await
            .expect("catalog ok");
        assert_eq!(all.len(), 20);

        let tracks = catalog
            .search("demo", Some(EntityType::Track), 0, 50)
            .await
            .expect("catalog ok");
        assert!(tracks.iter().all(|e| e.entity_type == EntityType::Track));
        assert!(!tracks.is_empty());

        let page0 = catalog.search("demo", None, 0, 5).await.expect("catalog ok");
        let page1 = catalog.search("demo", None, 1, 5).await.expect("catalog ok");
        assert_eq!(page0.len(), 5);
        assert_eq!(page1.len(), 5);
        assert_ne!(page0[0].id, page1[0].id);
    }

    #[tokio::test]
    async fn test_health_check() {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.health_check().await.is_ok());
    }
}
