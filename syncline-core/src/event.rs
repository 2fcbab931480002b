//! Change-feed event types
//!
//! `UpdateEvent` is the immutable value object emitted by the change feed.
//! Events are produced per request and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{CatalogEntity, EntityType};

/// Operation carried by an update event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOp {
    Upsert,
    Delete,
}

/// A single versioned change to a catalog entity.
///
/// Serialized in camelCase (`entityType`, `updatedAt`) to match the sync
/// protocol wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    pub op: UpdateOp,
    pub entity_type: EntityType,
    pub id: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl UpdateEvent {
    /// Derive the event describing an entity's latest state: deleted
    /// entities become delete events, everything else an upsert.
    pub fn from_entity(entity: &CatalogEntity) -> Self {
        Self {
            op: if entity.deleted {
                UpdateOp::Delete
            } else {
                UpdateOp::Upsert
            },
            entity_type: entity.entity_type,
            id: entity.id.clone(),
            version: entity.version,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(deleted: bool) -> CatalogEntity {
        CatalogEntity {
            id: "e1".to_string(),
            entity_type: EntityType::Episode,
            version: 3,
            updated_at: "2024-01-01T00:30:00Z".parse().expect("timestamp"),
            deleted,
            data: serde_json::json!({"title": "Ep 3"}),
        }
    }

    #[test]
    fn test_from_entity_upsert() {
        let event = UpdateEvent::from_entity(&entity(false));
        assert_eq!(event.op, UpdateOp::Upsert);
        assert_eq!(event.id, "e1");
        assert_eq!(event.version, 3);
    }

    #[test]
    fn test_from_entity_delete() {
        let event = UpdateEvent::from_entity(&entity(true));
        assert_eq!(event.op, UpdateOp::Delete);
    }

    #[test]
    fn test_event_wire_format() {
        let event = UpdateEvent::from_entity(&entity(false));
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"op\":\"upsert\""));
        assert!(json.contains("\"entityType\":\"episode\""));
        assert!(json.contains("\"updatedAt\""));
    }
}
