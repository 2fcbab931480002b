//! Catalog entity types
//!
//! The gateway does not own the catalog; these are the shapes it receives
//! from the catalog collaborator and serves back to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ============================================================================
// ENTITY TYPE
// ============================================================================

/// Entity type discriminator for catalog content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Track,
    Video,
    Podcast,
    Episode,
    Audiobook,
    Book,
    Image,
}

impl EntityType {
    /// All entity types, in route-registration order.
    pub const ALL: [EntityType; 7] = [
        EntityType::Track,
        EntityType::Video,
        EntityType::Podcast,
        EntityType::Episode,
        EntityType::Audiobook,
        EntityType::Book,
        EntityType::Image,
    ];

    /// Plural URL path segment for this entity type (`/v1/{segment}/:id`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            EntityType::Track => "tracks",
            EntityType::Video => "videos",
            EntityType::Podcast => "podcasts",
            EntityType::Episode => "episodes",
            EntityType::Audiobook => "audiobooks",
            EntityType::Book => "books",
            EntityType::Image => "images",
        }
    }

    /// Parse a plural URL path segment back into an entity type.
    pub fn from_path_segment(segment: &str) -> Result<Self, CoreError> {
        match segment {
            "tracks" => Ok(EntityType::Track),
            "videos" => Ok(EntityType::Video),
            "podcasts" => Ok(EntityType::Podcast),
            "episodes" => Ok(EntityType::Episode),
            "audiobooks" => Ok(EntityType::Audiobook),
            "books" => Ok(EntityType::Book),
            "images" => Ok(EntityType::Image),
            other => Err(CoreError::UnknownEntityType(other.to_string())),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Track => "track",
            EntityType::Video => "video",
            EntityType::Podcast => "podcast",
            EntityType::Episode => "episode",
            EntityType::Audiobook => "audiobook",
            EntityType::Book => "book",
            EntityType::Image => "image",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for EntityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(EntityType::Track),
            "video" => Ok(EntityType::Video),
            "podcast" => Ok(EntityType::Podcast),
            "episode" => Ok(EntityType::Episode),
            "audiobook" => Ok(EntityType::Audiobook),
            "book" => Ok(EntityType::Book),
            "image" => Ok(EntityType::Image),
            other => Err(CoreError::UnknownEntityType(other.to_string())),
        }
    }
}

// ============================================================================
// CATALOG ENTITY
// ============================================================================

/// A versioned catalog entity as supplied by the catalog collaborator.
///
/// `version` is monotonically non-decreasing per (entity_type, id) in a
/// well-behaved source; the gateway trusts the source and does not enforce
/// this itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: String,
    pub entity_type: EntityType,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
    /// Tombstone flag: deleted entities stay in the change history so the
    /// feed can emit delete events.
    #[serde(default)]
    pub deleted: bool,
    pub data: serde_json::Value,
}

impl CatalogEntity {
    pub fn new(
        id: impl Into<String>,
        entity_type: EntityType,
        version: i64,
        updated_at: DateTime<Utc>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type,
            version,
            updated_at,
            deleted: false,
            data,
        }
    }
}
