//! Syncline Core - Domain Types
//!
//! Pure data structures and deterministic algorithms for the Syncline
//! catalog gateway. This crate has no async code and no I/O: catalog
//! entities, change-feed events, sync cursors, and the content addresser
//! used for weak ETag computation all live here.

pub mod cursor;
pub mod entity;
pub mod error;
pub mod etag;
pub mod event;

// Re-export commonly used types
pub use cursor::{SyncCursor, DEFAULT_SYNC_LIMIT, MAX_SYNC_LIMIT};
pub use entity::{CatalogEntity, EntityType};
pub use error::{CoreError, CoreResult, CursorError};
pub use etag::{stable_stringify, weak_etag_from, ETag};
pub use event::{UpdateEvent, UpdateOp};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
