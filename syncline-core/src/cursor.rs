//! Sync cursor for the incremental change feed
//!
//! A cursor is a half-open time window `[since, until)` plus an event cap.
//! Each feed response carries `next_since = until`, which the client feeds
//! back as `since` on its next poll.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CursorError;

/// Hard cap on events per feed page.
pub const MAX_SYNC_LIMIT: usize = 500;

/// Page size when the client does not ask for one.
pub const DEFAULT_SYNC_LIMIT: usize = 100;

/// Validated change-feed window.
///
/// Invariant: `since <= until`. Every event returned for this cursor
/// satisfies `since <= updated_at < until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub limit: usize,
}

impl SyncCursor {
    /// Build a cursor, validating the window and clamping the limit.
    ///
    /// `limit = None` or `Some(0)` selects [`DEFAULT_SYNC_LIMIT`]; anything
    /// above [`MAX_SYNC_LIMIT`] is clamped down rather than rejected.
    pub fn new(
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Self, CursorError> {
        if since > until {
            return Err(CursorError::InvertedWindow {
                since: since.to_rfc3339(),
                until: until.to_rfc3339(),
            });
        }

        let limit = match limit {
            None | Some(0) => DEFAULT_SYNC_LIMIT,
            Some(n) => n.min(MAX_SYNC_LIMIT),
        };

        Ok(Self { since, until, limit })
    }

    /// Whether a timestamp falls inside the half-open window.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.since <= at && at < self.until
    }

    /// The watermark the client must use as `since` on its next poll.
    pub fn next_since(&self) -> DateTime<Utc> {
        self.until
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("timestamp")
    }

    #[test]
    fn test_cursor_valid_window() {
        let cursor = SyncCursor::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T01:00:00Z"),
            Some(10),
        )
        .expect("valid cursor");
        assert_eq!(cursor.limit, 10);
        assert_eq!(cursor.next_since(), ts("2024-01-01T01:00:00Z"));
    }

    #[test]
    fn test_cursor_rejects_inverted_window() {
        let err = SyncCursor::new(
            ts("2024-01-01T01:00:00Z"),
            ts("2024-01-01T00:00:00Z"),
            None,
        )
        .expect_err("inverted window");
        assert!(matches!(err, CursorError::InvertedWindow { .. }));
    }

    #[test]
    fn test_cursor_empty_window_is_valid() {
        let at = ts("2024-01-01T00:00:00Z");
        let cursor = SyncCursor::new(at, at, None).expect("empty window");
        assert!(!cursor.contains(at));
    }

    #[test]
    fn test_cursor_limit_defaults_and_clamps() {
        let since = ts("2024-01-01T00:00:00Z");
        let until = ts("2024-01-02T00:00:00Z");

        let cursor = SyncCursor::new(since, until, None).expect("cursor");
        assert_eq!(cursor.limit, DEFAULT_SYNC_LIMIT);

        let cursor = SyncCursor::new(since, until, Some(0)).expect("cursor");
        assert_eq!(cursor.limit, DEFAULT_SYNC_LIMIT);

        let cursor = SyncCursor::new(since, until, Some(10_000)).expect("cursor");
        assert_eq!(cursor.limit, MAX_SYNC_LIMIT);
    }

    #[test]
    fn test_cursor_window_is_half_open() {
        let cursor = SyncCursor::new(
            ts("2024-01-01T00:00:00Z"),
            ts("2024-01-01T01:00:00Z"),
            None,
        )
        .expect("cursor");

        assert!(cursor.contains(ts("2024-01-01T00:00:00Z")));
        assert!(cursor.contains(ts("2024-01-01T00:59:59Z")));
        assert!(!cursor.contains(ts("2024-01-01T01:00:00Z")));
    }
}
