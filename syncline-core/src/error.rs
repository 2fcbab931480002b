//! Error types for Syncline core operations

use thiserror::Error;

/// Sync cursor validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Inverted window: since {since} is after until {until}")]
    InvertedWindow { since: String, until: String },

    #[error("Invalid timestamp for {field}: {value}")]
    InvalidTimestamp { field: String, value: String },

    #[error("Invalid limit: {value} - {reason}")]
    InvalidLimit { value: String, reason: String },
}

/// Master error type for Syncline core operations.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_error_display_inverted_window() {
        let err = CursorError::InvertedWindow {
            since: "2024-01-02T00:00:00Z".to_string(),
            until: "2024-01-01T00:00:00Z".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Inverted window"));
        assert!(msg.contains("2024-01-02"));
    }

    #[test]
    fn test_core_error_from_cursor_error() {
        let err = CoreError::from(CursorError::InvalidLimit {
            value: "-1".to_string(),
            reason: "must be positive".to_string(),
        });
        assert!(matches!(err, CoreError::Cursor(_)));
    }

    #[test]
    fn test_unknown_entity_type_display() {
        let err = CoreError::UnknownEntityType("widgets".to_string());
        assert!(format!("{}", err).contains("widgets"));
    }
}
