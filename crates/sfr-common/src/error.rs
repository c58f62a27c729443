//! Error types for SFR

use thiserror::Error;

/// Result type alias for SFR operations
pub type Result<T> = std::result::Result<T, SfrError>;

/// Main error type for SFR
#[derive(Error, Debug)]
pub enum SfrError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SfrError {
    /// Stable machine-readable error code used in API payloads and logs.
    pub fn code(&self) -> &'static str {
        match self {
            SfrError::Io(_) => "IO_ERROR",
            SfrError::Serialization(_) => "SERIALIZATION_ERROR",
            SfrError::Validation(_) => "VALIDATION_ERROR",
            SfrError::NotFound(_) => "NOT_FOUND",
            SfrError::Conflict(_) => "CONFLICT",
            SfrError::Config(_) => "CONFIG_ERROR",
            SfrError::Store(_) => "STORE_ERROR",
            SfrError::Parse(_) => "PARSE_ERROR",
            SfrError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(SfrError::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(SfrError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(SfrError::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(SfrError::Store("x".into()).code(), "STORE_ERROR");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = SfrError::NotFound("HZCR123".into());
        assert_eq!(err.to_string(), "Not found: HZCR123");
    }
}
