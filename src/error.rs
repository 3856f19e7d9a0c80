//! Error types for the edca library.
//!
//! Every failure of an issuance run maps onto one of these variants. The
//! `Display` text starts with the error class so that the CLI can print a
//! single diagnostic line that names what went wrong.

use std::path::Path;
use thiserror::Error;

/// The main error type for edca operations.
#[derive(Error, Debug)]
pub enum CaError {
    /// Input rejected before anything was touched (e.g. empty subject)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An authority certificate or key could not be found or read
    #[error("Not found: {0}")]
    NotFound(String),

    /// A destination directory is missing or unusable
    #[error("Path error: {0}")]
    PathError(String),

    /// A destination file already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Key, signing request or certificate generation failed
    #[error("Generation failed: {0}")]
    GenerationError(String),

    /// The produced certificate did not pass verification
    #[error("Verification failed: {0}")]
    VerificationError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),

    /// PEM encoding/decoding error
    #[error("PEM error: {0}")]
    PemError(String),

    /// Malformed data
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CaError {
    /// Short label of the error class, used for log fields.
    pub fn class(&self) -> &'static str {
        match self {
            CaError::InvalidInput(_) => "invalid-input",
            CaError::NotFound(_) => "not-found",
            CaError::PathError(_) => "path",
            CaError::AlreadyExists(_) => "conflict",
            CaError::GenerationError(_) => "generation",
            CaError::VerificationError(_) => "verification",
            CaError::StorageError(_) => "storage",
            CaError::PemError(_) => "pem",
            CaError::ParseError(_) => "parse",
            CaError::JsonError(_) => "json",
        }
    }

    pub(crate) fn already_exists(what: &str, path: &Path) -> Self {
        CaError::AlreadyExists(format!("{} '{}' already exists", what, path.display()))
    }
}

/// A specialized Result type for edca operations.
pub type Result<T> = std::result::Result<T, CaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaError::GenerationError("test error".to_string());
        assert_eq!(err.to_string(), "Generation failed: test error");
    }

    #[test]
    fn test_error_display_names_class() {
        let err = CaError::already_exists("certificate", Path::new("server.crt"));
        assert_eq!(
            err.to_string(),
            "Already exists: certificate 'server.crt' already exists"
        );
        assert_eq!(err.class(), "conflict");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CaError>();
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CaError = io.into();
        assert!(matches!(err, CaError::StorageError(_)));
        assert_eq!(err.class(), "storage");
    }
}
