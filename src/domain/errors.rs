//! Domain error types
//!
//! This module defines the error hierarchy for Veil. Errors are domain-specific and
//! don't expose third-party types; every variant maps onto one [`ErrorKind`] so that
//! batch summaries can classify failures without string matching.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Main Veil error type
///
/// This is the primary error type used throughout the library.
#[derive(Debug, Error)]
pub enum VeilError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors (bad input, illegal state transitions)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Strict mode and no policy matched the field
    #[error("No policy for field '{0}'")]
    NoPolicyForField(String),

    /// Technique operator errors
    #[error("Technique error: {0}")]
    Technique(#[from] TechniqueError),

    /// Correspondence store errors
    #[error("Correspondence store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

/// Errors raised by the technique operators
///
/// An operator only ever sees one field value, so these errors never carry
/// record context; the orchestrator attaches it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TechniqueError {
    /// The value does not have the shape the technique expects for its field type
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The technique parameters are unusable (zero bucket width, epsilon <= 0, ...)
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Correspondence store errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The backend could not be reached or failed mid-operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    /// The credential does not carry reversal rights
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Unknown pseudonym, or one without a reverse path
    #[error("Not found: {0}")]
    NotFound(String),

    /// A technique id was used with both reversible and one-way mappings
    #[error("Mapping mode conflict for technique '{0}'")]
    ModeConflict(String),

    /// Encryption, decryption or key derivation failed
    #[error("Crypto failure: {0}")]
    Crypto(String),

    /// The persistence journal could not be read or written
    #[error("Journal failure: {0}")]
    Journal(String),
}

/// Classification of failures as reported in batch summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Value doesn't match the expected shape for its technique
    InvalidFormat,
    /// Strict mode, unmatched field
    NoPolicyForField,
    /// Correspondence store timeout or outage
    StoreUnavailable,
    /// Reverse lookup without rights
    Unauthorized,
    /// Reverse lookup on an unknown pseudonym
    NotFound,
    /// Informational: a record was intentionally dropped
    RecordSuppressed,
    /// Configuration or policy problems
    Configuration,
    /// Anything else (I/O, serialization, crypto, internal invariants)
    Internal,
}

impl VeilError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::NoPolicyForField(_) => ErrorKind::NoPolicyForField,
            Self::Technique(TechniqueError::InvalidFormat(_)) => ErrorKind::InvalidFormat,
            Self::Technique(TechniqueError::InvalidParameters(_)) => ErrorKind::Configuration,
            Self::Store(err) => err.kind(),
            Self::Validation(_) | Self::Serialization(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }
}

impl StoreError {
    /// Classify this store error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) | Self::Timeout(_) | Self::Journal(_) => {
                ErrorKind::StoreUnavailable
            }
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::ModeConflict(_) => ErrorKind::Configuration,
            Self::Crypto(_) => ErrorKind::Internal,
        }
    }

    /// Whether this failure is an outage rather than a refusal
    pub fn is_outage(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout(_) | Self::Journal(_)
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for VeilError {
    fn from(err: std::io::Error) -> Self {
        VeilError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for VeilError {
    fn from(err: serde_json::Error) -> Self {
        VeilError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for VeilError {
    fn from(err: toml::de::Error) -> Self {
        VeilError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_veil_error_display() {
        let err = VeilError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_technique_error_conversion() {
        let err: VeilError = TechniqueError::InvalidFormat("missing '@'".to_string()).into();
        assert!(matches!(err, VeilError::Technique(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn test_store_error_kinds() {
        assert_eq!(
            StoreError::Timeout(Duration::from_millis(50)).kind(),
            ErrorKind::StoreUnavailable
        );
        assert_eq!(
            StoreError::Unauthorized("no scope".into()).kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(StoreError::NotFound("p".into()).kind(), ErrorKind::NotFound);
        assert!(StoreError::Unavailable("down".into()).is_outage());
        assert!(!StoreError::NotFound("p".into()).is_outage());
    }

    #[test]
    fn test_no_policy_kind() {
        let err = VeilError::NoPolicyForField("ssn".to_string());
        assert_eq!(err.kind(), ErrorKind::NoPolicyForField);
        assert_eq!(err.to_string(), "No policy for field 'ssn'");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: VeilError = io_err.into();
        assert!(matches!(err, VeilError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: VeilError = json_err.into();
        assert!(matches!(err, VeilError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: VeilError = toml_err.into();
        assert!(matches!(err, VeilError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
