//! Logging and observability
//!
//! Structured logging through `tracing`, with a console layer and an optional
//! JSON file layer. Field values are personal data and never appear in logs;
//! when a log line must identify a value it carries its [`fingerprint`].
//!
//! # Example
//!
//! ```no_run
//! use veil::logging::init_logging;
//! use veil::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

use sha2::{Digest, Sha256};

/// Short SHA-256 fingerprint of a value, safe to log
///
/// # Example
///
/// ```
/// use veil::logging::fingerprint;
///
/// let fp = fingerprint("jane.doe@corp.com");
/// assert_eq!(fp.len(), 16);
/// assert!(!fp.contains("jane"));
/// ```
pub fn fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    format!("{digest:.16x}")
}

/// Log the start of a batch
///
/// # Example
///
/// ```no_run
/// use veil::log_batch_start;
///
/// let batch_id = uuid::Uuid::new_v4();
/// log_batch_start!(batch_id, 1000, 4);
/// ```
#[macro_export]
macro_rules! log_batch_start {
    ($batch_id:expr, $records:expr, $workers:expr) => {
        tracing::info!(
            batch_id = %$batch_id,
            records = $records,
            workers = $workers,
            "Starting batch"
        );
    };
}

/// Log the completion of a batch
///
/// # Example
///
/// ```no_run
/// use veil::log_batch_complete;
/// use std::time::Duration;
///
/// let batch_id = uuid::Uuid::new_v4();
/// log_batch_complete!(batch_id, 998, 2, Duration::from_millis(120));
/// ```
#[macro_export]
macro_rules! log_batch_complete {
    ($batch_id:expr, $transformed:expr, $dropped:expr, $duration:expr) => {
        tracing::info!(
            batch_id = %$batch_id,
            transformed = $transformed,
            dropped = $dropped,
            duration_ms = $duration.as_millis() as u64,
            "Batch completed"
        );
    };
}

/// Log a field passed through without any technique
///
/// # Example
///
/// ```no_run
/// use veil::log_passthrough;
///
/// log_passthrough!("notes", "no policy matched");
/// ```
#[macro_export]
macro_rules! log_passthrough {
    ($field:expr, $reason:expr) => {
        tracing::warn!(
            field = $field,
            reason = $reason,
            "Field passed through unchanged"
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_opaque() {
        let a = fingerprint("28045");
        assert_eq!(a, fingerprint("28045"));
        assert_ne!(a, fingerprint("28046"));
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_macros_expand() {
        let batch_id = uuid::Uuid::nil();
        crate::log_batch_start!(batch_id, 3, 2);
        crate::log_batch_complete!(batch_id, 3, 0, std::time::Duration::from_millis(5));
        crate::log_passthrough!("notes", "lenient");
    }
}
