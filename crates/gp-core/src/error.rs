//! Error types for gofpower

use std::path::PathBuf;

use thiserror::Error;

/// gofpower error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error: unknown test mode, malformed distribution
    /// parameters, batch sizes the selected bootstrap cannot handle.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical error: non-positive densities under a log, covariance
    /// breakdown during fitting, non-finite statistics.
    #[error("Computation error: {0}")]
    Computation(String),

    /// A persisted dataset exists but cannot be trusted.
    #[error("Corrupt dataset cache at {}: {reason}", path.display())]
    CacheCorrupt {
        /// Artifact location.
        path: PathBuf,
        /// What failed during verification.
        reason: String,
    },

    /// Binary (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// `true` for configuration errors.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// `true` for numerical errors.
    pub fn is_computation(&self) -> bool {
        matches!(self, Error::Computation(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_corrupt_message_names_path() {
        let err = Error::CacheCorrupt {
            path: PathBuf::from("/tmp/processed/GMM_abc.bin"),
            reason: "checksum mismatch".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("GMM_abc.bin"), "{msg}");
        assert!(msg.contains("checksum mismatch"), "{msg}");
    }

    fn kind(err: &Error) -> &'static str {
        match err {
            Error::Io(_) => "io",
            Error::Validation(_) => "validation",
            Error::Computation(_) => "computation",
            Error::CacheCorrupt { .. } => "cache-corrupt",
            Error::Serialization(_) => "serialization",
        }
    }

    #[test]
    fn test_every_variant_is_reachable() {
        let io: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(kind(&io), "io");
        assert_eq!(kind(&Error::Serialization("bincode".into())), "serialization");
        let corrupt = Error::CacheCorrupt { path: PathBuf::from("x.bin"), reason: "short".into() };
        assert_eq!(kind(&corrupt), "cache-corrupt");
    }

    #[test]
    fn test_kind_predicates() {
        assert!(Error::Validation("x".into()).is_validation());
        assert!(!Error::Validation("x".into()).is_computation());
        assert!(Error::Computation("x".into()).is_computation());
    }
}
