//! # Ledger Error Types
//!
//! What callers of the engines see.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  LedgerError                                                            │
//! │  ├── Domain(CoreError)     business rejection, never retried           │
//! │  │     InsufficientStock, AlreadyVoided, OverRefund, Unauthorized, ... │
//! │  ├── TransientStorage      database stayed busy through every retry    │
//! │  ├── Storage(DbError)      anything else from SQLite                   │
//! │  └── Credential            PIN hashing failed                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use till_core::{CoreError, ValidationError};
use till_db::DbError;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Business rule rejection. Durable state is unchanged.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Lock contention outlasted the retry budget. Safe to try again later.
    #[error("Storage busy during {operation}; gave up after {attempts} attempt(s)")]
    TransientStorage { operation: String, attempts: u32 },

    /// Non-transient storage failure.
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    /// Supervisor PIN could not be hashed.
    #[error("Credential error: {0}")]
    Credential(String),
}

impl LedgerError {
    /// True for storage contention that a later attempt may get past.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Machine-readable code for the register UI.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Domain(e) => e.code(),
            LedgerError::TransientStorage { .. } => "TRANSIENT_STORAGE",
            LedgerError::Storage(e) => e.code(),
            LedgerError::Credential(_) => "CREDENTIAL_ERROR",
        }
    }

    /// The business rejection, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            LedgerError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Domain(CoreError::Validation(err))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Storage(DbError::from(err))
    }
}

// =============================================================================
// Config Error
// =============================================================================

/// Failures loading or saving `ledger.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("No config path available")]
    NoPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err: LedgerError = CoreError::AlreadyVoided { sale_id: 3 }.into();
        assert_eq!(err.code(), "ALREADY_VOIDED");
        assert_eq!(err.to_string(), "Sale 3 is already voided");

        let err = LedgerError::TransientStorage {
            operation: "create_sale".into(),
            attempts: 5,
        };
        assert_eq!(err.code(), "TRANSIENT_STORAGE");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_busy_storage_is_retryable() {
        let err: LedgerError = DbError::Busy("database is locked".into()).into();
        assert!(err.is_retryable());

        let err: LedgerError = CoreError::Unauthorized {
            supervisor: "sam".into(),
        }
        .into();
        assert!(!err.is_retryable());
        assert!(err.as_domain().is_some());
    }
}
