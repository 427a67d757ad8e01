//! # Operator Error Type
//!
//! Every failure is printed to stderr as one JSON object:
//!
//! ```json
//! { "code": "TRANSIENT_STORAGE", "message": "Storage busy during integrity_sweep; gave up after 5 attempt(s)" }
//! ```
//!
//! The `code` strings are the same ones the ledger errors expose.

use serde::Serialize;
use std::fmt;
use till_db::DbError;
use till_ledger::{ConfigError, LedgerError};

#[derive(Debug, Clone, Serialize)]
pub struct OpsError {
    /// Machine-readable error code
    pub code: &'static str,

    /// Human-readable error message
    pub message: String,
}

impl OpsError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        OpsError {
            code,
            message: message.into(),
        }
    }

    /// Bad command line.
    pub fn usage(message: impl Into<String>) -> Self {
        OpsError::new("USAGE", message)
    }

    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        OpsError::new("NOT_FOUND", format!("{} not found: {}", resource, id))
    }
}

impl fmt::Display for OpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for OpsError {}

impl From<LedgerError> for OpsError {
    fn from(err: LedgerError) -> Self {
        OpsError::new(err.code(), err.to_string())
    }
}

impl From<DbError> for OpsError {
    fn from(err: DbError) -> Self {
        OpsError::new(err.code(), err.to_string())
    }
}

impl From<ConfigError> for OpsError {
    fn from(err: ConfigError) -> Self {
        OpsError::new("CONFIG_ERROR", err.to_string())
    }
}

impl From<serde_json::Error> for OpsError {
    fn from(err: serde_json::Error) -> Self {
        OpsError::new("INTERNAL", format!("JSON encoding failed: {}", err))
    }
}

pub type OpsResult<T> = Result<T, OpsError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::CoreError;

    #[test]
    fn test_ledger_error_keeps_code() {
        let err: OpsError = LedgerError::from(CoreError::SaleNotFound(9)).into();
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "Sale not found: 9");
    }

    #[test]
    fn test_serializes_as_code_and_message() {
        let json = serde_json::to_value(OpsError::usage("missing date")).unwrap();
        assert_eq!(json["code"], "USAGE");
        assert_eq!(json["message"], "missing date");
    }
}
