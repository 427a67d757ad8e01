//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError        - Business rule rejections                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  till-db errors                                                        │
//! │  └── DbError          - Storage failures (busy, constraint, trigger)   │
//! │                                                                         │
//! │  till-ledger errors                                                    │
//! │  └── LedgerError      - What callers of the engines see               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                  │
//! │                        DbError ─────┴─► LedgerError → register UI     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every rejection leaves durable state untouched, so none of these errors
//! is ever retried. Only storage contention (in till-db) is retryable.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule rejections raised by the ledger engines.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Item is not in the inventory catalog.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// A cart line (or a negative stock adjustment) exceeds the stock on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: Beer ×2, Water ×5
    ///      │
    ///      ▼
    /// Stock check inside the sale transaction: Water=3
    ///      │
    ///      ▼
    /// InsufficientStock { item: "Water", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Nothing committed, Beer stock untouched
    /// ```
    #[error("Insufficient stock for {item}: available {available}, requested {requested}")]
    InsufficientStock {
        item: String,
        available: i64,
        requested: i64,
    },

    /// Sale header does not exist.
    #[error("Sale not found: {0}")]
    SaleNotFound(i64),

    /// Line does not belong to the given sale.
    #[error("Line {line_id} not found on sale {sale_id}")]
    SaleLineNotFound { sale_id: i64, line_id: i64 },

    /// Sale was voided earlier. Repeating a void is rejected, never re-applied.
    #[error("Sale {sale_id} is already voided")]
    AlreadyVoided { sale_id: i64 },

    /// Sale already has refunds, so a full void would restore those units twice.
    #[error("Sale {sale_id} has {refunded_units} refunded unit(s); refund the remaining quantity instead of voiding")]
    HasRefunds { sale_id: i64, refunded_units: i64 },

    /// Target of a correction is itself a refund entry.
    #[error("Sale {sale_id} is a refund entry and cannot be corrected")]
    NotCorrectable { sale_id: i64 },

    /// Refund quantity exceeds what is still refundable on the line.
    #[error("Cannot refund {requested} of {item} on sale {sale_id} line {line_id}: only {refundable} refundable")]
    OverRefund {
        sale_id: i64,
        line_id: i64,
        item: String,
        requested: i64,
        refundable: i64,
    },

    /// Supervisor credential check failed.
    #[error("Supervisor authorization failed for '{supervisor}'")]
    Unauthorized { supervisor: String },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Machine-readable code for the register UI.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ItemNotFound(_) => "ITEM_NOT_FOUND",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::SaleNotFound(_) | CoreError::SaleLineNotFound { .. } => "NOT_FOUND",
            CoreError::AlreadyVoided { .. } => "ALREADY_VOIDED",
            CoreError::HasRefunds { .. } => "HAS_REFUNDS",
            CoreError::NotCorrectable { .. } => "NOT_CORRECTABLE",
            CoreError::OverRefund { .. } => "OVER_REFUND",
            CoreError::Unauthorized { .. } => "UNAUTHORIZED",
            CoreError::CartTooLarge { .. }
            | CoreError::QuantityTooLarge { .. }
            | CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before a transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g. malformed transaction id).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Arithmetic on the value would overflow.
    #[error("{field} is too large")]
    Overflow { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            item: "Water".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Water: available 3, requested 5"
        );
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    }

    #[test]
    fn test_over_refund_message() {
        let err = CoreError::OverRefund {
            sale_id: 7,
            line_id: 12,
            item: "Soda".to_string(),
            requested: 3,
            refundable: 2,
        };
        assert_eq!(
            err.to_string(),
            "Cannot refund 3 of Soda on sale 7 line 12: only 2 refundable"
        );
        assert_eq!(err.code(), "OVER_REFUND");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "reason".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.code(), "VALIDATION_ERROR");
    }
}
