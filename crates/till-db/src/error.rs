//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← classified by SQLite code / message           │
//! │       │                                                                 │
//! │       ├── Busy / PoolExhausted ──► retried by till-ledger with backoff │
//! │       ├── AppendOnlyViolation ───► trigger refused a DELETE/UPDATE     │
//! │       ├── UniqueViolation ───────► e.g. transaction_id collision       │
//! │       └── everything else ──────► surfaced as-is                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Prefix every append-only trigger uses in its RAISE message.
pub const APPEND_ONLY_PREFIX: &str = "append-only:";

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// `field` is the `table.column` SQLite reports.
    #[error("Duplicate value for {field}")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (e.g. stock would go negative).
    #[error("Check constraint failed: {message}")]
    CheckViolation { message: String },

    /// An append-only trigger refused the statement.
    #[error("Audit violation: {message}")]
    AppendOnlyViolation { message: String },

    /// The database is locked by another writer and the busy timeout elapsed.
    #[error("Database busy: {0}")]
    Busy(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Stored value could not be encoded/decoded (e.g. snapshot JSON).
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Transaction control (BEGIN / COMMIT / ROLLBACK) failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Returns true if the operation may succeed when repeated later.
    ///
    /// Only lock contention qualifies. Constraint and trigger failures are
    /// deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }

    /// Returns true if a UNIQUE constraint on the given column fired.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field } if field.ends_with(column))
    }

    /// Machine-readable code for callers that surface storage failures.
    pub fn code(&self) -> &'static str {
        match self {
            DbError::NotFound { .. } => "NOT_FOUND",
            DbError::Busy(_) | DbError::PoolExhausted => "STORAGE_BUSY",
            DbError::AppendOnlyViolation { .. } => "AUDIT_VIOLATION",
            DbError::UniqueViolation { .. }
            | DbError::ForeignKeyViolation { .. }
            | DbError::CheckViolation { .. } => "CONSTRAINT_VIOLATION",
            _ => "DATABASE_ERROR",
        }
    }
}

/// SQLite primary result codes that mean "someone else holds the lock".
///
/// 5 = SQLITE_BUSY, 6 = SQLITE_LOCKED. Extended codes keep the primary code
/// in the low byte (e.g. 517 = SQLITE_BUSY_SNAPSHOT, 262 = SQLITE_LOCKED_SHAREDCACHE).
fn is_lock_code(code: &str) -> bool {
    code.parse::<i64>()
        .map(|c| matches!(c & 0xff, 5 | 6))
        .unwrap_or(false)
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → code / message analysis (busy, trigger, constraint)
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();

                if is_lock_code(&code) || msg.contains("database is locked") {
                    DbError::Busy(msg)
                } else if msg.starts_with(APPEND_ONLY_PREFIX) {
                    DbError::AppendOnlyViolation { message: msg }
                } else if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation { message: msg }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation { message: msg }
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
