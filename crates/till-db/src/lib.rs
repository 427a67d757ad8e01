//! # till-db: Database Layer for the Till Order Ledger
//!
//! SQLite storage for inventory, sales, corrections and the authorization
//! trail, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Data Flow                                   │
//! │                                                                         │
//! │  till-ledger engines (SaleEngine, CorrectionEngine, ...)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ inventory     │    │ 0001 schema  │  │   │
//! │  │   │ SqlitePool    │◄───│ sale          │    │ 0002 audit   │  │   │
//! │  │   │ ImmediateTx   │    │ correction    │    │   triggers   │  │   │
//! │  │   │ (tx.rs)       │    │ supervisor    │    │              │  │   │
//! │  │   │               │    │ audit, report │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig};
//! use till_db::repository::inventory;
//!
//! let db = Database::new(DbConfig::new("till.db")).await?;
//!
//! let mut tx = db.begin_immediate().await?;
//! let stock = inventory::stock_of(tx.conn(), "Beer").await?;
//! tx.commit().await?;
//!
//! let summary = db.reports().daily_summary(today).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod tx;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use tx::ImmediateTx;

// Repository re-exports for convenience
pub use repository::audit::AuditRepository;
pub use repository::correction::CorrectionRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::report::ReportRepository;
pub use repository::sale::SaleRepository;
pub use repository::supervisor::SupervisorSessionRepository;
