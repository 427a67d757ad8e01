//! # Repository Module
//!
//! Database repository implementations for the till ledger.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reads outside a transaction            Writes inside one               │
//! │  ───────────────────────────            ─────────────────               │
//! │  db.sales().get(42)                     let mut tx = db.begin_immediate()│
//! │  db.reports().daily_summary(day)        inventory::stock_of(tx.conn(),..)│
//! │       │                                 sale::insert_header(tx.conn(),..)│
//! │       │  &SqlitePool                    tx.commit()                     │
//! │       ▼                                      │  &mut SqliteConnection    │
//! │  ┌─────────────────────────────────────────────▼──────────────────────┐ │
//! │  │   free functions generic over SqliteExecutor (one SQL each)       │ │
//! │  └────────────────────────────────────────────────────────────────────┘ │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repository structs hold the pool and delegate to the free functions, so
//! the SQL for a given read exists once.
//!
//! ## Available Repositories
//!
//! - [`InventoryRepository`](inventory::InventoryRepository) - Catalog and stock
//! - [`SaleRepository`](sale::SaleRepository) - Headers, lines, receipts
//! - [`CorrectionRepository`](correction::CorrectionRepository) - VOID / REFUND records
//! - [`SupervisorSessionRepository`](supervisor::SupervisorSessionRepository) - Authorization trail
//! - [`AuditRepository`](audit::AuditRepository) - Change trail and integrity checks
//! - [`ReportRepository`](report::ReportRepository) - Read-only reporting

pub mod audit;
pub mod correction;
pub mod inventory;
pub mod report;
pub mod sale;
pub mod supervisor;
