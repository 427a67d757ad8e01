//! # Integrity Sweep
//!
//! Read-only checks that should never find anything. The schema triggers
//! block direct edits; the sweep catches what they cannot, such as rows
//! written by a tool that bypassed the engines.
//!
//! ## Checks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  void_without_authorizer      VOIDED header, no void_authorized_by     │
//! │  refund_without_correction    REFUND header, no REFUND correction      │
//! │  refund_without_original      REFUND header, no original_sale_id       │
//! │  unclassified_negative_total  total < 0 on a non-adjustment header     │
//! │  total_mismatch               header total != Σ line subtotals         │
//! │  over_refunded_line           refunded units > sold units              │
//! │  negative_stock               inventory quantity < 0                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Violations are logged and reported. Nothing is repaired automatically.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use till_core::IntegrityViolation;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::LedgerResult;
use crate::event_log::EventLog;
use crate::retry::with_retry;
use crate::store::LedgerStore;

/// Outcome of one sweep.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub checked_at: DateTime<Utc>,
    pub violations: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct IntegritySweep {
    store: LedgerStore,
    event_log: Option<EventLog>,
}

impl IntegritySweep {
    pub fn new(store: LedgerStore) -> Self {
        IntegritySweep {
            store,
            event_log: None,
        }
    }

    /// Also appends each sweep's result to `log`.
    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.event_log = Some(log);
        self
    }

    /// Runs every check once.
    pub async fn run_once(&self) -> LedgerResult<IntegrityReport> {
        let checked_at = Utc::now();
        let violations = with_retry(self.store.retry_policy(), "integrity_sweep", move || {
            self.collect()
        })
        .await?;

        if violations.is_empty() {
            debug!("Integrity sweep clean");
        }
        for violation in &violations {
            warn!(code = violation.code(), "Integrity violation: {}", violation);
        }

        if let Some(log) = &self.event_log {
            let mut events = vec![format!("integrity sweep: {} violation(s)", violations.len())];
            events.extend(violations.iter().map(|v| format!("  {}: {}", v.code(), v)));
            log.note_all(events).await;
        }

        Ok(IntegrityReport {
            checked_at,
            violations,
        })
    }

    async fn collect(&self) -> LedgerResult<Vec<IntegrityViolation>> {
        let audit = self.store.db().audit();

        let mut violations = audit.voided_without_authorizer().await?;
        violations.extend(audit.refunds_without_correction().await?);
        violations.extend(audit.refunds_without_original().await?);
        violations.extend(audit.unclassified_negative_totals().await?);
        violations.extend(audit.total_mismatches().await?);
        violations.extend(audit.over_refunded_lines().await?);
        violations.extend(audit.negative_stock().await?);

        Ok(violations)
    }

    /// Runs the sweep every `period` until the handle is shut down.
    pub fn spawn_periodic(self, period: Duration) -> SweepHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let join = tokio::spawn(self.run(period, shutdown_rx));
        SweepHandle { shutdown_tx, join }
    }

    async fn run(self, period: Duration, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(period_secs = period.as_secs(), "Integrity sweep starting");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Integrity sweep failed");
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Integrity sweep shutting down");
                    break;
                }
            }
        }

        info!("Integrity sweep stopped");
    }
}

/// Handle for the periodic sweep task.
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

impl SweepHandle {
    /// Stops the sweep and waits for an in-flight run to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.join.await {
            error!(error = %e, "Integrity sweep task ended abnormally");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::CorrectionEngine;
    use crate::inventory::InventoryLedger;
    use crate::sale::SaleEngine;
    use till_core::{CartLine, Money, RefundRequest, Session, SupervisorCredential};
    use till_db::{Database, DbConfig};

    async fn store() -> LedgerStore {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        LedgerStore::new(db)
    }

    fn always(_: &str, _: &str) -> bool {
        true
    }

    #[tokio::test]
    async fn test_engine_written_ledger_is_clean() {
        let store = store().await;
        InventoryLedger::new(store.clone()).adjust_stock("Soda", 10).await.unwrap();

        let sales = SaleEngine::new(store.clone());
        let corrections = CorrectionEngine::new(store.clone(), always);
        let session = Session::cashier("alice");
        let sam = SupervisorCredential::new("sam", "1");

        let kept = sales
            .create_sale(&session, &[CartLine::new("Soda", 3, Money::from_cents(500))])
            .await
            .unwrap();
        let voided = sales
            .create_sale(&session, &[CartLine::new("Soda", 1, Money::from_cents(500))])
            .await
            .unwrap();

        let line_id = store.db().sales().lines(kept.sale_id).await.unwrap()[0].id;
        corrections
            .refund_item(
                &session,
                &RefundRequest {
                    sale_id: kept.sale_id,
                    line_id,
                    quantity: 1,
                    reason: "Flat".into(),
                },
                &sam,
            )
            .await
            .unwrap();
        corrections
            .void_sale(&session, voided.sale_id, "Wrong item", &sam)
            .await
            .unwrap();

        let report = IntegritySweep::new(store).run_once().await.unwrap();
        assert!(report.is_clean(), "{:?}", report.violations);
    }

    #[tokio::test]
    async fn test_detects_rows_written_around_the_engines() {
        let store = store().await;
        let pool = store.db().pool();
        let now = Utc::now();

        // Negative total with no adjustment classification and no lines.
        sqlx::query(
            "INSERT INTO sales (transaction_id, kind, cashier, total_cents, created_at, status) \
             VALUES ('TX-20261018120000-000001', 'SALE', 'mallory', -500, ?1, 'ACTIVE')",
        )
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        // REFUND header with no original and no correction.
        sqlx::query(
            "INSERT INTO sales (transaction_id, kind, cashier, total_cents, created_at, status, \
             adjustment_reason, adjustment_authorized_by) \
             VALUES ('TX-20261018120000-000002', 'REFUND', 'mallory', -100, ?1, 'ACTIVE', 'x', 'y')",
        )
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        // Voided without an authorizer.
        sqlx::query(
            "INSERT INTO sales (transaction_id, kind, cashier, total_cents, created_at, status) \
             VALUES ('TX-20261018120000-000003', 'SALE', 'mallory', 0, ?1, 'VOIDED')",
        )
        .bind(now)
        .execute(pool)
        .await
        .unwrap();

        let report = IntegritySweep::new(store.clone()).run_once().await.unwrap();
        let codes: Vec<&str> = report.violations.iter().map(|v| v.code()).collect();

        assert!(codes.contains(&"unclassified_negative_total"));
        assert!(codes.contains(&"total_mismatch"));
        assert!(codes.contains(&"refund_without_original"));
        assert!(codes.contains(&"refund_without_correction"));
        assert!(codes.contains(&"void_without_authorizer"));
    }

    #[tokio::test]
    async fn test_sweep_writes_event_log() {
        let store = store().await;
        let path = std::env::temp_dir().join(format!("till-sweep-{}.log", uuid::Uuid::new_v4()));

        let sweep = IntegritySweep::new(store).with_event_log(EventLog::new(&path));
        sweep.run_once().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("integrity sweep: 0 violation(s)\n"));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_periodic_sweep_shuts_down() {
        let store = store().await;
        let handle = IntegritySweep::new(store).spawn_periodic(Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(35)).await;
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .unwrap();
    }
}
