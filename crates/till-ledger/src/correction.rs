//! # Correction Engine
//!
//! Voids and refunds. Committed sales are never edited or deleted: a void
//! flips the header's status once, a refund appends a negative-valued entry.
//!
//! ## Void vs Refund
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  VOID (whole sale)                 REFUND (part of one line)           │
//! │  ─────────────────                 ─────────────────────────           │
//! │  sale ACTIVE, no refunds yet       sale ACTIVE, qty <= refundable      │
//! │  restore every line's units        restore qty units                   │
//! │  status ACTIVE ──► VOIDED          new REFUND header, total < 0        │
//! │  one VOID correction               one REFUND correction               │
//! │  amount = -total                   amount = -(qty × unit price)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authorization Trail
//! Every attempt lands in `supervisor_sessions`:
//! - `DENIED`: credential rejected, nothing else written
//! - `GRANTED`: written in the same transaction as the correction
//! - `REJECTED`: credential accepted, correction refused by a business rule

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use till_core::validation::{validate_name, validate_reason, validate_refund_quantity};
use till_core::{
    AuthorizationOutcome, Correction, CoreError, CorrectionType, Money, RefundRecord, RefundRequest,
    RefundableLine, SaleKind, Session, SupervisorAction, SupervisorCredential, TransactionIdSource,
    VoidRecord,
};
use till_db::repository::correction::{self, NewCorrection};
use till_db::repository::sale::{self, NewSaleLine};
use till_db::repository::supervisor::{self, NewSupervisorSession};
use tracing::{debug, error, info, warn};

use crate::auth::SupervisorVerifier;
use crate::error::{LedgerError, LedgerResult};
use crate::inventory::adjust_stock_in;
use crate::retry::with_retry;
use crate::sale::{insert_header_with_fresh_id, HeaderFields};
use crate::store::{finish, LedgerStore};

/// Applies supervisor-authorized voids and refunds.
#[derive(Clone)]
pub struct CorrectionEngine<V> {
    store: LedgerStore,
    verifier: V,
}

impl<V: SupervisorVerifier> CorrectionEngine<V> {
    pub fn new(store: LedgerStore, verifier: V) -> Self {
        CorrectionEngine { store, verifier }
    }

    // =========================================================================
    // Void
    // =========================================================================

    /// Voids a whole sale and restores its stock.
    ///
    /// A second void of the same sale is rejected with `AlreadyVoided`; it is
    /// never applied twice.
    pub async fn void_sale(
        &self,
        session: &Session,
        sale_id: i64,
        reason: &str,
        credential: &SupervisorCredential,
    ) -> LedgerResult<VoidRecord> {
        validate_name("cashier", &session.cashier)?;
        validate_name("supervisor", &credential.name)?;
        validate_reason(reason)?;

        self.authorize(session, credential, SupervisorAction::Void, sale_id).await?;

        let supervisor = credential.name.as_str();
        let reason = reason.trim();
        let result = with_retry(self.store.retry_policy(), "void_sale", move || {
            self.try_void(session, sale_id, reason, supervisor)
        })
        .await;

        match result {
            Ok(record) => {
                info!(
                    sale_id = sale_id,
                    correction_id = record.correction_id,
                    restored_units = record.restored_units,
                    amount = %record.amount,
                    requested_by = %session.cashier,
                    authorized_by = %supervisor,
                    "Sale voided"
                );
                Ok(record)
            }
            Err(e) => {
                self.record_rejection(session, supervisor, SupervisorAction::Void, sale_id, &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn try_void(
        &self,
        session: &Session,
        sale_id: i64,
        reason: &str,
        supervisor: &str,
    ) -> LedgerResult<VoidRecord> {
        let mut tx = self.store.db().begin_immediate().await?;
        let result = write_void(tx.conn(), session, sale_id, reason, supervisor, Utc::now()).await;
        finish(tx, result).await
    }

    // =========================================================================
    // Refund
    // =========================================================================

    /// Refunds part or all of one sale line.
    ///
    /// Creates a negative-valued REFUND entry referencing the original sale
    /// and returns how many units of the line remain refundable.
    pub async fn refund_item(
        &self,
        session: &Session,
        request: &RefundRequest,
        credential: &SupervisorCredential,
    ) -> LedgerResult<RefundRecord> {
        validate_name("cashier", &session.cashier)?;
        validate_name("supervisor", &credential.name)?;
        validate_reason(&request.reason)?;
        validate_refund_quantity(request.quantity)?;

        self.authorize(session, credential, SupervisorAction::Refund, request.sale_id)
            .await?;

        let supervisor = credential.name.as_str();
        let result = with_retry(self.store.retry_policy(), "refund_item", move || {
            self.try_refund(session, request, supervisor)
        })
        .await;

        match result {
            Ok(record) => {
                info!(
                    sale_id = request.sale_id,
                    line_id = request.line_id,
                    quantity = request.quantity,
                    refund_sale_id = record.refund_sale_id,
                    amount = %record.amount,
                    remaining = record.remaining_refundable,
                    authorized_by = %supervisor,
                    "Line refunded"
                );
                Ok(record)
            }
            Err(e) => {
                self.record_rejection(session, supervisor, SupervisorAction::Refund, request.sale_id, &e)
                    .await;
                Err(e)
            }
        }
    }

    async fn try_refund(
        &self,
        session: &Session,
        request: &RefundRequest,
        supervisor: &str,
    ) -> LedgerResult<RefundRecord> {
        let mut tx = self.store.db().begin_immediate().await?;
        let result = write_refund(
            tx.conn(),
            self.store.ids(),
            session,
            request,
            supervisor,
            Utc::now(),
        )
        .await;
        finish(tx, result).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Corrections recorded against a sale, oldest first.
    pub async fn corrections_for(&self, sale_id: i64) -> LedgerResult<Vec<Correction>> {
        Ok(self.store.db().corrections().for_sale(sale_id).await?)
    }

    /// Per-line refundable quantities for the refund screen.
    pub async fn refundable_lines(&self, sale_id: i64) -> LedgerResult<Vec<RefundableLine>> {
        Ok(self.store.db().reports().refundable_lines(sale_id).await?)
    }

    // =========================================================================
    // Authorization Trail
    // =========================================================================

    async fn authorize(
        &self,
        session: &Session,
        credential: &SupervisorCredential,
        action: SupervisorAction,
        sale_id: i64,
    ) -> LedgerResult<()> {
        if self.verifier.verify(&credential.name, credential.pin()) {
            debug!(supervisor = %credential.name, ?action, sale_id, "Supervisor credential accepted");
            return Ok(());
        }

        warn!(
            supervisor = %credential.name,
            cashier = %session.cashier,
            ?action,
            sale_id,
            "Supervisor authorization denied"
        );
        self.record_outcome(session, &credential.name, action, sale_id, AuthorizationOutcome::Denied)
            .await;

        Err(CoreError::Unauthorized {
            supervisor: credential.name.clone(),
        }
        .into())
    }

    /// Business-rule refusals after a granted credential are logged as
    /// REJECTED. Storage failures are not.
    async fn record_rejection(
        &self,
        session: &Session,
        supervisor: &str,
        action: SupervisorAction,
        sale_id: i64,
        err: &LedgerError,
    ) {
        if let Some(rule) = err.as_domain() {
            debug!(sale_id, ?action, code = rule.code(), "Correction rejected");
            self.record_outcome(session, supervisor, action, sale_id, AuthorizationOutcome::Rejected)
                .await;
        }
    }

    async fn record_outcome(
        &self,
        session: &Session,
        supervisor: &str,
        action: SupervisorAction,
        sale_id: i64,
        outcome: AuthorizationOutcome,
    ) {
        let result = with_retry(self.store.retry_policy(), "record_supervisor_session", move || {
            self.try_record(session, supervisor, action, sale_id, outcome)
        })
        .await;

        if let Err(e) = result {
            error!(
                supervisor = %supervisor,
                ?action,
                ?outcome,
                sale_id,
                error = %e,
                "Failed to record supervisor session"
            );
        }
    }

    async fn try_record(
        &self,
        session: &Session,
        supervisor: &str,
        action: SupervisorAction,
        sale_id: i64,
        outcome: AuthorizationOutcome,
    ) -> LedgerResult<i64> {
        let row = NewSupervisorSession {
            supervisor_name: supervisor,
            session_start: Utc::now(),
            cashier_name: &session.cashier,
            action_type: action,
            outcome,
            sale_id: Some(sale_id),
        };
        Ok(self.store.db().supervisor_sessions().record(&row).await?)
    }
}

// =============================================================================
// Transaction Bodies
// =============================================================================

async fn write_void(
    conn: &mut SqliteConnection,
    session: &Session,
    sale_id: i64,
    reason: &str,
    supervisor: &str,
    now: DateTime<Utc>,
) -> LedgerResult<VoidRecord> {
    let header = sale::fetch_sale(&mut *conn, sale_id)
        .await?
        .ok_or(CoreError::SaleNotFound(sale_id))?;

    if header.kind == SaleKind::Refund {
        return Err(CoreError::NotCorrectable { sale_id }.into());
    }
    if header.is_voided() {
        return Err(CoreError::AlreadyVoided { sale_id }.into());
    }

    let refunded_units = correction::refunded_units_for_sale(&mut *conn, sale_id).await?;
    if refunded_units > 0 {
        return Err(CoreError::HasRefunds {
            sale_id,
            refunded_units,
        }
        .into());
    }

    let lines = sale::fetch_lines(&mut *conn, sale_id).await?;
    let mut restored_units = 0;
    for line in &lines {
        adjust_stock_in(&mut *conn, &line.item, line.quantity, now).await?;
        restored_units += line.quantity;
    }

    if sale::mark_voided(&mut *conn, sale_id, reason, supervisor, now).await? == 0 {
        return Err(CoreError::AlreadyVoided { sale_id }.into());
    }

    let items = lines
        .iter()
        .map(|l| l.item.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let snapshot = serde_json::to_string(&lines)?;
    let single_price = match lines.as_slice() {
        [only] => Some(only.unit_price_cents),
        _ => None,
    };

    let correction_id = correction::insert_correction(
        &mut *conn,
        &NewCorrection {
            original_sale_id: sale_id,
            correction_type: CorrectionType::Void,
            reason,
            requested_by: &session.cashier,
            authorized_by: supervisor,
            created_at: now,
            original_line_id: None,
            original_item: &items,
            original_quantity: restored_units,
            original_price_cents: single_price,
            original_total_cents: header.total_cents,
            corrected_quantity: restored_units,
            correction_amount_cents: -header.total_cents,
            refund_sale_id: None,
            line_snapshot: Some(&snapshot),
        },
    )
    .await?;

    supervisor::insert_session(
        &mut *conn,
        &NewSupervisorSession {
            supervisor_name: supervisor,
            session_start: now,
            cashier_name: &session.cashier,
            action_type: SupervisorAction::Void,
            outcome: AuthorizationOutcome::Granted,
            sale_id: Some(sale_id),
        },
    )
    .await?;

    Ok(VoidRecord {
        sale_id,
        correction_id,
        restored_units,
        amount: Money::from_cents(-header.total_cents),
    })
}

async fn write_refund(
    conn: &mut SqliteConnection,
    ids: &dyn TransactionIdSource,
    session: &Session,
    request: &RefundRequest,
    supervisor: &str,
    now: DateTime<Utc>,
) -> LedgerResult<RefundRecord> {
    let sale_id = request.sale_id;
    let reason = request.reason.trim();

    let header = sale::fetch_sale(&mut *conn, sale_id)
        .await?
        .ok_or(CoreError::SaleNotFound(sale_id))?;

    if header.kind == SaleKind::Refund {
        return Err(CoreError::NotCorrectable { sale_id }.into());
    }
    if header.is_voided() {
        return Err(CoreError::AlreadyVoided { sale_id }.into());
    }

    let line = sale::fetch_line(&mut *conn, sale_id, request.line_id)
        .await?
        .ok_or(CoreError::SaleLineNotFound {
            sale_id,
            line_id: request.line_id,
        })?;

    let already_refunded = correction::refunded_quantity(&mut *conn, line.id).await?;
    let refundable = line.quantity - already_refunded;
    if request.quantity > refundable {
        return Err(CoreError::OverRefund {
            sale_id,
            line_id: line.id,
            item: line.item.clone(),
            requested: request.quantity,
            refundable,
        }
        .into());
    }

    let amount = line.unit_price().multiply_quantity(request.quantity);

    let (refund_sale_id, transaction_id) = insert_header_with_fresh_id(
        &mut *conn,
        ids,
        &HeaderFields {
            kind: SaleKind::Refund,
            original_sale_id: Some(sale_id),
            cashier: &session.cashier,
            total_cents: -amount.cents(),
            created_at: now,
            adjustment_reason: Some(reason),
            adjustment_authorized_by: Some(supervisor),
        },
    )
    .await?;

    sale::insert_line(
        &mut *conn,
        &NewSaleLine {
            sale_id: refund_sale_id,
            item: &line.item,
            quantity: request.quantity,
            unit_price_cents: -line.unit_price_cents,
            refunded_line_id: Some(line.id),
        },
    )
    .await?;

    adjust_stock_in(&mut *conn, &line.item, request.quantity, now).await?;

    let snapshot = serde_json::to_string(&line)?;
    let correction_id = correction::insert_correction(
        &mut *conn,
        &NewCorrection {
            original_sale_id: sale_id,
            correction_type: CorrectionType::Refund,
            reason,
            requested_by: &session.cashier,
            authorized_by: supervisor,
            created_at: now,
            original_line_id: Some(line.id),
            original_item: &line.item,
            original_quantity: line.quantity,
            original_price_cents: Some(line.unit_price_cents),
            original_total_cents: line.subtotal_cents,
            corrected_quantity: request.quantity,
            correction_amount_cents: -amount.cents(),
            refund_sale_id: Some(refund_sale_id),
            line_snapshot: Some(&snapshot),
        },
    )
    .await?;

    supervisor::insert_session(
        &mut *conn,
        &NewSupervisorSession {
            supervisor_name: supervisor,
            session_start: now,
            cashier_name: &session.cashier,
            action_type: SupervisorAction::Refund,
            outcome: AuthorizationOutcome::Granted,
            sale_id: Some(sale_id),
        },
    )
    .await?;

    Ok(RefundRecord {
        refund_sale_id,
        transaction_id,
        correction_id,
        amount: -amount,
        remaining_refundable: refundable - request.quantity,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
