//! Payment DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_payment::{
    AdvanceOutcome, BanknoteType, ExceptionFlags, ExceptionKind, ExceptionOutcome, MoveReason,
    Payment, PaymentDirection, PaymentState, StageMove,
};

use super::{validate_not_blank, validate_positive};

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub method_id: Uuid,
    pub journal_id: Uuid,
    pub partner_id: Uuid,
    pub direction: PaymentDirection,
    #[validate(custom(function = "validate_positive"))]
    pub amount: Decimal,
    /// Defaults to the company currency
    pub currency: Option<String>,
    /// Receivable or payable account settled by the payment
    pub counterpart_account: Uuid,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub transaction_number: Option<String>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub certified: bool,
    #[serde(default)]
    pub banknote_type: BanknoteType,
}

/// Filters of `GET /payments`
#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentsQuery {
    pub partner_id: Option<Uuid>,
    pub method_id: Option<Uuid>,
    pub direction: Option<PaymentDirection>,
    pub state: Option<PaymentState>,
    pub exception: Option<ExceptionKind>,
    pub batch_id: Option<Uuid>,
    /// Hide bank-side clones
    #[serde(default)]
    pub originals_only: bool,
}

/// Optional accounting date of an action, `?entry_date=2024-03-20`
#[derive(Debug, Default, Deserialize)]
pub struct ActionParams {
    pub entry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct LinkStatementRequest {
    pub statement_line_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StageMoveResponse {
    pub from: Option<Uuid>,
    pub to: Option<Uuid>,
    pub entry_id: Option<Uuid>,
    pub reason: MoveReason,
    pub at: NaiveDate,
    pub user: Uuid,
}

impl From<&StageMove> for StageMoveResponse {
    fn from(m: &StageMove) -> Self {
        Self {
            from: m.from.map(|s| *s.as_uuid()),
            to: m.to.map(|s| *s.as_uuid()),
            entry_id: m.entry_id.map(|e| *e.as_uuid()),
            reason: m.reason,
            at: m.at,
            user: *m.user.as_uuid(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub label: String,
    pub method_id: Uuid,
    pub journal_id: Uuid,
    pub partner_id: Uuid,
    pub direction: PaymentDirection,
    pub amount: Decimal,
    pub currency: String,
    pub state: PaymentState,
    pub stage_id: Option<Uuid>,
    pub holding_account: Option<Uuid>,
    pub banknote_type: BanknoteType,
    pub transaction_number: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub certified: bool,
    pub is_paid: bool,
    pub exceptions: ExceptionFlags,
    pub is_replaced: bool,
    pub replaced_amount: Decimal,
    pub batch_id: Option<Uuid>,
    pub origin_payment: Option<Uuid>,
    pub statement_line: Option<Uuid>,
    pub last_entry: Option<Uuid>,
    pub history: Vec<StageMoveResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(p: &Payment) -> Self {
        Self {
            id: *p.id.as_uuid(),
            label: p.label(),
            method_id: *p.method_id.as_uuid(),
            journal_id: *p.journal_id.as_uuid(),
            partner_id: *p.partner_id.as_uuid(),
            direction: p.direction,
            amount: p.amount.amount(),
            currency: p.currency().code().to_string(),
            state: p.state,
            stage_id: p.stage_id.map(|s| *s.as_uuid()),
            holding_account: p.holding_account.map(|a| *a.as_uuid()),
            banknote_type: p.banknote_type,
            transaction_number: p.transaction_number.clone(),
            due_date: p.due_date,
            certified: p.certified,
            is_paid: p.is_paid,
            exceptions: p.exceptions,
            is_replaced: p.is_replaced,
            replaced_amount: p.replaced_amount.amount(),
            batch_id: p.batch_id.map(|b| *b.as_uuid()),
            origin_payment: p.origin_payment.map(|o| *o.as_uuid()),
            statement_line: p.statement_line.map(|l| *l.as_uuid()),
            last_entry: p.last_entry().map(|e| *e.as_uuid()),
            history: p.history.iter().map(StageMoveResponse::from).collect(),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdvanceResponse {
    pub payment_id: Uuid,
    pub stage_id: Uuid,
    pub entry_id: Option<Uuid>,
    pub is_paid: bool,
}

impl From<AdvanceOutcome> for AdvanceResponse {
    fn from(o: AdvanceOutcome) -> Self {
        Self {
            payment_id: *o.payment_id.as_uuid(),
            stage_id: *o.stage_id.as_uuid(),
            entry_id: o.entry_id.map(|e| *e.as_uuid()),
            is_paid: o.is_paid,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExceptionResponse {
    pub compensation_entry: Option<Uuid>,
    pub entry_id: Option<Uuid>,
}

impl From<ExceptionOutcome> for ExceptionResponse {
    fn from(o: ExceptionOutcome) -> Self {
        Self {
            compensation_entry: o.compensation_entry.map(|e| *e.as_uuid()),
            entry_id: o.entry.map(|e| *e.as_uuid()),
        }
    }
}

/// Entry booked by an action, if any
#[derive(Debug, Serialize)]
pub struct EntryRefResponse {
    pub entry_id: Option<Uuid>,
}
