//! Payment aggregate
//!
//! A payment is created in draft, posted (which books its initial entry and
//! places it at the first stage) and then moved through its method's stages.
//! Once posted it is never deleted; it can only be reset to draft or
//! cancelled while it still sits in its first stage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{
    AccountId, BatchId, CompanyId, Currency, JournalEntryId, JournalId, Money, PartyId,
    PaymentId, PaymentMethodId, StageId, StatementLineId, UserId,
};

use crate::error::PaymentError;
use crate::stage::BanknoteType;

/// Direction of the money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    /// Received from a customer
    Inbound,
    /// Paid to a supplier
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Draft,
    Posted,
    Cancelled,
}

/// The three payment problem branches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    Butterfly,
    PriorNotice,
    Unpaid,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 3] = [
        ExceptionKind::Butterfly,
        ExceptionKind::PriorNotice,
        ExceptionKind::Unpaid,
    ];

    /// Whether an active exception of this kind blocks the counterparty
    pub fn blocks_counterparty(&self) -> bool {
        matches!(self, ExceptionKind::PriorNotice | ExceptionKind::Unpaid)
    }

    /// Whether a replacement instrument may settle this kind
    pub fn is_replaceable(&self) -> bool {
        matches!(self, ExceptionKind::Butterfly | ExceptionKind::Unpaid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionKind::Butterfly => "butterfly",
            ExceptionKind::PriorNotice => "prior_notice",
            ExceptionKind::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state exception marker
///
/// `Fixed` is a permanent historical marker: a flag never goes back to
/// `Never`, and only an `Active` flag can become `Fixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExceptionFlag {
    #[default]
    #[serde(rename = "no")]
    Never,
    #[serde(rename = "yes")]
    Active,
    #[serde(rename = "fixed")]
    Fixed,
}

impl ExceptionFlag {
    pub fn is_active(&self) -> bool {
        *self == ExceptionFlag::Active
    }

    pub fn activate(&mut self) {
        *self = ExceptionFlag::Active;
    }

    pub fn fix(&mut self) -> Result<(), PaymentError> {
        match self {
            ExceptionFlag::Active => {
                *self = ExceptionFlag::Fixed;
                Ok(())
            }
            other => Err(PaymentError::invalid_state(format!(
                "Cannot fix an exception flag in state {:?}",
                other
            ))),
        }
    }
}

/// Per-kind exception flags of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExceptionFlags {
    pub butterfly: ExceptionFlag,
    pub prior_notice: ExceptionFlag,
    pub unpaid: ExceptionFlag,
}

impl ExceptionFlags {
    pub fn get(&self, kind: ExceptionKind) -> ExceptionFlag {
        match kind {
            ExceptionKind::Butterfly => self.butterfly,
            ExceptionKind::PriorNotice => self.prior_notice,
            ExceptionKind::Unpaid => self.unpaid,
        }
    }

    pub fn get_mut(&mut self, kind: ExceptionKind) -> &mut ExceptionFlag {
        match kind {
            ExceptionKind::Butterfly => &mut self.butterfly,
            ExceptionKind::PriorNotice => &mut self.prior_notice,
            ExceptionKind::Unpaid => &mut self.unpaid,
        }
    }

    /// The exception currently active, if any; at most one is
    pub fn active_kind(&self) -> Option<ExceptionKind> {
        ExceptionKind::ALL.into_iter().find(|k| self.get(*k).is_active())
    }
}

/// Why a payment changed stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "kind", rename_all = "snake_case")]
pub enum MoveReason {
    Posted,
    Advanced,
    Exception(ExceptionKind),
    /// Leaving an exception on the way into another one
    Compensation(ExceptionKind),
    Regularized(ExceptionKind),
    /// Value handed over to a bank-side payment by a batch switch
    Handoff,
    /// Reset to draft or cancelled
    Reset,
}

/// An append-only stage history record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMove {
    pub from: Option<StageId>,
    pub to: Option<StageId>,
    /// Entry booked by the move, if any
    pub entry_id: Option<JournalEntryId>,
    pub reason: MoveReason,
    pub at: NaiveDate,
    pub user: UserId,
}

/// Input for creating a draft payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub method_id: PaymentMethodId,
    pub journal_id: JournalId,
    pub partner_id: PartyId,
    pub direction: PaymentDirection,
    pub amount: Money,
    /// Receivable or payable account the payment settles
    pub counterpart_account: AccountId,
    #[serde(default)]
    pub transaction_number: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub certified: bool,
    #[serde(default)]
    pub banknote_type: BanknoteType,
}

/// A payment instrument moving through its stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub method_id: PaymentMethodId,
    pub journal_id: JournalId,
    pub partner_id: PartyId,
    pub direction: PaymentDirection,
    pub amount: Money,
    pub counterpart_account: AccountId,
    pub state: PaymentState,
    /// Current stage; set once posted
    pub stage_id: Option<StageId>,
    /// Account currently holding the payment's value
    pub holding_account: Option<AccountId>,
    pub banknote_type: BanknoteType,
    /// Check or note number
    pub transaction_number: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub certified: bool,
    pub is_paid: bool,
    pub exceptions: ExceptionFlags,
    pub is_replaced: bool,
    /// Portion of `amount` settled by replacement instruments
    pub replaced_amount: Money,
    pub initial_entry: Option<JournalEntryId>,
    pub history: Vec<StageMove>,
    pub statement_line: Option<StatementLineId>,
    pub batch_id: Option<BatchId>,
    /// Set on bank-side clones created by a batch switch
    pub origin_payment: Option<PaymentId>,
    pub company_id: CompanyId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(input: NewPayment, company_id: CompanyId, created_by: UserId) -> Result<Self, PaymentError> {
        if !input.amount.is_positive() {
            return Err(PaymentError::validation(format!(
                "Payment amount must be positive: {}",
                input.amount
            )));
        }

        Ok(Self {
            id: PaymentId::new_v7(),
            method_id: input.method_id,
            journal_id: input.journal_id,
            partner_id: input.partner_id,
            direction: input.direction,
            amount: input.amount,
            counterpart_account: input.counterpart_account,
            state: PaymentState::Draft,
            stage_id: None,
            holding_account: None,
            banknote_type: input.banknote_type,
            transaction_number: input.transaction_number,
            due_date: input.due_date,
            certified: input.certified,
            is_paid: false,
            exceptions: ExceptionFlags::default(),
            is_replaced: false,
            replaced_amount: Money::zero(input.amount.currency()),
            initial_entry: None,
            history: Vec::new(),
            statement_line: None,
            batch_id: None,
            origin_payment: None,
            company_id,
            created_by,
            created_at: Utc::now(),
        })
    }

    pub fn currency(&self) -> Currency {
        self.amount.currency()
    }

    pub fn is_posted(&self) -> bool {
        self.state == PaymentState::Posted
    }

    pub fn is_bank_side(&self) -> bool {
        self.origin_payment.is_some()
    }

    pub fn active_exception(&self) -> Option<ExceptionKind> {
        self.exceptions.active_kind()
    }

    /// Amount still open for replacement
    pub fn remaining_to_replace(&self) -> Result<Money, PaymentError> {
        Ok(self.amount.checked_sub(&self.replaced_amount)?)
    }

    /// Most recent entry booked for this payment
    pub fn last_entry(&self) -> Option<JournalEntryId> {
        self.history
            .iter()
            .rev()
            .find_map(|m| m.entry_id)
            .or(self.initial_entry)
    }

    pub fn require_stage(&self) -> Result<StageId, PaymentError> {
        self.stage_id.ok_or_else(|| {
            PaymentError::invalid_state(format!("Payment {} has no current stage", self.id))
        })
    }

    pub fn require_holding_account(&self) -> Result<AccountId, PaymentError> {
        self.holding_account.ok_or_else(|| PaymentError::MissingEntry {
            payment: self.id.to_string(),
        })
    }

    pub fn require_posted(&self) -> Result<(), PaymentError> {
        if !self.is_posted() {
            return Err(PaymentError::invalid_state(format!(
                "Payment {} is {:?}, expected Posted",
                self.id, self.state
            )));
        }
        Ok(())
    }

    /// Bank-side copies created by a batch switch have no lifecycle of their own
    pub fn require_own_lifecycle(&self) -> Result<(), PaymentError> {
        match self.origin_payment {
            Some(origin) => Err(PaymentError::invalid_state(format!(
                "Payment {} is the bank-side copy of {}",
                self.id, origin
            ))),
            None => Ok(()),
        }
    }

    /// Records a stage change
    pub fn record_move(
        &mut self,
        to: Option<StageId>,
        entry_id: Option<JournalEntryId>,
        reason: MoveReason,
        at: NaiveDate,
        user: UserId,
    ) {
        self.history.push(StageMove {
            from: self.stage_id,
            to,
            entry_id,
            reason,
            at,
            user,
        });
        self.stage_id = to;
    }

    /// Label used on ledger lines booked for this payment
    pub fn label(&self) -> String {
        match &self.transaction_number {
            Some(number) => format!("{} {}", self.id, number),
            None => self.id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(amount: rust_decimal::Decimal) -> Result<Payment, PaymentError> {
        Payment::new(
            NewPayment {
                method_id: PaymentMethodId::new(),
                journal_id: JournalId::new(),
                partner_id: PartyId::new(),
                direction: PaymentDirection::Inbound,
                amount: Money::new(amount, Currency::MAD),
                counterpart_account: AccountId::new(),
                transaction_number: Some("0042".to_string()),
                due_date: None,
                certified: false,
                banknote_type: BanknoteType::None,
            },
            CompanyId::new(),
            UserId::new(),
        )
    }

    #[test]
    fn test_new_payment_is_draft() {
        let payment = draft(dec!(1000)).unwrap();
        assert_eq!(payment.state, PaymentState::Draft);
        assert!(payment.replaced_amount.is_zero());
        assert_eq!(payment.remaining_to_replace().unwrap().amount(), dec!(1000));
        assert!(payment.active_exception().is_none());
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        assert!(matches!(draft(dec!(0)), Err(PaymentError::Validation(_))));
    }

    #[test]
    fn test_flag_cannot_be_fixed_before_active() {
        let mut flag = ExceptionFlag::Never;
        assert!(flag.fix().is_err());

        flag.activate();
        flag.fix().unwrap();
        assert_eq!(flag, ExceptionFlag::Fixed);
        assert!(flag.fix().is_err());
    }

    #[test]
    fn test_flags_serialize_as_tri_state_strings() {
        let mut flags = ExceptionFlags::default();
        flags.unpaid.activate();
        let json = serde_json::to_value(flags).unwrap();
        assert_eq!(json["unpaid"], "yes");
        assert_eq!(json["butterfly"], "no");
        assert_eq!(flags.active_kind(), Some(ExceptionKind::Unpaid));
    }

    #[test]
    fn test_last_entry_prefers_history() {
        let mut payment = draft(dec!(10)).unwrap();
        let initial = JournalEntryId::new();
        payment.initial_entry = Some(initial);
        assert_eq!(payment.last_entry(), Some(initial));

        let moved = JournalEntryId::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        payment.record_move(Some(StageId::new()), Some(moved), MoveReason::Advanced, date, UserId::new());
        payment.record_move(Some(StageId::new()), None, MoveReason::Advanced, date, UserId::new());
        assert_eq!(payment.last_entry(), Some(moved));
    }
}
