//! Payment stage engine
//!
//! Advances one payment at a time through its method's catalog. Every move
//! that books an entry credits the account currently holding the payment's
//! value and debits the target stage account (the other way round for
//! outbound payments), then tries to reconcile the new entry against the
//! previous one on the account the value left.
//!
//! All preconditions are checked before the first mutation. The caller runs
//! each action in a [`UnitOfWork`], so an error part way through still
//! leaves the book untouched.

use tracing::{debug, info, warn};

use core_kernel::{
    AccountId, ActionContext, JournalEntryId, JournalLineId, PaymentId, StageId, StatementLineId,
};
use domain_ledger::{EntryDraft, Ledger, LineSide};

use crate::batch::BatchState;
use crate::book::PaymentBook;
use crate::error::PaymentError;
use crate::payment::{MoveReason, NewPayment, Payment, PaymentDirection, PaymentState};
use crate::settings::EngineSettings;
use crate::stage::{Stage, StageType};
use crate::statement::StatementLine;
use crate::unit_of_work::UnitOfWork;

/// Reference type stamped on entries generated for payments
pub const PAYMENT_DOCUMENT: &str = "payment";

/// Side on which value enters an account for a payment of `direction`
pub fn entering_side(direction: PaymentDirection) -> LineSide {
    match direction {
        PaymentDirection::Inbound => LineSide::Debit,
        PaymentDirection::Outbound => LineSide::Credit,
    }
}

/// What a successful `advance` will do, computed without side effects
#[derive(Debug, Clone)]
pub struct AdvancePlan {
    pub payment_id: PaymentId,
    pub current: Stage,
    pub next: Stage,
    /// False for pointer-only moves
    pub books_entry: bool,
    /// The next stage has no regular stage after it
    pub reaches_last_stage: bool,
}

/// Result of an advance
#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    pub payment_id: PaymentId,
    pub stage_id: StageId,
    pub entry_id: Option<JournalEntryId>,
    pub is_paid: bool,
}

/// The stage state machine
#[derive(Debug, Clone, Default)]
pub struct StageEngine {
    settings: EngineSettings,
}

impl StageEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Creates a draft payment
    pub fn create_payment(
        &self,
        uow: &mut UnitOfWork,
        input: NewPayment,
        ctx: &ActionContext,
    ) -> Result<PaymentId, PaymentError> {
        let book = uow.book();
        book.catalog(&input.method_id)?.get_available_stages()?;
        book.ledger().require_journal(&input.journal_id)?;
        book.ledger().require_account(&input.counterpart_account)?;
        if input.amount.currency() != book.ledger().currency() {
            return Err(PaymentError::validation(format!(
                "Payment currency {} differs from company currency {}",
                input.amount.currency(),
                book.ledger().currency()
            )));
        }

        let payment = Payment::new(input, ctx.company_id, ctx.user_id)?;
        let id = payment.id;
        uow.book_mut().insert_payment(payment);

        debug!(payment = %id, "Draft payment created");
        Ok(id)
    }

    /// Books the initial entry and places the payment at its first stage
    ///
    /// Inbound payments debit the first stage account and credit the
    /// counterpart account; outbound payments are mirrored.
    pub fn post_payment(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<JournalEntryId, PaymentError> {
        let payment = uow.book().payment(&payment_id)?.clone();
        if payment.state != PaymentState::Draft {
            return Err(PaymentError::invalid_state(format!(
                "Payment {} is {:?}, only drafts can be posted",
                payment.id, payment.state
            )));
        }
        let first = uow
            .book()
            .catalog(&payment.method_id)?
            .first_stage(payment.banknote_type)?
            .clone();
        let stage_account = first.require_account()?;

        let side = entering_side(payment.direction);
        let draft = EntryDraft::new(payment.journal_id, ctx.accounting_date())
            .with_reference(payment.label())
            .for_document(PAYMENT_DOCUMENT, *payment.id.as_uuid())
            .line(stage_account, Some(payment.partner_id), side, payment.amount, first.name.clone())
            .line(
                payment.counterpart_account,
                Some(payment.partner_id),
                side.opposite(),
                payment.amount,
                payment.label(),
            );
        let entry_id = uow.book_mut().ledger_mut().post(draft)?;

        let payment = uow.book_mut().payment_mut(&payment_id)?;
        payment.state = PaymentState::Posted;
        payment.initial_entry = Some(entry_id);
        payment.holding_account = Some(stage_account);
        payment.is_paid = false;
        payment.record_move(Some(first.id), Some(entry_id), MoveReason::Posted, ctx.as_of, ctx.user_id);

        info!(payment = %payment_id, stage = %first.name, entry = %entry_id, "Payment posted");
        Ok(entry_id)
    }

    /// Checks every precondition of `advance` without touching the book
    pub fn check_advance(
        &self,
        book: &PaymentBook,
        payment_id: PaymentId,
    ) -> Result<AdvancePlan, PaymentError> {
        let payment = book.payment(&payment_id)?;
        payment.require_posted()?;
        if let Some(kind) = payment.active_exception() {
            return Err(PaymentError::invalid_state(format!(
                "Payment {} has an active '{}' exception",
                payment.id, kind
            )));
        }
        if payment.is_replaced {
            return Err(PaymentError::invalid_state(format!(
                "Payment {} was replaced",
                payment.id
            )));
        }

        let catalog = book.catalog(&payment.method_id)?;
        let current = catalog.require_stage(&payment.require_stage()?)?.clone();
        if current.stage_type.is_exception() {
            return Err(PaymentError::invalid_state(format!(
                "Payment {} sits in exception stage '{}'",
                payment.id, current.name
            )));
        }

        let next = catalog
            .get_next_stage(&current.id, payment.banknote_type)?
            .ok_or_else(|| PaymentError::AlreadyLastStage {
                payment: payment.id.to_string(),
                stage: current.name.clone(),
            })?
            .clone();

        if next.stage_type.is_exception() {
            return Err(PaymentError::ExceptionStageRequiresAction { stage: next.name });
        }

        if current.stage_type == StageType::MustBeSent || next.stage_type == StageType::MustBeSent {
            require_sent_batch(book, payment)?;
        }

        if next.stage_type == StageType::InBank && next.with_bank_statement {
            require_reconciled_statement(book, payment)?;
        }

        let books_entry = next.with_journal_entry && !payment.is_bank_side();
        if books_entry {
            next.require_account()?;
        }

        let reaches_last_stage = next.stage_type == StageType::Reconcile
            || catalog.is_last_regular_stage(&next.id, payment.banknote_type)?;

        Ok(AdvancePlan {
            payment_id,
            current,
            next,
            books_entry,
            reaches_last_stage,
        })
    }

    /// Moves a payment to the next stage of its catalog
    pub fn advance(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<AdvanceOutcome, PaymentError> {
        let plan = self.check_advance(uow.book(), payment_id)?;

        let entry_id = self.move_to_stage(uow.book_mut(), payment_id, &plan.next, MoveReason::Advanced, ctx)?;

        let payment = uow.book_mut().payment_mut(&payment_id)?;
        if plan.reaches_last_stage && self.settings.mark_paid_on_last_stage {
            payment.is_paid = true;
        }

        info!(
            payment = %payment_id,
            from = %plan.current.name,
            to = %plan.next.name,
            entry = ?entry_id,
            "Payment advanced"
        );

        Ok(AdvanceOutcome {
            payment_id,
            stage_id: plan.next.id,
            entry_id,
            is_paid: payment.is_paid,
        })
    }

    /// Moves the payment pointer to `target`, booking an entry when the stage asks for one
    ///
    /// Bank-side clones never book: their value is carried by the original.
    pub(crate) fn move_to_stage(
        &self,
        book: &mut PaymentBook,
        payment_id: PaymentId,
        target: &Stage,
        reason: MoveReason,
        ctx: &ActionContext,
    ) -> Result<Option<JournalEntryId>, PaymentError> {
        let books_entry = target.with_journal_entry && !book.payment(&payment_id)?.is_bank_side();
        let entry_id = if books_entry {
            let account = target.require_account()?;
            Some(transfer_value(book, payment_id, account, &target.name, ctx)?)
        } else {
            None
        };

        book.payment_mut(&payment_id)?
            .record_move(Some(target.id), entry_id, reason, ctx.as_of, ctx.user_id);
        Ok(entry_id)
    }

    /// Resets a posted payment to draft by reversing its initial entry
    ///
    /// Only allowed while the payment is still at its first stage and is not
    /// held by a sent batch.
    pub fn action_draft(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<JournalEntryId, PaymentError> {
        self.check_reset(uow.book(), payment_id)?;
        let entry_id = self.reset_to_draft(uow.book_mut(), payment_id, "Reset to draft", ctx)?;
        info!(payment = %payment_id, reversal = %entry_id, "Payment reset to draft");
        Ok(entry_id)
    }

    /// Cancels a payment; posted payments are first reset to draft
    pub fn action_cancel(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<Option<JournalEntryId>, PaymentError> {
        let state = uow.book().payment(&payment_id)?.state;
        let reversal = match state {
            PaymentState::Cancelled => {
                return Err(PaymentError::invalid_state(format!(
                    "Payment {} is already cancelled",
                    payment_id
                )))
            }
            PaymentState::Draft => None,
            PaymentState::Posted => {
                self.check_reset(uow.book(), payment_id)?;
                Some(self.reset_to_draft(uow.book_mut(), payment_id, "Cancelled", ctx)?)
            }
        };

        let book = uow.book_mut();
        let batch_id = book.payment(&payment_id)?.batch_id;
        if let Some(batch_id) = batch_id {
            let batch = book.batch_mut(&batch_id)?;
            batch.payment_ids.retain(|id| *id != payment_id);
        }
        let payment = book.payment_mut(&payment_id)?;
        payment.batch_id = None;
        payment.state = PaymentState::Cancelled;

        info!(payment = %payment_id, "Payment cancelled");
        Ok(reversal)
    }

    fn check_reset(&self, book: &PaymentBook, payment_id: PaymentId) -> Result<(), PaymentError> {
        let payment = book.payment(&payment_id)?;
        payment.require_posted()?;

        let first = book.catalog(&payment.method_id)?.first_stage(payment.banknote_type)?;
        if payment.stage_id != Some(first.id) {
            return Err(PaymentError::invalid_state(format!(
                "Payment {} can only be reset while in its first stage '{}'",
                payment.id, first.name
            )));
        }
        if let Some(batch_id) = payment.batch_id {
            if book.batch(&batch_id)?.state == BatchState::Sent {
                return Err(PaymentError::invalid_state(format!(
                    "Payment {} belongs to sent batch {}",
                    payment.id, batch_id
                )));
            }
        }
        if !book.active_links_of(&payment_id).is_empty() {
            return Err(PaymentError::invalid_state(format!(
                "Payment {} replaces other payments; unwind the replacement first",
                payment.id
            )));
        }
        Ok(())
    }

    pub(crate) fn reset_to_draft(
        &self,
        book: &mut PaymentBook,
        payment_id: PaymentId,
        reason: &str,
        ctx: &ActionContext,
    ) -> Result<JournalEntryId, PaymentError> {
        let payment = book.payment(&payment_id)?;
        let entry_id = payment.initial_entry.ok_or_else(|| PaymentError::MissingEntry {
            payment: payment_id.to_string(),
        })?;

        let ledger = book.ledger_mut();
        ledger.unreconcile_entry(&entry_id)?;
        let reversal = ledger.reverse(&entry_id, ctx.accounting_date(), reason)?;

        let payment = book.payment_mut(&payment_id)?;
        payment.record_move(None, Some(reversal), MoveReason::Reset, ctx.as_of, ctx.user_id);
        payment.state = PaymentState::Draft;
        payment.initial_entry = None;
        payment.holding_account = None;
        payment.is_paid = false;
        Ok(reversal)
    }

    /// Records a bank statement line
    pub fn register_statement_line(&self, uow: &mut UnitOfWork, line: StatementLine) -> Result<StatementLineId, PaymentError> {
        uow.book().ledger().require_journal(&line.journal_id)?;
        let id = line.id;
        uow.book_mut().insert_statement_line(line);
        Ok(id)
    }

    /// Links a statement line to a payment
    pub fn link_statement_line(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        line_id: StatementLineId,
    ) -> Result<(), PaymentError> {
        let book = uow.book();
        let payment = book.payment(&payment_id)?;
        let line = book.statement_line(&line_id)?;
        if let Some(other) = line.payment_id.filter(|p| *p != payment_id) {
            return Err(PaymentError::validation(format!(
                "Statement line {} is already linked to payment {}",
                line_id, other
            )));
        }
        if line.amount != payment.amount {
            return Err(PaymentError::validation(format!(
                "Statement line amount {} differs from payment amount {}",
                line.amount, payment.amount
            )));
        }

        let book = uow.book_mut();
        book.statement_line_mut(&line_id)?.payment_id = Some(payment_id);
        book.payment_mut(&payment_id)?.statement_line = Some(line_id);
        Ok(())
    }

    /// Flags a statement line as reconciled by the bank reconciliation service
    pub fn mark_statement_reconciled(&self, uow: &mut UnitOfWork, line_id: StatementLineId) -> Result<(), PaymentError> {
        uow.book_mut().statement_line_mut(&line_id)?.reconciled = true;
        Ok(())
    }
}

fn require_sent_batch(book: &PaymentBook, payment: &Payment) -> Result<(), PaymentError> {
    let sent = match payment.batch_id {
        Some(batch_id) => book.batch(&batch_id)?.state == BatchState::Sent,
        None => false,
    };
    if !sent {
        return Err(PaymentError::MustBeSent {
            payment: payment.id.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn require_reconciled_statement(book: &PaymentBook, payment: &Payment) -> Result<(), PaymentError> {
    let reconciled = match payment.statement_line {
        Some(line_id) => book.statement_line(&line_id)?.reconciled,
        None => false,
    };
    if !reconciled {
        return Err(PaymentError::MissingBankStatement {
            payment: payment.id.to_string(),
        });
    }
    Ok(())
}

/// Books the payment's open value from its holding account into `target`
///
/// Reconciles the line on the old holding account against the previous
/// entry, then makes `target` the new holding account.
pub(crate) fn transfer_value(
    book: &mut PaymentBook,
    payment_id: PaymentId,
    target: AccountId,
    label: &str,
    ctx: &ActionContext,
) -> Result<JournalEntryId, PaymentError> {
    let payment = book.payment(&payment_id)?.clone();
    let from = payment.require_holding_account()?;
    let amount = payment.remaining_to_replace()?;
    if !amount.is_positive() {
        return Err(PaymentError::invalid_state(format!(
            "Payment {} has no open amount left to move",
            payment.id
        )));
    }

    let side = entering_side(payment.direction);
    let draft = EntryDraft::new(payment.journal_id, ctx.accounting_date())
        .with_reference(payment.label())
        .for_document(PAYMENT_DOCUMENT, *payment.id.as_uuid())
        .line(target, Some(payment.partner_id), side, amount, label)
        .line(from, Some(payment.partner_id), side.opposite(), amount, payment.label());
    let entry_id = book.ledger_mut().post(draft)?;

    if let Some(prior) = payment.last_entry() {
        reconcile_with_prior(book.ledger_mut(), prior, entry_id, from, payment_id)?;
    }

    book.payment_mut(&payment_id)?.holding_account = Some(target);
    Ok(entry_id)
}

/// Open lines of an entry on `account` lying on `side`
pub(crate) fn open_lines(
    ledger: &Ledger,
    entry_id: JournalEntryId,
    account: AccountId,
    side: LineSide,
) -> Result<Vec<JournalLineId>, PaymentError> {
    Ok(ledger
        .require_entry(&entry_id)?
        .lines_on(account, side)
        .filter(|l| ledger.residual(&l.id).map_or(false, |r| !r.is_zero()))
        .map(|l| l.id)
        .collect())
}

/// Reconciles the lines `entry` booked on `account` with the prior entry's opposite lines
pub(crate) fn reconcile_with_prior(
    ledger: &mut Ledger,
    prior: JournalEntryId,
    entry: JournalEntryId,
    account: AccountId,
    payment_id: PaymentId,
) -> Result<(), PaymentError> {
    let new_lines: Vec<(JournalLineId, LineSide)> = ledger
        .require_entry(&entry)?
        .lines
        .iter()
        .filter(|l| l.account_id == account)
        .map(|l| (l.id, l.side))
        .collect();

    let mut ids = Vec::new();
    for (line, side) in &new_lines {
        ids.extend(open_lines(ledger, prior, account, side.opposite())?);
        ids.push(*line);
    }
    try_reconcile(ledger, &ids, payment_id)
}

/// Attempts a reconciliation, tolerating misses
pub(crate) fn try_reconcile(
    ledger: &mut Ledger,
    ids: &[JournalLineId],
    payment_id: PaymentId,
) -> Result<(), PaymentError> {
    match ledger.reconcile(ids) {
        Ok(outcome) => {
            debug!(
                payment = %payment_id,
                matched = %outcome.matched,
                full = outcome.is_full(),
                "Payment entry reconciled"
            );
            Ok(())
        }
        Err(err) if err.is_reconciliation_miss() => {
            warn!(payment = %payment_id, error = %err, "Reconciliation miss tolerated");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
