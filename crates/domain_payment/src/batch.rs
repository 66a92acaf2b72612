//! Batch payments and the journal switch
//!
//! A batch groups instruments physically handed to a bank together. Switching
//! a sent batch clones every member into a bank-side payment in the
//! destination journal, books the handoff and moves both payments past the
//! must-be-sent stage.
//!
//! The whole batch is checked before anything is touched. Members are then
//! processed one unit of work at a time: a failure stops the loop and the
//! members already switched stay switched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use core_kernel::{ActionContext, BatchId, JournalEntryId, JournalId, PaymentId, UserId};
use domain_ledger::EntryDraft;

use crate::book::PaymentBook;
use crate::engine::{reconcile_with_prior, require_reconciled_statement, StageEngine, PAYMENT_DOCUMENT};
use crate::error::PaymentError;
use crate::payment::{MoveReason, NewPayment, Payment, PaymentState, StageMove};
use crate::stage::{BanknoteType, StageType};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Draft,
    Validated,
    Sent,
}

/// An original payment and its bank-side clone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSidePair {
    pub original: PaymentId,
    pub bank_side: PaymentId,
}

/// Payments delivered to a bank together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPayment {
    pub id: BatchId,
    pub name: String,
    /// Journal the members were booked in
    pub journal_id: JournalId,
    /// Bank journal receiving the bank-side payments
    pub destination_journal_id: JournalId,
    /// Bank slip number
    pub external_ref: String,
    pub banknote_type: BanknoteType,
    pub payment_ids: Vec<PaymentId>,
    pub bank_side_payments: Vec<BankSidePair>,
    /// Advance members past the must-be-sent stage during the switch
    pub move_to_next_stage: bool,
    pub state: BatchState,
    pub sent_at: Option<NaiveDate>,
    pub created_by: UserId,
}

impl BatchPayment {
    pub fn is_sent(&self) -> bool {
        self.state == BatchState::Sent
    }

    /// Members without a bank-side clone yet
    pub fn pending_members(&self) -> Vec<PaymentId> {
        let done: HashSet<PaymentId> = self.bank_side_payments.iter().map(|p| p.original).collect();
        self.payment_ids
            .iter()
            .filter(|id| !done.contains(*id))
            .copied()
            .collect()
    }
}

/// Input for creating a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatch {
    pub name: String,
    pub journal_id: JournalId,
    pub destination_journal_id: JournalId,
    #[serde(default)]
    pub external_ref: String,
    #[serde(default)]
    pub banknote_type: BanknoteType,
    pub payment_ids: Vec<PaymentId>,
    #[serde(default = "default_move_to_next_stage")]
    pub move_to_next_stage: bool,
}

fn default_move_to_next_stage() -> bool {
    true
}

/// One member handled by a switch
#[derive(Debug, Clone, Serialize)]
pub struct SwitchedPayment {
    pub original: PaymentId,
    pub bank_side: PaymentId,
    pub handoff_entry: JournalEntryId,
    pub advanced: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSwitchReport {
    pub batch_id: BatchId,
    pub switched: Vec<SwitchedPayment>,
}

impl StageEngine {
    pub fn create_batch(
        &self,
        uow: &mut UnitOfWork,
        input: NewBatch,
        ctx: &ActionContext,
    ) -> Result<BatchId, PaymentError> {
        let book = uow.book();
        book.ledger().require_journal(&input.journal_id)?;
        book.ledger().require_journal(&input.destination_journal_id)?;
        if input.journal_id == input.destination_journal_id {
            return Err(PaymentError::validation(
                "Source and destination journals must differ",
            ));
        }
        for id in &input.payment_ids {
            let payment = book.payment(id)?;
            payment.require_posted()?;
            if payment.journal_id != input.journal_id {
                return Err(PaymentError::validation(format!(
                    "Payment {} is not booked in the batch journal",
                    payment.id
                )));
            }
            if let Some(other) = payment.batch_id {
                return Err(PaymentError::validation(format!(
                    "Payment {} already belongs to batch {}",
                    payment.id, other
                )));
            }
        }

        let mut seen = HashSet::new();
        let mut payment_ids = input.payment_ids;
        payment_ids.retain(|id| seen.insert(*id));
        let batch = BatchPayment {
            id: BatchId::new_v7(),
            name: input.name,
            journal_id: input.journal_id,
            destination_journal_id: input.destination_journal_id,
            external_ref: input.external_ref,
            banknote_type: input.banknote_type,
            payment_ids,
            bank_side_payments: Vec::new(),
            move_to_next_stage: input.move_to_next_stage,
            state: BatchState::Draft,
            sent_at: None,
            created_by: ctx.user_id,
        };
        let batch_id = batch.id;

        let book = uow.book_mut();
        for id in &batch.payment_ids {
            book.payment_mut(id)?.batch_id = Some(batch_id);
        }
        book.insert_batch(batch);

        info!(batch = %batch_id, "Batch created");
        Ok(batch_id)
    }

    /// Records the bank slip number of a batch not yet sent
    pub fn set_external_ref(
        &self,
        uow: &mut UnitOfWork,
        batch_id: BatchId,
        external_ref: String,
    ) -> Result<(), PaymentError> {
        let batch = uow.book_mut().batch_mut(&batch_id)?;
        if batch.is_sent() {
            return Err(PaymentError::invalid_state(format!("Batch {} was already sent", batch_id)));
        }
        batch.external_ref = external_ref;
        Ok(())
    }

    pub fn validate_batch(&self, uow: &mut UnitOfWork, batch_id: BatchId) -> Result<(), PaymentError> {
        let batch = uow.book_mut().batch_mut(&batch_id)?;
        if batch.state != BatchState::Draft {
            return Err(PaymentError::invalid_state(format!(
                "Batch {} is {:?}, only drafts can be validated",
                batch_id, batch.state
            )));
        }
        if batch.payment_ids.is_empty() {
            return Err(PaymentError::validation(format!("Batch {} has no payments", batch_id)));
        }
        batch.state = BatchState::Validated;
        info!(batch = %batch_id, "Batch validated");
        Ok(())
    }

    /// Checks the whole batch before any member is switched
    ///
    /// A sent batch whose switch stopped part way passes again; only its
    /// pending members are checked.
    pub fn check_switch(&self, book: &PaymentBook, batch_id: BatchId) -> Result<(), PaymentError> {
        let batch = book.batch(&batch_id)?;
        if batch.payment_ids.is_empty() {
            return Err(PaymentError::validation(format!("Batch {} has no payments", batch_id)));
        }
        if batch.external_ref.trim().is_empty() {
            return Err(PaymentError::validation(format!(
                "Batch {} has no bank reference",
                batch_id
            )));
        }
        match batch.state {
            BatchState::Validated => {}
            BatchState::Draft => {
                return Err(PaymentError::invalid_state(format!(
                    "Batch {} must be validated before it is sent",
                    batch_id
                )))
            }
            BatchState::Sent if batch.pending_members().is_empty() => {
                return Err(PaymentError::invalid_state(format!("Batch {} was already sent", batch_id)))
            }
            BatchState::Sent => {}
        }

        let destination = book.ledger().require_journal(&batch.destination_journal_id)?;
        if destination.transfer_account.is_none() {
            return Err(PaymentError::MissingJournalAccount {
                journal: destination.code.clone(),
                purpose: "transfer".to_string(),
            });
        }

        for id in &batch.pending_members() {
            let payment = book.payment(id)?;
            payment.require_posted()?;
            if payment.batch_id != Some(batch_id) || payment.journal_id != batch.journal_id {
                return Err(PaymentError::validation(format!(
                    "Payment {} does not belong to batch {}",
                    payment.id, batch_id
                )));
            }
            if let Some(kind) = payment.active_exception() {
                return Err(PaymentError::invalid_state(format!(
                    "Payment {} has an active '{}' exception",
                    payment.id, kind
                )));
            }
            if !batch.banknote_type.applies_to(payment.banknote_type) {
                return Err(PaymentError::validation(format!(
                    "Payment {} banknote type differs from the batch",
                    payment.id
                )));
            }

            let catalog = book.catalog(&payment.method_id)?;
            let current = catalog.require_stage(&payment.require_stage()?)?;
            if current.stage_type != StageType::MustBeSent {
                return Err(PaymentError::validation(format!(
                    "Payment {} is at stage '{}', not a must-be-sent stage",
                    payment.id, current.name
                )));
            }
            let holding = payment.require_holding_account()?;
            let last_entry = payment.last_entry().ok_or_else(|| PaymentError::MissingEntry {
                payment: payment.id.to_string(),
            })?;
            let entry = book.ledger().require_entry(&last_entry)?;
            if !entry.lines.iter().any(|l| l.account_id == holding) {
                return Err(PaymentError::MissingEntry {
                    payment: payment.id.to_string(),
                });
            }

            if batch.move_to_next_stage {
                let next = catalog
                    .get_next_stage(&current.id, payment.banknote_type)?
                    .ok_or_else(|| PaymentError::AlreadyLastStage {
                        payment: payment.id.to_string(),
                        stage: current.name.clone(),
                    })?;
                if next.stage_type.is_exception() {
                    return Err(PaymentError::ExceptionStageRequiresAction {
                        stage: next.name.clone(),
                    });
                }
                if next.stage_type == StageType::InBank && next.with_bank_statement {
                    require_reconciled_statement(book, payment)?;
                }
                if next.with_journal_entry {
                    next.require_account()?;
                }
            }
        }
        Ok(())
    }

    /// Switches a validated batch to its destination journal
    ///
    /// # Errors
    ///
    /// Any check failure is returned before a member is touched. A failure
    /// while processing a member is returned as `BatchPartialFailure`
    /// naming that member and the members already switched. Calling it
    /// again resumes with the members left over.
    #[instrument(skip(self, book, ctx), fields(batch = %batch_id))]
    pub fn switch_batch(
        &self,
        book: &mut PaymentBook,
        batch_id: BatchId,
        ctx: &ActionContext,
    ) -> Result<BatchSwitchReport, PaymentError> {
        self.check_switch(book, batch_id)?;

        let members = book.batch(&batch_id)?.pending_members();
        let mut switched = Vec::with_capacity(members.len());
        for payment_id in members {
            match UnitOfWork::run(book, |uow| self.switch_member(uow, batch_id, payment_id, ctx)) {
                Ok((member, _)) => switched.push(member),
                Err(err) => {
                    warn!(payment = %payment_id, error = %err, "Batch switch stopped");
                    return Err(PaymentError::BatchPartialFailure {
                        batch: batch_id.to_string(),
                        payment: payment_id.to_string(),
                        processed: switched.iter().map(|s: &SwitchedPayment| s.original).collect(),
                        source: Box::new(err),
                    });
                }
            }
        }

        info!(batch = %batch_id, payments = switched.len(), "Batch switched");
        Ok(BatchSwitchReport { batch_id, switched })
    }

    fn switch_member(
        &self,
        uow: &mut UnitOfWork,
        batch_id: BatchId,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<SwitchedPayment, PaymentError> {
        let batch = uow.book_mut().batch_mut(&batch_id)?;
        if !batch.is_sent() {
            batch.state = BatchState::Sent;
            batch.sent_at = Some(ctx.as_of);
        }
        let batch = batch.clone();

        let book = uow.book();
        let destination = book.ledger().require_journal(&batch.destination_journal_id)?.clone();
        let transfer = destination
            .transfer_account
            .ok_or_else(|| PaymentError::MissingJournalAccount {
                journal: destination.code.clone(),
                purpose: "transfer".to_string(),
            })?;
        let original = book.payment(&payment_id)?.clone();
        let holding = original.require_holding_account()?;
        let source_entry = original.last_entry().ok_or_else(|| PaymentError::MissingEntry {
            payment: payment_id.to_string(),
        })?;
        let template = book.ledger().require_entry(&source_entry)?.clone();

        let mut clone = Payment::new(
            NewPayment {
                method_id: original.method_id,
                journal_id: destination.id,
                partner_id: original.partner_id,
                direction: original.direction,
                amount: original.amount,
                counterpart_account: original.counterpart_account,
                transaction_number: original.transaction_number.clone(),
                due_date: original.due_date,
                certified: original.certified,
                banknote_type: original.banknote_type,
            },
            ctx.company_id,
            ctx.user_id,
        )?;

        // Mirror the last entry: the holding line keeps its account, the
        // others land on the destination's transfer account
        let mut draft = EntryDraft::new(destination.id, ctx.accounting_date())
            .with_reference(format!("{} {}", batch.external_ref.trim(), original.label()))
            .for_document(PAYMENT_DOCUMENT, *clone.id.as_uuid());
        for line in &template.lines {
            let account = if line.account_id == holding || Some(line.account_id) == destination.skip_account {
                line.account_id
            } else {
                transfer
            };
            draft = draft.line(
                account,
                line.partner_id,
                line.side.opposite(),
                line.amount,
                format!("Bank handoff: {}", line.label),
            );
        }
        if let Some(skip) = destination.skip_account {
            let dropped = draft.drop_account(skip);
            if dropped > 0 {
                debug!(payment = %payment_id, dropped, "Skip account lines left out of the handoff");
            }
        }
        if !draft.lines.iter().any(|l| l.account_id == transfer) {
            // Every counter line was skipped; the transfer account takes the whole value
            for line in template.lines.iter().filter(|l| l.account_id == holding) {
                draft = draft.line(
                    transfer,
                    line.partner_id,
                    line.side,
                    line.amount,
                    format!("Bank handoff: {}", original.label()),
                );
            }
        }
        draft.rebalance()?;

        let entry_id = uow.book_mut().ledger_mut().post(draft)?;
        reconcile_with_prior(uow.book_mut().ledger_mut(), source_entry, entry_id, holding, payment_id)?;

        clone.state = PaymentState::Posted;
        clone.origin_payment = Some(payment_id);
        clone.batch_id = Some(batch_id);
        clone.statement_line = original.statement_line;
        clone.initial_entry = Some(entry_id);
        clone.holding_account = Some(transfer);
        clone.stage_id = original.stage_id;
        clone.history.push(StageMove {
            from: None,
            to: original.stage_id,
            entry_id: Some(entry_id),
            reason: MoveReason::Handoff,
            at: ctx.as_of,
            user: ctx.user_id,
        });
        let clone_id = clone.id;

        let book = uow.book_mut();
        book.insert_payment(clone);
        let original_mut = book.payment_mut(&payment_id)?;
        original_mut.holding_account = Some(transfer);
        let stage = original_mut.stage_id;
        original_mut.record_move(stage, Some(entry_id), MoveReason::Handoff, ctx.as_of, ctx.user_id);
        book.batch_mut(&batch_id)?.bank_side_payments.push(BankSidePair {
            original: payment_id,
            bank_side: clone_id,
        });

        let advanced = batch.move_to_next_stage;
        if advanced {
            self.advance(uow, payment_id, ctx)?;
            self.advance(uow, clone_id, ctx)?;
        }

        info!(
            batch = %batch_id,
            payment = %payment_id,
            bank_side = %clone_id,
            entry = %entry_id,
            advanced,
            "Payment handed to bank"
        );

        Ok(SwitchedPayment {
            original: payment_id,
            bank_side: clone_id,
            handoff_entry: entry_id,
            advanced,
        })
    }
}
