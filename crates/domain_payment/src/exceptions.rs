//! Exception branches: butterfly, prior notice and unpaid
//!
//! Each branch moves the payment straight into its method's exception stage
//! and books the matching entry. At most one exception is active per
//! payment: unpaid may follow an active prior notice or butterfly, in which
//! case the earlier exception is first compensated back into the bank and
//! marked fixed. Regularizing (`set_paid`) books the way back into the bank.

use tracing::info;

use core_kernel::{ActionContext, JournalEntryId, PartyId, PaymentId};

use crate::blocking::BlockingDirective;
use crate::book::PaymentBook;
use crate::engine::StageEngine;
use crate::error::PaymentError;
use crate::payment::{ExceptionKind, MoveReason, PaymentState};
use crate::query::PaymentQuery;
use crate::unit_of_work::UnitOfWork;

/// Entries booked by an exception action
#[derive(Debug, Clone, Default)]
pub struct ExceptionOutcome {
    /// Move back into the bank out of the previous exception
    pub compensation_entry: Option<JournalEntryId>,
    pub entry: Option<JournalEntryId>,
}

impl StageEngine {
    pub fn set_butterfly(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<ExceptionOutcome, PaymentError> {
        self.raise_exception(uow, payment_id, ExceptionKind::Butterfly, ctx)
    }

    pub fn set_prior_notice(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<ExceptionOutcome, PaymentError> {
        self.raise_exception(uow, payment_id, ExceptionKind::PriorNotice, ctx)
    }

    pub fn set_unpaid(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<ExceptionOutcome, PaymentError> {
        self.raise_exception(uow, payment_id, ExceptionKind::Unpaid, ctx)
    }

    fn raise_exception(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        kind: ExceptionKind,
        ctx: &ActionContext,
    ) -> Result<ExceptionOutcome, PaymentError> {
        let payment = uow.book().payment(&payment_id)?.clone();
        payment.require_posted()?;
        payment.require_own_lifecycle()?;
        if payment.exceptions.get(kind).is_active() {
            return Err(PaymentError::ExceptionAlreadyActive {
                payment: payment.id.to_string(),
                kind: kind.to_string(),
            });
        }
        if payment.is_replaced {
            return Err(PaymentError::invalid_state(format!(
                "Payment {} was replaced",
                payment.id
            )));
        }

        let catalog = uow.book().catalog(&payment.method_id)?;
        let target = catalog.exception_stage(kind)?.clone();
        if target.with_journal_entry {
            target.require_account()?;
        }

        let previous = payment.active_exception();
        let compensation_stage = match previous {
            Some(active) if kind == ExceptionKind::Unpaid => {
                let in_bank = catalog.in_bank_stage()?.clone();
                if in_bank.with_journal_entry {
                    in_bank.require_account()?;
                }
                Some((active, in_bank))
            }
            Some(active) => {
                return Err(PaymentError::invalid_state(format!(
                    "Payment {} already has an active '{}' exception",
                    payment.id, active
                )))
            }
            None => None,
        };

        let mut outcome = ExceptionOutcome::default();

        if let Some((active, in_bank)) = compensation_stage {
            outcome.compensation_entry = self.move_to_stage(
                uow.book_mut(),
                payment_id,
                &in_bank,
                MoveReason::Compensation(active),
                ctx,
            )?;
            uow.book_mut()
                .payment_mut(&payment_id)?
                .exceptions
                .get_mut(active)
                .fix()?;
        }

        outcome.entry = self.move_to_stage(
            uow.book_mut(),
            payment_id,
            &target,
            MoveReason::Exception(kind),
            ctx,
        )?;

        let payment = uow.book_mut().payment_mut(&payment_id)?;
        payment.exceptions.get_mut(kind).activate();
        payment.is_paid = false;
        let partner = payment.partner_id;
        let label = payment.label();

        if kind.blocks_counterparty() {
            uow.defer(BlockingDirective::Block {
                partner,
                reason: format!("Payment {} set to {}", label, kind),
            });
        }

        info!(
            payment = %payment_id,
            exception = %kind,
            compensated = ?previous,
            "Payment exception raised"
        );
        Ok(outcome)
    }

    /// Regularizes an active exception by moving the payment back into the bank
    pub fn set_paid(
        &self,
        uow: &mut UnitOfWork,
        payment_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<Option<JournalEntryId>, PaymentError> {
        let payment = uow.book().payment(&payment_id)?.clone();
        payment.require_posted()?;
        payment.require_own_lifecycle()?;
        let kind = payment
            .active_exception()
            .ok_or_else(|| PaymentError::NotInExceptionState {
                payment: payment.id.to_string(),
            })?;

        let in_bank = uow.book().catalog(&payment.method_id)?.in_bank_stage()?.clone();
        if in_bank.with_journal_entry {
            in_bank.require_account()?;
        }

        let entry = self.move_to_stage(
            uow.book_mut(),
            payment_id,
            &in_bank,
            MoveReason::Regularized(kind),
            ctx,
        )?;

        let payment = uow.book_mut().payment_mut(&payment_id)?;
        payment.exceptions.get_mut(kind).fix()?;
        payment.is_paid = true;
        let partner = payment.partner_id;

        if kind.blocks_counterparty() && !counterparty_still_blocked(uow.book(), partner) {
            uow.defer(BlockingDirective::Unblock {
                partner,
                reason: format!("Payment {} regularized", payment_id),
            });
        }

        info!(payment = %payment_id, exception = %kind, entry = ?entry, "Payment regularized");
        Ok(entry)
    }
}

/// True when some posted payment of `partner` still has a blocking exception active
pub(crate) fn counterparty_still_blocked(book: &PaymentBook, partner: PartyId) -> bool {
    !book
        .search(
            &PaymentQuery::for_partner(partner)
                .state(PaymentState::Posted)
                .blocking(),
        )
        .is_empty()
}
