//! Replacement engine
//!
//! A new instrument settles one or more payments stuck in an unpaid or
//! butterfly exception. Its amount is allocated over the originals, its
//! counter lines are booked on the originals' exception accounts and then
//! reconciled against their open lines. Each allocation is recorded as an
//! append-only [`ReplacementLink`], which is what an unwind replays in
//! reverse.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use core_kernel::{
    AccountId, ActionContext, JournalEntryId, JournalLineId, Money, PaymentId, ReplacementLinkId,
    UserId,
};
use domain_ledger::EntryDraft;

use crate::blocking::BlockingDirective;
use crate::engine::{entering_side, open_lines, try_reconcile, StageEngine, PAYMENT_DOCUMENT};
use crate::error::PaymentError;
use crate::exceptions::counterparty_still_blocked;
use crate::payment::{ExceptionFlag, ExceptionKind, MoveReason, Payment, PaymentState};
use crate::settings::AllocationOrder;
use crate::unit_of_work::UnitOfWork;

/// Allocation of part of a replacement payment to one original payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplacementLink {
    pub id: ReplacementLinkId,
    /// The payment being replaced
    pub original: PaymentId,
    /// The payment replacing it
    pub replacement: PaymentId,
    pub amount: Money,
    /// Position in the allocation order
    pub sequence: u32,
    pub exception: ExceptionKind,
    /// Original's exception flag before this allocation
    pub flag_before: ExceptionFlag,
    pub was_paid_before: bool,
    pub was_replaced_before: bool,
    /// Length of the original's stage history when the link was made
    pub history_mark: usize,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub unwound_at: Option<DateTime<Utc>>,
    pub unwound_by: Option<UserId>,
}

impl ReplacementLink {
    pub fn is_active(&self) -> bool {
        self.unwound_at.is_none()
    }
}

/// Result of a replacement
#[derive(Debug, Clone)]
pub struct ReplacementOutcome {
    pub replacement: PaymentId,
    pub entry_id: JournalEntryId,
    pub links: Vec<ReplacementLinkId>,
    /// Part of the replacement amount absorbed by the originals
    pub consumed: Money,
    /// Part booked on the counterpart account
    pub excess: Money,
}

#[derive(Debug, Clone)]
struct Allocation {
    original: PaymentId,
    amount: Money,
    account: AccountId,
    exception: ExceptionKind,
    flag_before: ExceptionFlag,
    was_paid_before: bool,
    was_replaced_before: bool,
    history_mark: usize,
    /// Last entry of the original, holding its open exception line
    source_entry: JournalEntryId,
}

/// Orders candidates by remaining amount, ties broken by id
pub fn allocation_order(order: AllocationOrder, candidates: &mut [(PaymentId, Money)]) {
    candidates.sort_by(|a, b| {
        let by_amount = a.1.amount().cmp(&b.1.amount());
        let by_amount = match order {
            AllocationOrder::LargestRemainingFirst => by_amount.reverse(),
            AllocationOrder::SmallestRemainingFirst => by_amount,
        };
        by_amount.then_with(|| a.0.cmp(&b.0))
    });
}

impl StageEngine {
    /// Replaces `originals` with the draft payment `replacement_id`
    ///
    /// # Errors
    ///
    /// - No originals, or the same original given twice
    /// - The replacement is not a draft, or differs in direction, partner or currency
    /// - An original is not posted, has no active unpaid/butterfly exception, or nothing left to replace
    pub fn replace(
        &self,
        uow: &mut UnitOfWork,
        originals: &[PaymentId],
        replacement_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<ReplacementOutcome, PaymentError> {
        let (replacement, allocations) = self.plan_replacement(uow, originals, replacement_id)?;

        let currency = replacement.currency();
        let consumed = Money::sum(currency, allocations.iter().map(|a| &a.amount))?;
        let excess = replacement.amount.checked_sub(&consumed)?;

        // One counter line per distinct exception account, in allocation order
        let mut accounts: Vec<(AccountId, Money)> = Vec::new();
        for allocation in &allocations {
            match accounts.iter_mut().find(|(a, _)| *a == allocation.account) {
                Some((_, total)) => *total = total.checked_add(&allocation.amount)?,
                None => accounts.push((allocation.account, allocation.amount)),
            }
        }
        let mut weights: Vec<Decimal> = accounts.iter().map(|(_, m)| m.amount()).collect();
        if excess.is_positive() {
            weights.push(excess.amount());
        }
        let parts = replacement.amount.split_by_weights(&weights)?;

        let first = uow
            .book()
            .catalog(&replacement.method_id)?
            .first_stage(replacement.banknote_type)?
            .clone();
        let stage_account = first.require_account()?;

        let side = entering_side(replacement.direction);
        let mut draft = EntryDraft::new(replacement.journal_id, ctx.accounting_date())
            .with_reference(format!("Replacement {}", replacement.label()))
            .for_document(PAYMENT_DOCUMENT, *replacement.id.as_uuid())
            .line(
                stage_account,
                Some(replacement.partner_id),
                side,
                replacement.amount,
                first.name.clone(),
            );
        for ((account, _), part) in accounts.iter().zip(parts.iter()) {
            draft = draft.line(
                *account,
                Some(replacement.partner_id),
                side.opposite(),
                *part,
                format!("Replacement {}", replacement.label()),
            );
        }
        if excess.is_positive() {
            if let Some(part) = parts.last() {
                draft = draft.line(
                    replacement.counterpart_account,
                    Some(replacement.partner_id),
                    side.opposite(),
                    *part,
                    replacement.label(),
                );
            }
        }
        let entry_id = uow.book_mut().ledger_mut().post(draft)?;

        // Match each counter line with the originals' open lines on the same account
        for (account, _) in &accounts {
            let ledger = uow.book().ledger();
            let mut ids: Vec<JournalLineId> = ledger
                .require_entry(&entry_id)?
                .lines_on(*account, side.opposite())
                .map(|l| l.id)
                .collect();
            for allocation in allocations.iter().filter(|a| a.account == *account) {
                ids.extend(open_lines(ledger, allocation.source_entry, *account, side)?);
            }
            try_reconcile(uow.book_mut().ledger_mut(), &ids, replacement_id)?;
        }

        let book = uow.book_mut();
        let payment = book.payment_mut(&replacement_id)?;
        payment.state = PaymentState::Posted;
        payment.initial_entry = Some(entry_id);
        payment.holding_account = Some(stage_account);
        payment.record_move(Some(first.id), Some(entry_id), MoveReason::Posted, ctx.as_of, ctx.user_id);

        let mut links = Vec::with_capacity(allocations.len());
        let mut fixed_blocking = false;
        for (sequence, allocation) in allocations.iter().enumerate() {
            let original = book.payment_mut(&allocation.original)?;
            original.replaced_amount = original.replaced_amount.checked_add(&allocation.amount)?;
            if original.replaced_amount.amount() >= original.amount.amount() {
                original.is_replaced = true;
                original.is_paid = true;
                original.exceptions.get_mut(allocation.exception).fix()?;
                fixed_blocking |= allocation.exception.blocks_counterparty();
            }
            debug!(
                original = %allocation.original,
                allocated = %allocation.amount,
                replaced = %original.replaced_amount,
                "Replacement allocated"
            );

            let link = ReplacementLink {
                id: ReplacementLinkId::new_v7(),
                original: allocation.original,
                replacement: replacement_id,
                amount: allocation.amount,
                sequence: sequence as u32,
                exception: allocation.exception,
                flag_before: allocation.flag_before,
                was_paid_before: allocation.was_paid_before,
                was_replaced_before: allocation.was_replaced_before,
                history_mark: allocation.history_mark,
                created_at: Utc::now(),
                created_by: ctx.user_id,
                unwound_at: None,
                unwound_by: None,
            };
            links.push(link.id);
            book.push_link(link);
        }

        if fixed_blocking && !counterparty_still_blocked(uow.book(), replacement.partner_id) {
            uow.defer(BlockingDirective::Unblock {
                partner: replacement.partner_id,
                reason: format!("Unpaid payments replaced by {}", replacement.label()),
            });
        }

        info!(
            replacement = %replacement_id,
            originals = allocations.len(),
            consumed = %consumed,
            excess = %excess,
            "Payments replaced"
        );

        Ok(ReplacementOutcome {
            replacement: replacement_id,
            entry_id,
            links,
            consumed,
            excess,
        })
    }

    /// Validates a replacement request and computes the allocation
    fn plan_replacement(
        &self,
        uow: &UnitOfWork,
        originals: &[PaymentId],
        replacement_id: PaymentId,
    ) -> Result<(Payment, Vec<Allocation>), PaymentError> {
        if originals.is_empty() {
            return Err(PaymentError::validation("No payment to replace"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = originals.iter().find(|id| !seen.insert(**id)) {
            return Err(PaymentError::validation(format!(
                "Payment {} is listed twice",
                dup
            )));
        }
        if originals.contains(&replacement_id) {
            return Err(PaymentError::validation("A payment cannot replace itself"));
        }

        let book = uow.book();
        let replacement = book.payment(&replacement_id)?.clone();
        if replacement.state != PaymentState::Draft {
            return Err(PaymentError::invalid_state(format!(
                "Replacement payment {} must be a draft",
                replacement.id
            )));
        }

        let mut candidates = Vec::with_capacity(originals.len());
        for id in originals {
            let original = book.payment(id)?;
            original.require_posted()?;
            original.require_own_lifecycle()?;
            if original.direction != replacement.direction {
                return Err(PaymentError::validation(format!(
                    "Payment {} has a different direction than the replacement",
                    original.id
                )));
            }
            if original.partner_id != replacement.partner_id {
                return Err(PaymentError::validation(format!(
                    "Payment {} belongs to another counterparty",
                    original.id
                )));
            }
            if original.currency() != replacement.currency() {
                return Err(PaymentError::validation(format!(
                    "Payment {} is in {}, the replacement in {}",
                    original.id,
                    original.currency(),
                    replacement.currency()
                )));
            }
            let kind = original
                .active_exception()
                .filter(|k| k.is_replaceable())
                .ok_or_else(|| {
                    PaymentError::validation(format!(
                        "Payment {} is not unpaid or butterfly",
                        original.id
                    ))
                })?;
            let remaining = original.remaining_to_replace()?;
            if !remaining.is_positive() {
                return Err(PaymentError::validation(format!(
                    "Payment {} is already fully replaced",
                    original.id
                )));
            }
            original.require_holding_account()?;
            original.last_entry().ok_or_else(|| PaymentError::MissingEntry {
                payment: original.id.to_string(),
            })?;
            debug!(original = %original.id, exception = %kind, remaining = %remaining, "Replacement candidate");
            candidates.push((original.id, remaining));
        }

        allocation_order(self.settings().allocation_order, &mut candidates);

        let mut left = replacement.amount;
        let mut allocations = Vec::new();
        for (id, remaining) in candidates {
            if !left.is_positive() {
                break;
            }
            let amount = left.min(&remaining)?;
            left = left.checked_sub(&amount)?;

            let original = book.payment(&id)?;
            let exception = original
                .active_exception()
                .ok_or_else(|| PaymentError::NotInExceptionState { payment: id.to_string() })?;
            allocations.push(Allocation {
                original: id,
                amount,
                account: original.require_holding_account()?,
                exception,
                flag_before: original.exceptions.get(exception),
                was_paid_before: original.is_paid,
                was_replaced_before: original.is_replaced,
                history_mark: original.history.len(),
                source_entry: original.last_entry().ok_or_else(|| PaymentError::MissingEntry {
                    payment: id.to_string(),
                })?,
            });
        }

        Ok((replacement, allocations))
    }

    /// Undoes a replacement that is still in its first stage
    ///
    /// The replacement entry is unreconciled and reversed, the replacement is
    /// cancelled and each original gets back the replaced amount, flags and
    /// paid state it had before, in reverse allocation order.
    pub fn unwind_replacement(
        &self,
        uow: &mut UnitOfWork,
        replacement_id: PaymentId,
        ctx: &ActionContext,
    ) -> Result<JournalEntryId, PaymentError> {
        let book = uow.book();
        let mut links: Vec<_> = book
            .active_links_of(&replacement_id)
            .into_iter()
            .cloned()
            .collect();
        if links.is_empty() {
            return Err(PaymentError::validation(format!(
                "Payment {} has no active replacement",
                replacement_id
            )));
        }

        let replacement = book.payment(&replacement_id)?.clone();
        replacement.require_posted()?;
        let first = book
            .catalog(&replacement.method_id)?
            .first_stage(replacement.banknote_type)?;
        if replacement.stage_id != Some(first.id) {
            return Err(PaymentError::invalid_state(format!(
                "Replacement {} has left its first stage and can no longer be unwound",
                replacement.id
            )));
        }
        for link in &links {
            let original = book.payment(&link.original)?;
            if let Some(active) = original.active_exception().filter(|k| *k != link.exception) {
                return Err(PaymentError::invalid_state(format!(
                    "Payment {} has since entered a '{}' exception",
                    original.id, active
                )));
            }
            if original.history.len() != link.history_mark {
                return Err(PaymentError::invalid_state(format!(
                    "Payment {} has changed stage since it was replaced",
                    original.id
                )));
            }
            // Links are appended, so anything after this one was made later
            let later = book
                .links()
                .iter()
                .skip_while(|l| l.id != link.id)
                .any(|l| l.is_active() && l.original == link.original && l.replacement != replacement_id);
            if later {
                return Err(PaymentError::invalid_state(format!(
                    "Payment {} has a later replacement that must be unwound first",
                    original.id
                )));
            }
        }

        let reversal = self.reset_to_draft(uow.book_mut(), replacement_id, "Replacement unwound", ctx)?;

        links.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        let mut reblock = false;
        let book = uow.book_mut();
        for link in &links {
            let original = book.payment_mut(&link.original)?;
            original.replaced_amount = original.replaced_amount.checked_sub(&link.amount)?;
            *original.exceptions.get_mut(link.exception) = link.flag_before;
            original.is_paid = link.was_paid_before;
            original.is_replaced = link.was_replaced_before;
            reblock |= link.flag_before.is_active() && link.exception.blocks_counterparty();
        }

        let unwound: HashSet<ReplacementLinkId> = links.iter().map(|l| l.id).collect();
        let now = Utc::now();
        for link in book.links_mut().filter(|l| unwound.contains(&l.id)) {
            link.unwound_at = Some(now);
            link.unwound_by = Some(ctx.user_id);
        }

        let payment = book.payment_mut(&replacement_id)?;
        payment.state = PaymentState::Cancelled;

        if reblock {
            uow.defer(BlockingDirective::Block {
                partner: replacement.partner_id,
                reason: format!("Replacement {} unwound", replacement.label()),
            });
        }

        info!(replacement = %replacement_id, originals = links.len(), "Replacement unwound");
        Ok(reversal)
    }
}
