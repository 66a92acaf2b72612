//! Double-entry ledger implementation
//!
//! Holds the chart of accounts, the journals, every posted entry and the
//! reconciliation state of each line.

use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use core_kernel::{
    AccountId, Currency, JournalEntryId, JournalId, JournalLineId, MatchingId, Money,
    ReconciliationId,
};

use crate::account::Account;
use crate::entry::{EntryDraft, JournalEntry, JournalLine, LineSide};
use crate::error::LedgerError;
use crate::journal::Journal;
use crate::query::LineQuery;
use crate::reconciliation::{PartialReconciliation, ReconcileOutcome};

/// The ledger for a single company currency
///
/// # Invariants
///
/// - Every posted entry balances (debits = credits)
/// - Posted entries are never modified, only reversed
/// - A line's residual never exceeds its amount and never drops below zero
/// - Lines carrying a matching number all have a zero residual
#[derive(Debug, Clone)]
pub struct Ledger {
    currency: Currency,
    accounts: HashMap<AccountId, Account>,
    journals: HashMap<JournalId, Journal>,
    entries: Vec<JournalEntry>,
    entry_index: HashMap<JournalEntryId, usize>,
    /// Line id -> (entry position, line position)
    line_index: HashMap<JournalLineId, (usize, usize)>,
    residuals: HashMap<JournalLineId, Money>,
    partials: Vec<PartialReconciliation>,
    matchings: HashMap<JournalLineId, MatchingId>,
    /// Debit minus credit per account
    balances: HashMap<AccountId, Money>,
}

impl Ledger {
    /// Creates an empty ledger keeping its books in `currency`
    pub fn new(currency: Currency) -> Self {
        Self {
            currency,
            accounts: HashMap::new(),
            journals: HashMap::new(),
            entries: Vec::new(),
            entry_index: HashMap::new(),
            line_index: HashMap::new(),
            residuals: HashMap::new(),
            partials: Vec::new(),
            matchings: HashMap::new(),
            balances: HashMap::new(),
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Adds an account to the chart of accounts
    ///
    /// # Errors
    ///
    /// Returns error if account already exists
    pub fn add_account(&mut self, account: Account) -> Result<(), LedgerError> {
        if self.accounts.contains_key(&account.id) {
            return Err(LedgerError::AccountAlreadyExists(account.id.to_string()));
        }
        self.balances.insert(account.id, Money::zero(self.currency));
        self.accounts.insert(account.id, account);
        Ok(())
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn require_account(&self, id: &AccountId) -> Result<&Account, LedgerError> {
        self.accounts
            .get(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    pub fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account, LedgerError> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    pub fn add_journal(&mut self, journal: Journal) -> Result<(), LedgerError> {
        if self.journals.contains_key(&journal.id) {
            return Err(LedgerError::JournalAlreadyExists(journal.id.to_string()));
        }
        for account in journal.transfer_account.iter().chain(journal.skip_account.iter()) {
            self.require_account(account)?;
        }
        self.journals.insert(journal.id, journal);
        Ok(())
    }

    pub fn journal(&self, id: &JournalId) -> Option<&Journal> {
        self.journals.get(id)
    }

    pub fn require_journal(&self, id: &JournalId) -> Result<&Journal, LedgerError> {
        self.journals
            .get(id)
            .ok_or_else(|| LedgerError::JournalNotFound(id.to_string()))
    }

    /// Current balance (debit minus credit) of an account
    pub fn balance(&self, id: &AccountId) -> Option<Money> {
        self.balances.get(id).copied()
    }

    /// Posts a draft entry
    ///
    /// # Errors
    ///
    /// - The journal or an account does not exist, or an account is inactive
    /// - Fewer than two lines, a non-positive line, or a foreign currency line
    /// - The draft only has lines on one side
    /// - Debits and credits differ
    pub fn post(&mut self, draft: EntryDraft) -> Result<JournalEntryId, LedgerError> {
        self.require_journal(&draft.journal_id)?;
        self.validate_draft(&draft)?;

        let entry_id = JournalEntryId::new_v7();
        let lines: Vec<JournalLine> = draft
            .lines
            .iter()
            .map(|l| JournalLine {
                id: JournalLineId::new_v7(),
                entry_id,
                journal_id: draft.journal_id,
                account_id: l.account_id,
                partner_id: l.partner_id,
                side: l.side,
                amount: l.amount,
                label: l.label.clone(),
                date: draft.date,
            })
            .collect();

        let entry_pos = self.entries.len();
        for (line_pos, line) in lines.iter().enumerate() {
            self.line_index.insert(line.id, (entry_pos, line_pos));
            self.residuals.insert(line.id, line.amount);
            let balance = self
                .balances
                .get_mut(&line.account_id)
                .ok_or_else(|| LedgerError::AccountNotFound(line.account_id.to_string()))?;
            *balance = balance.checked_add(&line.balance())?;
        }

        self.entries.push(JournalEntry {
            id: entry_id,
            journal_id: draft.journal_id,
            date: draft.date,
            reference: draft.reference,
            reference_type: draft.reference_type,
            reference_id: draft.reference_id,
            lines,
            reversal_of: None,
            reversed_by: None,
            created_at: Utc::now(),
        });
        self.entry_index.insert(entry_id, entry_pos);

        debug!(entry = %entry_id, "Journal entry posted");
        Ok(entry_id)
    }

    fn validate_draft(&self, draft: &EntryDraft) -> Result<(), LedgerError> {
        if draft.lines.len() < 2 {
            return Err(LedgerError::InvalidLine(
                "An entry needs at least two lines".to_string(),
            ));
        }

        for line in &draft.lines {
            if line.amount.currency() != self.currency {
                return Err(LedgerError::InvalidLine(format!(
                    "Line in {} on a {} ledger",
                    line.amount.currency(),
                    self.currency
                )));
            }
            if !line.amount.is_positive() {
                return Err(LedgerError::InvalidLine(format!(
                    "Line amount must be positive: {}",
                    line.amount
                )));
            }
            let account = self.require_account(&line.account_id)?;
            if !account.is_active {
                return Err(LedgerError::InvalidLine(format!(
                    "Account {} is inactive",
                    account.code
                )));
            }
        }

        let has_debit = draft.lines.iter().any(|l| l.side == LineSide::Debit);
        let has_credit = draft.lines.iter().any(|l| l.side == LineSide::Credit);
        if !has_debit || !has_credit {
            return Err(LedgerError::InvalidLine(
                "An entry needs both debit and credit lines".to_string(),
            ));
        }

        let (debits, credits) = draft.totals()?;
        if debits != credits {
            return Err(LedgerError::UnbalancedEntry {
                debits: debits.amount(),
                credits: credits.amount(),
            });
        }

        Ok(())
    }

    pub fn entry(&self, id: &JournalEntryId) -> Option<&JournalEntry> {
        self.entry_index.get(id).map(|pos| &self.entries[*pos])
    }

    pub fn require_entry(&self, id: &JournalEntryId) -> Result<&JournalEntry, LedgerError> {
        self.entry(id)
            .ok_or_else(|| LedgerError::EntryNotFound(id.to_string()))
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.iter()
    }

    pub fn line(&self, id: &JournalLineId) -> Option<&JournalLine> {
        self.line_index
            .get(id)
            .map(|(entry_pos, line_pos)| &self.entries[*entry_pos].lines[*line_pos])
    }

    pub fn require_line(&self, id: &JournalLineId) -> Result<&JournalLine, LedgerError> {
        self.line(id)
            .ok_or_else(|| LedgerError::LineNotFound(id.to_string()))
    }

    /// Amount of the line not yet matched by any reconciliation
    pub fn residual(&self, id: &JournalLineId) -> Option<Money> {
        self.residuals.get(id).copied()
    }

    pub fn matching_of(&self, id: &JournalLineId) -> Option<MatchingId> {
        self.matchings.get(id).copied()
    }

    pub fn is_fully_reconciled(&self, id: &JournalLineId) -> bool {
        self.residual(id).map_or(false, |r| r.is_zero())
    }

    /// Partial reconciliation records touching a line
    pub fn partials_of(&self, id: &JournalLineId) -> Vec<&PartialReconciliation> {
        self.partials.iter().filter(|p| p.touches(*id)).collect()
    }

    /// Lines matching a typed query, in posting order
    pub fn lines(&self, query: &LineQuery) -> Vec<&JournalLine> {
        self.entries
            .iter()
            .flat_map(|e| e.lines.iter())
            .filter(|l| query.matches(l))
            .filter(|l| {
                !query.unreconciled_only || self.residual(&l.id).map_or(false, |r| !r.is_zero())
            })
            .collect()
    }

    /// Reconciles lines of one reconcilable account against each other
    ///
    /// Debit and credit residuals are paired in the order given. The call may
    /// leave residuals behind (partial reconciliation); a matching number is
    /// only assigned when every line of the connected group is settled.
    ///
    /// # Errors
    ///
    /// `ReconciliationMismatch` when lines sit on different or non-reconcilable
    /// accounts or all lie on the same side; `AlreadyReconciled` when nothing
    /// is left to match.
    pub fn reconcile(&mut self, line_ids: &[JournalLineId]) -> Result<ReconcileOutcome, LedgerError> {
        let mut seen = HashSet::new();
        let unique: Vec<JournalLineId> = line_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if unique.len() < 2 {
            return Err(LedgerError::mismatch("At least two lines are required"));
        }

        let lines: Vec<JournalLine> = unique
            .iter()
            .map(|id| self.require_line(id).cloned())
            .collect::<Result<_, _>>()?;

        let account_id = lines[0].account_id;
        if lines.iter().any(|l| l.account_id != account_id) {
            return Err(LedgerError::mismatch("Lines belong to different accounts"));
        }
        let account = self.require_account(&account_id)?;
        if !account.reconcilable {
            return Err(LedgerError::mismatch(format!(
                "Account {} is not reconcilable",
                account.code
            )));
        }

        let mut debits: Vec<(JournalLineId, Money)> = Vec::new();
        let mut credits: Vec<(JournalLineId, Money)> = Vec::new();
        for line in &lines {
            let residual = self.residual(&line.id).unwrap_or(Money::zero(self.currency));
            if residual.is_zero() {
                continue;
            }
            match line.side {
                LineSide::Debit => debits.push((line.id, residual)),
                LineSide::Credit => credits.push((line.id, residual)),
            }
        }

        if debits.is_empty() && credits.is_empty() {
            return Err(LedgerError::AlreadyReconciled(unique[0].to_string()));
        }
        if debits.is_empty() || credits.is_empty() {
            return Err(LedgerError::mismatch(
                "Open lines are all on the same side",
            ));
        }

        let mut created = Vec::new();
        let mut matched = Money::zero(self.currency);
        let (mut i, mut j) = (0, 0);
        while i < debits.len() && j < credits.len() {
            let amount = debits[i].1.min(&credits[j].1)?;
            let partial = PartialReconciliation {
                id: ReconciliationId::new_v7(),
                debit_line: debits[i].0,
                credit_line: credits[j].0,
                amount,
                created_at: Utc::now(),
            };
            created.push(partial.id);
            self.partials.push(partial);

            debits[i].1 = debits[i].1.checked_sub(&amount)?;
            credits[j].1 = credits[j].1.checked_sub(&amount)?;
            self.residuals.insert(debits[i].0, debits[i].1);
            self.residuals.insert(credits[j].0, credits[j].1);
            matched = matched.checked_add(&amount)?;

            if debits[i].1.is_zero() {
                i += 1;
            }
            if credits[j].1.is_zero() {
                j += 1;
            }
        }

        let group = self.reconciled_group(&unique);
        let settled = group
            .iter()
            .all(|id| self.residual(id).map_or(false, |r| r.is_zero()));
        let matching = if settled {
            let matching = MatchingId::new_v7();
            for id in &group {
                self.matchings.insert(*id, matching);
            }
            Some(matching)
        } else {
            None
        };

        debug!(
            account = %account_id,
            matched = %matched,
            full = matching.is_some(),
            "Lines reconciled"
        );

        Ok(ReconcileOutcome {
            partials: created,
            matched,
            matching,
        })
    }

    /// Every line connected to `start` through reconciliation records
    fn reconciled_group(&self, start: &[JournalLineId]) -> Vec<JournalLineId> {
        let mut visited: HashSet<JournalLineId> = HashSet::new();
        let mut queue: VecDeque<JournalLineId> = start.iter().copied().collect();
        let mut group = Vec::new();

        while let Some(line) = queue.pop_front() {
            if !visited.insert(line) {
                continue;
            }
            group.push(line);
            for partial in &self.partials {
                if let Some(other) = partial.counterpart_of(line) {
                    if !visited.contains(&other) {
                        queue.push_back(other);
                    }
                }
            }
        }

        group
    }

    /// Removes every reconciliation record touching a line
    ///
    /// Residuals on both sides are restored and the matching number of the
    /// whole group is cleared. Returns the number of records removed.
    pub fn unreconcile_line(&mut self, id: &JournalLineId) -> Result<usize, LedgerError> {
        self.require_line(id)?;

        for line in self.reconciled_group(&[*id]) {
            self.matchings.remove(&line);
        }

        let (removed, kept): (Vec<_>, Vec<_>) =
            self.partials.drain(..).partition(|p| p.touches(*id));
        self.partials = kept;

        for partial in &removed {
            for line in [partial.debit_line, partial.credit_line] {
                let residual = self
                    .residuals
                    .get_mut(&line)
                    .ok_or_else(|| LedgerError::LineNotFound(line.to_string()))?;
                *residual = residual.checked_add(&partial.amount)?;
            }
        }

        Ok(removed.len())
    }

    /// Unreconciles every line of an entry
    pub fn unreconcile_entry(&mut self, id: &JournalEntryId) -> Result<usize, LedgerError> {
        let line_ids: Vec<JournalLineId> = self.require_entry(id)?.lines.iter().map(|l| l.id).collect();
        let mut removed = 0;
        for line in line_ids {
            removed += self.unreconcile_line(&line)?;
        }
        Ok(removed)
    }

    /// Posts the mirror image of an entry and matches each line with its mirror
    ///
    /// Lines on non-reconcilable accounts or already settled are left alone.
    pub fn reverse(
        &mut self,
        id: &JournalEntryId,
        date: NaiveDate,
        reason: &str,
    ) -> Result<JournalEntryId, LedgerError> {
        let original = self.require_entry(id)?.clone();
        if let Some(by) = original.reversed_by {
            return Err(LedgerError::AlreadyReversed(format!("{} (by {})", id, by)));
        }

        let mut draft = EntryDraft::new(original.journal_id, date)
            .with_reference(format!(
                "Reversal of {}: {}",
                original.reference.as_deref().unwrap_or(&original.id.to_string()),
                reason
            ));
        draft.reference_type = original.reference_type.clone();
        draft.reference_id = original.reference_id;
        for line in &original.lines {
            draft = draft.line(
                line.account_id,
                line.partner_id,
                line.side.opposite(),
                line.amount,
                format!("Reversal: {}", line.label),
            );
        }

        let reversal_id = self.post(draft)?;
        if let Some(pos) = self.entry_index.get(id).copied() {
            self.entries[pos].reversed_by = Some(reversal_id);
        }
        if let Some(pos) = self.entry_index.get(&reversal_id).copied() {
            self.entries[pos].reversal_of = Some(*id);
        }

        let mirrored: Vec<(JournalLineId, JournalLineId)> = original
            .lines
            .iter()
            .zip(self.require_entry(&reversal_id)?.lines.iter())
            .map(|(o, r)| (o.id, r.id))
            .collect();
        for (original_line, reversal_line) in mirrored {
            if let Err(err) = self.reconcile(&[original_line, reversal_line]) {
                debug!(line = %original_line, error = %err, "Reversal line left open");
            }
        }

        Ok(reversal_id)
    }

    /// Generates a trial balance report, ordered by account code
    pub fn trial_balance(&self) -> Result<TrialBalance, LedgerError> {
        let mut entries = Vec::new();
        let mut total_debits = Money::zero(self.currency);
        let mut total_credits = Money::zero(self.currency);

        for (account_id, balance) in &self.balances {
            if balance.is_zero() {
                continue;
            }
            let account = self.require_account(account_id)?;
            let (debit, credit) = if balance.is_positive() {
                (*balance, Money::zero(self.currency))
            } else {
                (Money::zero(self.currency), balance.abs())
            };

            total_debits = total_debits.checked_add(&debit)?;
            total_credits = total_credits.checked_add(&credit)?;
            entries.push(TrialBalanceEntry {
                account_id: *account_id,
                account_code: account.code.clone(),
                account_name: account.name.clone(),
                debit,
                credit,
            });
        }

        entries.sort_by(|a, b| a.account_code.cmp(&b.account_code));

        Ok(TrialBalance {
            entries,
            total_debits,
            total_credits,
            is_balanced: total_debits == total_credits,
        })
    }
}

/// Trial balance report
#[derive(Debug)]
pub struct TrialBalance {
    pub entries: Vec<TrialBalanceEntry>,
    pub total_debits: Money,
    pub total_credits: Money,
    pub is_balanced: bool,
}

/// A single entry in the trial balance
#[derive(Debug)]
pub struct TrialBalanceEntry {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub debit: Money,
    pub credit: Money,
}
