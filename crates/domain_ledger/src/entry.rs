//! Journal entries and their lines
//!
//! An `EntryDraft` is built by the caller and handed to `Ledger::post`, which
//! validates it and turns it into an immutable `JournalEntry`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{AccountId, Currency, JournalEntryId, JournalId, JournalLineId, Money, PartyId};

use crate::error::LedgerError;

/// Debit or credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSide {
    Debit,
    Credit,
}

impl LineSide {
    pub fn opposite(&self) -> Self {
        match self {
            LineSide::Debit => LineSide::Credit,
            LineSide::Credit => LineSide::Debit,
        }
    }
}

/// A line not yet posted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineDraft {
    pub account_id: AccountId,
    pub partner_id: Option<PartyId>,
    pub side: LineSide,
    /// Always positive
    pub amount: Money,
    pub label: String,
}

/// An entry being assembled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDraft {
    pub journal_id: JournalId,
    pub date: NaiveDate,
    /// Free-text reference (check number, bank slip...)
    pub reference: Option<String>,
    /// What the entry belongs to (e.g., "payment")
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub lines: Vec<LineDraft>,
}

impl EntryDraft {
    pub fn new(journal_id: JournalId, date: NaiveDate) -> Self {
        Self {
            journal_id,
            date,
            reference: None,
            reference_type: None,
            reference_id: None,
            lines: Vec::new(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Links the entry to the document it was generated for
    pub fn for_document(mut self, ref_type: impl Into<String>, ref_id: Uuid) -> Self {
        self.reference_type = Some(ref_type.into());
        self.reference_id = Some(ref_id);
        self
    }

    pub fn debit(
        self,
        account_id: AccountId,
        partner_id: Option<PartyId>,
        amount: Money,
        label: impl Into<String>,
    ) -> Self {
        self.line(account_id, partner_id, LineSide::Debit, amount, label)
    }

    pub fn credit(
        self,
        account_id: AccountId,
        partner_id: Option<PartyId>,
        amount: Money,
        label: impl Into<String>,
    ) -> Self {
        self.line(account_id, partner_id, LineSide::Credit, amount, label)
    }

    pub fn line(
        mut self,
        account_id: AccountId,
        partner_id: Option<PartyId>,
        side: LineSide,
        amount: Money,
        label: impl Into<String>,
    ) -> Self {
        self.lines.push(LineDraft {
            account_id,
            partner_id,
            side,
            amount,
            label: label.into(),
        });
        self
    }

    /// Currency of the first line, if any
    pub fn currency(&self) -> Option<Currency> {
        self.lines.first().map(|l| l.amount.currency())
    }

    /// Returns (total debits, total credits)
    pub fn totals(&self) -> Result<(Money, Money), LedgerError> {
        let currency = self
            .currency()
            .ok_or_else(|| LedgerError::InvalidLine("Entry has no lines".to_string()))?;
        let mut debits = Money::zero(currency);
        let mut credits = Money::zero(currency);

        for line in &self.lines {
            match line.side {
                LineSide::Debit => debits = debits.checked_add(&line.amount)?,
                LineSide::Credit => credits = credits.checked_add(&line.amount)?,
            }
        }

        Ok((debits, credits))
    }

    /// Debits minus credits
    pub fn imbalance(&self) -> Result<Money, LedgerError> {
        let (debits, credits) = self.totals()?;
        Ok(debits.checked_sub(&credits)?)
    }

    pub fn is_balanced(&self) -> bool {
        self.imbalance().map(|m| m.is_zero()).unwrap_or(false)
    }

    /// Removes every line booked on `account_id`, returning how many were dropped
    pub fn drop_account(&mut self, account_id: AccountId) -> usize {
        let before = self.lines.len();
        self.lines.retain(|l| l.account_id != account_id);
        before - self.lines.len()
    }

    /// Brings the draft back to balance after lines were removed
    ///
    /// The shortfall is taken off the heavier side, starting with its smallest
    /// line. A line reduced to zero is removed.
    pub fn rebalance(&mut self) -> Result<(), LedgerError> {
        let imbalance = self.imbalance()?;
        if imbalance.is_zero() {
            return Ok(());
        }

        let heavy_side = if imbalance.is_positive() {
            LineSide::Debit
        } else {
            LineSide::Credit
        };
        let mut shortfall = imbalance.abs();

        let mut candidates: Vec<usize> = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.side == heavy_side)
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by(|a, b| self.lines[*a].amount.amount().cmp(&self.lines[*b].amount.amount()));

        for idx in candidates {
            if shortfall.is_zero() {
                break;
            }
            let line = &mut self.lines[idx];
            let cut = line.amount.min(&shortfall)?;
            line.amount = line.amount.checked_sub(&cut)?;
            shortfall = shortfall.checked_sub(&cut)?;
        }

        self.lines.retain(|l| !l.amount.is_zero());
        Ok(())
    }
}

/// A posted line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: JournalLineId,
    pub entry_id: JournalEntryId,
    pub journal_id: JournalId,
    pub account_id: AccountId,
    pub partner_id: Option<PartyId>,
    pub side: LineSide,
    pub amount: Money,
    pub label: String,
    pub date: NaiveDate,
}

impl JournalLine {
    pub fn debit(&self) -> Money {
        match self.side {
            LineSide::Debit => self.amount,
            LineSide::Credit => Money::zero(self.amount.currency()),
        }
    }

    pub fn credit(&self) -> Money {
        match self.side {
            LineSide::Credit => self.amount,
            LineSide::Debit => Money::zero(self.amount.currency()),
        }
    }

    /// Debit minus credit
    pub fn balance(&self) -> Money {
        match self.side {
            LineSide::Debit => self.amount,
            LineSide::Credit => -self.amount,
        }
    }
}

/// A posted, immutable journal entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub journal_id: JournalId,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub lines: Vec<JournalLine>,
    /// Entry this one reverses
    pub reversal_of: Option<JournalEntryId>,
    /// Entry that reversed this one
    pub reversed_by: Option<JournalEntryId>,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn total_debit(&self) -> Result<Money, LedgerError> {
        let currency = self.currency()?;
        Ok(self
            .lines
            .iter()
            .try_fold(Money::zero(currency), |acc, l| acc.checked_add(&l.debit()))?)
    }

    pub fn total_credit(&self) -> Result<Money, LedgerError> {
        let currency = self.currency()?;
        Ok(self
            .lines
            .iter()
            .try_fold(Money::zero(currency), |acc, l| acc.checked_add(&l.credit()))?)
    }

    pub fn is_balanced(&self) -> bool {
        match (self.total_debit(), self.total_credit()) {
            (Ok(d), Ok(c)) => d == c,
            _ => false,
        }
    }

    /// Lines of this entry booked on `account_id` on the given side
    pub fn lines_on(&self, account_id: AccountId, side: LineSide) -> impl Iterator<Item = &JournalLine> {
        self.lines
            .iter()
            .filter(move |l| l.account_id == account_id && l.side == side)
    }

    fn currency(&self) -> Result<Currency, LedgerError> {
        self.lines
            .first()
            .map(|l| l.amount.currency())
            .ok_or_else(|| LedgerError::InvalidLine(format!("Entry {} has no lines", self.id)))
    }
}
