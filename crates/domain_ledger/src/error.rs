//! Ledger domain errors

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::MoneyError;

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account already exists
    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    /// Journal not found
    #[error("Journal not found: {0}")]
    JournalNotFound(String),

    /// Journal already exists
    #[error("Journal already exists: {0}")]
    JournalAlreadyExists(String),

    /// Journal entry not found
    #[error("Journal entry not found: {0}")]
    EntryNotFound(String),

    /// Journal line not found
    #[error("Journal line not found: {0}")]
    LineNotFound(String),

    /// Entry is not balanced
    #[error("Unbalanced entry: debits={debits}, credits={credits}")]
    UnbalancedEntry {
        debits: Decimal,
        credits: Decimal,
    },

    /// Invalid line
    #[error("Invalid line: {0}")]
    InvalidLine(String),

    /// Entry was already reversed
    #[error("Entry already reversed: {0}")]
    AlreadyReversed(String),

    /// Lines cannot be reconciled together
    #[error("Reconciliation not possible: {0}")]
    ReconciliationMismatch(String),

    /// Line has nothing left to reconcile
    #[error("Line already fully reconciled: {0}")]
    AlreadyReconciled(String),

    /// Calculation error
    #[error("Calculation error: {0}")]
    Calculation(#[from] MoneyError),
}

impl LedgerError {
    pub fn mismatch(message: impl Into<String>) -> Self {
        LedgerError::ReconciliationMismatch(message.into())
    }

    /// True for errors a caller may tolerate when a reconciliation attempt misses
    pub fn is_reconciliation_miss(&self) -> bool {
        matches!(
            self,
            LedgerError::ReconciliationMismatch(_) | LedgerError::AlreadyReconciled(_)
        )
    }
}
