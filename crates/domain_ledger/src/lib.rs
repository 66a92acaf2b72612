//! Ledger Domain - Double-Entry Journal and Reconciliation
//!
//! This crate is the accounting collaborator of the payment stage engine.
//! Every stage transition of a payment produces a balanced journal entry here,
//! and the engine reconciles that entry against the previous one.
//!
//! # Double-Entry Principles
//!
//! - Every entry has at least two lines
//! - Each line is either a debit or a credit, never both
//! - The sum of debits equals the sum of credits per entry
//! - Posted entries are never modified, only reversed
//!
//! # Reconciliation
//!
//! Lines on a reconcilable account can be matched against lines of the
//! opposite side. Matching may be partial; once every line in a connected
//! group has a zero residual the group receives a matching number.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{Ledger, EntryDraft};
//!
//! let draft = EntryDraft::new(journal_id, date)
//!     .with_reference("CHK-0042")
//!     .debit(in_bank_account, Some(partner), amount, "Check deposited")
//!     .credit(to_send_account, Some(partner), amount, "Check deposited");
//!
//! let entry_id = ledger.post(draft)?;
//! ```

pub mod account;
pub mod journal;
pub mod entry;
pub mod ledger;
pub mod reconciliation;
pub mod query;
pub mod error;

pub use account::{Account, AccountType};
pub use journal::{Journal, JournalKind};
pub use entry::{EntryDraft, JournalEntry, JournalLine, LineDraft, LineSide};
pub use ledger::{Ledger, TrialBalance, TrialBalanceEntry};
pub use reconciliation::{PartialReconciliation, ReconcileOutcome};
pub use query::LineQuery;
pub use error::LedgerError;
