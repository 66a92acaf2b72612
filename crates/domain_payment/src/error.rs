//! Payment domain errors
//!
//! Configuration errors and precondition errors are both raised before any
//! mutation; the unit of work discards the working copy on any `Err`.

use thiserror::Error;

use core_kernel::{MoneyError, PaymentId};
use domain_ledger::LedgerError;

/// Errors that can occur in the payment domain
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Leaving or entering a must-be-sent stage without a sent batch
    #[error("Payment {payment} must belong to a validated and sent batch")]
    MustBeSent { payment: String },

    /// The in-bank stage requires a reconciled bank statement line
    #[error("Payment {payment} has no reconciled bank statement line")]
    MissingBankStatement { payment: String },

    #[error("Payment {payment} is already at its last stage ({stage})")]
    AlreadyLastStage { payment: String, stage: String },

    /// A stage that books an entry has no ledger account
    #[error("Stage '{stage}' has no ledger account configured")]
    MissingAccountConfiguration { stage: String },

    /// A journal lacks an account the operation needs
    #[error("Journal {journal} has no {purpose} account configured")]
    MissingJournalAccount { journal: String, purpose: String },

    #[error("Payment method {method} has no '{stage_type}' stage")]
    StageNotConfigured { method: String, stage_type: String },

    #[error("Payment method {0} has no stages configured")]
    EmptyCatalog(String),

    /// Exception stages are only reached through their dedicated action
    #[error("Next stage '{stage}' is an exception stage and needs an explicit action")]
    ExceptionStageRequiresAction { stage: String },

    #[error("Payment {payment} is not in an exception state")]
    NotInExceptionState { payment: String },

    #[error("Payment {payment} already has an active '{kind}' exception")]
    ExceptionAlreadyActive { payment: String, kind: String },

    #[error("Payment {payment} has no accounting entry")]
    MissingEntry { payment: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A batch switch stopped part way; earlier members stay switched
    #[error("Batch {batch} stopped at payment {payment} after {} processed payment(s): {source}", processed.len())]
    BatchPartialFailure {
        batch: String,
        payment: String,
        processed: Vec<PaymentId>,
        #[source]
        source: Box<PaymentError>,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Money error: {0}")]
    Money(#[from] MoneyError),
}

impl PaymentError {
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        PaymentError::InvalidStateTransition(message.into())
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        PaymentError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Errors caused by missing or inconsistent setup rather than by the request
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PaymentError::MissingAccountConfiguration { .. }
                | PaymentError::MissingJournalAccount { .. }
                | PaymentError::StageNotConfigured { .. }
                | PaymentError::EmptyCatalog(_)
        )
    }
}
