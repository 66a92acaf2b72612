//! Reconciliation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{JournalLineId, MatchingId, Money, ReconciliationId};

/// A (possibly partial) match between one debit line and one credit line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialReconciliation {
    pub id: ReconciliationId,
    pub debit_line: JournalLineId,
    pub credit_line: JournalLineId,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

impl PartialReconciliation {
    pub fn touches(&self, line: JournalLineId) -> bool {
        self.debit_line == line || self.credit_line == line
    }

    /// The line on the other side of `line`, if this record touches it
    pub fn counterpart_of(&self, line: JournalLineId) -> Option<JournalLineId> {
        if self.debit_line == line {
            Some(self.credit_line)
        } else if self.credit_line == line {
            Some(self.debit_line)
        } else {
            None
        }
    }
}

/// Result of a reconciliation call
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Partial records created by the call
    pub partials: Vec<ReconciliationId>,
    /// Total amount matched by the call
    pub matched: Money,
    /// Set when the whole connected group reached a zero residual
    pub matching: Option<MatchingId>,
}

impl ReconcileOutcome {
    pub fn is_full(&self) -> bool {
        self.matching.is_some()
    }
}
