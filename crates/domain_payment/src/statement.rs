//! Bank statement lines
//!
//! Only what the in-bank precondition needs: a line can be linked to a
//! payment and flagged once the bank reconciliation service matched it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{JournalId, Money, PaymentId, StatementLineId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementLine {
    pub id: StatementLineId,
    pub journal_id: JournalId,
    pub amount: Money,
    pub date: NaiveDate,
    pub reference: String,
    pub payment_id: Option<PaymentId>,
    pub reconciled: bool,
}

impl StatementLine {
    pub fn new(journal_id: JournalId, amount: Money, date: NaiveDate, reference: impl Into<String>) -> Self {
        Self {
            id: StatementLineId::new_v7(),
            journal_id,
            amount,
            date,
            reference: reference.into(),
            payment_id: None,
            reconciled: false,
        }
    }
}
