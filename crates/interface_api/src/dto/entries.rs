//! Journal entry DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use domain_ledger::{JournalEntry, Ledger, LineSide};

#[derive(Debug, Serialize)]
pub struct EntryLineResponse {
    pub id: Uuid,
    pub account_id: Uuid,
    pub partner_id: Option<Uuid>,
    pub side: LineSide,
    pub amount: Decimal,
    pub label: String,
    /// Amount still open for reconciliation; absent on non-reconcilable accounts
    pub residual: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub currency: Option<String>,
    pub lines: Vec<EntryLineResponse>,
    pub reversal_of: Option<Uuid>,
    pub reversed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EntryResponse {
    /// Builds the response with each line's open residual
    pub fn from_entry(entry: &JournalEntry, ledger: &Ledger) -> Self {
        Self {
            id: *entry.id.as_uuid(),
            journal_id: *entry.journal_id.as_uuid(),
            date: entry.date,
            reference: entry.reference.clone(),
            reference_type: entry.reference_type.clone(),
            reference_id: entry.reference_id,
            currency: entry.lines.first().map(|l| l.amount.currency().code().to_string()),
            lines: entry
                .lines
                .iter()
                .map(|line| EntryLineResponse {
                    id: *line.id.as_uuid(),
                    account_id: *line.account_id.as_uuid(),
                    partner_id: line.partner_id.map(|p| *p.as_uuid()),
                    side: line.side,
                    amount: line.amount.amount(),
                    label: line.label.clone(),
                    residual: ledger.residual(&line.id).map(|r| r.amount()),
                })
                .collect(),
            reversal_of: entry.reversal_of.map(|e| *e.as_uuid()),
            reversed_by: entry.reversed_by.map(|e| *e.as_uuid()),
            created_at: entry.created_at,
        }
    }
}
