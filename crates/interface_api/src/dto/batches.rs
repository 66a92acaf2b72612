//! Batch DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_payment::{BanknoteType, BatchPayment, BatchState, BatchSwitchReport};

use super::validate_not_blank;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchRequest {
    #[validate(length(min = 1, max = 128), custom(function = "validate_not_blank"))]
    pub name: String,
    /// Journal the instruments are held in
    pub journal_id: Uuid,
    /// Bank journal receiving them
    pub destination_journal_id: Uuid,
    /// Bank remittance reference; may be set later
    #[serde(default)]
    #[validate(length(max = 64))]
    pub external_ref: String,
    #[serde(default)]
    pub banknote_type: BanknoteType,
    #[validate(length(min = 1, max = 500))]
    pub payment_ids: Vec<Uuid>,
    #[serde(default)]
    pub move_to_next_stage: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetReferenceRequest {
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub external_ref: String,
}

#[derive(Debug, Serialize)]
pub struct BankSideResponse {
    pub original_id: Uuid,
    pub bank_side_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub id: Uuid,
    pub name: String,
    pub journal_id: Uuid,
    pub destination_journal_id: Uuid,
    pub external_ref: String,
    pub banknote_type: BanknoteType,
    pub payment_ids: Vec<Uuid>,
    pub bank_side_payments: Vec<BankSideResponse>,
    pub move_to_next_stage: bool,
    pub state: BatchState,
    pub sent_at: Option<NaiveDate>,
}

impl From<&BatchPayment> for BatchResponse {
    fn from(b: &BatchPayment) -> Self {
        Self {
            id: *b.id.as_uuid(),
            name: b.name.clone(),
            journal_id: *b.journal_id.as_uuid(),
            destination_journal_id: *b.destination_journal_id.as_uuid(),
            external_ref: b.external_ref.clone(),
            banknote_type: b.banknote_type,
            payment_ids: b.payment_ids.iter().map(|p| *p.as_uuid()).collect(),
            bank_side_payments: b
                .bank_side_payments
                .iter()
                .map(|pair| BankSideResponse {
                    original_id: *pair.original.as_uuid(),
                    bank_side_id: *pair.bank_side.as_uuid(),
                })
                .collect(),
            move_to_next_stage: b.move_to_next_stage,
            state: b.state,
            sent_at: b.sent_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SwitchedPaymentResponse {
    pub original_id: Uuid,
    pub bank_side_id: Uuid,
    pub handoff_entry_id: Uuid,
    pub advanced: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchSwitchResponse {
    pub batch_id: Uuid,
    pub switched: Vec<SwitchedPaymentResponse>,
}

impl From<BatchSwitchReport> for BatchSwitchResponse {
    fn from(report: BatchSwitchReport) -> Self {
        Self {
            batch_id: *report.batch_id.as_uuid(),
            switched: report
                .switched
                .iter()
                .map(|s| SwitchedPaymentResponse {
                    original_id: *s.original.as_uuid(),
                    bank_side_id: *s.bank_side.as_uuid(),
                    handoff_entry_id: *s.handoff_entry.as_uuid(),
                    advanced: s.advanced,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_request_needs_payments() {
        let request = CreateBatchRequest {
            name: "Remittance".to_string(),
            journal_id: Uuid::new_v4(),
            destination_journal_id: Uuid::new_v4(),
            external_ref: String::new(),
            banknote_type: BanknoteType::None,
            payment_ids: vec![],
            move_to_next_stage: false,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_blank_reference_rejected() {
        let request = SetReferenceRequest { external_ref: "   ".to_string() };
        assert!(request.validate().is_err());
    }
}
