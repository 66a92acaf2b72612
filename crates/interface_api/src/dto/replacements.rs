//! Replacement DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_payment::{ExceptionKind, ReplacementLink, ReplacementOutcome};

#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceRequest {
    /// Defaulted payments settled by the replacement
    #[validate(length(min = 1, max = 100))]
    pub original_ids: Vec<Uuid>,
    /// Draft payment replacing them
    pub replacement_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReplacementResponse {
    pub replacement_id: Uuid,
    pub entry_id: Uuid,
    pub links: Vec<Uuid>,
    pub consumed: Decimal,
    pub excess: Decimal,
}

impl From<ReplacementOutcome> for ReplacementResponse {
    fn from(o: ReplacementOutcome) -> Self {
        Self {
            replacement_id: *o.replacement.as_uuid(),
            entry_id: *o.entry_id.as_uuid(),
            links: o.links.iter().map(|l| *l.as_uuid()).collect(),
            consumed: o.consumed.amount(),
            excess: o.excess.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnwindResponse {
    pub replacement_id: Uuid,
    pub reversal_entry_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ReplacementLinkResponse {
    pub id: Uuid,
    pub original_id: Uuid,
    pub replacement_id: Uuid,
    pub amount: Decimal,
    pub sequence: u32,
    pub exception: ExceptionKind,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub unwound_at: Option<DateTime<Utc>>,
}

impl From<&ReplacementLink> for ReplacementLinkResponse {
    fn from(l: &ReplacementLink) -> Self {
        Self {
            id: *l.id.as_uuid(),
            original_id: *l.original.as_uuid(),
            replacement_id: *l.replacement.as_uuid(),
            amount: l.amount.amount(),
            sequence: l.sequence,
            exception: l.exception,
            active: l.is_active(),
            created_at: l.created_at,
            unwound_at: l.unwound_at,
        }
    }
}

/// Filter of `GET /replacements`
#[derive(Debug, Default, Deserialize)]
pub struct ListLinksQuery {
    /// Links touching this payment, as original or replacement
    pub payment_id: Option<Uuid>,
    #[serde(default)]
    pub active_only: bool,
}
