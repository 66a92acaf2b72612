//! Stage catalog DTOs

use serde::Serialize;
use uuid::Uuid;

use domain_payment::{BanknoteType, PaymentMethodKind, Stage, StageCatalog, StageType};

#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub id: Uuid,
    pub name: String,
    pub sequence: u32,
    pub stage_type: StageType,
    pub account_id: Option<Uuid>,
    pub with_journal_entry: bool,
    pub with_bank_statement: bool,
    pub banknote_type: BanknoteType,
}

impl From<&Stage> for StageResponse {
    fn from(s: &Stage) -> Self {
        Self {
            id: *s.id.as_uuid(),
            name: s.name.clone(),
            sequence: s.sequence,
            stage_type: s.stage_type,
            account_id: s.account_id.map(|a| *a.as_uuid()),
            with_journal_entry: s.with_journal_entry,
            with_bank_statement: s.with_bank_statement,
            banknote_type: s.banknote_type,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MethodResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub kind: PaymentMethodKind,
    pub stages: Vec<StageResponse>,
}

impl From<&StageCatalog> for MethodResponse {
    fn from(catalog: &StageCatalog) -> Self {
        let method = catalog.method();
        Self {
            id: *method.id.as_uuid(),
            code: method.code.clone(),
            name: method.name.clone(),
            kind: method.kind,
            stages: catalog
                .get_available_stages()
                .map(|stages| stages.iter().map(StageResponse::from).collect())
                .unwrap_or_default(),
        }
    }
}
