//! Stage catalog
//!
//! Each payment method owns an ordered list of stages. Regular stages are
//! traversed one at a time by the stage engine; exception stages
//! (butterfly, prior notice, unpaid) are side branches reached only through
//! their dedicated action.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use core_kernel::{AccountId, PaymentMethodId, StageId};

use crate::error::PaymentError;
use crate::payment::ExceptionKind;

/// Type tag of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    /// Instrument waits to be handed to the bank in a batch
    MustBeSent,
    /// Instrument deposited at the bank
    InBank,
    Butterfly,
    PriorNotice,
    Unpaid,
    /// Terminal settlement stage
    Reconcile,
    Generic,
}

impl StageType {
    pub fn is_exception(&self) -> bool {
        self.exception_kind().is_some()
    }

    /// The exception kind this stage type represents, if any
    pub fn exception_kind(&self) -> Option<ExceptionKind> {
        match self {
            StageType::Butterfly => Some(ExceptionKind::Butterfly),
            StageType::PriorNotice => Some(ExceptionKind::PriorNotice),
            StageType::Unpaid => Some(ExceptionKind::Unpaid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::MustBeSent => "must_be_sent",
            StageType::InBank => "in_bank",
            StageType::Butterfly => "butterfly",
            StageType::PriorNotice => "prior_notice",
            StageType::Unpaid => "unpaid",
            StageType::Reconcile => "reconcile",
            StageType::Generic => "generic",
        }
    }
}

impl From<ExceptionKind> for StageType {
    fn from(kind: ExceptionKind) -> Self {
        match kind {
            ExceptionKind::Butterfly => StageType::Butterfly,
            ExceptionKind::PriorNotice => StageType::PriorNotice,
            ExceptionKind::Unpaid => StageType::Unpaid,
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Banknote (promissory note) operation type
///
/// Collection at due date and discount before due date share one catalog;
/// some stages only apply to one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanknoteType {
    AtDueDate,
    BeforeDueDate,
    #[default]
    None,
}

impl BanknoteType {
    /// Whether a stage restricted to `self` applies to a payment of type `payment`
    ///
    /// `None` on either side means "no restriction".
    pub fn applies_to(&self, payment: BanknoteType) -> bool {
        *self == BanknoteType::None || payment == BanknoteType::None || *self == payment
    }
}

/// Kind of payment instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Check,
    Banknote,
    Cash,
    Transfer,
}

/// A payment instrument class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub code: String,
    pub name: String,
    pub kind: PaymentMethodKind,
}

impl PaymentMethod {
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: PaymentMethodKind) -> Self {
        Self {
            id: PaymentMethodId::new_v7(),
            code: code.into(),
            name: name.into(),
            kind,
        }
    }
}

/// A step in a payment method's lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub method_id: PaymentMethodId,
    pub name: String,
    /// Defines the order within the method
    pub sequence: u32,
    pub stage_type: StageType,
    /// Ledger account holding the payment's value while at this stage
    pub account_id: Option<AccountId>,
    /// Entering this stage books a journal entry
    pub with_journal_entry: bool,
    /// Entering this stage requires a reconciled bank statement line
    pub with_bank_statement: bool,
    pub banknote_type: BanknoteType,
}

impl Stage {
    pub fn from_config(method_id: PaymentMethodId, config: StageConfig) -> Self {
        Self {
            id: StageId::new_v7(),
            method_id,
            name: config.name,
            sequence: config.sequence,
            stage_type: config.stage_type,
            account_id: config.account,
            with_journal_entry: config.with_journal_entry,
            with_bank_statement: config.with_bank_statement,
            banknote_type: config.banknote_type,
        }
    }

    /// The stage account, required when the stage books entries
    pub fn require_account(&self) -> Result<AccountId, PaymentError> {
        self.account_id
            .ok_or_else(|| PaymentError::MissingAccountConfiguration {
                stage: self.name.clone(),
            })
    }
}

/// Stage configuration as consumed from an external catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub sequence: u32,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    #[serde(default)]
    pub account: Option<AccountId>,
    #[serde(default = "default_true")]
    pub with_journal_entry: bool,
    #[serde(default)]
    pub with_bank_statement: bool,
    #[serde(default)]
    pub banknote_type: BanknoteType,
}

fn default_true() -> bool {
    true
}

/// Ordered stages of one payment method
#[derive(Debug, Clone, Serialize)]
pub struct StageCatalog {
    method: PaymentMethod,
    /// Sorted by sequence
    stages: Vec<Stage>,
}

impl StageCatalog {
    /// Builds a catalog, sorting stages by sequence
    ///
    /// # Errors
    ///
    /// - A stage belongs to another method
    /// - Two stages share a sequence number
    /// - More than one stage of the same exception type
    pub fn new(method: PaymentMethod, mut stages: Vec<Stage>) -> Result<Self, PaymentError> {
        if let Some(foreign) = stages.iter().find(|s| s.method_id != method.id) {
            return Err(PaymentError::validation(format!(
                "Stage '{}' does not belong to method {}",
                foreign.name, method.code
            )));
        }

        stages.sort_by_key(|s| s.sequence);

        if let Some(pair) = stages.windows(2).find(|w| w[0].sequence >= w[1].sequence) {
            return Err(PaymentError::validation(format!(
                "Stages '{}' and '{}' share sequence {}",
                pair[0].name, pair[1].name, pair[1].sequence
            )));
        }

        let mut seen = HashSet::new();
        for stage in stages.iter().filter(|s| s.stage_type.is_exception()) {
            if !seen.insert(stage.stage_type) {
                return Err(PaymentError::validation(format!(
                    "Method {} has more than one '{}' stage",
                    method.code, stage.stage_type
                )));
            }
        }

        Ok(Self { method, stages })
    }

    /// Builds a catalog from external stage configuration
    pub fn from_configs(method: PaymentMethod, configs: Vec<StageConfig>) -> Result<Self, PaymentError> {
        let stages = configs
            .into_iter()
            .map(|c| Stage::from_config(method.id, c))
            .collect();
        Self::new(method, stages)
    }

    pub fn method(&self) -> &PaymentMethod {
        &self.method
    }

    /// All stages sorted by sequence
    pub fn get_available_stages(&self) -> Result<&[Stage], PaymentError> {
        if self.stages.is_empty() {
            return Err(PaymentError::EmptyCatalog(self.method.code.clone()));
        }
        Ok(&self.stages)
    }

    pub fn stage(&self, id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == *id)
    }

    pub fn require_stage(&self, id: &StageId) -> Result<&Stage, PaymentError> {
        self.stage(id).ok_or_else(|| PaymentError::not_found("Stage", id))
    }

    /// First regular stage applicable to a banknote type
    pub fn first_stage(&self, banknote: BanknoteType) -> Result<&Stage, PaymentError> {
        self.get_available_stages()?
            .iter()
            .find(|s| !s.stage_type.is_exception() && s.banknote_type.applies_to(banknote))
            .ok_or_else(|| PaymentError::EmptyCatalog(self.method.code.clone()))
    }

    /// First stage with a sequence strictly greater than `current`'s
    ///
    /// Exception stages are returned as-is; the engine refuses to enter
    /// them implicitly.
    pub fn get_next_stage(
        &self,
        current: &StageId,
        banknote: BanknoteType,
    ) -> Result<Option<&Stage>, PaymentError> {
        let current = self.require_stage(current)?;
        Ok(self
            .get_available_stages()?
            .iter()
            .find(|s| s.sequence > current.sequence && s.banknote_type.applies_to(banknote)))
    }

    /// True when no regular stage follows `current`
    pub fn is_last_regular_stage(&self, current: &StageId, banknote: BanknoteType) -> Result<bool, PaymentError> {
        let current = self.require_stage(current)?;
        Ok(!self.stages.iter().any(|s| {
            s.sequence > current.sequence
                && !s.stage_type.is_exception()
                && s.banknote_type.applies_to(banknote)
        }))
    }

    pub fn stage_of_type(&self, stage_type: StageType) -> Option<&Stage> {
        self.stages.iter().find(|s| s.stage_type == stage_type)
    }

    /// The configured stage for an exception kind
    pub fn exception_stage(&self, kind: ExceptionKind) -> Result<&Stage, PaymentError> {
        let stage_type = StageType::from(kind);
        self.stage_of_type(stage_type)
            .ok_or_else(|| PaymentError::StageNotConfigured {
                method: self.method.code.clone(),
                stage_type: stage_type.to_string(),
            })
    }

    /// The stage an exception is regularized back into
    pub fn in_bank_stage(&self) -> Result<&Stage, PaymentError> {
        self.stage_of_type(StageType::InBank)
            .ok_or_else(|| PaymentError::StageNotConfigured {
                method: self.method.code.clone(),
                stage_type: StageType::InBank.to_string(),
            })
    }
}
