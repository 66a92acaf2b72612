//! Catalog seed
//!
//! Builds the ledger and stage catalogs the service starts with from a JSON
//! document. Accounts and journals are referenced by code inside the
//! document; the generated ids are kept in a [`SeedIndex`].

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use core_kernel::{AccountId, CoreError, Currency, JournalId, PaymentMethodId};
use domain_ledger::{Account, AccountType, Journal, JournalKind, Ledger};
use domain_payment::{
    BanknoteType, EngineSettings, PaymentMethod, PaymentMethodKind, PaymentService, StageCatalog,
    StageConfig, StageType,
};

const BUILTIN_CATALOG: &str = include_str!("../config/catalog.json");

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSeed {
    pub accounts: Vec<SeedAccount>,
    pub journals: Vec<SeedJournal>,
    pub methods: Vec<SeedMethod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub reconcilable: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedJournal {
    pub code: String,
    pub name: String,
    pub kind: JournalKind,
    /// Account code
    #[serde(default)]
    pub transfer_account: Option<String>,
    /// Account code
    #[serde(default)]
    pub skip_account: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedMethod {
    pub code: String,
    pub name: String,
    pub kind: PaymentMethodKind,
    pub stages: Vec<SeedStage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedStage {
    pub name: String,
    pub sequence: u32,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    /// Account code
    #[serde(default)]
    pub account: Option<String>,
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

/// Ids generated for the seeded codes
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedIndex {
    pub accounts: HashMap<String, AccountId>,
    pub journals: HashMap<String, JournalId>,
    pub methods: HashMap<String, PaymentMethodId>,
}

impl SeedIndex {
    fn account(&self, code: &str) -> Result<AccountId, CoreError> {
        self.accounts
            .get(code)
            .copied()
            .ok_or_else(|| CoreError::configuration(format!("Unknown account code '{}'", code)))
    }
}

impl CatalogSeed {
    /// The catalog bundled with the server
    pub fn builtin() -> Result<Self, CoreError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::configuration(format!("Invalid catalog seed: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            CoreError::configuration(format!("Cannot read catalog seed {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Builds a payment service holding the seeded ledger and catalogs
    pub fn build(
        &self,
        currency: Currency,
        settings: EngineSettings,
    ) -> Result<(PaymentService, SeedIndex), CoreError> {
        let mut index = SeedIndex::default();
        let mut ledger = Ledger::new(currency);

        for seed in &self.accounts {
            let id = AccountId::new_v7();
            let account = Account::new(id, seed.code.clone(), seed.name.clone(), seed.account_type);
            let account = if seed.reconcilable { account.reconcilable() } else { account };
            ledger.add_account(account).map_err(configuration)?;
            index.accounts.insert(seed.code.clone(), id);
        }

        for seed in &self.journals {
            let id = JournalId::new_v7();
            let mut journal = Journal::new(id, seed.code.clone(), seed.name.clone(), seed.kind);
            if let Some(code) = &seed.transfer_account {
                journal = journal.with_transfer_account(index.account(code)?);
            }
            if let Some(code) = &seed.skip_account {
                journal = journal.with_skip_account(index.account(code)?);
            }
            ledger.add_journal(journal).map_err(configuration)?;
            index.journals.insert(seed.code.clone(), id);
        }

        let mut service = PaymentService::new(ledger, settings);
        for seed in &self.methods {
            let method = PaymentMethod::new(seed.code.clone(), seed.name.clone(), seed.kind);
            let configs = seed
                .stages
                .iter()
                .map(|s| {
                    Ok(StageConfig {
                        name: s.name.clone(),
                        sequence: s.sequence,
                        stage_type: s.stage_type,
                        account: s.account.as_deref().map(|c| index.account(c)).transpose()?,
                        with_journal_entry: s.with_journal_entry,
                        with_bank_statement: s.with_bank_statement,
                        banknote_type: s.banknote_type,
                    })
                })
                .collect::<Result<Vec<_>, CoreError>>()?;
            let catalog = StageCatalog::from_configs(method, configs).map_err(configuration)?;
            let id = service.register_catalog(catalog).map_err(configuration)?;
            index.methods.insert(seed.code.clone(), id);
        }

        info!(
            accounts = index.accounts.len(),
            journals = index.journals.len(),
            methods = index.methods.len(),
            "Catalog seeded"
        );
        Ok((service, index))
    }
}

fn configuration(err: impl std::fmt::Display) -> CoreError {
    CoreError::configuration(err.to_string())
}
