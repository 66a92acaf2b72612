//! Journals group entries by where the money physically sits

use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, JournalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalKind {
    Bank,
    Cash,
    General,
}

/// A journal (cash register, bank account, miscellaneous operations)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub id: JournalId,
    /// Short code (e.g., "BNK1")
    pub code: String,
    pub name: String,
    pub kind: JournalKind,
    /// Account that holds instruments in transit when they leave this journal
    pub transfer_account: Option<AccountId>,
    /// Lines on this account are dropped when an entry is cloned into this journal
    pub skip_account: Option<AccountId>,
}

impl Journal {
    pub fn new(id: JournalId, code: impl Into<String>, name: impl Into<String>, kind: JournalKind) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            kind,
            transfer_account: None,
            skip_account: None,
        }
    }

    pub fn with_transfer_account(mut self, account: AccountId) -> Self {
        self.transfer_account = Some(account);
        self
    }

    pub fn with_skip_account(mut self, account: AccountId) -> Self {
        self.skip_account = Some(account);
        self
    }
}
