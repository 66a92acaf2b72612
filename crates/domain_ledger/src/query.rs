//! Typed filters over posted journal lines

use core_kernel::{AccountId, JournalEntryId, PartyId};

use crate::entry::{JournalLine, LineSide};

/// Query parameters for finding ledger lines
#[derive(Debug, Clone, Default)]
pub struct LineQuery {
    pub account_id: Option<AccountId>,
    pub partner_id: Option<PartyId>,
    /// Restrict to lines of these entries
    pub entry_ids: Option<Vec<JournalEntryId>>,
    pub side: Option<LineSide>,
    /// Only lines with a non-zero residual
    pub unreconciled_only: bool,
}

impl LineQuery {
    pub fn on_account(account_id: AccountId) -> Self {
        Self {
            account_id: Some(account_id),
            ..Default::default()
        }
    }

    pub fn in_entries(entry_ids: impl IntoIterator<Item = JournalEntryId>) -> Self {
        Self {
            entry_ids: Some(entry_ids.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn partner(mut self, partner_id: PartyId) -> Self {
        self.partner_id = Some(partner_id);
        self
    }

    pub fn side(mut self, side: LineSide) -> Self {
        self.side = Some(side);
        self
    }

    pub fn unreconciled(mut self) -> Self {
        self.unreconciled_only = true;
        self
    }

    /// Checks the static attributes of a line; residual filtering is done by the ledger
    pub fn matches(&self, line: &JournalLine) -> bool {
        self.account_id.map_or(true, |a| line.account_id == a)
            && self.partner_id.map_or(true, |p| line.partner_id == Some(p))
            && self.side.map_or(true, |s| line.side == s)
            && self
                .entry_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&line.entry_id))
    }
}
