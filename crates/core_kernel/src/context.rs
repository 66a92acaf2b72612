//! Explicit action context
//!
//! Every engine call receives the company, the acting user and the business
//! date it runs as of. Nothing in the engine reads an ambient "current user"
//! or "today".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::identifiers::{CompanyId, UserId};

/// Who is acting, for which company, and as of which date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionContext {
    pub company_id: CompanyId,
    pub user_id: UserId,
    /// Business date of the action
    pub as_of: NaiveDate,
    /// Overrides the date of ledger entries created by the action
    pub entry_date: Option<NaiveDate>,
}

impl ActionContext {
    pub fn new(company_id: CompanyId, user_id: UserId, as_of: NaiveDate) -> Self {
        Self {
            company_id,
            user_id,
            as_of,
            entry_date: None,
        }
    }

    /// Returns a copy that books entries on `date` instead of `as_of`
    pub fn with_entry_date(mut self, date: NaiveDate) -> Self {
        self.entry_date = Some(date);
        self
    }

    /// Date to stamp on ledger entries created under this context
    pub fn accounting_date(&self) -> NaiveDate {
        self.entry_date.unwrap_or(self.as_of)
    }
}
