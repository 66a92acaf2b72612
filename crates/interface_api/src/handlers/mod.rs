//! Request handlers

pub mod health;
pub mod payments;
pub mod replacements;
pub mod batches;
pub mod entries;
pub mod statements;
pub mod catalog;

use chrono::Utc;

use core_kernel::ActionContext;

use crate::auth::Claims;
use crate::dto::payments::ActionParams;
use crate::error::ApiError;

/// Context of an action requested now by the token holder
pub(crate) fn action_context(claims: &Claims, params: &ActionParams) -> Result<ActionContext, ApiError> {
    let ctx = claims.context(Utc::now().date_naive())?;
    Ok(match params.entry_date {
        Some(date) => ctx.with_entry_date(date),
        None => ctx,
    })
}
