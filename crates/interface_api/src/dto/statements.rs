//! Bank statement line DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{validate_not_blank, validate_positive};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterStatementLineRequest {
    /// Bank journal of the statement
    pub journal_id: Uuid,
    #[validate(custom(function = "validate_positive"))]
    pub amount: Decimal,
    /// Defaults to today
    pub date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub reference: String,
}

#[derive(Debug, Serialize)]
pub struct StatementLineResponse {
    pub id: Uuid,
}
