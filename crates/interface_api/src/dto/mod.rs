//! Request/response data transfer objects

pub mod payments;
pub mod replacements;
pub mod batches;
pub mod entries;
pub mod statements;
pub mod catalog;

use rust_decimal::Decimal;
use validator::ValidationError;

/// Amounts received over the wire must be strictly positive
pub fn validate_positive(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("positive_amount"))
    }
}

/// Rejects strings made only of whitespace
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank"))
    } else {
        Ok(())
    }
}
