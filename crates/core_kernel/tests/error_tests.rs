//! Tests for core_kernel error types

use chrono::NaiveDate;
use core_kernel::{ActionContext, CompanyId, CoreError, MoneyError, UserId};

#[test]
fn test_core_error_validation() {
    let error = CoreError::validation("Invalid input");
    assert!(matches!(error, CoreError::Validation(ref msg) if msg == "Invalid input"));
}

#[test]
fn test_core_error_configuration_display() {
    let error = CoreError::configuration("missing stage account");
    assert_eq!(error.to_string(), "Configuration error: missing stage account");
}

#[test]
fn test_core_error_from_money_error() {
    let money_error = MoneyError::CurrencyMismatch("MAD".to_string(), "EUR".to_string());
    let core_error: CoreError = money_error.into();
    assert!(matches!(core_error, CoreError::Money(_)));
    assert!(core_error.to_string().contains("MAD"));
}

#[test]
fn test_context_entry_date_override() {
    let as_of = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let booked = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    let ctx = ActionContext::new(CompanyId::new(), UserId::new(), as_of);

    assert_eq!(ctx.accounting_date(), as_of);
    assert_eq!(ctx.with_entry_date(booked).accounting_date(), booked);
}
