//! Custom Test Assertions
//!
//! Provides assertion helpers for money and ledger entries that give more
//! meaningful messages than the standard assertions.

use core_kernel::{JournalEntryId, Money};
use domain_ledger::{Ledger, LineSide};
use rust_decimal::Decimal;

/// Asserts that a Money value has the expected amount
pub fn assert_money_eq(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.amount(),
        expected,
        "Expected {} {}, got {}",
        actual.currency().symbol(),
        expected,
        actual
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that money values sum to a total
///
/// # Panics
///
/// Panics if the sum doesn't equal the total
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum = parts.iter().fold(Money::zero(total.currency()), |acc, m| {
        acc.checked_add(m).expect("Currency mismatch in sum")
    });

    assert_eq!(
        sum.amount(),
        total.amount(),
        "Sum of parts ({}) doesn't equal total ({})",
        sum.amount(),
        total.amount()
    );
}

/// Asserts that a posted entry balances and returns its (debit, credit) totals
pub fn assert_entry_balanced(ledger: &Ledger, entry_id: &JournalEntryId) -> (Decimal, Decimal) {
    let entry = ledger.entry(entry_id).expect("Entry not found");
    let debit: Decimal = entry
        .lines
        .iter()
        .filter(|l| l.side == LineSide::Debit)
        .map(|l| l.amount.amount())
        .sum();
    let credit: Decimal = entry
        .lines
        .iter()
        .filter(|l| l.side == LineSide::Credit)
        .map(|l| l.amount.amount())
        .sum();
    assert_eq!(debit, credit, "Entry {} is unbalanced: {} / {}", entry_id, debit, credit);
    (debit, credit)
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => panic!("{}: got Ok({:?})", $msg, value),
            Err(e) => e,
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_money_eq_passes() {
        assert_money_eq(&Money::new(dec!(12.50), Currency::MAD), dec!(12.5));
    }

    #[test]
    #[should_panic(expected = "doesn't equal total")]
    fn test_assert_money_sum_equals_fails() {
        let parts = vec![Money::new(dec!(1), Currency::MAD)];
        assert_money_sum_equals(&parts, &Money::new(dec!(2), Currency::MAD));
    }

    #[test]
    fn test_assert_ok_macro() {
        let result: Result<i32, String> = Ok(42);
        let value = assert_ok!(result);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_assert_err_macro() {
        let result: Result<i32, String> = Err("error".to_string());
        let err = assert_err!(result);
        assert_eq!(err, "error");
    }
}
