//! Property-Based Test Generators
//!
//! Provides proptest strategies for amounts and allocation inputs.

use core_kernel::{Currency, Money};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for generating valid positive amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for generating positive MAD amounts
pub fn mad_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|amount| Money::from_minor(amount, Currency::MAD))
}

/// Strategy for generating cheque-sized MAD amounts (1.00 to 50 000.00)
pub fn check_amount_strategy() -> impl Strategy<Value = Money> {
    (100i64..5_000_000i64).prop_map(|amount| Money::from_minor(amount, Currency::MAD))
}

/// Strategy for generating `1..=max` check amounts
pub fn check_amounts_strategy(max: usize) -> impl Strategy<Value = Vec<Money>> {
    proptest::collection::vec(check_amount_strategy(), 1..=max)
}

/// Strategy for generating non-negative split weights with a positive total
pub fn weights_strategy(max: usize) -> impl Strategy<Value = Vec<Decimal>> {
    proptest::collection::vec(0u32..10_000u32, 1..=max)
        .prop_filter("total weight must be positive", |w| w.iter().any(|x| *x > 0))
        .prop_map(|w| w.into_iter().map(|x| Decimal::new(x as i64, 2)).collect())
}

/// Strategy for generating ascending, distinct stage sequence numbers
pub fn stage_sequences_strategy(max: usize) -> impl Strategy<Value = Vec<u32>> {
    proptest::collection::btree_set(1u32..1000u32, 1..=max).prop_map(|s| s.into_iter().collect())
}
