//! Money types with precise decimal arithmetic
//!
//! Payment amounts, ledger lines and replacement allocations all go through
//! `Money`, so splitting an amount across several accounts never loses a cent.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    MAD,
    EUR,
    USD,
    MXN,
    GBP,
    CHF,
    JPY,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::MAD => "DH",
            Currency::EUR => "€",
            Currency::USD => "$",
            Currency::MXN => "MX$",
            Currency::GBP => "£",
            Currency::CHF => "CHF",
            Currency::JPY => "¥",
        }
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::MAD => "MAD",
            Currency::EUR => "EUR",
            Currency::USD => "USD",
            Currency::MXN => "MXN",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
            Currency::JPY => "JPY",
        }
    }

    /// Smallest representable amount (one cent for two-decimal currencies)
    pub fn minor_unit(&self) -> Decimal {
        Decimal::new(1, self.decimal_places())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MAD" => Ok(Currency::MAD),
            "EUR" => Ok(Currency::EUR),
            "USD" => Ok(Currency::USD),
            "MXN" => Ok(Currency::MXN),
            "GBP" => Ok(Currency::GBP),
            "CHF" => Ok(Currency::CHF),
            "JPY" => Ok(Currency::JPY),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),
}

/// A monetary amount with associated currency
///
/// Amounts are kept at the currency's precision; anything finer would leave
/// sub-cent residuals on reconciled ledger lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: amount.round_dp(currency.decimal_places()),
            currency,
        }
    }

    /// Creates Money from an integer amount in minor units (e.g., cents)
    pub fn from_minor(minor_units: i64, currency: Currency) -> Self {
        Self::new(Decimal::new(minor_units, currency.decimal_places()), currency)
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self {
            amount: self.amount.abs(),
            currency: self.currency,
        }
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    /// Returns the smaller of two amounts of the same currency
    pub fn min(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(if self.amount <= other.amount { *self } else { *other })
    }

    /// True when both amounts differ by no more than `tolerance`
    pub fn is_close_to(&self, other: &Money, tolerance: Decimal) -> bool {
        self.currency == other.currency && (self.amount - other.amount).abs() <= tolerance
    }

    /// Sums an iterator of amounts, starting from zero in `currency`
    pub fn sum<'a>(
        currency: Currency,
        amounts: impl IntoIterator<Item = &'a Money>,
    ) -> Result<Money, MoneyError> {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    /// Splits this amount proportionally to `weights`
    ///
    /// Every part but the last is rounded to the currency precision; the last
    /// part takes whatever remains, so the parts always sum to `self` exactly.
    pub fn split_by_weights(&self, weights: &[Decimal]) -> Result<Vec<Money>, MoneyError> {
        if weights.is_empty() {
            return Err(MoneyError::InvalidAmount("Empty weights".to_string()));
        }
        if weights.iter().any(|w| w.is_sign_negative()) {
            return Err(MoneyError::InvalidAmount("Negative weight".to_string()));
        }

        let total: Decimal = weights.iter().sum();
        if total.is_zero() {
            return Err(MoneyError::InvalidAmount("Total weight is zero".to_string()));
        }

        let dp = self.currency.decimal_places();
        let mut allocated = Money::zero(self.currency);
        let mut parts = Vec::with_capacity(weights.len());

        for (i, weight) in weights.iter().enumerate() {
            if i == weights.len() - 1 {
                parts.push(self.checked_sub(&allocated)?);
            } else {
                let part = Self::new((self.amount * *weight / total).round_dp(dp), self.currency);
                allocated = allocated.checked_add(&part)?;
                parts.push(part);
            }
        }

        Ok(parts)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dp = self.currency.decimal_places();
        write!(
            f,
            "{} {:.dp$}",
            self.currency.symbol(),
            self.amount,
            dp = dp as usize
        )
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rounds_to_currency_precision() {
        let m = Money::new(dec!(100.505), Currency::MAD);
        assert_eq!(m.amount(), dec!(100.50));

        let yen = Money::new(dec!(1500.4), Currency::JPY);
        assert_eq!(yen.amount(), dec!(1500));
    }

    #[test]
    fn test_from_minor() {
        let m = Money::from_minor(10050, Currency::EUR);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_currency_mismatch() {
        let mad = Money::new(dec!(100), Currency::MAD);
        let eur = Money::new(dec!(100), Currency::EUR);

        assert!(matches!(mad.checked_add(&eur), Err(MoneyError::CurrencyMismatch(_, _))));
        assert!(mad.min(&eur).is_err());
        assert!(!mad.is_close_to(&eur, dec!(1)));
    }

    #[test]
    fn test_split_gives_remainder_to_last_part() {
        let m = Money::new(dec!(100.00), Currency::MAD);
        let parts = m.split_by_weights(&[dec!(1), dec!(1), dec!(1)]).unwrap();

        assert_eq!(parts[0].amount(), dec!(33.33));
        assert_eq!(parts[1].amount(), dec!(33.33));
        assert_eq!(parts[2].amount(), dec!(33.34));
    }

    #[test]
    fn test_split_rejects_zero_weights() {
        let m = Money::new(dec!(10), Currency::MAD);
        assert!(m.split_by_weights(&[]).is_err());
        assert!(m.split_by_weights(&[dec!(0), dec!(0)]).is_err());
        assert!(m.split_by_weights(&[dec!(1), dec!(-1)]).is_err());
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("mad".parse::<Currency>().unwrap(), Currency::MAD);
        assert!("XYZ".parse::<Currency>().is_err());
    }
}
