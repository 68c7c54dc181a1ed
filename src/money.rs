//! Exact decimal money arithmetic
//!
//! All cost amounts flow through [`Money`]: a `rust_decimal` value
//! tagged with a currency code. Intermediate results keep their full
//! scale; rounding happens once, at display time, with banker's
//! rounding (half to even). Mixing currencies is an error, never a
//! silent coercion.

use rust_decimal::{Decimal, RoundingStrategy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Hours in a billing month, fixed by convention across providers.
pub const HOURS_PER_MONTH: u32 = 730;

/// Minimum scale kept during computation.
pub const COMPUTE_SCALE: u32 = 6;

/// Scale used for external string form.
pub const DISPLAY_SCALE: u32 = 2;

/// Money arithmetic errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid decimal literal: {0}")]
    Parse(String),
}

/// ISO 4217 currency codes accepted by the engine
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A signed fixed-precision amount tagged with its currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Parse a decimal literal, e.g. `"0.096"`.
    pub fn new_from_str(s: &str, currency: Currency) -> Result<Self, MoneyError> {
        let amount = Decimal::from_str(s).map_err(|_| MoneyError::Parse(s.to_string()))?;
        Ok(Self { amount, currency })
    }

    pub fn new_from_int(n: i64, currency: Currency) -> Self {
        Self {
            amount: Decimal::from(n),
            currency,
        }
    }

    pub fn from_decimal(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
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

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    fn require_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    pub fn sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.require_same_currency(other)?;
        Ok(Money {
            amount: self.amount - other.amount,
            currency: self.currency,
        })
    }

    pub fn mul_decimal(&self, factor: Decimal) -> Money {
        Money {
            amount: self.amount * factor,
            currency: self.currency,
        }
    }

    pub fn mul_int(&self, factor: i64) -> Money {
        self.mul_decimal(Decimal::from(factor))
    }

    pub fn div_int(&self, divisor: i64) -> Result<Money, MoneyError> {
        if divisor == 0 {
            return Err(MoneyError::DivisionByZero);
        }
        Ok(Money {
            amount: self.amount / Decimal::from(divisor),
            currency: self.currency,
        })
    }

    pub fn neg(&self) -> Money {
        Money {
            amount: -self.amount,
            currency: self.currency,
        }
    }

    pub fn abs(&self) -> Money {
        Money {
            amount: self.amount.abs(),
            currency: self.currency,
        }
    }

    /// Ordering is only defined within one currency.
    pub fn cmp(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.require_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Convert a monthly amount to hourly using the fixed 730 h/month.
    pub fn monthly_to_hourly(&self) -> Money {
        Money {
            amount: self.amount / Decimal::from(HOURS_PER_MONTH),
            currency: self.currency,
        }
    }

    /// Convert an hourly amount to monthly using the fixed 730 h/month.
    pub fn hourly_to_monthly(&self) -> Money {
        Money {
            amount: self.amount * Decimal::from(HOURS_PER_MONTH),
            currency: self.currency,
        }
    }

    /// Render at an explicit scale with banker's rounding.
    pub fn to_string_scale(&self, scale: u32) -> String {
        let mut rounded = self
            .amount
            .round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
        rounded.rescale(scale);
        rounded.to_string()
    }

    /// The external string form: two fractional digits, no symbol.
    pub fn to_display(&self) -> String {
        self.to_string_scale(DISPLAY_SCALE)
    }

    /// Signed display with currency symbol, e.g. `+$70.08` / `-$3.50`.
    ///
    /// Zero renders as `+$0.00`.
    pub fn to_signed_display(&self) -> String {
        let sign = if self.is_negative() { "-" } else { "+" };
        format!("{}${}", sign, self.abs().to_display())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_display(), self.currency)
    }
}

/// Sum a sequence of same-currency amounts; empty sums are zero in the
/// given currency.
pub fn sum<'a, I>(amounts: I, currency: Currency) -> Result<Money, MoneyError>
where
    I: IntoIterator<Item = &'a Money>,
{
    let mut total = Money::zero(currency);
    for m in amounts {
        total = total.add(m)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(s: &str) -> Money {
        Money::new_from_str(s, Currency::Usd).unwrap()
    }

    #[test]
    fn test_add_commutes_at_display_scale() {
        let a = usd("10.123456");
        let b = usd("2.654321");

        let ab = a.add(&b).unwrap();
        let ba = b.add(&a).unwrap();
        assert_eq!(ab.to_display(), ba.to_display());

        // (a + b) - b == a, no drift
        let back = ab.sub(&b).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_currency_mismatch_is_fatal() {
        let a = usd("1.00");
        let b = Money::new_from_str("1.00", Currency::Eur).unwrap();

        assert_eq!(
            a.add(&b),
            Err(MoneyError::CurrencyMismatch {
                left: Currency::Usd,
                right: Currency::Eur,
            })
        );
        assert!(a.cmp(&b).is_err());
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        assert_eq!(usd("1.00").div_int(0), Err(MoneyError::DivisionByZero));
    }

    #[test]
    fn test_bankers_rounding_half_to_even() {
        // 0.125 rounds to 0.12, 0.135 rounds to 0.14
        assert_eq!(usd("0.125").to_display(), "0.12");
        assert_eq!(usd("0.135").to_display(), "0.14");
    }

    #[test]
    fn test_monthly_hourly_uses_730() {
        let hourly = usd("0.096");
        let monthly = hourly.hourly_to_monthly();
        assert_eq!(monthly.to_display(), "70.08");
        assert_eq!(monthly.monthly_to_hourly().to_display(), "0.10");
    }

    #[test]
    fn test_signed_display() {
        assert_eq!(usd("0").to_signed_display(), "+$0.00");
        assert_eq!(usd("70.08").to_signed_display(), "+$70.08");
        assert_eq!(usd("-3.5").to_signed_display(), "-$3.50");
    }

    #[test]
    fn test_intermediate_scale_preserved() {
        let m = usd("0.000001").mul_int(3);
        assert_eq!(m.amount(), Decimal::from_str("0.000003").unwrap());
        // display collapses to two digits only at the edge
        assert_eq!(m.to_display(), "0.00");
    }
}
