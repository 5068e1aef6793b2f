//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Price`] or [`DiscountPercent`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is negative.
    #[error("price cannot be negative (got {0})")]
    Negative(Decimal),
    /// The currency code is not one we support.
    #[error("unsupported currency code: {0}")]
    UnsupportedCurrency(String),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a non-negative price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `amount` is below zero.
    pub fn non_negative(amount: Decimal, currency_code: CurrencyCode) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self::new(amount, currency_code))
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Multiply the amount by a unit count (e.g. a line quantity).
    #[must_use]
    pub fn times(self, units: u32) -> Self {
        Self::new(self.amount * Decimal::from(units), self.currency_code)
    }

    /// Apply a percentage discount.
    #[must_use]
    pub fn discounted(self, discount: DiscountPercent) -> Self {
        Self::new(self.amount * discount.remaining_fraction(), self.currency_code)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    INR,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::INR => "₹",
        }
    }

    /// Parse a currency code, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::UnsupportedCurrency`] for unknown codes.
    pub fn parse(code: &str) -> Result<Self, PriceError> {
        match code.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "INR" => Ok(Self::INR),
            _ => Err(PriceError::UnsupportedCurrency(code.to_string())),
        }
    }
}

/// A percentage discount as reported by the Gateway.
///
/// The raw value is kept as received; [`DiscountPercent::effective`] clamps it
/// to `[0, 100]` for arithmetic so a bad record can never produce a negative
/// price or a markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    /// No discount.
    pub const NONE: Self = Self(Decimal::ZERO);

    /// Wrap a raw percentage value.
    #[must_use]
    pub const fn new(percent: Decimal) -> Self {
        Self(percent)
    }

    /// The raw value as received.
    #[must_use]
    pub const fn raw(self) -> Decimal {
        self.0
    }

    /// Whether the raw value lies outside `[0, 100]`.
    #[must_use]
    pub fn is_out_of_range(self) -> bool {
        self.0 < Decimal::ZERO || self.0 > Decimal::ONE_HUNDRED
    }

    /// The percentage clamped to `[0, 100]`.
    #[must_use]
    pub fn effective(self) -> Decimal {
        self.0.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
    }

    /// `1 - effective / 100`, the fraction of the price that remains.
    #[must_use]
    pub fn remaining_fraction(self) -> Decimal {
        Decimal::ONE - self.effective() / Decimal::ONE_HUNDRED
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_discounted_price() {
        let price = Price::new(dec!(100), CurrencyCode::USD);
        let discounted = price.discounted(DiscountPercent::new(dec!(10)));
        assert_eq!(discounted.amount, dec!(90));
    }

    #[test]
    fn test_discount_is_clamped() {
        let price = Price::new(dec!(40), CurrencyCode::USD);
        assert_eq!(
            price.discounted(DiscountPercent::new(dec!(150))).amount,
            dec!(0)
        );
        assert_eq!(
            price.discounted(DiscountPercent::new(dec!(-20))).amount,
            dec!(40)
        );
        assert!(DiscountPercent::new(dec!(150)).is_out_of_range());
        assert!(!DiscountPercent::new(dec!(100)).is_out_of_range());
    }

    #[test]
    fn test_non_negative_rejects_negative() {
        assert_eq!(
            Price::non_negative(dec!(-1), CurrencyCode::USD),
            Err(PriceError::Negative(dec!(-1)))
        );
        assert!(Price::non_negative(dec!(0), CurrencyCode::USD).is_ok());
    }

    #[test]
    fn test_times() {
        let price = Price::new(dec!(2.50), CurrencyCode::EUR);
        assert_eq!(price.times(3).amount, dec!(7.50));
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::new(dec!(19.5), CurrencyCode::USD).to_string(), "$19.50");
        assert_eq!(Price::new(dec!(3), CurrencyCode::GBP).to_string(), "£3.00");
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!(CurrencyCode::parse("usd"), Ok(CurrencyCode::USD));
        assert_eq!(CurrencyCode::parse("INR"), Ok(CurrencyCode::INR));
        assert!(CurrencyCode::parse("XYZ").is_err());
    }
}
