//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are never floats. Every arithmetic step the checkout performs
//! (line totals, order totals) goes through checked `Decimal` operations so
//! an overflow is reported instead of wrapping or rounding.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when constructing a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// The amount was below zero.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),

    /// The input could not be parsed as a decimal amount.
    #[error("invalid price: {0}")]
    Invalid(String),
}

/// A non-negative monetary amount in the store currency.
///
/// Equality is numeric, so `20.00` and `20` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price, rejecting negative amounts.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `amount < 0`.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a price from an integer number of cents.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `cents < 0`.
    pub fn from_cents(cents: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(cents, 2))
    }

    /// Whether the amount is exactly representable as SQL `NUMERIC(precision, scale)`.
    ///
    /// Trailing zeros do not count towards the scale, so `10.50` fits
    /// `NUMERIC(10, 2)` while `10.005` does not.
    #[must_use]
    pub fn fits_numeric(self, precision: u32, scale: u32) -> bool {
        let amount = self.0.normalize();
        if amount.scale() > scale {
            return false;
        }
        match 10_i64.checked_pow(precision.saturating_sub(scale)) {
            Some(limit) => amount.trunc() < Decimal::from(limit),
            None => true,
        }
    }

    /// Price of `quantity` units, or `None` on overflow or negative quantity.
    #[must_use]
    pub fn checked_mul_quantity(self, quantity: i32) -> Option<Self> {
        if quantity < 0 {
            return None;
        }
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }

    /// Sum of two prices, or `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|e| PriceError::Invalid(e.to_string()))?;
        Self::new(amount)
    }
}
