//! # Money Module
//!
//! `Money` and `TaxRate`: the two numeric types every sale flows through.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                   │
//! │    3570 / 1.19 = 2999.9999999999995 ❌ (penny drift on every report)     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer cents + integer basis points                     │
//! │    357000 * 10000 / 11900 = 300000 (exact, or explicitly rounded)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockroom_core::money::{Money, TaxRate};
//!
//! let price = Money::from_cents(1000);
//! let line = price.multiply_quantity(3).unwrap();
//! assert_eq!(line.cents(), 3000);
//! assert_eq!(line.calculate_tax(TaxRate::from_bps(1900)).unwrap().cents(), 570);
//! ```
//!
//! ## Overflow
//! Every operation on the pricing path is checked and returns `None`
//! instead of wrapping. The only operator is `-`, for splitting an amount
//! into parts no larger than itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::BPS_PER_UNIT;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: subtraction never panics on underflow of the type
/// - **Single field tuple struct**: Zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Calculates `self × rate`, rounding half up to the nearest cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000` in i128, then
    /// narrowed back to i64. `None` when the tax does not fit.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::{Money, TaxRate};
    ///
    /// let price = Money::from_cents(1000);
    /// // 10.00 × 8.25% = 0.825 → 0.83
    /// assert_eq!(price.calculate_tax(TaxRate::from_bps(825)).unwrap().cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Option<Money> {
        mul_bps_rounded(self.0, rate.bps()).map(Money)
    }

    /// Extracts the pre-tax part of a tax-inclusive amount.
    ///
    /// `round(amount × 10000 / (10000 + bps))`, half up.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::{Money, TaxRate};
    ///
    /// let gross = Money::from_cents(3570);
    /// assert_eq!(gross.exclude_tax(TaxRate::from_bps(1900)).cents(), 3000);
    /// ```
    pub fn exclude_tax(&self, rate: TaxRate) -> Money {
        let denominator = BPS_PER_UNIT as i128 + rate.bps() as i128;
        let numerator = self.0 as i128 * BPS_PER_UNIT as i128;
        // The quotient never exceeds `self` in magnitude, so it fits in i64.
        Money((numerator * 2 + denominator).div_euclid(denominator * 2) as i64)
    }

    /// Multiplies money by a quantity, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).unwrap().cents(), 897);
    /// assert!(Money::from_cents(i64::MAX / 2).multiply_quantity(3).is_none());
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Arguments
    /// * `discount_bps` - Discount in basis points (1000 = 10%)
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::Money;
    ///
    /// let price = Money::from_cents(10000);
    /// assert_eq!(price.apply_percentage_discount(1000).unwrap().cents(), 9000);
    /// ```
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Option<Money> {
        let discount = mul_bps_rounded(self.0, discount_bps)?;
        self.0.checked_sub(discount).map(Money)
    }
}

/// `round(amount × bps / 10000)`, half up (away from zero is irrelevant:
/// callers only pass non-negative amounts). `None` if it does not fit in i64.
fn mul_bps_rounded(amount: i64, bps: u32) -> Option<i64> {
    // i64 × u32 cannot overflow i128
    let scaled = (amount as i128 * bps as i128 + 5000).div_euclid(BPS_PER_UNIT as i128);
    i64::try_from(scaled).ok()
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display (`12.34`, `-5.50`). Currency symbols and
/// localisation belong to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}


// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1900 bps = 19% (e.g., VAT); 0.19 as a fraction.
///
/// A rate is unsigned, so a negative rate cannot exist once constructed.
/// There is no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (`19.0` → 1900 bps).
    ///
    /// Rejects negative, NaN and infinite input.
    ///
    /// ## Example
    /// ```rust
    /// use stockroom_core::money::TaxRate;
    ///
    /// assert_eq!(TaxRate::try_from_percentage(8.25).unwrap().bps(), 825);
    /// assert!(TaxRate::try_from_percentage(-1.0).is_err());
    /// ```
    pub fn try_from_percentage(pct: f64) -> Result<Self, ValidationError> {
        if !pct.is_finite() || pct < 0.0 {
            return Err(ValidationError::OutOfRange {
                field: "tax_rate".to_string(),
                min: 0,
                max: i64::from(u32::MAX),
            });
        }

        let bps = (pct * 100.0).round();
        if bps > f64::from(u32::MAX) {
            return Err(ValidationError::OutOfRange {
                field: "tax_rate".to_string(),
                min: 0,
                max: i64::from(u32::MAX),
            });
        }

        Ok(TaxRate(bps as u32))
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.checked_add(b), Some(Money::from_cents(1500)));
        assert_eq!(a.multiply_quantity(3), Some(Money::from_cents(3000)));
    }

    #[test]
    fn test_overflow_is_reported_not_wrapped() {
        let huge = Money::from_cents(i64::MAX / 2);

        assert_eq!(huge.multiply_quantity(3), None);
        assert_eq!(huge.checked_add(huge).and_then(|m| m.checked_add(huge)), None);
        // Tax on a near-max amount exceeds i64 once the rate passes 100%.
        assert_eq!(Money::from_cents(i64::MAX).calculate_tax(TaxRate::from_bps(20_000)), None);
        assert!(Money::from_cents(i64::MAX).calculate_tax(TaxRate::from_bps(1900)).is_some());
        assert_eq!(Money::from_cents(i64::MAX).apply_percentage_discount(u32::MAX), None);
    }

    #[test]
    fn test_tax_calculation_with_rounding() {
        // 10.00 at 8.25% = 0.825 → 0.83
        let amount = Money::from_cents(1000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(825)).unwrap().cents(), 83);
        assert_eq!(amount.calculate_tax(TaxRate::zero()).unwrap().cents(), 0);
    }

    #[test]
    fn test_exclude_tax() {
        let rate = TaxRate::from_bps(1900);
        assert_eq!(Money::from_cents(3570).exclude_tax(rate).cents(), 3000);
        // 1000 / 1.19 = 840.336... → 840
        assert_eq!(Money::from_cents(1000).exclude_tax(rate).cents(), 840);
        assert_eq!(Money::from_cents(1000).exclude_tax(TaxRate::zero()).cents(), 1000);
    }

    #[test]
    fn test_percentage_discount() {
        let price = Money::from_cents(10000);
        assert_eq!(price.apply_percentage_discount(1000).unwrap().cents(), 9000);
        assert_eq!(price.apply_percentage_discount(0).unwrap().cents(), 10000);
        assert_eq!(price.apply_percentage_discount(10000).unwrap().cents(), 0);
        // 3.33 at 50% = 1.665 discount → 1.67 off → 1.66
        assert_eq!(Money::from_cents(333).apply_percentage_discount(5000).unwrap().cents(), 166);
    }

    #[test]
    fn test_tax_rate_constructors() {
        assert_eq!(TaxRate::from_bps(825).bps(), 825);
        assert_eq!(TaxRate::try_from_percentage(19.0).unwrap().bps(), 1900);

        assert!(TaxRate::try_from_percentage(-0.5).is_err());
        assert!(TaxRate::try_from_percentage(f64::NAN).is_err());
        assert!(TaxRate::try_from_percentage(f64::INFINITY).is_err());
    }
}
