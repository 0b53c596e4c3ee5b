//! # Tax Calculator
//!
//! Turns one amount into `{subtotal, tax, total}` under either tax policy.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EXCLUSIVE (tax on top)              INCLUSIVE (tax inside the price)   │
//! │                                                                         │
//! │  input = subtotal S                  input = total T                    │
//! │  tax   = round(S × rate)             subtotal = round(T / (1 + rate))   │
//! │  total = S + tax                     tax      = T - subtotal            │
//! │                                                                         │
//! │  3000 @ 19% → 3000 / 570 / 3570      3570 @ 19% → 3000 / 570 / 3570     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deriving `tax` as a difference in the inclusive case keeps
//! `subtotal + tax == total` exact, whatever the rounding did.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, TaxRate};

/// Result of a tax computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxBreakdown {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

/// Computes subtotal, tax and total for `amount`.
///
/// ## Arguments
/// * `amount` - the tax-inclusive total when `tax_included`, else the pre-tax subtotal
/// * `tax_included` - which policy `amount` is quoted under
/// * `rate` - the tax rate
///
/// ## Errors
/// `ValidationError::OutOfRange` when `amount` is negative, or when the tax
/// or total would not fit in an `i64` of cents.
///
/// ## Example
/// ```rust
/// use stockroom_core::money::{Money, TaxRate};
/// use stockroom_core::tax::compute_tax;
///
/// let b = compute_tax(Money::from_cents(3570), true, TaxRate::from_bps(1900)).unwrap();
/// assert_eq!(b.subtotal.cents(), 3000);
/// assert_eq!(b.tax.cents(), 570);
/// assert_eq!(b.total.cents(), 3570);
/// ```
pub fn compute_tax(
    amount: Money,
    tax_included: bool,
    rate: TaxRate,
) -> Result<TaxBreakdown, ValidationError> {
    if amount.is_negative() {
        return Err(amount_out_of_range());
    }

    let breakdown = if tax_included {
        let subtotal = amount.exclude_tax(rate);
        TaxBreakdown {
            subtotal,
            tax: amount - subtotal,
            total: amount,
        }
    } else {
        let tax = amount.calculate_tax(rate).ok_or_else(amount_out_of_range)?;
        let total = amount.checked_add(tax).ok_or_else(amount_out_of_range)?;
        TaxBreakdown {
            subtotal: amount,
            tax,
            total,
        }
    };

    Ok(breakdown)
}

fn amount_out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "amount".to_string(),
        min: 0,
        max: i64::MAX,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
