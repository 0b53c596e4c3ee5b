//! # Pricing
//!
//! Line totals and sale totals. One rounding step per line (the discount),
//! one for the whole sale (the tax).
//!
//! ```text
//! line:  final_unit = unit - round(unit × discount)
//!        line_total = final_unit × quantity
//! sale:  amount     = Σ line_total
//!        breakdown  = compute_tax(amount, tax_included, rate)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, TaxRate};
use crate::tax::{compute_tax, TaxBreakdown};

/// A priced sale line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub quantity: i64,
    pub unit_price: Money,
    pub discount_bps: u32,
    /// Unit price after discount.
    pub final_unit: Money,
    pub line_total: Money,
}

/// All lines of a sale plus the sale-level tax breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedSale {
    pub lines: Vec<PricedLine>,
    pub breakdown: TaxBreakdown,
}

/// Prices one line.
///
/// ## Example
/// ```rust
/// use stockroom_core::money::Money;
/// use stockroom_core::pricing::price_line;
///
/// let line = price_line(Money::from_cents(1000), 3, 1000).unwrap();
/// assert_eq!(line.final_unit.cents(), 900);
/// assert_eq!(line.line_total.cents(), 2700);
/// ```
///
/// ## Errors
/// `ValidationError::OutOfRange` when the line total does not fit in an
/// `i64` of cents.
pub fn price_line(
    unit_price: Money,
    quantity: i64,
    discount_bps: u32,
) -> Result<PricedLine, ValidationError> {
    let final_unit = unit_price
        .apply_percentage_discount(discount_bps)
        .ok_or_else(line_total_out_of_range)?;
    let line_total = final_unit
        .multiply_quantity(quantity)
        .ok_or_else(line_total_out_of_range)?;

    Ok(PricedLine {
        quantity,
        unit_price,
        discount_bps,
        final_unit,
        line_total,
    })
}

/// Sums priced lines and applies the sale-level tax once.
///
/// With `tax_included` the line totals are treated as tax-inclusive and
/// the sum becomes the sale total; otherwise the sum is the subtotal.
pub fn price_sale(
    lines: Vec<PricedLine>,
    tax_included: bool,
    rate: TaxRate,
) -> Result<PricedSale, ValidationError> {
    let amount = lines
        .iter()
        .try_fold(Money::zero(), |sum, line| sum.checked_add(line.line_total))
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 0,
            max: i64::MAX,
        })?;
    let breakdown = compute_tax(amount, tax_included, rate)?;

    Ok(PricedSale { lines, breakdown })
}

fn line_total_out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "line_total".to_string(),
        min: 0,
        max: i64::MAX,
    }
}
