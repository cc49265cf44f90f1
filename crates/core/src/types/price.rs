//! Money arithmetic and order totals.
//!
//! All amounts are `Decimal` in the store currency's standard unit (dollars,
//! not cents). Amounts that leave the system are rounded to two places with
//! midpoint-away-from-zero, matching how receipts are printed.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Orders whose subtotal is strictly above this ship for free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(5000, 0, 0, false, 2);

/// Flat shipping fee below the free-shipping threshold.
pub const FLAT_SHIPPING_FEE: Decimal = Decimal::from_parts(999, 0, 0, false, 2);

/// Sales tax rate applied to the subtotal (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Errors from money validation and conversion.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Amount was below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// Amount was zero or below where a positive amount is required.
    #[error("amount must be greater than zero")]
    NotPositive,
    /// Amount does not fit the target representation.
    #[error("amount is out of range")]
    OutOfRange,
    /// Quantity was zero or negative.
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

/// Round an amount to cents.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert an amount to integer minor units (cents, xu).
///
/// Gateways such as VNPay expect `amount * 100` as an integer.
///
/// # Errors
///
/// Returns `PriceError::NotPositive` for zero or negative amounts and
/// `PriceError::OutOfRange` if the value does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, PriceError> {
    if amount <= Decimal::ZERO {
        return Err(PriceError::NotPositive);
    }
    let minor = (round_money(amount) * Decimal::ONE_HUNDRED).trunc();
    i64::try_from(minor).map_err(|_| PriceError::OutOfRange)
}

/// Line total for a unit price and quantity.
///
/// # Errors
///
/// Returns `PriceError::Negative` for a negative price and
/// `PriceError::InvalidQuantity` for a quantity below one.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Result<Decimal, PriceError> {
    if unit_price < Decimal::ZERO {
        return Err(PriceError::Negative);
    }
    if quantity < 1 {
        return Err(PriceError::InvalidQuantity);
    }
    Ok(unit_price * Decimal::from(quantity))
}

/// Breakdown of what a customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    /// Sum of line totals.
    pub subtotal: Decimal,
    /// Shipping fee (zero above the free-shipping threshold).
    pub shipping: Decimal,
    /// Sales tax on the subtotal.
    pub tax: Decimal,
    /// `subtotal + shipping + tax`.
    pub total: Decimal,
}

impl OrderTotals {
    /// Compute totals from a subtotal.
    #[must_use]
    pub fn from_subtotal(subtotal: Decimal) -> Self {
        let subtotal = round_money(subtotal);
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            FLAT_SHIPPING_FEE
        };
        let tax = round_money(subtotal * TAX_RATE);

        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }

    /// Compute totals from `(unit_price, quantity)` lines.
    ///
    /// # Errors
    ///
    /// Returns the first line's `PriceError` if any line is invalid.
    pub fn from_lines<I>(lines: I) -> Result<Self, PriceError>
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let mut subtotal = Decimal::ZERO;
        for (price, quantity) in lines {
            subtotal += line_total(price, quantity)?;
        }
        Ok(Self::from_subtotal(subtotal))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_constants() {
        assert_eq!(FREE_SHIPPING_THRESHOLD, dec("50.00"));
        assert_eq!(FLAT_SHIPPING_FEE, dec("9.99"));
        assert_eq!(TAX_RATE, dec("0.08"));
    }

    #[test]
    fn test_small_order_pays_shipping() {
        let totals = OrderTotals::from_subtotal(dec("20.00"));
        assert_eq!(totals.shipping, dec("9.99"));
        assert_eq!(totals.tax, dec("1.60"));
        assert_eq!(totals.total, dec("31.59"));
    }

    #[test]
    fn test_exactly_fifty_still_pays_shipping() {
        let totals = OrderTotals::from_subtotal(dec("50.00"));
        assert_eq!(totals.shipping, dec("9.99"));
    }

    #[test]
    fn test_large_order_ships_free() {
        let totals = OrderTotals::from_subtotal(dec("50.01"));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.tax, dec("4.00"));
        assert_eq!(totals.total, dec("54.01"));
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 10.5625 * 0.08 = 0.845 -> 0.85
        let totals = OrderTotals::from_subtotal(dec("10.5625"));
        assert_eq!(totals.subtotal, dec("10.56"));
        // 10.56 * 0.08 = 0.8448 -> 0.84
        assert_eq!(totals.tax, dec("0.84"));
        assert_eq!(round_money(dec("0.845")), dec("0.85"));
    }

    #[test]
    fn test_from_lines() {
        let totals = OrderTotals::from_lines([(dec("19.99"), 2), (dec("5.00"), 1)]).unwrap();
        assert_eq!(totals.subtotal, dec("44.98"));
        assert_eq!(totals.shipping, dec("9.99"));
    }

    #[test]
    fn test_from_lines_rejects_zero_quantity() {
        let result = OrderTotals::from_lines([(dec("1.00"), 0)]);
        assert_eq!(result, Err(PriceError::InvalidQuantity));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(dec("150000")).unwrap(), 15_000_000);
        assert_eq!(to_minor_units(dec("12.345")).unwrap(), 1235);
        assert_eq!(to_minor_units(Decimal::ZERO), Err(PriceError::NotPositive));
    }

    #[test]
    fn test_serializes_as_strings() {
        let totals = OrderTotals::from_subtotal(dec("60.00"));
        let json = serde_json::to_value(totals).unwrap();
        assert_eq!(json["subtotal"], "60.00");
        assert_eq!(json["shipping"], "0");
    }
}
