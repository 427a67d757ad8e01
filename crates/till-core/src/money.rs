//! # Money Module
//!
//! Integer money for sale totals, refunds and correction amounts.
//!
//! ## Signed Cents
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Where the sign lives                                                   │
//! │                                                                         │
//! │  Sale header total        +$40.00   (Beer ×2 @ $20.00)                  │
//! │  Refund header total       -$5.00   (Soda ×1 @ $5.00 returned)          │
//! │  Void correction amount   -$40.00   (money handed back)                 │
//! │                                                                         │
//! │  Net revenue = Σ totals of non-voided headers, no special cases.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::Money;
//!
//! let unit = Money::from_cents(500);
//! let refund = -unit.multiply_quantity(1);
//! assert_eq!(refund.to_string(), "-$5.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor units (cents).
///
/// Signed so that refunds and correction amounts use the same type as sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(2000).cents(), 2000);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole units and cents.
    ///
    /// Only the major part carries the sign: `from_major_minor(-5, 50)` is -$5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the whole-unit portion, truncated toward zero.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the cents portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Line subtotal: unit price × quantity.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let subtotal = Money::from_cents(800).multiply_quantity(5);
    /// assert_eq!(subtotal.cents(), 4000);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Checked variant of [`Money::multiply_quantity`] for untrusted input.
    #[inline]
    pub fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug/log rendering, e.g. `$40.00` or `-$5.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

/// Negation turns a sale amount into the matching refund amount.
impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(20, 0).cents(), 2000);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(4000).to_string(), "$40.00");
        assert_eq!(Money::from_cents(-500).to_string(), "-$5.00");
        assert_eq!(Money::from_cents(-5).to_string(), "-$0.05");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn test_cart_total_from_lines() {
        let lines = [
            Money::from_cents(2000).multiply_quantity(2),
            Money::from_cents(800).multiply_quantity(5),
        ];
        let total: Money = lines.iter().sum();
        assert_eq!(total.cents(), 8000);
    }

    #[test]
    fn test_refund_is_negated_sale_amount() {
        let refund = -Money::from_cents(500).multiply_quantity(1);
        assert!(refund.is_negative());
        assert_eq!(refund.abs(), Money::from_cents(500));
    }

    #[test]
    fn test_checked_multiply_overflow() {
        assert!(Money::from_cents(i64::MAX).checked_multiply_quantity(2).is_none());
        assert_eq!(
            Money::from_cents(299).checked_multiply_quantity(3),
            Some(Money::from_cents(897))
        );
    }
}
