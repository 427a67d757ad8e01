//! # Validation Module
//!
//! Checks run on caller input before a write transaction is opened.
//!
//! ## Where Each Rule Lives
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (no I/O)                                         │
//! │  ├── Cart shape: non-empty, ≤ 100 lines, quantities 1..=999            │
//! │  ├── Names and reasons: present, bounded length                        │
//! │  └── Refund quantity: positive                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engines (inside BEGIN IMMEDIATE)                             │
//! │  ├── Stock sufficiency for every line                                  │
//! │  └── Remaining refundable quantity                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK (quantity >= 0) on inventory                                │
//! │  ├── UNIQUE transaction_id                                             │
//! │  └── Append-only triggers                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::Money;
//! use till_core::types::CartLine;
//! use till_core::validation::validate_cart;
//!
//! let cart = vec![CartLine::new("Beer", 2, Money::from_cents(2000))];
//! assert_eq!(validate_cart(&cart).unwrap(), Money::from_cents(4000));
//! assert!(validate_cart(&[]).is_err());
//! ```

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::CartLine;
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY, MAX_NAME_LEN, MAX_REASON_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required, bounded name (`item`, `cashier`, `supervisor`, ...).
pub fn validate_name(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates an item name.
///
/// ```rust
/// use till_core::validation::validate_item_name;
///
/// assert!(validate_item_name("Beer").is_ok());
/// assert!(validate_item_name("  ").is_err());
/// ```
pub fn validate_item_name(item: &str) -> ValidationResult<()> {
    validate_name("item", item)
}

/// Validates a void/refund reason. Corrections are never accepted without one.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: positive and at most [`MAX_LINE_QUANTITY`].
pub fn validate_quantity(qty: i64) -> CoreResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: qty,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (comped items).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a refund quantity. The upper bound depends on prior refunds and
/// is checked inside the refund transaction.
pub fn validate_refund_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "refund quantity".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Cart Validation
// =============================================================================

/// Validates a whole cart and returns its total.
///
/// ## Rules
/// - At least one line, at most [`MAX_CART_LINES`]
/// - Every item name valid, every quantity in `1..=999`
/// - Unit prices non-negative
/// - Total fits in an `i64` of cents
pub fn validate_cart(lines: &[CartLine]) -> CoreResult<Money> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        }
        .into());
    }

    if lines.len() > MAX_CART_LINES {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_LINES,
        });
    }

    let mut total = Money::zero();
    for line in lines {
        validate_item_name(&line.item)?;
        validate_quantity(line.quantity)?;
        validate_price_cents("unit price", line.unit_price_cents)?;

        let subtotal = line
            .unit_price()
            .checked_multiply_quantity(line.quantity)
            .ok_or_else(|| ValidationError::Overflow {
                field: "line subtotal".to_string(),
            })?;
        total = total
            .cents()
            .checked_add(subtotal.cents())
            .map(Money::from_cents)
            .ok_or_else(|| ValidationError::Overflow {
                field: "cart total".to_string(),
            })?;
    }

    Ok(total)
}

/// Units requested per item across the cart.
///
/// The same item may appear on several lines; stock sufficiency is checked
/// against the combined demand.
pub fn demand_by_item(lines: &[CartLine]) -> BTreeMap<&str, i64> {
    let mut demand: BTreeMap<&str, i64> = BTreeMap::new();
    for line in lines {
        *demand.entry(line.item.as_str()).or_insert(0) += line.quantity;
    }
    demand
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(item: &str, qty: i64, cents: i64) -> CartLine {
        CartLine::new(item, qty, Money::from_cents(cents))
    }

    #[test]
    fn test_validate_cart_total() {
        let cart = vec![line("Beer", 2, 2000), line("Water", 5, 800)];
        assert_eq!(validate_cart(&cart).unwrap(), Money::from_cents(8000));
    }

    #[test]
    fn test_validate_cart_rejects_empty_and_oversized() {
        assert!(matches!(
            validate_cart(&[]),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));

        let big: Vec<CartLine> = (0..=MAX_CART_LINES).map(|i| line(&format!("Item {}", i), 1, 100)).collect();
        assert!(matches!(
            validate_cart(&big),
            Err(CoreError::CartTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_cart_rejects_bad_lines() {
        assert!(validate_cart(&[line("Beer", 0, 2000)]).is_err());
        assert!(validate_cart(&[line("Beer", -1, 2000)]).is_err());
        assert!(matches!(
            validate_cart(&[line("Beer", 1000, 2000)]),
            Err(CoreError::QuantityTooLarge { .. })
        ));
        assert!(validate_cart(&[line("", 1, 2000)]).is_err());
        assert!(validate_cart(&[line("Beer", 1, -1)]).is_err());
        assert!(validate_cart(&[line("Beer", 999, i64::MAX / 100)]).is_err());
    }

    #[test]
    fn test_demand_combines_duplicate_items() {
        let cart = vec![line("Beer", 2, 2000), line("Water", 1, 800), line("Beer", 3, 1800)];
        let demand = demand_by_item(&cart);
        assert_eq!(demand.get("Beer"), Some(&5));
        assert_eq!(demand.get("Water"), Some(&1));
    }

    #[test]
    fn test_validate_reason() {
        assert!(validate_reason("customer changed mind").is_ok());
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason(&"x".repeat(MAX_REASON_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_refund_quantity() {
        assert!(validate_refund_quantity(1).is_ok());
        assert!(validate_refund_quantity(0).is_err());
    }
}
