//! # Validation Module
//!
//! Business rule validation for the sale-building engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI                                                            │
//! │  ├── Disables the save action while amount paid < total                 │
//! │  └── Immediate cashier feedback                                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (before any remote call)                          │
//! │  ├── Non-empty cart                                                     │
//! │  ├── Credit sale ⇒ customer attached                                    │
//! │  ├── Total computed fresh from the lines                                │
//! │  └── Amount paid covers the total                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend                                                       │
//! │  └── Authoritative persistence-side checks                              │
//! │                                                                         │
//! │  First failing rule aborts with a specific reason; nothing reaches      │
//! │  the network and no partial state change is applied.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::tab::SaleTab;
use crate::types::{PriceMode, SaleType};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Runs all submission rules against a tab and returns the fresh total.
///
/// ## Rules (in order, first failure wins)
/// 1. The cart must not be empty.
/// 2. A credit sale must have a customer attached.
/// 3. The amount paid must not be negative.
/// 4. The amount paid must cover the total (computed fresh here, never
///    taken from a cached value).
pub fn validate_tab_for_submission(tab: &SaleTab, amount_paid: Money) -> ValidationResult<Money> {
    if tab.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    if tab.sale_type == SaleType::Credit && tab.customer.is_none() {
        return Err(ValidationError::CustomerRequiredForCredit);
    }

    if amount_paid.is_negative() {
        return Err(ValidationError::MustBeNonNegative {
            field: "amount paid".to_string(),
        });
    }

    let total = tab.total();
    if amount_paid < total {
        return Err(ValidationError::InsufficientPayment {
            total,
            paid: amount_paid,
        });
    }

    Ok(total)
}

/// Checks that a pricing mode is selectable for a sale type.
///
/// Credit pricing is only meaningful on a credit sale; every other
/// combination is allowed.
pub fn validate_price_mode(mode: PriceMode, sale_type: SaleType) -> ValidationResult<()> {
    if mode == PriceMode::Credit && sale_type != SaleType::Credit {
        return Err(ValidationError::CreditModeRequiresCreditSale);
    }
    Ok(())
}

/// Validates a staged-confirm quantity.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
