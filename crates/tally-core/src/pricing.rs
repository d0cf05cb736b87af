//! # Price Resolution & Reconciliation
//!
//! The one genuinely tricky part of the engine: two price sources vary
//! independently (the live stock snapshot and the cashier's own edits) and
//! must never silently overwrite each other.
//!
//! ## Resolution Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            Price Resolution for a new, non-overridden line              │
//! │                                                                         │
//! │  Wholesale mode:                       Retail / Credit mode:            │
//! │  stock.wholesale_price                 stock.retail_price               │
//! │        │ absent?                             │ absent?                  │
//! │        ▼                                     ▼                          │
//! │  stock.base_price                      stock.base_price                 │
//! │        │ absent?                             │ absent?                  │
//! │        ▼                                     ▼                          │
//! │  product.wholesale_price               product.retail_price             │
//! │        │ absent?                             │ absent?                  │
//! │        ▼                                     ▼                          │
//! │  product.base_price                    product.base_price               │
//! │        │ absent?                             │ absent?                  │
//! │        ▼                                     ▼                          │
//! │  zero                                  zero                             │
//! │                                                                         │
//! │  Each step is tried only when the previous one is ABSENT (None),        │
//! │  never when it is merely zero.                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reconciliation Rules
//! When a fresher snapshot arrives, or the tab's price mode changes, every
//! line that the cashier has NOT manually priced is recomputed. The new
//! price is applied only if it is positive AND different from the current
//! one. The positive check keeps a half-loaded snapshot from flashing
//! prices to zero; the difference check avoids redundant re-renders.
//!
//! Reconciliation is a pure function of (snapshot, override flags), so
//! applying the same snapshot twice, or applying it late after user edits,
//! converges to the same prices regardless of arrival order.

use crate::money::Money;
use crate::tab::SaleTab;
use crate::types::{PriceMode, ProductRef, StockEntry, StockSnapshot};

/// Resolves the effective unit price for a new, non-overridden line.
///
/// `stock` is the live snapshot entry for the product, if one has loaded.
/// `Credit` mode resolves through the retail chain.
pub fn resolve_unit_price(
    product: &ProductRef,
    stock: Option<&StockEntry>,
    mode: PriceMode,
) -> Money {
    match mode {
        PriceMode::Wholesale => stock
            .and_then(|s| s.wholesale_price)
            .or_else(|| stock.and_then(|s| s.base_price))
            .or(product.wholesale_price)
            .or(product.base_price)
            .unwrap_or(Money::zero()),
        PriceMode::Retail | PriceMode::Credit => stock
            .and_then(|s| s.retail_price)
            .or_else(|| stock.and_then(|s| s.base_price))
            .or(product.retail_price)
            .or(product.base_price)
            .unwrap_or(Money::zero()),
    }
}

/// Recomputes every non-overridden line of a tab against a snapshot.
///
/// A line's price is replaced only when the recomputed value is positive
/// and differs from the current one. Overridden lines are never touched.
///
/// Returns the number of lines whose price changed (0 means no re-render
/// is needed).
pub fn reconcile_tab(tab: &mut SaleTab, snapshot: &StockSnapshot) -> usize {
    let mode = tab.price_mode;
    let mut changed = 0;

    for line in tab.lines.iter_mut() {
        if line.price_overridden {
            continue;
        }

        let stock = snapshot.get(&line.product.id);
        let resolved = resolve_unit_price(&line.product, stock, mode);

        if resolved.is_positive() && resolved != line.unit_price {
            line.unit_price = resolved;
            changed += 1;
        }
    }

    changed
}

/// Back-solves a unit price from an edited line subtotal.
///
/// A 0-quantity line cannot otherwise hold a price, so the subtotal is
/// taken as the unit price in that case ([`Money::divide_quantity`]
/// handles zero the same way).
pub fn unit_price_from_subtotal(subtotal: Money, quantity: i64) -> Money {
    subtotal.divide_quantity(quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================
