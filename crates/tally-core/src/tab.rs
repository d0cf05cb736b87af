//! # Sale Tab
//!
//! One in-progress (or edit-mode) sale session: selected customer, pricing
//! mode, sale type, and an ordered list of cart lines.
//!
//! ## Tab Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tab State Changes                                  │
//! │                                                                         │
//! │  Cashier Action            Mutator                  State Change        │
//! │  ──────────────            ───────                  ────────────        │
//! │                                                                         │
//! │  Click Product ──────────► add_product() ─────────► merge or push       │
//! │                                                                         │
//! │  Change Quantity ────────► update_quantity() ─────► lines[i].qty = n    │
//! │                                                                         │
//! │  Edit Price/Subtotal ────► update_line() ─────────► price + OVERRIDE    │
//! │                                                                         │
//! │  Click Remove ───────────► remove_line() ─────────► lines.remove(i)     │
//! │                                                                         │
//! │  Sale Committed ─────────► reset_in_place() ──────► empty cash tab,     │
//! │                                                      same id            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The Override Flag
//! `CartLine::price_overridden` is the single most important bit in the
//! engine. Once set, automatic reconciliation never touches that line's
//! price again. It is set at creation (staged confirm with an explicit
//! price) or by `update_line`, and cleared never.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    CustomerRef, PriceMode, ProductRef, SaleLinePayload, SalePayload, SaleRecord, SaleType,
};
use crate::validation::validate_tab_for_submission;

// =============================================================================
// Cart Line
// =============================================================================

/// One product row inside a tab's cart.
///
/// ## Design Notes
/// - `product`: frozen copy of the catalog entry at time of adding, so the
///   cart displays consistent data even if the catalog refreshes.
/// - `unit_price`: the effective price captured at add/last-edit time. It
///   is NOT recomputed from the catalog on every render; only
///   reconciliation (for non-overridden lines) or an explicit edit may
///   change it.
/// - `id`: stable per-line identity. Positional indices remain the editing
///   API, but the id survives removals so a UI can key rows safely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    /// Stable line identity (UUID v4), assigned at creation.
    pub id: String,

    /// Product snapshot at time of adding.
    pub product: ProductRef,

    /// Quantity in cart. Always ≥ 1; zero is rejected by mutators.
    pub quantity: i64,

    /// Effective unit price captured at add/last-edit time.
    pub unit_price: Money,

    /// Once true, automatic reconciliation never changes `unit_price`.
    pub price_overridden: bool,
}

impl CartLine {
    /// Calculates the line total (unit price × quantity).
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Sale Tab
// =============================================================================

/// One independent in-progress sale session.
///
/// ## Invariants
/// - Lines are unique by product id (adding the same product merges into
///   the existing line and never reprices it)
/// - Quantity is ≥ 1 for every line
/// - `price_mode == Credit` only while `sale_type == Credit`
/// - Insertion order = display order; callers must never reorder lines out
///   of band or index-based edits will target the wrong line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleTab {
    /// Locally unique identifier, stable for the tab's lifetime.
    pub id: String,

    /// Attached customer; `None` means walk-in.
    pub customer: Option<CustomerRef>,

    /// Pricing basis for non-overridden lines.
    pub price_mode: PriceMode,

    /// Cash vs credit payment category.
    pub sale_type: SaleType,

    /// Ordered cart lines.
    pub lines: Vec<CartLine>,

    /// Remote sale id when this tab edits a previously committed sale.
    pub sale_id: Option<String>,

    /// True when the tab was created by loading an existing sale.
    pub is_edit_mode: bool,

    /// Explicit back-date overriding "now" for the sale's effective date.
    #[ts(as = "Option<String>")]
    pub sale_date: Option<NaiveDate>,
}

impl SaleTab {
    /// Creates a new empty cash tab at retail pricing.
    pub fn new() -> Self {
        SaleTab {
            id: Uuid::new_v4().to_string(),
            customer: None,
            price_mode: PriceMode::Retail,
            sale_type: SaleType::Cash,
            lines: Vec::new(),
            sale_id: None,
            is_edit_mode: false,
            sale_date: None,
        }
    }

    /// Builds an edit-mode tab from a previously committed sale.
    ///
    /// Every remote line becomes a cart line with `price_overridden = true`:
    /// prices from a committed sale are always intentional and must never
    /// be subject to automatic reconciliation.
    pub fn from_sale_record(record: &SaleRecord) -> Self {
        SaleTab {
            id: Uuid::new_v4().to_string(),
            customer: record.customer.clone(),
            price_mode: record.price_mode,
            sale_type: record.sale_type,
            lines: record
                .lines
                .iter()
                .map(|l| CartLine {
                    id: Uuid::new_v4().to_string(),
                    product: l.product.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    price_overridden: true,
                })
                .collect(),
            sale_id: Some(record.id.clone()),
            is_edit_mode: true,
            sale_date: record.sale_date,
        }
    }

    // =========================================================================
    // Line Mutators
    // =========================================================================

    /// Adds a product to the cart, merging into an existing line.
    ///
    /// ## Behavior
    /// - Product already in cart: quantity increases; the existing
    ///   `unit_price` and `price_overridden` are left untouched (a
    ///   duplicate add never reprices, even if the resolved price changed
    ///   between the two adds)
    /// - Product not in cart: appended at `unit_price` with the given flag
    ///
    /// Callers resolve the price and validate `quantity > 0` first.
    pub fn add_product(
        &mut self,
        product: ProductRef,
        quantity: i64,
        unit_price: Money,
        price_overridden: bool,
    ) {
        if let Some(line) = self.lines.iter_mut().find(|l| l.product.id == product.id) {
            line.quantity += quantity;
            return;
        }

        self.lines.push(CartLine {
            id: Uuid::new_v4().to_string(),
            product,
            quantity,
            unit_price,
            price_overridden,
        });
    }

    /// Updates the quantity of the line at `index`.
    ///
    /// ## Behavior
    /// - `quantity <= 0`: no-op, returns `Ok(false)` (removal must go
    ///   through [`SaleTab::remove_line`], never through a zero quantity)
    /// - index out of range: error
    /// - otherwise sets the quantity and returns `Ok(true)`
    pub fn update_quantity(&mut self, index: usize, quantity: i64) -> CoreResult<bool> {
        if quantity <= 0 {
            return Ok(false);
        }

        let line = self
            .lines
            .get_mut(index)
            .ok_or(CoreError::LineNotFound { index })?;
        line.quantity = quantity;
        Ok(true)
    }

    /// Removes the line at `index`. Indices of later lines shift down.
    pub fn remove_line(&mut self, index: usize) -> CoreResult<CartLine> {
        if index >= self.lines.len() {
            return Err(CoreError::LineNotFound { index });
        }
        Ok(self.lines.remove(index))
    }

    /// Sets quantity and unit price directly, forcing the override flag.
    ///
    /// This is the *only* path that marks a line manually priced after
    /// creation. In-place edits of quantity, price, or the derived
    /// subtotal all land here (subtotal edits back-solve the unit price
    /// via [`crate::pricing::unit_price_from_subtotal`]).
    pub fn update_line(&mut self, index: usize, quantity: i64, unit_price: Money) -> CoreResult<()> {
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if unit_price.is_negative() {
            return Err(ValidationError::MustBeNonNegative {
                field: "unit price".to_string(),
            }
            .into());
        }

        let line = self
            .lines
            .get_mut(index)
            .ok_or(CoreError::LineNotFound { index })?;
        line.quantity = quantity;
        line.unit_price = unit_price;
        line.price_overridden = true;
        Ok(())
    }

    /// Resets the tab in place after a successful submission.
    ///
    /// The tab keeps its `id` (and therefore its position in the
    /// registry); everything else returns to the empty-cash-tab state.
    pub fn reset_in_place(&mut self) {
        self.customer = None;
        self.price_mode = PriceMode::Retail;
        self.sale_type = SaleType::Cash;
        self.lines.clear();
        self.sale_id = None;
        self.is_edit_mode = false;
        self.sale_date = None;
    }

    // =========================================================================
    // Derived Values (computed on demand, never stored)
    // =========================================================================

    /// Sale total: Σ unit_price × quantity over all lines.
    pub fn total(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(), |acc, l| acc + l.line_total())
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Number of distinct products in the cart.
    pub fn distinct_count(&self) -> usize {
        self.lines.len()
    }

    /// Checks if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    // =========================================================================
    // Submission Payload
    // =========================================================================

    /// Validates the tab and builds the backend payload.
    ///
    /// All business rules run before anything else; the first failing rule
    /// aborts with its user-facing reason and nothing is constructed. The
    /// total is computed fresh here, never trusted from a cached value.
    ///
    /// `today` supplies the effective date when the tab carries no
    /// explicit back-date (the pure core does not read the clock).
    pub fn build_payload(
        &self,
        amount_paid: Money,
        today: NaiveDate,
    ) -> Result<SalePayload, ValidationError> {
        let total = validate_tab_for_submission(self, amount_paid)?;

        Ok(SalePayload {
            lines: self
                .lines
                .iter()
                .map(|l| SaleLinePayload {
                    product_id: l.product.id.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    line_total: l.line_total(),
                })
                .collect(),
            customer_id: self.customer.as_ref().map(|c| c.id.clone()),
            sale_type: self.sale_type,
            price_mode: self.price_mode,
            total,
            amount_paid,
            due: (total - amount_paid).clamp_non_negative(),
            sale_date: self.sale_date.unwrap_or(today),
        })
    }
}

impl Default for SaleTab {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
