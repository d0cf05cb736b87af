//! # Domain Types
//!
//! Core domain types used throughout the sale-building engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ProductRef    │   │   StockEntry    │   │  CustomerRef    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  stock (i64)    │   │  id             │       │
//! │  │  name/size/...  │   │  retail_price?  │   │  name           │       │
//! │  │  catalog prices │   │  wholesale?     │   │  phone?         │       │
//! │  └─────────────────┘   │  base_price?    │   └─────────────────┘       │
//! │                        └─────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   PriceMode     │   │    SaleType     │   │  SalePayload    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Retail         │   │  Cash           │   │  what the       │       │
//! │  │  Wholesale      │   │  Credit         │   │  backend gets   │       │
//! │  │  Credit         │   └─────────────────┘   │  on submit      │       │
//! │  └─────────────────┘                         └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Price Sources
//! A product's effective price can come from two independently varying
//! places: the live stock snapshot (per-branch, refreshed at any time) and
//! the product catalog defaults (loaded once with the product list). The
//! resolution order between them lives in [`crate::pricing`].

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product Reference
// =============================================================================

/// Immutable identity + metadata for a sellable item.
///
/// Owned by the catalog; the engine only reads it. The three price fields
/// are the product's *catalog defaults* - the live stock snapshot may carry
/// fresher per-branch prices that take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductRef {
    /// Unique identifier.
    pub id: String,

    /// Manufacturer / company name.
    pub manufacturer: String,

    /// Display name shown to the cashier.
    pub name: String,

    /// Short nickname used for quick search.
    pub nickname: Option<String>,

    /// Pack size label ("330ml", "24pc", ...).
    pub size: Option<String>,

    /// Product category label.
    pub product_type: Option<String>,

    /// Catalog fallback price when no mode-specific price is known.
    pub base_price: Option<Money>,

    /// Catalog default retail price.
    pub retail_price: Option<Money>,

    /// Catalog default wholesale price.
    pub wholesale_price: Option<Money>,
}

// =============================================================================
// Stock Snapshot
// =============================================================================

/// Live per-branch stock data for one product.
///
/// All price fields are optional: absence means "unknown/still loading",
/// which is distinct from a price of zero. The resolution chain only moves
/// past a field when it is absent, never when it is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockEntry {
    /// On-hand quantity. May be negative to represent backorder.
    pub stock: i64,

    /// Live retail price for this branch.
    pub retail_price: Option<Money>,

    /// Live wholesale price for this branch.
    pub wholesale_price: Option<Money>,

    /// Live fallback price for this branch.
    pub base_price: Option<Money>,
}

/// Point-in-time mapping from product id to live stock data.
///
/// Replaced wholesale whenever a fresher snapshot arrives - there is no
/// incremental merge. A stale snapshot is simply superseded by the next one.
pub type StockSnapshot = HashMap<String, StockEntry>;

// =============================================================================
// Customer Reference
// =============================================================================

/// A customer attached to a tab. `None` on the tab means walk-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerRef {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
}

// =============================================================================
// Price Mode
// =============================================================================

/// Display/pricing mode selected per tab.
///
/// `Credit` is only selectable when the tab's sale type is
/// [`SaleType::Credit`]; it resolves prices through the retail chain and
/// does not by itself determine payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PriceMode {
    /// Price individual customers pay.
    Retail,
    /// Price trade customers pay.
    Wholesale,
    /// Pricing basis for credit sales.
    Credit,
}

impl Default for PriceMode {
    fn default() -> Self {
        PriceMode::Retail
    }
}

// =============================================================================
// Sale Type
// =============================================================================

/// Payment category for the resulting sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SaleType {
    /// Paid in full at the counter.
    Cash,
    /// Booked against a customer's balance. Requires a customer.
    Credit,
}

impl Default for SaleType {
    fn default() -> Self {
        SaleType::Cash
    }
}

// =============================================================================
// Sale Payload (what the backend receives)
// =============================================================================

/// One line of a submitted sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleLinePayload {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// unit_price × quantity, precomputed for the backend.
    pub line_total: Money,
}

/// The full payload handed to the create/update collaborator.
///
/// Totals are computed fresh at submission time, never trusted from a
/// cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SalePayload {
    pub lines: Vec<SaleLinePayload>,
    pub customer_id: Option<String>,
    pub sale_type: SaleType,
    pub price_mode: PriceMode,
    pub total: Money,
    pub amount_paid: Money,
    /// max(0, total - amount_paid).
    pub due: Money,
    /// Effective date of the sale (explicit back-date or "today").
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
}

// =============================================================================
// Sale Record (what the backend returns for edit loads)
// =============================================================================

/// One line of a previously committed sale, as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleLineRecord {
    /// Product metadata embedded by the backend.
    pub product: ProductRef,
    pub quantity: i64,
    pub unit_price: Money,
}

/// A previously committed sale fetched for editing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleRecord {
    pub id: String,
    pub customer: Option<CustomerRef>,
    pub sale_type: SaleType,
    pub price_mode: PriceMode,
    pub lines: Vec<SaleLineRecord>,
    #[ts(as = "Option<String>")]
    pub sale_date: Option<NaiveDate>,
}

// =============================================================================
// Unit Tests
// =============================================================================
