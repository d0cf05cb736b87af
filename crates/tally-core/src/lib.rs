//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate is the **heart** of the sale-building engine. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tally POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     Frontend / UI Shell                         │   │
//! │  │    Product Search ──► Tab Bar ──► Cart ──► Tender ──► Receipt   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  tally-session (controller)                     │   │
//! │  │    owns the registry, talks to backend + storage ports          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ tally-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │    tab    │   │   │
//! │  │   │ ProductRef│  │   Money   │  │  resolve  │  │  SaleTab  │   │   │
//! │  │   │ StockEntry│  │  (cents)  │  │ reconcile │  │  CartLine │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐                                  │   │
//! │  │   │ registry  │  │validation │                                  │   │
//! │  │   │TabRegistry│  │   rules   │                                  │   │
//! │  │   └───────────┘  └───────────┘                                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO STORAGE • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ProductRef, StockEntry, SalePayload, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Price resolution chain and stock reconciliation
//! - [`tab`] - A single sale session: line items and their mutators
//! - [`registry`] - The ordered collection of open tabs
//! - [`validation`] - Business rule validation before submission
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Network, file system and storage access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//! use tally_core::pricing::resolve_unit_price;
//! use tally_core::types::{PriceMode, ProductRef, StockEntry};
//!
//! let product = ProductRef {
//!     id: "p-1".to_string(),
//!     manufacturer: "Acme".to_string(),
//!     name: "Widget".to_string(),
//!     nickname: None,
//!     size: None,
//!     product_type: None,
//!     base_price: Some(Money::from_cents(500)),
//!     retail_price: Some(Money::from_cents(750)),
//!     wholesale_price: None,
//! };
//!
//! // No live stock data yet: falls back to the catalog retail price.
//! let price = resolve_unit_price(&product, None, PriceMode::Retail);
//! assert_eq!(price.cents(), 750);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod registry;
pub mod tab;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Money` instead of
// `use tally_core::money::Money`

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use registry::TabRegistry;
pub use tab::{CartLine, SaleTab};
pub use types::*;
