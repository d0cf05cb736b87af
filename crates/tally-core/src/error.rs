//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Business rule violations                       │
//! │                                                                         │
//! │  tally-session errors (separate crate)                                 │
//! │  ├── SessionError     - Engine orchestration failures                  │
//! │  └── StoreError       - Durable storage failures (logged, swallowed)   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SessionError → UI                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, index, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
///
/// These errors represent failed operations against tabs or the registry.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A line index does not point at an existing cart line.
    ///
    /// ## When This Occurs
    /// - UI sent an edit/remove for a position that was already removed
    /// - Indices shifted after a removal and the caller kept a stale one
    #[error("No cart line at position {index}")]
    LineNotFound { index: usize },

    /// A tab id does not exist in the registry.
    #[error("Tab not found: {0}")]
    TabNotFound(String),

    /// Business rule violation (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Business rule violations detected locally, before any remote call.
///
/// Every variant carries a specific, user-facing reason. Validation
/// failures short-circuit: nothing reaches the network and no partial
/// state change is applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Submitting an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// Credit sales must be booked against a customer.
    #[error("customer required for credit sales")]
    CustomerRequiredForCredit,

    /// Payment below the computed total blocks a normal save.
    #[error("Amount paid {paid} is less than the sale total {total}")]
    InsufficientPayment { total: crate::Money, paid: crate::Money },

    /// Credit pricing mode is only meaningful on a credit sale.
    #[error("credit pricing requires a credit sale")]
    CreditModeRequiresCreditSale,

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Monetary value must not be negative.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
