//! # Ports
//!
//! The two seams the session engine talks through, as object-safe async
//! traits: the remote backend and durable client storage.
//!
//! ## Why Traits?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Ports & Adapters                                 │
//! │                                                                         │
//! │                    ┌────────────────────┐                               │
//! │   production ────► │  SessionController │ ◄──── tests                   │
//! │                    └──────┬──────┬──────┘                               │
//! │                           │      │                                      │
//! │                 SaleBackend    RegistryStore                            │
//! │                           │      │                                      │
//! │              ┌────────────┘      └───────────┐                          │
//! │              ▼                               ▼                          │
//! │      HTTP client adapter             JsonFileStore (prod)               │
//! │      (out of this repo)              MemoryStore   (tests)              │
//! │                                                                         │
//! │  The controller never constructs its collaborators; they are            │
//! │  injected, along with the branch id, at build time.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both backend fetches are independent: the catalog list and the stock
//! snapshot complete in any order, and either may race the cashier's own
//! edits. The controller is written so that ordering does not matter.

use async_trait::async_trait;
use thiserror::Error;

use tally_core::{CustomerRef, ProductRef, SalePayload, SaleRecord, SaleTab, StockSnapshot};

// =============================================================================
// Backend Port
// =============================================================================

/// A failure reported by the remote backend.
///
/// The message is surfaced to the operator verbatim; the engine adds no
/// interpretation and performs no automatic retry.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        BackendError {
            message: message.into(),
        }
    }
}

/// Remote persistence collaborator (REST-like backend).
///
/// All calls are single attempts, idempotent from the caller's
/// perspective. The engine never retries: a failed submission leaves the
/// tab in `Building` for the operator to retry or correct.
#[async_trait]
pub trait SaleBackend: Send + Sync {
    /// Product metadata list for a branch.
    async fn fetch_catalog(&self, branch_id: &str) -> Result<Vec<ProductRef>, BackendError>;

    /// Live stock/price snapshot for a branch. Arrives later than the
    /// catalog and may refresh at any time.
    async fn fetch_stock_snapshot(&self, branch_id: &str) -> Result<StockSnapshot, BackendError>;

    /// Customers known to a branch.
    async fn fetch_customers(&self, branch_id: &str) -> Result<Vec<CustomerRef>, BackendError>;

    /// Creates a new sale. Returns the remote sale id.
    async fn create_sale(
        &self,
        payload: &SalePayload,
        branch_id: &str,
    ) -> Result<String, BackendError>;

    /// Updates a previously committed sale in place.
    async fn update_sale(&self, sale_id: &str, payload: &SalePayload)
        -> Result<(), BackendError>;

    /// Fetches a committed sale for editing.
    async fn fetch_sale_by_id(&self, sale_id: &str) -> Result<SaleRecord, BackendError>;
}

// =============================================================================
// Storage Port
// =============================================================================

/// Durable-storage failure. Logged and swallowed by the controller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored registry is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable client storage, keyed as `(kind, branch id)`.
///
/// Two kinds are persisted: the full tab list and the active-tab pointer.
/// Each branch gets an independent registry; switching branches never
/// mixes state. Writes are last-write-wins and order-preserving.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn load_tabs(&self, branch_id: &str) -> Result<Option<Vec<SaleTab>>, StoreError>;

    async fn save_tabs(&self, branch_id: &str, tabs: &[SaleTab]) -> Result<(), StoreError>;

    async fn load_active_tab(&self, branch_id: &str) -> Result<Option<String>, StoreError>;

    async fn save_active_tab(&self, branch_id: &str, tab_id: &str) -> Result<(), StoreError>;
}

// =============================================================================
// Shared-Handle Implementations
// =============================================================================

// Ports are commonly shared between the controller and other parts of a
// host application. `Arc<T>` delegates so a single connection pool or
// storage handle can serve both.

#[async_trait]
impl<T: SaleBackend + ?Sized> SaleBackend for std::sync::Arc<T> {
    async fn fetch_catalog(&self, branch_id: &str) -> Result<Vec<ProductRef>, BackendError> {
        (**self).fetch_catalog(branch_id).await
    }

    async fn fetch_stock_snapshot(&self, branch_id: &str) -> Result<StockSnapshot, BackendError> {
        (**self).fetch_stock_snapshot(branch_id).await
    }

    async fn fetch_customers(&self, branch_id: &str) -> Result<Vec<CustomerRef>, BackendError> {
        (**self).fetch_customers(branch_id).await
    }

    async fn create_sale(
        &self,
        payload: &SalePayload,
        branch_id: &str,
    ) -> Result<String, BackendError> {
        (**self).create_sale(payload, branch_id).await
    }

    async fn update_sale(
        &self,
        sale_id: &str,
        payload: &SalePayload,
    ) -> Result<(), BackendError> {
        (**self).update_sale(sale_id, payload).await
    }

    async fn fetch_sale_by_id(&self, sale_id: &str) -> Result<SaleRecord, BackendError> {
        (**self).fetch_sale_by_id(sale_id).await
    }
}

#[async_trait]
impl<T: RegistryStore + ?Sized> RegistryStore for std::sync::Arc<T> {
    async fn load_tabs(&self, branch_id: &str) -> Result<Option<Vec<SaleTab>>, StoreError> {
        (**self).load_tabs(branch_id).await
    }

    async fn save_tabs(&self, branch_id: &str, tabs: &[SaleTab]) -> Result<(), StoreError> {
        (**self).save_tabs(branch_id, tabs).await
    }

    async fn load_active_tab(&self, branch_id: &str) -> Result<Option<String>, StoreError> {
        (**self).load_active_tab(branch_id).await
    }

    async fn save_active_tab(&self, branch_id: &str, tab_id: &str) -> Result<(), StoreError> {
        (**self).save_active_tab(branch_id, tab_id).await
    }
}
