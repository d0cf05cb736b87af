//! # Session Controller
//!
//! The single owner of the tab registry. Every mutation of any tab goes
//! through this type; no other component may touch tabs directly.
//!
//! ## Operation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Session Controller Operations                        │
//! │                                                                         │
//! │  UI Action                 Method                   Effect              │
//! │  ─────────                 ──────                   ──────              │
//! │                                                                         │
//! │  Open Tab ───────────────► add_tab() ─────────────► append + activate   │
//! │  Close Tab ──────────────► close_tab(id) ─────────► remove (≥2 tabs)    │
//! │  Click Product ──────────► select_product() ──────► merge/append line   │
//! │                              │ (confirm-before-add: staged instead)     │
//! │  Confirm Qty/Price ──────► confirm_pending() ─────► commit staged line  │
//! │  Edit Line ──────────────► update_line() ─────────► price + OVERRIDE    │
//! │  Stock Refresh ──────────► apply_stock_snapshot() ► reconcile prices    │
//! │  Save Sale ──────────────► submit() ──────────────► validate + dispatch │
//! │  Open Old Sale ──────────► load_sale_for_edit() ──► edit tab (once)     │
//! │                                                                         │
//! │  Every mutation re-persists the registry through the RegistryStore.     │
//! │  Write failures are logged and swallowed - degraded, never fatal.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Submission State Machine (per tab)
//! ```text
//! Building ──submit()──► Submitting ──success──► Committed (tab reset
//!     ▲                       │                  in place, same id)
//!     └───────failure─────────┘
//!       (cart preserved, collaborator's reason surfaced verbatim)
//! ```
//! There is no cancellation: once `Submitting` begins, re-submission is
//! rejected until success or failure lands.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::ports::{RegistryStore, SaleBackend};
use tally_core::money::Money;
use tally_core::pricing::{reconcile_tab, resolve_unit_price, unit_price_from_subtotal};
use tally_core::registry::TabRegistry;
use tally_core::tab::SaleTab;
use tally_core::types::{
    CustomerRef, PriceMode, ProductRef, SaleType, StockEntry, StockSnapshot,
};
use tally_core::validation::{validate_price_mode, validate_quantity};

// =============================================================================
// Configuration
// =============================================================================

/// Controller construction parameters.
///
/// The branch id is explicit: each branch gets an independent registry,
/// and the controller never reads ambient context.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Branch/location the session belongs to. Partitions durable storage.
    pub branch_id: String,

    /// When true, `select_product` stages the selection for a
    /// quantity/price confirmation step instead of committing immediately.
    pub confirm_before_add: bool,
}

impl SessionConfig {
    pub fn new(branch_id: impl Into<String>) -> Self {
        SessionConfig {
            branch_id: branch_id.into(),
            confirm_before_add: false,
        }
    }
}

// =============================================================================
// Transient Staging State
// =============================================================================

/// A product selection held pending the operator's quantity/price
/// confirmation. Lives outside the tab; it becomes a cart line only on
/// explicit confirmation.
#[derive(Debug, Clone)]
pub struct PendingSelection {
    pub product: ProductRef,
    /// Live stock entry frozen at staging time.
    pub stock_entry: Option<StockEntry>,
    /// Pricing mode frozen at staging time.
    pub price_mode: PriceMode,
    /// The system-default price the confirmation dialog starts from.
    pub default_price: Money,
}

/// What `select_product` did with the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The line was committed to the active tab immediately.
    Committed,
    /// The selection is staged; `confirm_pending` commits it.
    Staged,
}

/// What `load_sale_for_edit` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditLoad {
    /// A tab already editing this sale was activated (never two tabs for
    /// the same sale).
    Activated,
    /// The sale was fetched and a new edit-mode tab appended.
    Loaded,
    /// Hydration has not completed yet; the load was queued, not dropped.
    Deferred,
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub sale_id: String,
    pub total: Money,
    pub due: Money,
    /// True when the dispatch went to the update collaborator.
    pub was_update: bool,
}

// =============================================================================
// Session Controller
// =============================================================================

/// Owns the [`TabRegistry`] and orchestrates the ports around it.
///
/// Single-threaded, cooperative: methods take `&mut self`, so mutators
/// never run in parallel. Asynchronous completions (stock snapshots,
/// submission results) re-enter through these same methods in whatever
/// order they land.
pub struct SessionController<B, S> {
    config: SessionConfig,
    backend: B,
    store: S,
    registry: TabRegistry,
    snapshot: StockSnapshot,
    pending: Option<PendingSelection>,
    hydrated: bool,
    deferred_edit_loads: Vec<String>,
    /// Tab ids currently mid-submission.
    submitting: HashSet<String>,
}

impl<B: SaleBackend, S: RegistryStore> SessionController<B, S> {
    /// Creates a controller with a fresh single-tab registry.
    ///
    /// Call [`SessionController::hydrate`] before relying on persisted
    /// state; until then the registry is the default empty cash tab.
    pub fn new(config: SessionConfig, backend: B, store: S) -> Self {
        SessionController {
            config,
            backend,
            store,
            registry: TabRegistry::new(),
            snapshot: StockSnapshot::new(),
            pending: None,
            hydrated: false,
            deferred_edit_loads: Vec::new(),
            submitting: HashSet::new(),
        }
    }

    // =========================================================================
    // Hydration
    // =========================================================================

    /// Restores the registry persisted for this branch, then drains any
    /// edit loads that were requested before hydration completed.
    ///
    /// Runs once per branch context; subsequent calls are no-ops. Storage
    /// read failures fall back to a fresh registry (degraded, not fatal).
    pub async fn hydrate(&mut self) {
        if self.hydrated {
            return;
        }

        let tabs = match self.store.load_tabs(&self.config.branch_id).await {
            Ok(tabs) => tabs,
            Err(e) => {
                warn!(error = %e, branch_id = %self.config.branch_id, "failed to load persisted tabs, starting fresh");
                None
            }
        };
        let active = match self.store.load_active_tab(&self.config.branch_id).await {
            Ok(active) => active,
            Err(e) => {
                warn!(error = %e, "failed to load active tab pointer");
                None
            }
        };

        if let Some(tabs) = tabs {
            self.registry = TabRegistry::from_parts(tabs, active);
        }
        self.hydrated = true;
        info!(branch_id = %self.config.branch_id, tabs = self.registry.len(), "session hydrated");

        for sale_id in std::mem::take(&mut self.deferred_edit_loads) {
            if let Err(e) = self.load_sale_for_edit(&sale_id).await {
                warn!(sale_id = %sale_id, error = %e, "deferred edit load failed");
            }
        }
    }

    // =========================================================================
    // Catalog / Stock / Customers
    // =========================================================================

    /// Product metadata list for this branch (pass-through).
    pub async fn load_catalog(&self) -> SessionResult<Vec<ProductRef>> {
        debug!(branch_id = %self.config.branch_id, "load_catalog");
        Ok(self.backend.fetch_catalog(&self.config.branch_id).await?)
    }

    /// Customers known to this branch (pass-through).
    pub async fn load_customers(&self) -> SessionResult<Vec<CustomerRef>> {
        debug!(branch_id = %self.config.branch_id, "load_customers");
        Ok(self.backend.fetch_customers(&self.config.branch_id).await?)
    }

    /// Fetches a fresh stock snapshot and applies it.
    pub async fn refresh_stock(&mut self) -> SessionResult<()> {
        let snapshot = self
            .backend
            .fetch_stock_snapshot(&self.config.branch_id)
            .await?;
        self.apply_stock_snapshot(snapshot).await;
        Ok(())
    }

    /// Replaces the held snapshot wholesale and reconciles the active tab.
    ///
    /// Non-overridden lines are repriced only when the recomputed value is
    /// positive and different; overridden lines are never touched. Safe to
    /// call with late or duplicate snapshots - the result converges.
    pub async fn apply_stock_snapshot(&mut self, snapshot: StockSnapshot) {
        self.snapshot = snapshot;

        let changed = reconcile_tab(self.registry.active_tab_mut(), &self.snapshot);
        debug!(lines_repriced = changed, "stock snapshot applied");
        if changed > 0 {
            self.persist().await;
        }
    }

    // =========================================================================
    // Tab Lifecycle
    // =========================================================================

    /// Appends a new empty tab, makes it active, and returns its id.
    pub async fn add_tab(&mut self) -> String {
        let id = self.registry.add_tab();
        debug!(tab_id = %id, "tab added");
        self.persist().await;
        id
    }

    /// Closes a tab. No-op when it is the last one or the id is unknown.
    /// Closing the active tab activates the first remaining tab.
    pub async fn close_tab(&mut self, id: &str) -> bool {
        let closed = self.registry.close_tab(id);
        if closed {
            debug!(tab_id = %id, active = %self.registry.active_tab_id(), "tab closed");
            self.persist().await;
        }
        closed
    }

    /// Activates a tab. Silent no-op when the id is unknown.
    pub async fn set_active_tab(&mut self, id: &str) -> bool {
        let moved = self.registry.set_active_tab(id);
        if moved {
            self.persist().await;
        }
        moved
    }

    // =========================================================================
    // Active Tab Settings
    // =========================================================================

    /// Attaches (or detaches) a customer to the active tab.
    pub async fn set_customer(&mut self, customer: Option<CustomerRef>) {
        self.registry.active_tab_mut().customer = customer;
        self.persist().await;
    }

    /// Sets or clears the explicit back-date for the active tab.
    pub async fn set_sale_date(&mut self, date: Option<NaiveDate>) {
        self.registry.active_tab_mut().sale_date = date;
        self.persist().await;
    }

    /// Switches the active tab's sale type.
    ///
    /// Leaving a credit sale while credit pricing is selected drops the
    /// pricing mode back to retail (credit pricing is only selectable on
    /// credit sales) and reconciles immediately.
    pub async fn set_sale_type(&mut self, sale_type: SaleType) {
        let tab = self.registry.active_tab_mut();
        tab.sale_type = sale_type;

        if sale_type != SaleType::Credit && tab.price_mode == PriceMode::Credit {
            tab.price_mode = PriceMode::Retail;
            let changed = reconcile_tab(self.registry.active_tab_mut(), &self.snapshot);
            debug!(lines_repriced = changed, "price mode reset to retail");
        }
        self.persist().await;
    }

    /// Switches the active tab's pricing mode and reconciles immediately
    /// (not waiting for the next snapshot tick). Non-overridden lines fall
    /// back through the catalog chain if stock data for the new mode has
    /// not loaded yet.
    pub async fn set_price_mode(&mut self, mode: PriceMode) -> SessionResult<()> {
        let tab = self.registry.active_tab_mut();
        validate_price_mode(mode, tab.sale_type)?;
        tab.price_mode = mode;

        let changed = reconcile_tab(self.registry.active_tab_mut(), &self.snapshot);
        debug!(mode = ?mode, lines_repriced = changed, "price mode switched");
        self.persist().await;
        Ok(())
    }

    // =========================================================================
    // Line Mutation
    // =========================================================================

    /// Adds a product to the active tab at the resolved price.
    ///
    /// ## Behavior
    /// - Duplicate product: quantity += 1; the existing price and override
    ///   flag stay untouched (duplicate-add never reprices)
    /// - New product: appended with quantity 1 at the resolved price
    /// - `confirm_before_add` configured: the selection is staged instead
    ///   and committed by [`SessionController::confirm_pending`]
    pub async fn select_product(&mut self, product: ProductRef) -> SessionResult<SelectOutcome> {
        let mode = self.registry.active_tab().price_mode;
        let stock = self.snapshot.get(&product.id).cloned();
        let default_price = resolve_unit_price(&product, stock.as_ref(), mode);

        if self.config.confirm_before_add {
            debug!(product_id = %product.id, default_price = %default_price, "selection staged");
            self.pending = Some(PendingSelection {
                product,
                stock_entry: stock,
                price_mode: mode,
                default_price,
            });
            return Ok(SelectOutcome::Staged);
        }

        debug!(product_id = %product.id, price = %default_price, "product added");
        self.registry
            .active_tab_mut()
            .add_product(product, 1, default_price, false);
        self.persist().await;
        Ok(SelectOutcome::Committed)
    }

    /// Commits the staged selection with a confirmed quantity and price.
    ///
    /// `unit_price = None` accepts the system default. The line is marked
    /// overridden only when the confirmed price actually differs from that
    /// default - confirming the suggested price leaves the line subject to
    /// reconciliation like any ordinary add.
    pub async fn confirm_pending(
        &mut self,
        quantity: i64,
        unit_price: Option<Money>,
    ) -> SessionResult<()> {
        if self.pending.is_none() {
            return Err(SessionError::NoPendingSelection);
        }
        validate_quantity(quantity)?;

        let Some(staged) = self.pending.take() else {
            return Err(SessionError::NoPendingSelection);
        };
        let price = unit_price.unwrap_or(staged.default_price);
        let overridden = price != staged.default_price;

        debug!(product_id = %staged.product.id, quantity, price = %price, overridden, "staged selection confirmed");
        self.registry
            .active_tab_mut()
            .add_product(staged.product, quantity, price, overridden);
        self.persist().await;
        Ok(())
    }

    /// Discards the staged selection, if any.
    pub fn cancel_pending(&mut self) {
        if self.pending.take().is_some() {
            debug!("staged selection cancelled");
        }
    }

    /// Sets a line's quantity. A non-positive quantity is a no-op:
    /// removal must go through [`SessionController::remove_line`].
    pub async fn update_quantity(&mut self, index: usize, quantity: i64) -> SessionResult<()> {
        let changed = self
            .registry
            .active_tab_mut()
            .update_quantity(index, quantity)?;
        if changed {
            self.persist().await;
        }
        Ok(())
    }

    /// Removes the line at `index` from the active tab.
    pub async fn remove_line(&mut self, index: usize) -> SessionResult<()> {
        let removed = self.registry.active_tab_mut().remove_line(index)?;
        debug!(product_id = %removed.product.id, "line removed");
        self.persist().await;
        Ok(())
    }

    /// Direct in-place edit of quantity and price. Marks the line
    /// overridden, exempting it from reconciliation permanently.
    pub async fn update_line(
        &mut self,
        index: usize,
        quantity: i64,
        unit_price: Money,
    ) -> SessionResult<()> {
        self.registry
            .active_tab_mut()
            .update_line(index, quantity, unit_price)?;
        self.persist().await;
        Ok(())
    }

    /// Subtotal edit: back-solves the unit price and applies it through
    /// [`SessionController::update_line`].
    pub async fn update_line_subtotal(
        &mut self,
        index: usize,
        quantity: i64,
        subtotal: Money,
    ) -> SessionResult<()> {
        let unit_price = unit_price_from_subtotal(subtotal, quantity);
        self.update_line(index, quantity, unit_price).await
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Validates the active tab, builds the payload, and dispatches it to
    /// the create or update collaborator.
    ///
    /// ## Behavior
    /// - Validation failures abort before any remote call, with a
    ///   specific reason
    /// - Remote failures surface the collaborator's reason verbatim and
    ///   leave the tab exactly as it was (back to `Building`)
    /// - Success on a non-edit tab resets it in place (same id, same
    ///   registry position); edit tabs are left for the caller to close
    /// - No automatic retry, no cancellation
    pub async fn submit(&mut self, amount_paid: Money) -> SessionResult<SubmitReceipt> {
        let tab = self.registry.active_tab();
        let tab_id = tab.id.clone();
        if self.submitting.contains(&tab_id) {
            return Err(SessionError::SubmissionInProgress);
        }

        // Total and payload computed fresh; first failing rule aborts here.
        let payload = tab.build_payload(amount_paid, Utc::now().date_naive())?;
        let edit_target = if tab.is_edit_mode {
            tab.sale_id.clone()
        } else {
            None
        };

        debug!(tab_id = %tab_id, total = %payload.total, lines = payload.lines.len(), "submitting sale");
        let mark = SubmitMark::new(&mut self.submitting, tab_id.clone());

        let result = match &edit_target {
            Some(sale_id) => self
                .backend
                .update_sale(sale_id, &payload)
                .await
                .map(|_| sale_id.clone()),
            None => {
                self.backend
                    .create_sale(&payload, &self.config.branch_id)
                    .await
            }
        };
        drop(mark);

        let sale_id = match result {
            Ok(sale_id) => sale_id,
            Err(e) => {
                warn!(tab_id = %tab_id, error = %e, "sale submission failed");
                return Err(e.into());
            }
        };

        let was_update = edit_target.is_some();
        if !was_update {
            self.registry.active_tab_mut().reset_in_place();
        }
        self.persist().await;

        info!(sale_id = %sale_id, total = %payload.total, was_update, "sale committed");
        Ok(SubmitReceipt {
            sale_id,
            total: payload.total,
            due: payload.due,
            was_update,
        })
    }

    /// Whether a tab is currently mid-submission (UI disables the save
    /// action for the duration).
    pub fn is_submitting(&self, tab_id: &str) -> bool {
        self.submitting.contains(tab_id)
    }

    // =========================================================================
    // Edit Loads
    // =========================================================================

    /// Opens a previously committed sale for editing.
    ///
    /// ## Behavior
    /// - A tab already editing this sale exists: activate it (the same
    ///   sale is never loaded into two tabs)
    /// - Hydration pending: the request is queued and replayed after
    ///   hydration, never silently dropped
    /// - Otherwise the sale is fetched and appended as an edit-mode tab
    ///   with every line marked overridden (prices from a committed sale
    ///   are intentional, never subject to reconciliation)
    /// - A failed fetch leaves the registry untouched
    pub async fn load_sale_for_edit(&mut self, sale_id: &str) -> SessionResult<EditLoad> {
        if !self.hydrated {
            info!(sale_id = %sale_id, "edit load deferred until hydration");
            self.deferred_edit_loads.push(sale_id.to_string());
            return Ok(EditLoad::Deferred);
        }

        if let Some(tab) = self.registry.tab_by_sale_id(sale_id) {
            let tab_id = tab.id.clone();
            self.registry.set_active_tab(&tab_id);
            self.persist().await;
            debug!(sale_id = %sale_id, tab_id = %tab_id, "existing edit tab activated");
            return Ok(EditLoad::Activated);
        }

        // Fetch before touching the registry: a failure here must not
        // create a tab.
        let record = self.backend.fetch_sale_by_id(sale_id).await?;
        let tab = SaleTab::from_sale_record(&record);
        let tab_id = self.registry.push_tab(tab);
        self.persist().await;

        info!(sale_id = %sale_id, tab_id = %tab_id, "sale loaded for edit");
        Ok(EditLoad::Loaded)
    }

    // =========================================================================
    // Read-Only Access
    // =========================================================================

    /// The registry in display order.
    pub fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    /// The active tab.
    pub fn active_tab(&self) -> &SaleTab {
        self.registry.active_tab()
    }

    /// The staged selection awaiting confirmation, if any.
    pub fn pending(&self) -> Option<&PendingSelection> {
        self.pending.as_ref()
    }

    /// The snapshot currently held.
    pub fn stock_snapshot(&self) -> &StockSnapshot {
        &self.snapshot
    }

    /// Whether hydration has completed for this branch context.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// The injected backend (useful for pass-through reads).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // =========================================================================
    // Persistence (fire-and-forget)
    // =========================================================================

    /// Re-serializes the registry and active pointer to durable storage.
    ///
    /// Failures are logged and swallowed: losing persistence is acceptable
    /// degraded behavior, losing in-memory state is not.
    async fn persist(&self) {
        if let Err(e) = self
            .store
            .save_tabs(&self.config.branch_id, self.registry.tabs())
            .await
        {
            warn!(error = %e, "failed to persist tabs, continuing in memory");
        }
        if let Err(e) = self
            .store
            .save_active_tab(&self.config.branch_id, self.registry.active_tab_id())
            .await
        {
            warn!(error = %e, "failed to persist active tab pointer, continuing in memory");
        }
    }
}

// =============================================================================
// In-Flight Marker
// =============================================================================

/// Marks a tab mid-submission for the lifetime of the guard.
///
/// The mark is cleared on drop, so a submit future the host abandons
/// mid-await cannot leave the tab permanently stuck in `Submitting`.
struct SubmitMark<'a> {
    submitting: &'a mut HashSet<String>,
    tab_id: String,
}

impl<'a> SubmitMark<'a> {
    fn new(submitting: &'a mut HashSet<String>, tab_id: String) -> Self {
        submitting.insert(tab_id.clone());
        SubmitMark { submitting, tab_id }
    }
}

impl Drop for SubmitMark<'_> {
    fn drop(&mut self) {
        self.submitting.remove(&self.tab_id);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::error::SessionError;
    use crate::ports::BackendError;
    use crate::store::MemoryStore;
    use tally_core::error::ValidationError;
    use tally_core::types::{SaleLineRecord, SalePayload, SaleRecord};

    /// Installs a per-test fmt subscriber so controller tracing shows up
    /// in failing test output. `RUST_LOG` overrides the default filter.
    fn init_tracing() {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tally_session=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }

    // =========================================================================
    // Mock Backend
    // =========================================================================

    #[derive(Default)]
    struct MockBackend {
        stock: Mutex<StockSnapshot>,
        sales: Mutex<HashMap<String, SaleRecord>>,
        created: Mutex<Vec<SalePayload>>,
        updated: Mutex<Vec<(String, SalePayload)>>,
        fail_submit: AtomicBool,
        block_create: AtomicBool,
        release: tokio::sync::Notify,
        next_id: AtomicUsize,
    }

    impl MockBackend {
        fn set_stock(&self, snapshot: StockSnapshot) {
            *self.stock.lock().unwrap() = snapshot;
        }

        fn insert_sale(&self, record: SaleRecord) {
            self.sales.lock().unwrap().insert(record.id.clone(), record);
        }

        fn set_fail_submit(&self, fail: bool) {
            self.fail_submit.store(fail, Ordering::SeqCst);
        }

        fn set_block_create(&self, block: bool) {
            self.block_create.store(block, Ordering::SeqCst);
        }

        fn created(&self) -> Vec<SalePayload> {
            self.created.lock().unwrap().clone()
        }

        fn updated(&self) -> Vec<(String, SalePayload)> {
            self.updated.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SaleBackend for MockBackend {
        async fn fetch_catalog(&self, _branch_id: &str) -> Result<Vec<ProductRef>, BackendError> {
            Ok(Vec::new())
        }

        async fn fetch_stock_snapshot(
            &self,
            _branch_id: &str,
        ) -> Result<StockSnapshot, BackendError> {
            Ok(self.stock.lock().unwrap().clone())
        }

        async fn fetch_customers(
            &self,
            _branch_id: &str,
        ) -> Result<Vec<CustomerRef>, BackendError> {
            Ok(Vec::new())
        }

        async fn create_sale(
            &self,
            payload: &SalePayload,
            _branch_id: &str,
        ) -> Result<String, BackendError> {
            if self.block_create.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            if self.fail_submit.load(Ordering::SeqCst) {
                return Err(BackendError::new("ledger rejected the sale"));
            }
            self.created.lock().unwrap().push(payload.clone());
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(format!("sale-{n}"))
        }

        async fn update_sale(
            &self,
            sale_id: &str,
            payload: &SalePayload,
        ) -> Result<(), BackendError> {
            if self.fail_submit.load(Ordering::SeqCst) {
                return Err(BackendError::new("ledger rejected the sale"));
            }
            self.updated
                .lock()
                .unwrap()
                .push((sale_id.to_string(), payload.clone()));
            Ok(())
        }

        async fn fetch_sale_by_id(&self, sale_id: &str) -> Result<SaleRecord, BackendError> {
            self.sales
                .lock()
                .unwrap()
                .get(sale_id)
                .cloned()
                .ok_or_else(|| BackendError::new(format!("unknown sale: {sale_id}")))
        }
    }

    // =========================================================================
    // Fixtures
    // =========================================================================

    fn widget() -> ProductRef {
        ProductRef {
            id: "p-widget".to_string(),
            manufacturer: "Acme".to_string(),
            name: "Widget".to_string(),
            nickname: None,
            size: None,
            product_type: None,
            base_price: Some(Money::from_cents(500)),
            retail_price: Some(Money::from_cents(750)),
            wholesale_price: Some(Money::from_cents(600)),
        }
    }

    fn gadget() -> ProductRef {
        ProductRef {
            id: "p-gadget".to_string(),
            manufacturer: "Acme".to_string(),
            name: "Gadget".to_string(),
            nickname: None,
            size: None,
            product_type: None,
            base_price: Some(Money::from_cents(1200)),
            retail_price: None,
            wholesale_price: None,
        }
    }

    fn unpriced() -> ProductRef {
        ProductRef {
            id: "p-mystery".to_string(),
            manufacturer: "Acme".to_string(),
            name: "Mystery Item".to_string(),
            nickname: None,
            size: None,
            product_type: None,
            base_price: None,
            retail_price: None,
            wholesale_price: None,
        }
    }

    fn customer() -> CustomerRef {
        CustomerRef {
            id: "c-1".to_string(),
            name: "Walk-in Regular".to_string(),
            phone: None,
        }
    }

    fn snapshot(entries: &[(&str, i64)]) -> StockSnapshot {
        entries
            .iter()
            .map(|(id, retail)| {
                (
                    id.to_string(),
                    StockEntry {
                        stock: 10,
                        retail_price: Some(Money::from_cents(*retail)),
                        wholesale_price: None,
                        base_price: None,
                    },
                )
            })
            .collect()
    }

    type TestController = SessionController<Arc<MockBackend>, Arc<MemoryStore>>;

    async fn controller() -> (TestController, Arc<MockBackend>, Arc<MemoryStore>) {
        init_tracing();
        let backend = Arc::new(MockBackend::default());
        let store = Arc::new(MemoryStore::new());
        let mut ctrl = SessionController::new(
            SessionConfig::new("branch-1"),
            backend.clone(),
            store.clone(),
        );
        ctrl.hydrate().await;
        (ctrl, backend, store)
    }

    // =========================================================================
    // Line Mutation
    // =========================================================================

    #[tokio::test]
    async fn select_commits_line_at_resolved_price() {
        let (mut ctrl, _, _) = controller().await;
        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 750)])).await;

        let outcome = ctrl.select_product(widget()).await.unwrap();

        assert_eq!(outcome, SelectOutcome::Committed);
        let line = &ctrl.active_tab().lines[0];
        assert_eq!(line.quantity, 1);
        assert_eq!(line.unit_price, Money::from_cents(750));
        assert!(!line.price_overridden);
    }

    #[tokio::test]
    async fn duplicate_select_merges_quantity_without_repricing() {
        let (mut ctrl, _, _) = controller().await;
        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 750)])).await;

        ctrl.select_product(widget()).await.unwrap();
        // Operator negotiates a price; the merge on re-select must keep it.
        ctrl.update_line(0, 1, Money::from_cents(700)).await.unwrap();
        ctrl.select_product(widget()).await.unwrap();

        assert_eq!(ctrl.active_tab().lines.len(), 1);
        let line = &ctrl.active_tab().lines[0];
        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_price, Money::from_cents(700));
        assert!(line.price_overridden);
    }

    #[tokio::test]
    async fn select_falls_back_through_catalog_when_stock_missing() {
        let (mut ctrl, _, _) = controller().await;

        ctrl.select_product(gadget()).await.unwrap();

        assert_eq!(
            ctrl.active_tab().lines[0].unit_price,
            Money::from_cents(1200)
        );
    }

    #[tokio::test]
    async fn update_quantity_ignores_non_positive() {
        let (mut ctrl, _, _) = controller().await;
        ctrl.select_product(widget()).await.unwrap();

        ctrl.update_quantity(0, 0).await.unwrap();
        ctrl.update_quantity(0, -3).await.unwrap();

        assert_eq!(ctrl.active_tab().lines[0].quantity, 1);
    }

    #[tokio::test]
    async fn update_line_out_of_range_is_an_error() {
        let (mut ctrl, _, _) = controller().await;

        let err = ctrl
            .update_line(5, 1, Money::from_cents(100))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "No cart line at position 5");
    }

    #[tokio::test]
    async fn subtotal_edit_back_solves_unit_price() {
        let (mut ctrl, _, _) = controller().await;
        ctrl.select_product(widget()).await.unwrap();

        ctrl.update_line_subtotal(0, 3, Money::from_cents(2100))
            .await
            .unwrap();

        let line = &ctrl.active_tab().lines[0];
        assert_eq!(line.quantity, 3);
        assert_eq!(line.unit_price, Money::from_cents(700));
        assert!(line.price_overridden);
    }

    // =========================================================================
    // Confirm-Before-Add
    // =========================================================================

    #[tokio::test]
    async fn confirm_flow_stages_then_commits() {
        let backend = Arc::new(MockBackend::default());
        let store = Arc::new(MemoryStore::new());
        let mut config = SessionConfig::new("branch-1");
        config.confirm_before_add = true;
        let mut ctrl = SessionController::new(config, backend, store);
        ctrl.hydrate().await;
        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 750)])).await;

        let outcome = ctrl.select_product(widget()).await.unwrap();
        assert_eq!(outcome, SelectOutcome::Staged);
        assert!(ctrl.active_tab().is_empty());
        assert_eq!(
            ctrl.pending().unwrap().default_price,
            Money::from_cents(750)
        );

        ctrl.confirm_pending(4, None).await.unwrap();

        let line = &ctrl.active_tab().lines[0];
        assert_eq!(line.quantity, 4);
        assert_eq!(line.unit_price, Money::from_cents(750));
        // Accepting the suggested price is not an override.
        assert!(!line.price_overridden);
        assert!(ctrl.pending().is_none());
    }

    #[tokio::test]
    async fn confirm_with_different_price_marks_override() {
        let backend = Arc::new(MockBackend::default());
        let store = Arc::new(MemoryStore::new());
        let mut config = SessionConfig::new("branch-1");
        config.confirm_before_add = true;
        let mut ctrl = SessionController::new(config, backend, store);
        ctrl.hydrate().await;

        ctrl.select_product(widget()).await.unwrap();
        ctrl.confirm_pending(2, Some(Money::from_cents(725)))
            .await
            .unwrap();

        let line = &ctrl.active_tab().lines[0];
        assert_eq!(line.unit_price, Money::from_cents(725));
        assert!(line.price_overridden);
    }

    #[tokio::test]
    async fn confirm_without_staged_selection_is_rejected() {
        let (mut ctrl, _, _) = controller().await;

        let err = ctrl.confirm_pending(1, None).await.unwrap_err();

        assert!(matches!(err, SessionError::NoPendingSelection));
    }

    #[tokio::test]
    async fn cancel_discards_staged_selection() {
        let backend = Arc::new(MockBackend::default());
        let store = Arc::new(MemoryStore::new());
        let mut config = SessionConfig::new("branch-1");
        config.confirm_before_add = true;
        let mut ctrl = SessionController::new(config, backend, store);
        ctrl.hydrate().await;

        ctrl.select_product(widget()).await.unwrap();
        ctrl.cancel_pending();

        assert!(ctrl.pending().is_none());
        assert!(ctrl.active_tab().is_empty());
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    #[tokio::test]
    async fn snapshot_reprices_only_non_overridden_lines() {
        let (mut ctrl, _, _) = controller().await;
        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 750), ("p-gadget", 900)]))
            .await;
        ctrl.select_product(widget()).await.unwrap();
        ctrl.select_product(gadget()).await.unwrap();
        ctrl.update_line(0, 1, Money::from_cents(700)).await.unwrap();

        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 800), ("p-gadget", 950)]))
            .await;

        let tab = ctrl.active_tab();
        assert_eq!(tab.lines[0].unit_price, Money::from_cents(700));
        assert_eq!(tab.lines[1].unit_price, Money::from_cents(950));
    }

    #[tokio::test]
    async fn snapshot_application_is_idempotent() {
        let (mut ctrl, _, _) = controller().await;
        ctrl.select_product(widget()).await.unwrap();

        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 800)])).await;
        let after_first = ctrl.active_tab().lines.clone();
        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 800)])).await;

        assert_eq!(ctrl.active_tab().lines, after_first);
    }

    #[tokio::test]
    async fn late_snapshot_fills_in_missing_price_without_flashing_zero() {
        let (mut ctrl, _, _) = controller().await;

        // No price anywhere yet: the line lands at zero, visibly wrong
        // rather than silently plausible.
        ctrl.select_product(unpriced()).await.unwrap();
        assert!(ctrl.active_tab().lines[0].unit_price.is_zero());

        ctrl.apply_stock_snapshot(snapshot(&[("p-mystery", 450)])).await;
        assert_eq!(
            ctrl.active_tab().lines[0].unit_price,
            Money::from_cents(450)
        );

        // A later snapshot with no usable price must not drag it back down.
        ctrl.apply_stock_snapshot(StockSnapshot::new()).await;
        assert_eq!(
            ctrl.active_tab().lines[0].unit_price,
            Money::from_cents(450)
        );
    }

    #[tokio::test]
    async fn price_mode_switch_reconciles_immediately() {
        let (mut ctrl, _, _) = controller().await;
        let mut snap = snapshot(&[("p-widget", 750)]);
        snap.get_mut("p-widget").unwrap().wholesale_price = Some(Money::from_cents(650));
        ctrl.apply_stock_snapshot(snap).await;
        ctrl.select_product(widget()).await.unwrap();
        assert_eq!(
            ctrl.active_tab().lines[0].unit_price,
            Money::from_cents(750)
        );

        ctrl.set_price_mode(PriceMode::Wholesale).await.unwrap();

        assert_eq!(
            ctrl.active_tab().lines[0].unit_price,
            Money::from_cents(650)
        );
    }

    #[tokio::test]
    async fn credit_pricing_requires_credit_sale() {
        let (mut ctrl, _, _) = controller().await;

        let err = ctrl.set_price_mode(PriceMode::Credit).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::CreditModeRequiresCreditSale)
        ));

        ctrl.set_sale_type(SaleType::Credit).await;
        ctrl.set_price_mode(PriceMode::Credit).await.unwrap();

        // Leaving the credit sale drops credit pricing back to retail.
        ctrl.set_sale_type(SaleType::Cash).await;
        assert_eq!(ctrl.active_tab().price_mode, PriceMode::Retail);
    }

    // =========================================================================
    // Tab Lifecycle
    // =========================================================================

    #[tokio::test]
    async fn tabs_are_independent_and_last_one_cannot_close() {
        let (mut ctrl, _, _) = controller().await;
        ctrl.select_product(widget()).await.unwrap();
        let first = ctrl.active_tab().id.clone();

        let second = ctrl.add_tab().await;
        assert_eq!(ctrl.active_tab().id, second);
        assert!(ctrl.active_tab().is_empty());

        ctrl.select_product(gadget()).await.unwrap();
        ctrl.set_active_tab(&first).await;
        assert_eq!(ctrl.active_tab().lines[0].product.id, "p-widget");

        assert!(ctrl.close_tab(&second).await);
        assert!(!ctrl.close_tab(&first).await);
        assert_eq!(ctrl.registry().len(), 1);
    }

    #[tokio::test]
    async fn closing_active_tab_activates_first_remaining() {
        let (mut ctrl, _, _) = controller().await;
        let first = ctrl.active_tab().id.clone();
        let second = ctrl.add_tab().await;
        ctrl.add_tab().await;

        ctrl.set_active_tab(&second).await;
        ctrl.close_tab(&second).await;

        assert_eq!(ctrl.active_tab().id, first);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[tokio::test]
    async fn registry_survives_a_new_controller_on_the_same_store() {
        let backend = Arc::new(MockBackend::default());
        let store = Arc::new(MemoryStore::new());

        let mut ctrl = SessionController::new(
            SessionConfig::new("branch-1"),
            backend.clone(),
            store.clone(),
        );
        ctrl.hydrate().await;
        ctrl.select_product(widget()).await.unwrap();
        let tab_id = ctrl.active_tab().id.clone();
        drop(ctrl);

        let mut revived =
            SessionController::new(SessionConfig::new("branch-1"), backend, store);
        revived.hydrate().await;

        assert_eq!(revived.active_tab().id, tab_id);
        assert_eq!(revived.active_tab().lines[0].product.id, "p-widget");
    }

    #[tokio::test]
    async fn store_write_failure_does_not_fail_the_mutation() {
        let backend = Arc::new(MockBackend::default());
        let store = Arc::new(MemoryStore::new());
        let mut ctrl = SessionController::new(
            SessionConfig::new("branch-1"),
            backend,
            store.clone(),
        );
        ctrl.hydrate().await;
        store.set_fail_writes(true);

        ctrl.select_product(widget()).await.unwrap();

        assert_eq!(ctrl.active_tab().lines.len(), 1);
    }

    // =========================================================================
    // Submission
    // =========================================================================

    #[tokio::test]
    async fn submit_dispatches_create_and_resets_the_tab_in_place() {
        let (mut ctrl, backend, _) = controller().await;
        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 750)])).await;
        ctrl.select_product(widget()).await.unwrap();
        ctrl.select_product(widget()).await.unwrap();
        let tab_id = ctrl.active_tab().id.clone();

        let receipt = ctrl.submit(Money::from_cents(2000)).await.unwrap();

        assert_eq!(receipt.sale_id, "sale-0");
        assert_eq!(receipt.total, Money::from_cents(1500));
        assert_eq!(receipt.due, Money::zero());
        assert!(!receipt.was_update);

        let created = backend.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].lines[0].quantity, 2);
        assert_eq!(created[0].lines[0].line_total, Money::from_cents(1500));

        // Same tab, same position, emptied for the next sale.
        let tab = ctrl.active_tab();
        assert_eq!(tab.id, tab_id);
        assert!(tab.is_empty());
        assert!(tab.customer.is_none());
    }

    #[tokio::test]
    async fn submit_rejects_empty_cart_before_any_remote_call() {
        let (mut ctrl, backend, _) = controller().await;

        let err = ctrl.submit(Money::zero()).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::EmptyCart)
        ));
        assert!(backend.created().is_empty());
    }

    #[tokio::test]
    async fn submit_rejects_credit_sale_without_customer() {
        let (mut ctrl, backend, _) = controller().await;
        ctrl.select_product(widget()).await.unwrap();
        ctrl.set_sale_type(SaleType::Credit).await;

        let err = ctrl.submit(Money::zero()).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::CustomerRequiredForCredit)
        ));
        assert!(backend.created().is_empty());
        assert!(backend.updated().is_empty());
    }

    #[tokio::test]
    async fn credit_sale_with_customer_submits() {
        let (mut ctrl, backend, _) = controller().await;
        ctrl.select_product(gadget()).await.unwrap();
        ctrl.set_sale_type(SaleType::Credit).await;
        ctrl.set_customer(Some(customer())).await;

        let err = ctrl.submit(Money::from_cents(200)).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Validation(ValidationError::InsufficientPayment { .. })
        ));

        let receipt = ctrl.submit(Money::from_cents(1200)).await.unwrap();

        assert_eq!(receipt.due, Money::zero());
        assert_eq!(backend.created()[0].customer_id.as_deref(), Some("c-1"));
        assert_eq!(backend.created()[0].sale_type, SaleType::Credit);
    }

    #[tokio::test]
    async fn abandoned_submit_future_releases_the_in_flight_mark() {
        let (mut ctrl, backend, _) = controller().await;
        ctrl.select_product(widget()).await.unwrap();
        let tab_id = ctrl.active_tab().id.clone();
        backend.set_block_create(true);

        {
            let fut = ctrl.submit(Money::from_cents(750));
            tokio::pin!(fut);
            // Poll the submission into its remote await, then abandon it.
            tokio::select! {
                biased;
                _ = &mut fut => panic!("submission cannot complete while the backend is blocked"),
                _ = tokio::task::yield_now() => {}
            }
        }

        assert!(!ctrl.is_submitting(&tab_id));

        // A fresh submission on the same tab must go through.
        backend.set_block_create(false);
        let receipt = ctrl.submit(Money::from_cents(750)).await.unwrap();
        assert_eq!(receipt.total, Money::from_cents(750));
    }

    #[tokio::test]
    async fn failed_submission_preserves_the_tab_verbatim() {
        let (mut ctrl, backend, _) = controller().await;
        ctrl.select_product(widget()).await.unwrap();
        ctrl.set_customer(Some(customer())).await;
        let before = ctrl.active_tab().clone();
        backend.set_fail_submit(true);

        let err = ctrl.submit(Money::from_cents(5000)).await.unwrap_err();

        assert_eq!(err.to_string(), "ledger rejected the sale");
        assert_eq!(ctrl.active_tab(), &before);
        assert!(!ctrl.is_submitting(&before.id));
    }

    // =========================================================================
    // Edit Loads
    // =========================================================================

    fn committed_sale(sale_id: &str) -> SaleRecord {
        SaleRecord {
            id: sale_id.to_string(),
            customer: Some(customer()),
            sale_type: SaleType::Credit,
            price_mode: PriceMode::Retail,
            lines: vec![SaleLineRecord {
                product: widget(),
                quantity: 3,
                unit_price: Money::from_cents(725),
            }],
            sale_date: None,
        }
    }

    #[tokio::test]
    async fn edit_load_opens_a_dedicated_tab_once() {
        let (mut ctrl, backend, _) = controller().await;
        backend.insert_sale(committed_sale("s-42"));

        assert_eq!(
            ctrl.load_sale_for_edit("s-42").await.unwrap(),
            EditLoad::Loaded
        );
        assert_eq!(ctrl.registry().len(), 2);

        let tab = ctrl.active_tab();
        assert!(tab.is_edit_mode);
        assert_eq!(tab.sale_id.as_deref(), Some("s-42"));
        // Prices on a committed sale are intentional: exempt from
        // reconciliation.
        assert!(tab.lines.iter().all(|l| l.price_overridden));

        // A second request re-activates the same tab.
        assert_eq!(
            ctrl.load_sale_for_edit("s-42").await.unwrap(),
            EditLoad::Activated
        );
        assert_eq!(ctrl.registry().len(), 2);
    }

    #[tokio::test]
    async fn failed_edit_fetch_leaves_the_registry_untouched() {
        let (mut ctrl, _, _) = controller().await;

        let err = ctrl.load_sale_for_edit("s-missing").await.unwrap_err();

        assert_eq!(err.to_string(), "unknown sale: s-missing");
        assert_eq!(ctrl.registry().len(), 1);
    }

    #[tokio::test]
    async fn edit_load_before_hydration_is_deferred_then_replayed() {
        let backend = Arc::new(MockBackend::default());
        backend.insert_sale(committed_sale("s-42"));
        let store = Arc::new(MemoryStore::new());
        let mut ctrl = SessionController::new(
            SessionConfig::new("branch-1"),
            backend,
            store,
        );

        assert_eq!(
            ctrl.load_sale_for_edit("s-42").await.unwrap(),
            EditLoad::Deferred
        );
        assert_eq!(ctrl.registry().len(), 1);

        ctrl.hydrate().await;

        assert_eq!(ctrl.registry().len(), 2);
        assert_eq!(ctrl.active_tab().sale_id.as_deref(), Some("s-42"));
    }

    #[tokio::test]
    async fn submitting_an_edit_tab_dispatches_update_and_keeps_the_tab() {
        let (mut ctrl, backend, _) = controller().await;
        backend.insert_sale(committed_sale("s-42"));
        ctrl.load_sale_for_edit("s-42").await.unwrap();

        let receipt = ctrl.submit(Money::from_cents(10_000)).await.unwrap();

        assert_eq!(receipt.sale_id, "s-42");
        assert!(receipt.was_update);
        let updated = backend.updated();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].0, "s-42");
        // Edit tabs are not recycled into blank sales.
        assert!(ctrl.active_tab().is_edit_mode);
        assert!(!ctrl.active_tab().is_empty());
    }

    // =========================================================================
    // End-to-End Scenario
    // =========================================================================

    #[tokio::test]
    async fn full_sale_round_trip() {
        let (mut ctrl, backend, _) = controller().await;
        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 750)])).await;

        // Two scans of the same product merge into one line.
        ctrl.select_product(widget()).await.unwrap();
        ctrl.select_product(widget()).await.unwrap();
        // Negotiated discount on the merged line.
        ctrl.update_line(0, 2, Money::from_cents(700)).await.unwrap();
        // A stock refresh lands mid-sale; the manual price holds.
        ctrl.apply_stock_snapshot(snapshot(&[("p-widget", 800)])).await;
        // Second product priced off the catalog fallback.
        ctrl.select_product(gadget()).await.unwrap();

        assert_eq!(ctrl.active_tab().total(), Money::from_cents(2600));

        let receipt = ctrl.submit(Money::from_cents(2600)).await.unwrap();

        assert_eq!(receipt.total, Money::from_cents(2600));
        assert_eq!(receipt.due, Money::zero());
        let payload = &backend.created()[0];
        assert_eq!(payload.lines.len(), 2);
        assert_eq!(payload.lines[0].unit_price, Money::from_cents(700));
        assert_eq!(payload.lines[1].unit_price, Money::from_cents(1200));
        assert!(ctrl.active_tab().is_empty());
    }
}
