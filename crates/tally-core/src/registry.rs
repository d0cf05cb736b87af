//! # Tab Registry
//!
//! The ordered collection of all open tabs plus which one is active.
//!
//! ## Invariants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Registry Invariants                                │
//! │                                                                         │
//! │  • The registry always contains ≥ 1 tab                                 │
//! │    (the last tab cannot be closed, only cleared)                        │
//! │                                                                         │
//! │  • Exactly one tab is active at any time                                │
//! │                                                                         │
//! │  • Closing the active tab reassigns active to the FIRST remaining       │
//! │    tab - deterministic, not "previous" or "most recent"                 │
//! │                                                                         │
//! │  • A previously committed sale is loaded into at most one tab           │
//! │    (looked up by sale id before a new edit tab is created)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry is a plain data structure: persistence and asynchronous
//! concerns live in the session controller that owns it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::tab::SaleTab;

/// Ordered sequence of open tabs plus the active-tab pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TabRegistry {
    tabs: Vec<SaleTab>,
    active_tab_id: String,
}

impl TabRegistry {
    /// Creates a registry with one default empty cash tab, active.
    pub fn new() -> Self {
        let tab = SaleTab::new();
        let active = tab.id.clone();
        TabRegistry {
            tabs: vec![tab],
            active_tab_id: active,
        }
    }

    /// Rebuilds a registry from persisted parts.
    ///
    /// Hydration tolerates damaged input rather than failing the session:
    /// an empty tab list falls back to a fresh registry, and an unknown
    /// active pointer falls back to the first tab.
    pub fn from_parts(tabs: Vec<SaleTab>, active_tab_id: Option<String>) -> Self {
        if tabs.is_empty() {
            return TabRegistry::new();
        }

        let active = active_tab_id
            .filter(|id| tabs.iter().any(|t| &t.id == id))
            .unwrap_or_else(|| tabs[0].id.clone());

        TabRegistry {
            tabs,
            active_tab_id: active,
        }
    }

    // =========================================================================
    // Tab Lifecycle
    // =========================================================================

    /// Appends a new empty tab and makes it active. Returns its id.
    ///
    /// No upper bound on tab count is enforced here.
    pub fn add_tab(&mut self) -> String {
        let tab = SaleTab::new();
        let id = tab.id.clone();
        self.tabs.push(tab);
        self.active_tab_id = id.clone();
        id
    }

    /// Appends an already-built tab (edit-mode loads) and makes it active.
    pub fn push_tab(&mut self, tab: SaleTab) -> String {
        let id = tab.id.clone();
        self.tabs.push(tab);
        self.active_tab_id = id.clone();
        id
    }

    /// Removes the tab with the given id.
    ///
    /// ## Behavior
    /// - Exactly one tab open: no-op regardless of which id is passed
    /// - Unknown id: no-op
    /// - Removed tab was active: the first remaining tab becomes active
    ///
    /// Returns true when a tab was actually removed.
    pub fn close_tab(&mut self, id: &str) -> bool {
        if self.tabs.len() == 1 {
            return false;
        }

        let Some(pos) = self.tabs.iter().position(|t| t.id == id) else {
            return false;
        };

        self.tabs.remove(pos);
        if self.active_tab_id == id {
            self.active_tab_id = self.tabs[0].id.clone();
        }
        true
    }

    /// Makes the tab with the given id active.
    ///
    /// Fails silently (no state change) when the id is not present.
    /// Returns true when the pointer moved.
    pub fn set_active_tab(&mut self, id: &str) -> bool {
        if self.tabs.iter().any(|t| t.id == id) {
            self.active_tab_id = id.to_string();
            true
        } else {
            false
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The currently active tab.
    pub fn active_tab(&self) -> &SaleTab {
        // Invariant: active_tab_id always points at an existing tab.
        self.tabs
            .iter()
            .find(|t| t.id == self.active_tab_id)
            .unwrap_or(&self.tabs[0])
    }

    /// Mutable access to the active tab.
    pub fn active_tab_mut(&mut self) -> &mut SaleTab {
        let pos = self
            .tabs
            .iter()
            .position(|t| t.id == self.active_tab_id)
            .unwrap_or(0);
        &mut self.tabs[pos]
    }

    /// Id of the active tab.
    pub fn active_tab_id(&self) -> &str {
        &self.active_tab_id
    }

    /// Looks up an open tab already editing the given remote sale.
    pub fn tab_by_sale_id(&self, sale_id: &str) -> Option<&SaleTab> {
        self.tabs.iter().find(|t| t.sale_id.as_deref() == Some(sale_id))
    }

    /// All open tabs in display order.
    pub fn tabs(&self) -> &[SaleTab] {
        &self.tabs
    }

    /// Number of open tabs.
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    /// Always false: the registry holds at least one tab.
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

impl Default for TabRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
