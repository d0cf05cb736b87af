//! # Registry Store Implementations
//!
//! Two [`RegistryStore`] adapters:
//!
//! - [`JsonFileStore`] - one JSON document per `(kind, branch)` key under a
//!   root directory. The production default for a desktop shell.
//! - [`MemoryStore`] - in-process map, used by tests. Can be told to fail
//!   writes to exercise the degraded-persistence path.
//!
//! ## Key Layout (JsonFileStore)
//! ```text
//! <root>/
//! ├── tabs.<branch-id>.json         full tab list
//! └── active-tab.<branch-id>.json   active-tab pointer
//! ```
//!
//! Each branch gets independent files, so switching the branch context
//! yields an independent registry.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::ports::{RegistryStore, StoreError};
use tally_core::SaleTab;

const KIND_TABS: &str = "tabs";
const KIND_ACTIVE_TAB: &str = "active-tab";

// =============================================================================
// JSON File Store
// =============================================================================

/// Durable storage backed by JSON files under a root directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at `root`. The directory is created lazily
    /// on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonFileStore { root: root.into() }
    }

    fn path(&self, kind: &str, branch_id: &str) -> PathBuf {
        self.root.join(format!("{kind}.{branch_id}.json"))
    }

    async fn read_kind<T: DeserializeOwned>(
        &self,
        kind: &str,
        branch_id: &str,
    ) -> Result<Option<T>, StoreError> {
        let path = self.path(kind, branch_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_kind<T: Serialize>(
        &self,
        kind: &str,
        branch_id: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path(kind, branch_id);
        let bytes = serde_json::to_vec(value)?;
        tokio::fs::write(&path, bytes).await?;
        debug!(kind = %kind, branch_id = %branch_id, "registry write");
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for JsonFileStore {
    async fn load_tabs(&self, branch_id: &str) -> Result<Option<Vec<SaleTab>>, StoreError> {
        self.read_kind(KIND_TABS, branch_id).await
    }

    async fn save_tabs(&self, branch_id: &str, tabs: &[SaleTab]) -> Result<(), StoreError> {
        self.write_kind(KIND_TABS, branch_id, &tabs).await
    }

    async fn load_active_tab(&self, branch_id: &str) -> Result<Option<String>, StoreError> {
        self.read_kind(KIND_ACTIVE_TAB, branch_id).await
    }

    async fn save_active_tab(&self, branch_id: &str, tab_id: &str) -> Result<(), StoreError> {
        self.write_kind(KIND_ACTIVE_TAB, branch_id, &tab_id).await
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// In-process store for tests.
///
/// `set_fail_writes(true)` makes every save return an error, which lets
/// tests assert that persistence failures degrade (log + skip) instead of
/// failing the mutation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles simulated write failure.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn get(&self, kind: &str, branch_id: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))?;
        Ok(entries
            .get(&(kind.to_string(), branch_id.to_string()))
            .cloned())
    }

    fn put(&self, kind: &str, branch_id: &str, json: String) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated write failure".into()));
        }
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))?
            .insert((kind.to_string(), branch_id.to_string()), json);
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn load_tabs(&self, branch_id: &str) -> Result<Option<Vec<SaleTab>>, StoreError> {
        self.get(KIND_TABS, branch_id)?
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    async fn save_tabs(&self, branch_id: &str, tabs: &[SaleTab]) -> Result<(), StoreError> {
        self.put(KIND_TABS, branch_id, serde_json::to_string(&tabs)?)
    }

    async fn load_active_tab(&self, branch_id: &str) -> Result<Option<String>, StoreError> {
        self.get(KIND_ACTIVE_TAB, branch_id)?
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    async fn save_active_tab(&self, branch_id: &str, tab_id: &str) -> Result<(), StoreError> {
        self.put(KIND_ACTIVE_TAB, branch_id, serde_json::to_string(&tab_id)?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
