//! # tally-session: Async Session Engine
//!
//! Owns the [`tally_core::TabRegistry`] at runtime and orchestrates
//! everything asynchronous around it: hydration from durable storage,
//! stock-snapshot reconciliation, and the sale submission protocol.
//!
//! ## Module Organization
//! ```text
//! tally_session/
//! ├── lib.rs          ◄─── You are here (module exports)
//! ├── controller.rs   ◄─── SessionController: the single registry owner
//! ├── ports.rs        ◄─── SaleBackend + RegistryStore async traits
//! ├── store.rs        ◄─── JsonFileStore / MemoryStore implementations
//! └── error.rs        ◄─── SessionError
//! ```
//!
//! ## Concurrency Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │               Single-threaded, cooperative, event-driven                │
//! │                                                                         │
//! │  User events ─────────► SessionController ◄───────── async completions  │
//! │  (add line, switch       (&mut self methods,          (stock snapshot,  │
//! │   tab, submit...)         the ONLY mutator)            submit result)   │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                          TabRegistry ──► RegistryStore (fire & forget)  │
//! │                                                                         │
//! │  The stock snapshot load and the submission round trip complete in      │
//! │  any order relative to each other and to user edits. Reconciliation     │
//! │  is a pure function of (current snapshot, override flags), so late or   │
//! │  duplicate snapshots converge to the same prices.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Policy
//! - Validation errors short-circuit locally with a specific reason
//! - Remote errors surface the collaborator's message verbatim; the tab is
//!   left exactly as it was
//! - Storage errors are logged and swallowed: losing persistence is
//!   acceptable degraded behavior, losing in-memory state is not

pub mod controller;
pub mod error;
pub mod ports;
pub mod store;

pub use controller::{
    EditLoad, PendingSelection, SelectOutcome, SessionConfig, SessionController, SubmitReceipt,
};
pub use error::SessionError;
pub use ports::{BackendError, RegistryStore, SaleBackend, StoreError};
pub use store::{JsonFileStore, MemoryStore};
