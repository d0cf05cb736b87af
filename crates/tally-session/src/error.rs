//! # Session Error Type
//!
//! Unified error type for the session engine.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Failure Handling in the Session Engine                  │
//! │                                                                         │
//! │  (a) Validation errors  - locally detected, never reach the network,    │
//! │                           surfaced immediately with a specific reason   │
//! │                                                                         │
//! │  (b) Remote errors      - collaborator messages shown VERBATIM, the     │
//! │                           tab state preserved unchanged                 │
//! │                                                                         │
//! │  (c) Persistence errors - logged and swallowed inside the controller,   │
//! │                           never shown to the operator, never block      │
//! │                           the in-memory flow (no variant here)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::ports::BackendError;
use tally_core::{CoreError, ValidationError};

/// Errors surfaced by [`crate::SessionController`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Domain error from a tab/registry mutator.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Business rule violation, caught before any remote call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A collaborator reported a failure. The message is verbatim.
    #[error("{0}")]
    Backend(#[from] BackendError),

    /// The active tab is already mid-submission; the operator must wait
    /// for success or failure before re-submitting.
    #[error("A submission is already in progress for this tab")]
    SubmissionInProgress,

    /// `confirm_pending` was called with nothing staged.
    #[error("No staged product selection to confirm")]
    NoPendingSelection,
}

/// Convenience type alias for Results with SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
