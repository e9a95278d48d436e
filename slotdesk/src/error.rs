//! Error types for desk operations.

use crate::model::WaiterId;
use thiserror::Error;

/// Result type alias for desk operations.
pub type Result<T> = std::result::Result<T, DeskError>;

/// How a rejected operation should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Bad input; the operator should correct it and retry
    Validation,
    /// The request no longer matches the current state; nothing to retry
    Consistency,
}

/// Why the allocation reducer refused an action.
///
/// A rejected action leaves the application state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// Name was empty after trimming.
    #[error("participant name is required")]
    EmptyName,

    /// Phone number was empty after trimming.
    #[error("phone number is required")]
    EmptyPhone,

    /// No slot with this id.
    #[error("slot {0} does not exist")]
    UnknownSlot(usize),

    /// Slot already has an occupant.
    #[error("slot {0} is already occupied")]
    SlotOccupied(usize),

    /// Slot has nobody to release.
    #[error("slot {0} is not occupied")]
    SlotVacant(usize),

    /// Requested pool size outside the accepted range.
    #[error("slot count must be between 1 and 50, got {0}")]
    SlotCountOutOfRange(usize),

    /// Shrinking would drop an occupied slot.
    #[error("cannot shrink to {requested}: slot {occupied} is occupied")]
    ShrinkWouldEvict {
        /// Requested pool size
        requested: usize,
        /// Id of the first occupied slot beyond the new size
        occupied: usize,
    },

    /// No waiter with this id.
    #[error("waiter {0} is not on the waiting list")]
    UnknownWaiter(WaiterId),

    /// Every slot is taken.
    #[error("no vacant slot available")]
    NoVacantSlot,

    // ═══════════════════════════════════════════════════════════
    // Consistency
    // ═══════════════════════════════════════════════════════════

    /// Admission from the waiting list was requested but nobody is waiting.
    #[error("waiting list is empty")]
    WaitingListEmpty,
}

impl Rejection {
    /// Classify the rejection
    #[must_use]
    pub const fn kind(&self) -> RejectionKind {
        match self {
            Self::WaitingListEmpty => RejectionKind::Consistency,
            _ => RejectionKind::Validation,
        }
    }
}

/// Failure to read or accept a state document.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The document is not valid JSON for an application state.
    #[error("invalid state document: {0}")]
    Parse(#[from] serde_json::Error),

    /// The document parsed but breaks a structural rule.
    #[error("invalid state structure: {message}")]
    Structure {
        /// What was wrong
        message: String,
    },

    /// Producing the CSV report failed.
    #[error("CSV processing error: {0}")]
    Csv(#[from] csv::Error),

    /// Reading or writing a file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for the [`Desk`](crate::desk::Desk) facade.
#[derive(Debug, Error)]
pub enum DeskError {
    /// The reducer refused the action.
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),

    /// A snapshot could not be produced or accepted.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The persistence backend failed outside the store's write path.
    #[error(transparent)]
    Blob(#[from] crate::persistence::BlobStoreError),

    /// The store refused the action.
    #[error(transparent)]
    Store(#[from] slotdesk_runtime::StoreError),
}
