//! # SlotDesk
//!
//! Front-desk tool for a staffed experience program: a fixed pool of
//! numbered slots, a waiting list, a visit history, and an inactivity guard
//! that wipes the desk when the operator walks away.
//!
//! ## Architecture
//!
//! - [`allocation`]: reducer owning slots, history and the waiting list
//! - [`session`]: reducer for the inactivity warning and forced reset
//! - [`persistence`]: key-value storage the allocation store writes through
//! - [`snapshot`]: JSON backup and CSV report exchange
//! - [`notify`]: message templates and `sms:` links for waiters
//! - [`view`]: derived numbers and labels for presentation layers
//! - [`desk`]: the [`Desk`] facade tying it all together
//!
//! ## Example
//!
//! ```ignore
//! use slotdesk::{Desk, DeskOptions, MemoryBlobStore, TracingDispatcher};
//!
//! let options = DeskOptions::from_config(&DeskConfig::default(), Arc::new(TracingDispatcher));
//! let desk = Desk::open(Arc::new(MemoryBlobStore::new()), options)?;
//! desk.start_session().await?;
//!
//! desk.admit(0, "Kim", None).await?;
//! desk.enqueue_waiter("Lee", "010-1234-5678").await?;
//! desk.release(0).await?;
//! desk.admit_next_waiter(0, None).await?;
//! ```

pub mod allocation;
pub mod config;
pub mod desk;
pub mod error;
pub mod model;
pub mod notify;
pub mod persistence;
pub mod session;
pub mod snapshot;
pub mod view;

pub use allocation::{AllocationReducer, DeskAction, DeskEnvironment, DeskState, UuidGenerator};
pub use config::{ConfigError, DeskConfig};
pub use desk::{Desk, DeskOptions, Outcome};
pub use error::{DeskError, Rejection, RejectionKind, Result, SnapshotError};
pub use model::{AppState, HistoryId, HistoryRecord, Slot, Waiter, WaiterId};
pub use notify::{
    CollectingDispatcher, MessageDispatcher, MessageIntent, MessageTemplates, Platform,
    TracingDispatcher,
};
pub use persistence::{BlobStore, FileBlobStore, LoadOutcome, MemoryBlobStore};
pub use session::{SessionAction, SessionPhase, SessionState, SessionTimeouts};
