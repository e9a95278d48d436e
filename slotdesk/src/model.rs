//! Domain types for the desk: slots, history records, waiters and the
//! aggregate [`AppState`] that is persisted and exchanged as one unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of slots in a freshly reset desk
pub const INITIAL_SLOT_COUNT: usize = 3;

/// Smallest pool size accepted by a resize
pub const MIN_SLOTS: usize = 1;

/// Largest pool size accepted by a resize
pub const MAX_SLOTS: usize = 50;

/// Unique identifier for a history record
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryId(String);

impl HistoryId {
    /// Wraps an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HistoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a waiting-list entry
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaiterId(String);

impl WaiterId {
    /// Wraps an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WaiterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A numbered station
///
/// `participant_name` and `entry_time` are either both present or both absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// 0-based position in the pool
    pub id: usize,
    /// Current occupant
    pub participant_name: Option<String>,
    /// Free-form note attached at admission
    pub memo: Option<String>,
    /// When the occupant was admitted
    pub entry_time: Option<DateTime<Utc>>,
}

impl Slot {
    /// An unoccupied slot
    #[must_use]
    pub const fn empty(id: usize) -> Self {
        Self {
            id,
            participant_name: None,
            memo: None,
            entry_time: None,
        }
    }

    /// Whether someone is currently in this slot
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.participant_name.is_some()
    }

    /// 1-based number shown to people and stored on history records
    #[must_use]
    pub const fn number(&self) -> usize {
        self.id + 1
    }

    /// Whether occupant and entry time agree
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.participant_name.is_some() == self.entry_time.is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.participant_name = None;
        self.memo = None;
        self.entry_time = None;
    }
}

/// Audit entry for one visit to a slot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Unique identifier
    pub id: HistoryId,
    /// 1-based slot number at admission time
    pub slot_number: usize,
    /// Who was admitted
    pub participant_name: String,
    /// Note carried over from the slot
    pub memo: Option<String>,
    /// Admission time
    pub entry_time: DateTime<Utc>,
    /// Release time; `None` while the visit is in progress
    pub exit_time: Option<DateTime<Utc>>,
}

impl HistoryRecord {
    /// Whether the visit is still in progress
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }
}

/// Entry in the first-come waiting list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waiter {
    /// Unique identifier
    pub id: WaiterId,
    /// Display name
    pub name: String,
    /// Phone number as typed by the operator
    pub phone_number: String,
    /// Whether the waiter has been called forward
    #[serde(default)]
    pub notified: bool,
    /// When the most recent call-forward was sent
    #[serde(default)]
    pub notified_at: Option<DateTime<Utc>>,
}

/// The aggregate root: every slot, the visit history and the waiting list
///
/// History is newest-first; the waiting list is FIFO with index 0 next in line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// The slot pool, ids `0..N-1`
    pub slots: Vec<Slot>,
    /// Visit history, newest first
    pub history: Vec<HistoryRecord>,
    /// Waiting list, front first
    pub waiting_list: Vec<Waiter>,
}

impl AppState {
    /// The canonical initial state: three empty slots, nothing else
    #[must_use]
    pub fn initial() -> Self {
        Self {
            slots: (0..INITIAL_SLOT_COUNT).map(Slot::empty).collect(),
            history: Vec::new(),
            waiting_list: Vec::new(),
        }
    }

    /// Returns a slot by id
    #[must_use]
    pub fn slot(&self, id: usize) -> Option<&Slot> {
        self.slots.get(id)
    }

    /// Number of occupied slots
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_occupied()).count()
    }

    /// Whether at least one slot is free
    #[must_use]
    pub fn has_vacancy(&self) -> bool {
        self.slots.iter().any(|s| !s.is_occupied())
    }

    /// Index of a waiter in the queue
    #[must_use]
    pub fn waiter_index(&self, id: &WaiterId) -> Option<usize> {
        self.waiting_list.iter().position(|w| &w.id == id)
    }

    /// Returns a waiter by id
    #[must_use]
    pub fn waiter(&self, id: &WaiterId) -> Option<&Waiter> {
        self.waiting_list.iter().find(|w| &w.id == id)
    }

    /// History records still in progress for a slot number
    pub fn open_records(&self, slot_number: usize) -> impl Iterator<Item = &HistoryRecord> {
        self.history
            .iter()
            .filter(move |h| h.slot_number == slot_number && h.is_open())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::initial()
    }
}
