//! The allocation reducer: every change to slots, history and the waiting
//! list goes through [`AllocationReducer`].
//!
//! Each action is validated against the current state first. A rejected
//! action leaves [`AppState`] exactly as it was and records the
//! [`Rejection`] on [`DeskState::last_rejection`]; an accepted action clears
//! it. Messages to waiters are returned as effects and never sent from here.

use crate::error::{Rejection, RejectionKind};
use crate::model::{
    AppState, HistoryId, HistoryRecord, MAX_SLOTS, MIN_SLOTS, Slot, Waiter, WaiterId,
};
use crate::notify::{MessageDispatcher, MessageIntent, MessageTemplates};
use slotdesk_core::{
    SmallVec, smallvec,
    effect::Effect,
    environment::{Clock, IdGenerator},
    reducer::Reducer,
};
use std::sync::Arc;

/// State owned by the allocation store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeskState {
    /// The persisted application state
    pub app: AppState,
    /// Why the most recent action was refused, if it was
    pub last_rejection: Option<Rejection>,
}

impl DeskState {
    /// Wrap a loaded application state
    #[must_use]
    pub const fn new(app: AppState) -> Self {
        Self {
            app,
            last_rejection: None,
        }
    }
}

/// Operator commands accepted by the desk
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeskAction {
    /// Seat someone in a free slot
    ///
    /// With `from_waitlist` the name comes from the front of the waiting list
    /// and `name` is ignored.
    Admit {
        /// Target slot id
        slot_id: usize,
        /// Participant name
        name: String,
        /// Optional note, trimmed; one that is blank after trimming is
        /// stored as `None`, never as an empty string
        memo: Option<String>,
        /// Take the front waiter instead of `name`
        from_waitlist: bool,
    },

    /// Seat a walk-in who skips the queue; the phone number becomes the memo
    DirectAdmit {
        /// Participant name
        name: String,
        /// Phone number
        phone: String,
        /// Target slot id
        slot_id: usize,
    },

    /// Free an occupied slot and close its open history record
    Release {
        /// Slot to free
        slot_id: usize,
    },

    /// Grow or shrink the pool
    Resize {
        /// New number of slots
        count: usize,
    },

    /// Append someone to the waiting list
    EnqueueWaiter {
        /// Display name
        name: String,
        /// Phone number
        phone: String,
    },

    /// Remove a waiter wherever they are in the queue
    DequeueWaiter {
        /// Waiter to remove
        id: WaiterId,
    },

    /// Call a waiter forward (or again)
    NotifyWaiter {
        /// Waiter to call
        id: WaiterId,
    },

    /// Re-send a waiter their current queue position
    RemindWaiter {
        /// Waiter to remind
        id: WaiterId,
    },

    /// Back to three empty slots with no history and nobody waiting
    ForceReset,

    /// Replace everything with a previously exported state
    Restore {
        /// Validated state to install
        state: Box<AppState>,
    },
}

/// Injected dependencies for the allocation reducer
#[derive(Clone)]
pub struct DeskEnvironment {
    /// Source of entry/exit/notification timestamps
    pub clock: Arc<dyn Clock>,
    /// Source of history and waiter ids
    pub ids: Arc<dyn IdGenerator>,
    /// Receives message intents
    pub dispatcher: Arc<dyn MessageDispatcher>,
    /// Message bodies and link format
    pub templates: MessageTemplates,
}

impl DeskEnvironment {
    /// Creates a new `DeskEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        dispatcher: Arc<dyn MessageDispatcher>,
        templates: MessageTemplates,
    ) -> Self {
        Self {
            clock,
            ids,
            dispatcher,
            templates,
        }
    }
}

/// UUID v4 ids for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

type Effects = SmallVec<[Effect<DeskAction>; 4]>;

/// Reducer for slot allocation and the waiting list
#[derive(Clone, Debug, Default)]
pub struct AllocationReducer;

impl AllocationReducer {
    /// Creates a new `AllocationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn admit(
        app: &mut AppState,
        env: &DeskEnvironment,
        slot_id: usize,
        name: &str,
        memo: Option<&str>,
        from_waitlist: bool,
    ) -> Result<(), Rejection> {
        let slot = app.slot(slot_id).ok_or(Rejection::UnknownSlot(slot_id))?;
        if slot.is_occupied() {
            return Err(Rejection::SlotOccupied(slot_id));
        }

        let name = if from_waitlist {
            app.waiting_list
                .first()
                .ok_or(Rejection::WaitingListEmpty)?
                .name
                .trim()
                .to_string()
        } else {
            name.trim().to_string()
        };
        if name.is_empty() {
            return Err(Rejection::EmptyName);
        }
        let memo = memo
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        // Validated; mutate from here on
        if from_waitlist {
            app.waiting_list.remove(0);
        }

        let now = env.clock.now();
        let slot = &mut app.slots[slot_id];
        slot.participant_name = Some(name.clone());
        slot.memo.clone_from(&memo);
        slot.entry_time = Some(now);

        app.history.insert(
            0,
            HistoryRecord {
                id: HistoryId::new(env.ids.next_id()),
                slot_number: slot.number(),
                participant_name: name,
                memo,
                entry_time: now,
                exit_time: None,
            },
        );

        tracing::debug!(slot_id, from_waitlist, "Participant admitted");
        Ok(())
    }

    fn release(app: &mut AppState, env: &DeskEnvironment, slot_id: usize) -> Result<(), Rejection> {
        let slot = app.slot(slot_id).ok_or(Rejection::UnknownSlot(slot_id))?;
        if !slot.is_occupied() {
            return Err(Rejection::SlotVacant(slot_id));
        }
        let slot_number = slot.number();

        let now = env.clock.now();
        let mut closed = 0_usize;
        for record in app
            .history
            .iter_mut()
            .filter(|h| h.slot_number == slot_number && h.is_open())
        {
            record.exit_time = Some(now);
            closed += 1;
        }

        if closed == 0 {
            tracing::warn!(slot_id, "No open history record for released slot");
        }

        app.slots[slot_id].clear();
        tracing::debug!(slot_id, closed, "Slot released");
        Ok(())
    }

    fn resize(app: &mut AppState, count: usize) -> Result<(), Rejection> {
        if !(MIN_SLOTS..=MAX_SLOTS).contains(&count) {
            return Err(Rejection::SlotCountOutOfRange(count));
        }

        let current = app.slots.len();
        if count > current {
            app.slots.extend((current..count).map(Slot::empty));
        } else if count < current {
            if let Some(occupied) = app.slots[count..].iter().find(|s| s.is_occupied()) {
                return Err(Rejection::ShrinkWouldEvict {
                    requested: count,
                    occupied: occupied.id,
                });
            }
            app.slots.truncate(count);
        }

        tracing::debug!(from = current, to = count, "Slot pool resized");
        Ok(())
    }

    fn enqueue(
        app: &mut AppState,
        env: &DeskEnvironment,
        name: &str,
        phone: &str,
    ) -> Result<MessageIntent, Rejection> {
        let name = name.trim();
        let phone = phone.trim();
        if name.is_empty() {
            return Err(Rejection::EmptyName);
        }
        if phone.is_empty() {
            return Err(Rejection::EmptyPhone);
        }

        let waiter = Waiter {
            id: WaiterId::new(env.ids.next_id()),
            name: name.to_string(),
            phone_number: phone.to_string(),
            notified: false,
            notified_at: None,
        };
        app.waiting_list.push(waiter);

        let position = app.waiting_list.len();
        tracing::debug!(position, "Waiter enqueued");
        let waiter = &app.waiting_list[position - 1];
        Ok(env.templates.queue_position(waiter, position))
    }

    fn notify(
        app: &mut AppState,
        env: &DeskEnvironment,
        id: &WaiterId,
    ) -> Result<MessageIntent, Rejection> {
        let waiter = app
            .waiting_list
            .iter_mut()
            .find(|w| &w.id == id)
            .ok_or_else(|| Rejection::UnknownWaiter(id.clone()))?;

        waiter.notified = true;
        waiter.notified_at = Some(env.clock.now());

        tracing::debug!(waiter = %id, "Waiter called forward");
        Ok(env.templates.call_forward(waiter))
    }

    fn dispatch(env: &DeskEnvironment, intent: MessageIntent) -> Effects {
        smallvec![Effect::fire_and_forget(env.dispatcher.dispatch(intent))]
    }

    fn apply(
        app: &mut AppState,
        action: DeskAction,
        env: &DeskEnvironment,
    ) -> Result<Effects, Rejection> {
        match action {
            DeskAction::Admit {
                slot_id,
                name,
                memo,
                from_waitlist,
            } => {
                Self::admit(app, env, slot_id, &name, memo.as_deref(), from_waitlist)?;
                Ok(SmallVec::new())
            },

            DeskAction::DirectAdmit {
                name,
                phone,
                slot_id,
            } => {
                if name.trim().is_empty() {
                    return Err(Rejection::EmptyName);
                }
                if phone.trim().is_empty() {
                    return Err(Rejection::EmptyPhone);
                }
                if !app.has_vacancy() {
                    return Err(Rejection::NoVacantSlot);
                }
                Self::admit(app, env, slot_id, &name, Some(&phone), false)?;
                Ok(SmallVec::new())
            },

            DeskAction::Release { slot_id } => {
                Self::release(app, env, slot_id)?;
                Ok(SmallVec::new())
            },

            DeskAction::Resize { count } => {
                Self::resize(app, count)?;
                Ok(SmallVec::new())
            },

            DeskAction::EnqueueWaiter { name, phone } => {
                let intent = Self::enqueue(app, env, &name, &phone)?;
                Ok(Self::dispatch(env, intent))
            },

            DeskAction::DequeueWaiter { id } => {
                let index = app
                    .waiter_index(&id)
                    .ok_or_else(|| Rejection::UnknownWaiter(id.clone()))?;
                app.waiting_list.remove(index);
                tracing::debug!(waiter = %id, "Waiter removed");
                Ok(SmallVec::new())
            },

            DeskAction::NotifyWaiter { id } => {
                let intent = Self::notify(app, env, &id)?;
                Ok(Self::dispatch(env, intent))
            },

            DeskAction::RemindWaiter { id } => {
                let index = app
                    .waiter_index(&id)
                    .ok_or_else(|| Rejection::UnknownWaiter(id.clone()))?;
                let intent = env
                    .templates
                    .queue_position(&app.waiting_list[index], index + 1);
                Ok(Self::dispatch(env, intent))
            },

            DeskAction::ForceReset => {
                *app = AppState::initial();
                tracing::info!("Desk reset to initial state");
                Ok(SmallVec::new())
            },

            DeskAction::Restore { state } => {
                *app = *state;
                tracing::info!(
                    slots = app.slots.len(),
                    history = app.history.len(),
                    waiting = app.waiting_list.len(),
                    "Desk restored from snapshot"
                );
                Ok(SmallVec::new())
            },
        }
    }
}

impl Reducer for AllocationReducer {
    type State = DeskState;
    type Action = DeskAction;
    type Environment = DeskEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match Self::apply(&mut state.app, action, env) {
            Ok(effects) => {
                state.last_rejection = None;
                effects
            },
            Err(rejection) => {
                match rejection.kind() {
                    RejectionKind::Validation => {
                        tracing::warn!(%rejection, "Action rejected");
                    },
                    RejectionKind::Consistency => {
                        tracing::error!(%rejection, "Action ignored: state no longer matches");
                    },
                }
                state.last_rejection = Some(rejection);
                SmallVec::new()
            },
        }
    }
}
