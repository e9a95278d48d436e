//! # SlotDesk Core
//!
//! Core traits and types shared by every SlotDesk crate.
//!
//! The desk is modelled as a small set of reducers: pure functions that take
//! the current state, an action and an environment of injected dependencies,
//! mutate the state in place and describe (but never perform) side effects.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state owned by a store
//! - **Action**: Every input a reducer accepts (operator commands, timer ticks)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions (notification dispatch, timers)
//! - **Environment**: Injected dependencies (clock, id generator, dispatchers)
//!
//! ## Example
//!
//! ```ignore
//! use slotdesk_core::{effect::Effect, reducer::Reducer, SmallVec};
//!
//! impl Reducer for AllocationReducer {
//!     type State = DeskState;
//!     type Action = DeskAction;
//!     type Environment = DeskEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut DeskState,
//!         action: DeskAction,
//!         env: &DeskEnvironment,
//!     ) -> SmallVec<[Effect<DeskAction>; 4]> {
//!         // Business logic goes here
//!         SmallVec::new()
//!     }
//! }
//! ```

pub use smallvec::{smallvec, SmallVec};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// A reducer must never leave state partially updated: it validates
    /// first and mutates only once every precondition holds.
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution), returned from reducers and executed by
/// the Store.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// Named timer that sends `action` back after `duration`
        ///
        /// A store keeps at most one pending timer per key: arming a key
        /// again aborts the timer it replaces.
        Delay {
            /// Timer slot this delay occupies
            key: &'static str,
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::Delay {
                    key,
                    duration,
                    action,
                } => f
                    .debug_struct("Effect::Delay")
                    .field("key", key)
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Arm timer `key` to send `action` back to the store after `duration`
        #[must_use]
        pub fn delay(key: &'static str, duration: Duration, action: Action) -> Effect<Action> {
            Effect::Delay {
                key,
                duration,
                action: Box::new(action),
            }
        }

        /// Run a fire-and-forget computation that produces no follow-up action
        #[must_use]
        pub fn fire_and_forget<F>(fut: F) -> Effect<Action>
        where
            F: Future<Output = ()> + Send + 'static,
        {
            Effect::Future(Box::pin(async move {
                fut.await;
                None
            }))
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use slotdesk_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let _now = clock.now();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time from the operating system
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of unique identifiers for new records
    pub trait IdGenerator: Send + Sync {
        /// Produce a fresh identifier, unique for the lifetime of the process
        fn next_id(&self) -> String;
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};
    use std::time::Duration;

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn delay_boxes_action() {
        let effect: Effect<u8> = Effect::delay("reminder", Duration::from_secs(3), 7);
        match effect {
            Effect::Delay {
                key,
                duration,
                action,
            } => {
                assert_eq!(key, "reminder");
                assert_eq!(duration, Duration::from_secs(3));
                assert_eq!(*action, 7);
            },
            other => unreachable!("expected delay, got {other:?}"),
        }
    }

    #[test]
    fn fire_and_forget_yields_no_action() {
        let effect: Effect<u8> = Effect::fire_and_forget(async {});
        let Effect::Future(fut) = effect else {
            unreachable!("expected a future effect");
        };
        assert_eq!(tokio_test::block_on(fut), None);
    }
}
