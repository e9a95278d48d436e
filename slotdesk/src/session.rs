//! Inactivity guard.
//!
//! The guard moves between [`SessionPhase::Active`] and
//! [`SessionPhase::Warning`]. Both timers are armed under [`SESSION_TIMER`],
//! so the store keeps a single pending timer and each re-arm aborts the one
//! before it. Timers also carry the generation they were armed in; any
//! restart bumps the generation, so a timer already firing when a restart
//! lands is ignored.
//!
//! ```text
//! Active --(timeout - window)--> Warning --(window)--> expire, Active
//!   ^                               |
//!   +----------- Continue ----------+
//! ```

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use slotdesk_core::{
    SmallVec, smallvec,
    effect::Effect,
    environment::Clock,
    reducer::Reducer,
};
use std::sync::Arc;
use std::time::Duration;

/// Default inactivity timeout (30 minutes)
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default warning window (2 minutes)
pub const DEFAULT_WARNING_WINDOW: Duration = Duration::from_secs(2 * 60);

/// Timer key shared by the warning and countdown timers
pub const SESSION_TIMER: &str = "session";

/// Where the guard currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Counting down to the warning; activity restarts the timer
    #[default]
    Active,
    /// Warning shown; only an explicit continue clears it
    Warning {
        /// When the reset will happen
        deadline: DateTime<Utc>,
    },
}

/// State owned by the session store
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Current phase
    pub phase: SessionPhase,
    /// Bumped on every restart; timers from older generations are ignored
    pub generation: u64,
    /// Most recent accepted activity signal
    pub last_activity: Option<DateTime<Utc>>,
    /// Number of forced resets so far
    pub expirations: u64,
}

impl SessionState {
    /// Whether the warning is showing
    #[must_use]
    pub const fn is_warning(&self) -> bool {
        matches!(self.phase, SessionPhase::Warning { .. })
    }

    /// Time left on the warning countdown, if the warning is showing
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.phase {
            SessionPhase::Active => None,
            SessionPhase::Warning { deadline } => {
                Some((deadline - now).to_std().unwrap_or(Duration::ZERO))
            },
        }
    }
}

/// Inputs to the guard
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Arm the first timer
    Start,
    /// Passive activity: pointer movement, key press, click, scroll
    Activity,
    /// Explicit "continue" from the warning dialog
    Continue,
    /// Explicit "reset now" from the warning dialog
    ResetNow,
    /// Inactivity timer fired
    WarningDue {
        /// Generation the timer was armed in
        generation: u64,
    },
    /// Warning countdown ran out
    CountdownElapsed {
        /// Generation the countdown was armed in
        generation: u64,
    },
}

/// What to do when the session expires
pub trait ExpiryHook: Send + Sync {
    /// Called once per expiry
    fn on_expired(&self) -> BoxFuture<'static, ()>;
}

/// Timer lengths for the guard
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Total idle time before the forced reset
    pub inactivity_timeout: Duration,
    /// Length of the warning countdown at the end of `inactivity_timeout`
    pub warning_window: Duration,
}

impl SessionTimeouts {
    /// Idle time before the warning appears
    #[must_use]
    pub fn until_warning(&self) -> Duration {
        self.inactivity_timeout.saturating_sub(self.warning_window)
    }
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            warning_window: DEFAULT_WARNING_WINDOW,
        }
    }
}

/// Injected dependencies for the session guard
#[derive(Clone)]
pub struct SessionEnvironment {
    /// Clock used for deadlines and activity stamps
    pub clock: Arc<dyn Clock>,
    /// Timer lengths
    pub timeouts: SessionTimeouts,
    /// Invoked on expiry
    pub on_expiry: Arc<dyn ExpiryHook>,
}

impl SessionEnvironment {
    /// Creates a new `SessionEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        timeouts: SessionTimeouts,
        on_expiry: Arc<dyn ExpiryHook>,
    ) -> Self {
        Self {
            clock,
            timeouts,
            on_expiry,
        }
    }
}

/// Reducer for the inactivity guard
#[derive(Clone, Debug, Default)]
pub struct SessionReducer;

impl SessionReducer {
    /// Creates a new `SessionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn restart(
        state: &mut SessionState,
        env: &SessionEnvironment,
    ) -> SmallVec<[Effect<SessionAction>; 4]> {
        state.generation += 1;
        state.phase = SessionPhase::Active;
        state.last_activity = Some(env.clock.now());

        smallvec![Effect::delay(
            SESSION_TIMER,
            env.timeouts.until_warning(),
            SessionAction::WarningDue {
                generation: state.generation,
            },
        )]
    }

    fn expire(
        state: &mut SessionState,
        env: &SessionEnvironment,
    ) -> SmallVec<[Effect<SessionAction>; 4]> {
        state.expirations += 1;
        tracing::info!(expirations = state.expirations, "Session expired, resetting desk");

        let mut effects = Self::restart(state, env);
        effects.insert(0, Effect::fire_and_forget(env.on_expiry.on_expired()));
        effects
    }
}

impl Reducer for SessionReducer {
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match (action, state.phase) {
            (SessionAction::Start | SessionAction::Activity, SessionPhase::Active)
            | (SessionAction::Continue, _) => Self::restart(state, env),

            (SessionAction::WarningDue { generation }, SessionPhase::Active)
                if generation == state.generation =>
            {
                let window = env.timeouts.warning_window;
                let deadline = env.clock.now()
                    + chrono::Duration::from_std(window).unwrap_or(chrono::Duration::zero());
                state.phase = SessionPhase::Warning { deadline };
                tracing::info!(%deadline, "Inactivity warning raised");

                smallvec![Effect::delay(
                    SESSION_TIMER,
                    window,
                    SessionAction::CountdownElapsed { generation },
                )]
            },

            (SessionAction::CountdownElapsed { generation }, SessionPhase::Warning { .. })
                if generation == state.generation =>
            {
                Self::expire(state, env)
            },

            (SessionAction::ResetNow, SessionPhase::Warning { .. }) => Self::expire(state, env),

            // Passive activity during the warning, stale timers, reset-now
            // without a warning
            (action, phase) => {
                tracing::trace!(?action, ?phase, "Session signal ignored");
                SmallVec::new()
            },
        }
    }
}
