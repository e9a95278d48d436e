//! # SlotDesk Runtime
//!
//! Runtime implementation for the SlotDesk reducers.
//!
//! This crate provides the Store: the single atomic updater every mutation
//! funnels through.
//!
//! ## Core Components
//!
//! - **Store**: Owns state, runs the reducer under a write lock and persists
//!   the result before the lock is released
//! - **State sink**: Synchronous persistence hook invoked after every action
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to reducers
//!
//! ## Example
//!
//! ```ignore
//! use slotdesk_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment)
//!     .persisted_by(Arc::new(my_sink));
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use slotdesk_core::{effect::Effect, reducer::Reducer};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),
    }
}

/// Persistence hook for the Store
///
/// The store hands the freshly reduced state to a [`StateSink`] while it
/// still holds the write lock, so a transform and its durable write are never
/// interleaved with another action.
pub mod persistence {
    use thiserror::Error;

    /// Failure to write state to durable storage.
    ///
    /// The in-memory state is never rolled back when this happens; the
    /// failed write is retried implicitly by the next action.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum PersistError {
        /// The state could not be encoded
        #[error("failed to encode state: {0}")]
        Encode(String),

        /// The encoded state could not be written
        #[error("failed to write state: {0}")]
        Write(String),
    }

    /// Synchronous, best-effort durable write of the whole state.
    pub trait StateSink<S>: Send + Sync {
        /// Persist `state`, replacing whatever was written before.
        ///
        /// # Errors
        ///
        /// Returns [`PersistError`] when encoding or the write fails.
        fn persist(&self, state: &S) -> Result<(), PersistError>;
    }
}

pub use error::StoreError;
pub use persistence::{PersistError, StateSink};

/// Health check status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,

    /// Component is operational but the last durable write failed
    Degraded,
}

/// Result of a health check on the Store
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Component name
    pub component: String,
    /// Current status
    pub status: HealthStatus,
    /// Human readable detail when not healthy
    pub message: Option<String>,
    /// Additional key/value metadata
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    /// A healthy component
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// A degraded component with a reason
    #[must_use]
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Attach a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Dead letter queue entry
///
/// Represents a failed operation with metadata about the failure.
#[derive(Debug, Clone)]
pub struct DeadLetter<T> {
    /// The failed operation payload
    pub payload: T,

    /// The error message from the failure
    pub error_message: String,

    /// Timestamp when it failed (nanoseconds since epoch)
    pub failed_at: u64,
}

impl<T> DeadLetter<T> {
    fn new(payload: T, error_message: String) -> Self {
        // Note: Truncation acceptable for nanosecond timestamps (wraps every ~584 years)
        #[allow(clippy::cast_possible_truncation)]
        let now_nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_nanos() as u64;

        Self {
            payload,
            error_message,
            failed_at: now_nanos,
        }
    }
}

/// Dead Letter Queue for failed operations
///
/// The store pushes every failed durable write here so the operator can
/// inspect what did not reach storage.
///
/// - Bounded queue with configurable max size
/// - FIFO ordering (oldest entries dropped when full)
/// - Thread-safe for concurrent access
#[derive(Debug)]
pub struct DeadLetterQueue<T> {
    queue: Arc<Mutex<VecDeque<DeadLetter<T>>>>,
    max_size: usize,
}

impl<T> DeadLetterQueue<T> {
    /// Create a new dead letter queue with the given max size
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            max_size,
        }
    }

    /// Push a failed operation onto the queue
    ///
    /// If the queue is full, the oldest entry is dropped.
    pub fn push(&self, payload: T, error_message: String) {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if queue.len() >= self.max_size {
            queue.pop_front();
            metrics::counter!("dlq.dropped").increment(1);
            tracing::warn!(
                max_size = self.max_size,
                "DLQ at capacity, dropping oldest entry"
            );
        }

        queue.push_back(DeadLetter::new(payload, error_message));

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("dlq.size").set(queue.len() as f64);
        metrics::counter!("dlq.pushed").increment(1);
    }

    /// Get the current queue size
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Check if the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain all entries from the queue
    pub fn drain(&self) -> Vec<DeadLetter<T>> {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entries: Vec<_> = queue.drain(..).collect();

        metrics::gauge!("dlq.size").set(0.0);
        metrics::counter!("dlq.drained").increment(entries.len() as u64);

        entries
    }

    /// Peek at the oldest entry without removing it
    #[must_use]
    pub fn peek(&self) -> Option<DeadLetter<T>>
    where
        T: Clone,
    {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .front()
            .cloned()
    }

    /// Get the maximum queue size
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }
}

impl<T> Clone for DeadLetterQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            max_size: self.max_size,
        }
    }
}

impl<T> Default for DeadLetterQueue<T> {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Configuration for Store instances
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum size of the dead letter queue
    pub dlq_max_size: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
    /// Capacity of the applied-action broadcast channel
    pub broadcast_capacity: usize,
}

impl StoreConfig {
    /// Set the DLQ maximum size
    #[must_use]
    pub const fn with_dlq_max_size(mut self, max_size: usize) -> Self {
        self.dlq_max_size = max_size;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }

    /// Set the broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dlq_max_size: 100,
            default_shutdown_timeout: Duration::from_secs(5),
            broadcast_capacity: 64,
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects of an
/// action (notification dispatch, scheduled timers) to complete.
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (tx, rx) = watch::channel(());
        let _ = tx.send(());

        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the timeout expires before all effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), ()> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| ())
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: Effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Ensures the effect counter is always decremented, even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Outcome of [`Store::send_and_inspect`]
#[derive(Debug)]
pub struct Receipt<T> {
    /// Handle for the effects spawned by the action
    pub handle: EffectHandle,
    /// Value read from the state right after the reducer ran
    pub inspected: T,
    /// Set when the durable write after this action failed
    pub persist_warning: Option<PersistError>,
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicU64, AtomicUsize, DeadLetterQueue,
        DecrementGuard, Duration, Effect, EffectHandle, EffectTracking, HashMap, HealthCheck,
        Mutex, Ordering, PersistError, PoisonError, Receipt, Reducer, RwLock, StateSink,
        StoreConfig, StoreError,
    };
    use tokio::sync::broadcast;
    use tokio::task::AbortHandle;

    /// Pending `Effect::Delay` tasks by key, with the sequence number they were armed under
    type TimerRegistry = Arc<Mutex<HashMap<&'static str, (u64, AbortHandle)>>>;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`; every action takes the write lock)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Persistence (optional [`StateSink`] called after every action)
    /// 5. Effect execution (with feedback loop)
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        sink: Option<Arc<dyn StateSink<S>>>,
        dlq: DeadLetterQueue<String>,
        persist_degraded: Arc<AtomicBool>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        timers: TimerRegistry,
        timer_seq: Arc<AtomicU64>,
        default_shutdown_timeout: Duration,
        /// Every applied action is broadcast once its transform and durable
        /// write have finished.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: Send + Sync + Clone + 'static,
        S: Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                sink: None,
                dlq: DeadLetterQueue::new(config.dlq_max_size),
                persist_degraded: Arc::new(AtomicBool::new(false)),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                timers: Arc::new(Mutex::new(HashMap::new())),
                timer_seq: Arc::new(AtomicU64::new(0)),
                default_shutdown_timeout: config.default_shutdown_timeout,
                action_broadcast,
            }
        }

        /// Attach a persistence sink; every subsequent action is persisted through it.
        #[must_use]
        pub fn persisted_by(mut self, sink: Arc<dyn StateSink<S>>) -> Self {
            self.sink = Some(sink);
            self
        }

        /// Access the environment the reducer runs with
        #[must_use]
        pub const fn environment(&self) -> &E {
            &self.environment
        }

        /// Get access to the dead letter queue of failed writes
        #[must_use]
        pub fn dlq(&self) -> DeadLetterQueue<String> {
            self.dlq.clone()
        }

        /// Perform a health check on the Store
        ///
        /// Degraded while the most recent durable write has failed.
        #[must_use]
        pub fn health(&self) -> HealthCheck {
            let check = if self.persist_degraded.load(Ordering::Acquire) {
                HealthCheck::degraded("store", "last write may not have reached durable storage")
            } else {
                HealthCheck::healthy("store")
            };

            check.with_metadata("failed_writes", self.dlq.len().to_string())
        }

        /// Number of effects currently running, armed timers included
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Abort every armed timer, returning how many were cancelled
        pub fn cancel_timers(&self) -> usize {
            let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            let cancelled = timers.len();
            for (_, (_, handle)) in timers.drain() {
                handle.abort();
            }
            cancelled
        }

        /// Initiate graceful shutdown of the store
        ///
        /// Sets the shutdown flag (rejecting new actions), aborts armed
        /// timers and waits for the remaining effects to finish.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), StoreError> {
            let timeout = timeout.unwrap_or(self.default_shutdown_timeout);
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let cancelled = self.cancel_timers();
            if cancelled > 0 {
                tracing::debug!(cancelled, "Aborted armed timers");
            }

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(20);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::warn!(pending_effects = pending, "Shutdown timeout");
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Persists the resulting state through the sink, if any
        /// 4. Broadcasts the action and starts its effects
        ///
        /// A failed durable write is logged and recorded in the DLQ; it does
        /// not fail the send. Use [`Store::send_and_inspect`] to observe it.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            self.dispatch(action, |_| ()).await.map(|receipt| receipt.handle)
        }

        /// Send an action and read from the state in the same critical section
        ///
        /// `inspect` runs while the write lock is still held, so the value it
        /// returns reflects exactly this action's transform.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub async fn send_and_inspect<F, T>(
            &self,
            action: A,
            inspect: F,
        ) -> Result<Receipt<T>, StoreError>
        where
            F: FnOnce(&S) -> T,
        {
            self.dispatch(action, inspect).await
        }

        /// Subscribe to applied actions
        ///
        /// Presentation layers use this to re-render after every transform.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let occupied = store.state(|s| s.app.occupied_count()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        async fn dispatch<F, T>(&self, action: A, inspect: F) -> Result<Receipt<T>, StoreError>
        where
            F: FnOnce(&S) -> T,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let (effects, inspected, persist_warning) = {
                let mut state = self.state.write().await;

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self
                    .reducer
                    .reduce(&mut *state, action.clone(), &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                let persist_warning = self.persist(&state);
                let inspected = inspect(&state);

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                (effects, inspected, persist_warning)
            };

            // No subscribers is fine
            let _ = self.action_broadcast.send(action);

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            Ok(Receipt {
                handle,
                inspected,
                persist_warning,
            })
        }

        fn persist(&self, state: &S) -> Option<PersistError> {
            let sink = self.sink.as_ref()?;

            match sink.persist(state) {
                Ok(()) => {
                    self.persist_degraded.store(false, Ordering::Release);
                    None
                },
                Err(error) => {
                    tracing::warn!(error = %error, "Failed to persist state; in-memory state kept");
                    metrics::counter!("store.persist.failures").increment(1);
                    self.dlq.push("persist".to_string(), error.to_string());
                    self.persist_degraded.store(true, Ordering::Release);
                    Some(error)
                },
            }
        }

        /// Execute an effect with tracking
        ///
        /// - `Future`: Executes async computation, sends resulting action if `Some`
        /// - `Delay`: Waits for duration, then sends action; replaces any timer armed under the same key
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned into tasks
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let (guard, pending_guard) = self.track(&tracking);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;
                        let _pending_guard = pending_guard;

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            let _ = store.send(action).await;
                        }
                    });
                },
                Effect::Delay {
                    key,
                    duration,
                    action,
                } => {
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let (guard, pending_guard) = self.track(&tracking);
                    let store = self.clone();
                    let seq = self.timer_seq.fetch_add(1, Ordering::Relaxed);

                    // Registered under the lock so the task cannot disarm before it is recorded
                    let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
                    let task = tokio::spawn(async move {
                        let _guard = guard;
                        let _pending_guard = pending_guard;

                        tokio::time::sleep(duration).await;
                        store.disarm(key, seq);
                        tracing::trace!(key, ?duration, "Effect::Delay elapsed, sending action");
                        let _ = store.send(*action).await;
                    });
                    if let Some((_, replaced)) = timers.insert(key, (seq, task.abort_handle())) {
                        replaced.abort();
                        tracing::trace!(key, "Armed timer replaced");
                    }
                },
            }
        }

        /// Forget timer `key` if it is still the one armed under `seq`
        fn disarm(&self, key: &'static str, seq: u64) {
            let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            if timers.get(key).is_some_and(|(armed, _)| *armed == seq) {
                timers.remove(key);
            }
        }

        fn track(&self, tracking: &EffectTracking) -> (DecrementGuard, AtomicCounterGuard) {
            tracking.increment();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            (
                DecrementGuard(tracking.clone()),
                AtomicCounterGuard(Arc::clone(&self.pending_effects)),
            )
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                sink: self.sink.clone(),
                dlq: self.dlq.clone(),
                persist_degraded: Arc::clone(&self.persist_degraded),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                timers: Arc::clone(&self.timers),
                timer_seq: Arc::clone(&self.timer_seq),
                default_shutdown_timeout: self.default_shutdown_timeout,
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_drops_oldest_when_full() {
        let dlq = DeadLetterQueue::new(2);
        dlq.push("a".to_string(), "e1".to_string());
        dlq.push("b".to_string(), "e2".to_string());
        dlq.push("c".to_string(), "e3".to_string());

        assert_eq!(dlq.len(), 2);
        assert_eq!(dlq.peek().map(|d| d.payload), Some("b".to_string()));
        assert_eq!(dlq.drain().len(), 2);
        assert!(dlq.is_empty());
    }

    #[tokio::test]
    async fn completed_handle_does_not_block() {
        let mut handle = EffectHandle::completed();
        assert_eq!(handle.pending(), 0);
        assert!(handle.wait_with_timeout(Duration::from_millis(10)).await.is_ok());
    }
}
