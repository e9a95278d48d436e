//! # SlotDesk Testing
//!
//! Testing utilities and helpers for SlotDesk reducers and stores.
//!
//! This crate provides:
//! - Mock implementations of Environment traits (clocks, id generators)
//! - In-memory and failing [`StateSink`](slotdesk_runtime::StateSink) implementations
//! - The [`ReducerTest`] Given/When/Then harness and effect assertions
//!
//! ## Example
//!
//! ```ignore
//! use slotdesk_testing::{test_clock, InMemorySink};
//! use slotdesk_runtime::Store;
//!
//! #[tokio::test]
//! async fn admits_into_free_slot() {
//!     let sink = Arc::new(InMemorySink::new());
//!     let store = Store::new(DeskState::default(), AllocationReducer, env())
//!         .persisted_by(sink.clone());
//!
//!     store.send(DeskAction::Admit { .. }).await?;
//!
//!     assert_eq!(sink.writes(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use slotdesk_core::environment::{Clock, IdGenerator};


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use slotdesk_runtime::{PersistError, StateSink};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use slotdesk_testing::mocks::FixedClock;
    /// use slotdesk_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// 2025-01-01 00:00:00 UTC, the instant every test clock starts at
    ///
    /// # Panics
    ///
    /// Never in practice; the timestamp is hardcoded.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Clock that only moves when told to
    ///
    /// Clones share the same instant, so a test can keep one handle and
    /// advance the clock the reducer environment reads from.
    ///
    /// ```
    /// use slotdesk_testing::mocks::ManualClock;
    /// use slotdesk_core::environment::Clock;
    ///
    /// let clock = ManualClock::starting_at_epoch();
    /// let before = clock.now();
    /// clock.advance(chrono::Duration::seconds(90));
    /// assert_eq!((clock.now() - before).num_seconds(), 90);
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock frozen at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Create a clock frozen at [`test_epoch`]
        #[must_use]
        pub fn starting_at_epoch() -> Self {
            Self::new(test_epoch())
        }

        /// Move the clock forward by `by`
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute instant
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Predictable ids: `<prefix>-1`, `<prefix>-2`, ...
    #[derive(Debug)]
    pub struct SequentialIdGenerator {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator whose ids start with `prefix`
        #[must_use]
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(1),
            }
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new("id")
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            format!("{}-{n}", self.prefix)
        }
    }

    /// Sink that keeps every persisted state in memory
    #[derive(Debug)]
    pub struct InMemorySink<S> {
        written: Mutex<Vec<S>>,
    }

    impl<S: Clone> InMemorySink<S> {
        /// Create an empty sink
        #[must_use]
        pub const fn new() -> Self {
            Self {
                written: Mutex::new(Vec::new()),
            }
        }

        /// Number of successful writes so far
        #[must_use]
        pub fn writes(&self) -> usize {
            self.written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }

        /// The most recently persisted state
        #[must_use]
        pub fn last(&self) -> Option<S> {
            self.written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .last()
                .cloned()
        }
    }

    impl<S: Clone> Default for InMemorySink<S> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<S: Clone + Send> StateSink<S> for InMemorySink<S> {
        fn persist(&self, state: &S) -> Result<(), PersistError> {
            self.written
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(state.clone());
            Ok(())
        }
    }

    /// Sink whose writes fail while it is switched on
    #[derive(Debug)]
    pub struct FailingSink {
        failing: AtomicBool,
        attempts: AtomicU64,
    }

    impl FailingSink {
        /// A sink that fails every write until [`FailingSink::recover`] is called
        #[must_use]
        pub const fn new() -> Self {
            Self {
                failing: AtomicBool::new(true),
                attempts: AtomicU64::new(0),
            }
        }

        /// Make subsequent writes succeed
        pub fn recover(&self) {
            self.failing.store(false, Ordering::SeqCst);
        }

        /// Make subsequent writes fail again
        pub fn break_again(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        /// Number of writes attempted, failed or not
        #[must_use]
        pub fn attempts(&self) -> u64 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl Default for FailingSink {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<S> StateSink<S> for FailingSink {
        fn persist(&self, _state: &S) -> Result<(), PersistError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(PersistError::Write("storage quota exceeded".to_string()))
            } else {
                Ok(())
            }
        }
    }
}

// Re-export commonly used items
pub use mocks::{
    FailingSink, FixedClock, InMemorySink, ManualClock, SequentialIdGenerator, test_clock,
    test_epoch,
};
