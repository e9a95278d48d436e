//! Integration tests for the Store write path
//!
//! Covers persistence after every action, degraded health on failed writes,
//! action broadcasting, delayed feedback and timer replacement.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use slotdesk_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use slotdesk_runtime::{HealthStatus, Store, StoreError};
use slotdesk_testing::{FailingSink, InMemorySink};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TallyAction {
    Add(u32),
    AddLater {
        key: &'static str,
        amount: u32,
        after: Duration,
    },
    Refuse,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct TallyState {
    total: u32,
    refused: u32,
}

#[derive(Clone)]
struct TallyEnvironment;

#[derive(Clone)]
struct TallyReducer;

impl Reducer for TallyReducer {
    type State = TallyState;
    type Action = TallyAction;
    type Environment = TallyEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TallyAction::Add(amount) => {
                state.total += amount;
                SmallVec::new()
            },
            TallyAction::AddLater { key, amount, after } => {
                smallvec![Effect::delay(key, after, TallyAction::Add(amount))]
            },
            TallyAction::Refuse => {
                state.refused += 1;
                SmallVec::new()
            },
        }
    }
}

fn store() -> Store<TallyState, TallyAction, TallyEnvironment, TallyReducer> {
    Store::new(TallyState::default(), TallyReducer, TallyEnvironment)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_every_action_is_persisted() {
    let sink = Arc::new(InMemorySink::new());
    let store = store().persisted_by(sink.clone());

    store.send(TallyAction::Add(2)).await.unwrap();
    store.send(TallyAction::Add(3)).await.unwrap();
    store.send(TallyAction::Refuse).await.unwrap();

    assert_eq!(sink.writes(), 3);
    assert_eq!(
        sink.last(),
        Some(TallyState {
            total: 5,
            refused: 1
        })
    );
    assert_eq!(store.health().status, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_failed_write_is_reported_not_fatal() {
    let sink = Arc::new(FailingSink::new());
    let store = store().persisted_by(sink.clone());

    let receipt = store
        .send_and_inspect(TallyAction::Add(4), |s| s.total)
        .await
        .unwrap();

    assert_eq!(receipt.inspected, 4);
    assert!(receipt.persist_warning.is_some());
    assert_eq!(store.state(|s| s.total).await, 4);
    assert_eq!(store.health().status, HealthStatus::Degraded);
    assert_eq!(store.dlq().len(), 1);

    sink.recover();
    let receipt = store
        .send_and_inspect(TallyAction::Add(1), |s| s.total)
        .await
        .unwrap();
    assert!(receipt.persist_warning.is_none());
    assert_eq!(store.health().status, HealthStatus::Healthy);
    assert_eq!(sink.attempts(), 2);
}

#[tokio::test]
async fn test_inspect_sees_this_action_only() {
    let store = store();

    let receipts: Vec<_> = futures::future::join_all(
        (1..=5).map(|n| store.send_and_inspect(TallyAction::Add(n), |s| s.total)),
    )
    .await;

    let mut seen: Vec<u32> = receipts.into_iter().map(|r| r.unwrap().inspected).collect();
    seen.sort_unstable();
    // Running totals: each inspection is a distinct prefix sum
    seen.dedup();
    assert_eq!(seen.len(), 5);
    assert_eq!(*seen.last().unwrap(), 15);
}

#[tokio::test]
async fn test_applied_actions_are_broadcast() {
    let store = store();
    let mut applied = store.subscribe_actions();

    store.send(TallyAction::Add(1)).await.unwrap();
    store.send(TallyAction::Refuse).await.unwrap();

    assert_eq!(applied.recv().await.unwrap(), TallyAction::Add(1));
    assert_eq!(applied.recv().await.unwrap(), TallyAction::Refuse);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_action_feeds_back() {
    let store = store();

    let mut handle = store
        .send(TallyAction::AddLater {
            key: "bonus",
            amount: 7,
            after: Duration::from_secs(90),
        })
        .await
        .unwrap();
    assert_eq!(store.state(|s| s.total).await, 0);

    handle.wait().await;
    assert_eq!(store.state(|s| s.total).await, 7);
}

#[tokio::test(start_paused = true)]
async fn test_rearming_a_key_replaces_its_timer() {
    let store = store();

    let mut handles = Vec::new();
    for amount in 1..=500 {
        let handle = store
            .send(TallyAction::AddLater {
                key: "bonus",
                amount,
                after: Duration::from_secs(10),
            })
            .await
            .unwrap();
        handles.push(handle);
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(store.pending_effects(), 1);

    for handle in &mut handles {
        handle.wait().await;
    }
    assert_eq!(store.state(|s| s.total).await, 500);
    assert_eq!(store.pending_effects(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_keys_run_side_by_side() {
    let store = store();

    for (key, amount) in [("bonus", 2), ("refund", 3)] {
        store
            .send(TallyAction::AddLater {
                key,
                amount,
                after: Duration::from_secs(5),
            })
            .await
            .unwrap();
    }
    assert_eq!(store.pending_effects(), 2);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(store.state(|s| s.total).await, 5);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_armed_timers() {
    let store = store();
    store
        .send(TallyAction::AddLater {
            key: "bonus",
            amount: 7,
            after: Duration::from_secs(3600),
        })
        .await
        .unwrap();

    store.shutdown(Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(store.pending_effects(), 0);
    assert_eq!(store.state(|s| s.total).await, 0);
}

#[tokio::test]
async fn test_shutdown_rejects_new_actions() {
    let store = store();
    store.shutdown(Some(Duration::from_millis(100))).await.unwrap();

    let result = store.send(TallyAction::Add(1)).await;
    assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
}
