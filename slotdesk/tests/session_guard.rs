//! Inactivity guard running against tokio's paused clock

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use slotdesk::{
    AppState, CollectingDispatcher, Desk, DeskOptions, MemoryBlobStore, MessageTemplates,
    SessionTimeouts,
};
use slotdesk_testing::{ManualClock, SequentialIdGenerator};
use std::sync::Arc;
use std::time::Duration;

/// 60s timeout, warning for the last 10s
fn guarded_desk() -> (Desk, ManualClock) {
    let clock = ManualClock::starting_at_epoch();
    let options = DeskOptions {
        clock: Arc::new(clock.clone()),
        ids: Arc::new(SequentialIdGenerator::new("rec")),
        dispatcher: Arc::new(CollectingDispatcher::new()),
        templates: MessageTemplates::default(),
        timeouts: SessionTimeouts {
            inactivity_timeout: Duration::from_secs(60),
            warning_window: Duration::from_secs(10),
        },
        utc_offset: chrono::FixedOffset::east_opt(0).unwrap(),
    };
    let desk = Desk::open(Arc::new(MemoryBlobStore::new()), options).unwrap();
    (desk, clock)
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_desk_is_wiped() {
    let (desk, _) = guarded_desk();
    desk.admit(0, "Kim", None).await.unwrap();
    desk.enqueue_waiter("Lee", "010").await.unwrap();
    desk.start_session().await.unwrap();

    sleep_secs(49).await;
    assert!(!desk.session_state().await.is_warning());

    sleep_secs(2).await;
    assert!(desk.session_state().await.is_warning());
    assert_eq!(desk.snapshot().await.slots[0].participant_name.as_deref(), Some("Kim"));

    sleep_secs(10).await;
    let session = desk.session_state().await;
    assert!(!session.is_warning());
    assert_eq!(session.expirations, 1);
    assert_eq!(desk.snapshot().await, AppState::initial());
}

#[tokio::test(start_paused = true)]
async fn test_activity_pushes_the_warning_back() {
    let (desk, _) = guarded_desk();
    desk.start_session().await.unwrap();

    sleep_secs(30).await;
    desk.activity().await.unwrap();

    // The first timer fires at 50s but belongs to a stale generation
    sleep_secs(25).await;
    assert!(!desk.session_state().await.is_warning());

    sleep_secs(30).await;
    assert!(desk.session_state().await.is_warning());
}

#[tokio::test(start_paused = true)]
async fn test_passive_activity_does_not_dismiss_warning() {
    let (desk, _) = guarded_desk();
    desk.admit(0, "Kim", None).await.unwrap();
    desk.start_session().await.unwrap();

    sleep_secs(52).await;
    desk.activity().await.unwrap();
    assert!(desk.session_state().await.is_warning());

    sleep_secs(10).await;
    assert_eq!(desk.snapshot().await, AppState::initial());
}

#[tokio::test(start_paused = true)]
async fn test_continue_keeps_the_data() {
    let (desk, _) = guarded_desk();
    desk.admit(0, "Kim", None).await.unwrap();
    desk.start_session().await.unwrap();

    sleep_secs(55).await;
    assert!(desk.session_state().await.is_warning());
    desk.continue_session().await.unwrap();
    assert!(!desk.session_state().await.is_warning());

    // Past the first countdown deadline
    sleep_secs(20).await;
    let session = desk.session_state().await;
    assert_eq!(session.expirations, 0);
    assert_eq!(desk.snapshot().await.occupied_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_now_only_from_warning() {
    let (desk, _) = guarded_desk();
    desk.admit(0, "Kim", None).await.unwrap();
    desk.start_session().await.unwrap();

    assert!(!desk.reset_now().await.unwrap());
    assert_eq!(desk.snapshot().await.occupied_count(), 1);

    // The desk clock is frozen, so the full window remains
    sleep_secs(51).await;
    let remaining = desk.warning_remaining().await.unwrap();
    assert_eq!(remaining, Duration::from_secs(10));

    assert!(desk.reset_now().await.unwrap());
    assert_eq!(desk.snapshot().await, AppState::initial());
    assert!(!desk.session_state().await.is_warning());
}

#[tokio::test(start_paused = true)]
async fn test_activity_burst_keeps_one_timer() {
    let (desk, _) = guarded_desk();
    desk.start_session().await.unwrap();

    // Pointer-move rate for about half a minute
    for _ in 0..2_000 {
        desk.activity().await.unwrap();
        tokio::time::sleep(Duration::from_millis(16)).await;
    }
    assert_eq!(desk.session_store().pending_effects(), 1);

    sleep_secs(49).await;
    assert!(!desk.session_state().await.is_warning());
    sleep_secs(2).await;
    assert!(desk.session_state().await.is_warning());
    assert_eq!(desk.session_store().pending_effects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_the_armed_timer() {
    let (desk, _) = guarded_desk();
    desk.admit(0, "Kim", None).await.unwrap();
    desk.start_session().await.unwrap();
    assert_eq!(desk.session_store().pending_effects(), 1);

    desk.shutdown(Duration::from_secs(1)).await.unwrap();
    assert_eq!(desk.session_store().pending_effects(), 0);

    // Nothing left to fire the warning or the reset
    sleep_secs(120).await;
    assert!(!desk.session_state().await.is_warning());
    assert_eq!(desk.snapshot().await.occupied_count(), 1);
}
