//! Read-only helpers for presentation layers.

use crate::model::{AppState, HistoryRecord, Slot};
use crate::snapshot::format_duration;
use chrono::{DateTime, FixedOffset, Utc};
use std::time::Duration;

/// Headline numbers for the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeskStats {
    /// Every admission on record
    pub total_participants: usize,
    /// Occupied slots right now
    pub currently_in: usize,
    /// Visits that ended today (local date)
    pub completed_today: usize,
}

/// Compute [`DeskStats`]; "today" is the local date of `now` at `offset`
#[must_use]
pub fn stats(state: &AppState, now: DateTime<Utc>, offset: FixedOffset) -> DeskStats {
    let today = now.with_timezone(&offset).date_naive();
    DeskStats {
        total_participants: state.history.len(),
        currently_in: state.occupied_count(),
        completed_today: state
            .history
            .iter()
            .filter_map(|h| h.exit_time)
            .filter(|exit| exit.with_timezone(&offset).date_naive() == today)
            .count(),
    }
}

/// Which action a slot card offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotIntent {
    /// Occupied: release it
    EndExperience,
    /// Free and someone is waiting: admit the front waiter
    AdmitWaiter,
    /// Free and nobody waiting: admit a new participant
    StartExperience,
}

/// Decide the card action for `slot`
#[must_use]
pub const fn slot_intent(slot: &Slot, has_waiters: bool) -> SlotIntent {
    if slot.is_occupied() {
        SlotIntent::EndExperience
    } else if has_waiters {
        SlotIntent::AdmitWaiter
    } else {
        SlotIntent::StartExperience
    }
}

/// Live `HH:MM:SS` since admission
#[must_use]
pub fn elapsed_since(entry: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
    format_duration(entry, now)
}

/// `MM:SS` since a waiter was called; minutes keep counting past 59
#[must_use]
pub fn called_elapsed(notified_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
    let span = now - notified_at;
    if span < chrono::Duration::zero() {
        return None;
    }
    let seconds = span.num_seconds();
    Some(format!("{:02}:{:02}", seconds / 60, seconds % 60))
}

/// `M:SS` for the warning countdown
#[must_use]
pub fn countdown_text(remaining: Duration) -> String {
    let seconds = remaining.as_secs();
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Free slots, in id order
#[must_use]
pub fn vacant_slots(state: &AppState) -> Vec<&Slot> {
    state.slots.iter().filter(|s| !s.is_occupied()).collect()
}

/// History sorted by entry time, newest first
#[must_use]
pub fn history_by_entry(state: &AppState) -> Vec<&HistoryRecord> {
    let mut records: Vec<_> = state.history.iter().collect();
    records.sort_by(|a, b| b.entry_time.cmp(&a.entry_time));
    records
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::model::HistoryId;
    use slotdesk_testing::test_epoch;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn record(id: &str, entry_offset_secs: i64, exit_offset_secs: Option<i64>) -> HistoryRecord {
        HistoryRecord {
            id: HistoryId::new(id),
            slot_number: 1,
            participant_name: id.to_string(),
            memo: None,
            entry_time: test_epoch() + chrono::Duration::seconds(entry_offset_secs),
            exit_time: exit_offset_secs.map(|s| test_epoch() + chrono::Duration::seconds(s)),
        }
    }

    #[test]
    fn stats_count_today_in_local_time() {
        let mut state = AppState::initial();
        state.slots[0].participant_name = Some("Kim".to_string());
        state.slots[0].entry_time = Some(test_epoch());
        state.history = vec![
            record("open", 0, None),
            // 2025-01-01 08:00 KST, same local day as now
            record("morning", -7200, Some(-3600)),
            // 2024-12-31 23:00 KST, previous local day
            record("yesterday", -40000, Some(-36000)),
        ];

        let now = test_epoch() + chrono::Duration::hours(3);
        let stats = stats(&state, now, kst());
        assert_eq!(
            stats,
            DeskStats {
                total_participants: 3,
                currently_in: 1,
                completed_today: 1,
            }
        );
    }

    #[test]
    fn slot_intent_branches() {
        let mut slot = Slot::empty(0);
        assert_eq!(slot_intent(&slot, false), SlotIntent::StartExperience);
        assert_eq!(slot_intent(&slot, true), SlotIntent::AdmitWaiter);
        slot.participant_name = Some("Kim".to_string());
        slot.entry_time = Some(test_epoch());
        assert_eq!(slot_intent(&slot, true), SlotIntent::EndExperience);
    }

    #[test]
    fn elapsed_formats() {
        let t0 = test_epoch();
        assert_eq!(
            elapsed_since(t0, t0 + chrono::Duration::seconds(3725)).as_deref(),
            Some("01:02:05")
        );
        assert_eq!(
            called_elapsed(t0, t0 + chrono::Duration::seconds(3725)).as_deref(),
            Some("62:05")
        );
        assert_eq!(called_elapsed(t0 + chrono::Duration::seconds(1), t0), None);
        assert_eq!(countdown_text(Duration::from_secs(119)), "1:59");
    }

    #[test]
    fn history_sorted_by_entry_desc() {
        let mut state = AppState::initial();
        state.history = vec![record("a", 10, None), record("b", 30, None), record("c", 20, None)];
        let names: Vec<_> = history_by_entry(&state)
            .iter()
            .map(|h| h.participant_name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn vacant_slots_skip_occupied() {
        let mut state = AppState::initial();
        state.slots[1].participant_name = Some("Kim".to_string());
        state.slots[1].entry_time = Some(test_epoch());
        let ids: Vec<_> = vacant_slots(&state).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }
}
