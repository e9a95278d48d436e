//! Snapshot exchange: the CSV report and the JSON backup.
//!
//! The backup is the persisted document itself, pretty-printed. Anything read
//! back (a backup file or the stored blob) goes through [`parse_state`], which
//! checks the document's structure before a single field reaches the store.

use crate::error::SnapshotError;
use crate::model::AppState;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde_json::Value;

/// Header row of the CSV report
pub const REPORT_HEADER: &str =
    "상태,자리 번호,체험자 이름,전화번호,메모,입장 시간,퇴장 시간,소요 시간,호출 여부,호출 시간";

const STATUS_IN_PROGRESS: &str = "체험 중";
const STATUS_WAITING: &str = "대기 중";
const STATUS_COMPLETED: &str = "체험 완료";
const YES: &str = "예";
const NO: &str = "아니오";

const REQUIRED_COLLECTIONS: [&str; 3] = ["slots", "history", "waitingList"];

/// Default backup file name for `now`
#[must_use]
pub fn backup_file_name(now: DateTime<Utc>) -> String {
    format!("backup_{}.json", now.format("%Y-%m-%d"))
}

/// Default report file name for `now`
#[must_use]
pub fn report_file_name(now: DateTime<Utc>) -> String {
    format!("전체_체험기록_{}.csv", now.format("%Y-%m-%d"))
}

/// Serialize the full state as a pretty-printed JSON backup
///
/// # Errors
///
/// Returns [`SnapshotError::Parse`] if serialization fails.
pub fn export_backup(state: &AppState) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Parse and validate a state document
///
/// Rejects documents missing any of `slots`, `history` or `waitingList`,
/// documents whose timestamps do not parse, slot ids that are not exactly
/// `0..N-1` in order, and slots whose occupant and entry time disagree.
///
/// # Errors
///
/// Returns [`SnapshotError::Parse`] or [`SnapshotError::Structure`].
pub fn parse_state(raw: &str) -> Result<AppState, SnapshotError> {
    let value: Value = serde_json::from_str(raw)?;

    let Some(object) = value.as_object() else {
        return Err(structure("document is not an object"));
    };
    for key in REQUIRED_COLLECTIONS {
        if !object.get(key).is_some_and(Value::is_array) {
            return Err(structure(format!("missing collection '{key}'")));
        }
    }

    let state: AppState = serde_json::from_value(value)?;
    validate(&state)?;
    Ok(state)
}

/// Check the invariants a loaded state must satisfy
///
/// # Errors
///
/// Returns [`SnapshotError::Structure`] describing the first violation.
pub fn validate(state: &AppState) -> Result<(), SnapshotError> {
    for (index, slot) in state.slots.iter().enumerate() {
        if slot.id != index {
            return Err(structure(format!(
                "slot at position {index} has id {}",
                slot.id
            )));
        }
        if !slot.is_consistent() {
            return Err(structure(format!(
                "slot {index} has an occupant without an entry time or the reverse"
            )));
        }
    }
    Ok(())
}

fn structure(message: impl Into<String>) -> SnapshotError {
    SnapshotError::Structure {
        message: message.into(),
    }
}

/// `HH:MM:SS` between two instants, floored to the second
///
/// Negative spans yield `None`.
#[must_use]
pub fn format_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<String> {
    let span = end - start;
    if span < chrono::Duration::zero() {
        return None;
    }
    let seconds = span.num_seconds();
    Some(format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    ))
}

/// Korean locale date-time text, e.g. `2025. 1. 1. 오후 3:04:05`
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = at.with_timezone(&offset);
    let (is_pm, hour) = local.hour12();
    format!(
        "{}. {}. {}. {} {}:{:02}:{:02}",
        local.year(),
        local.month(),
        local.day(),
        if is_pm { "오후" } else { "오전" },
        hour,
        local.minute(),
        local.second()
    )
}

/// Build the CSV report: occupied slots, then the waiting list, then
/// completed visits newest exit first
///
/// Output is UTF-8 with a byte-order mark.
///
/// # Errors
///
/// Returns [`SnapshotError::Csv`] or [`SnapshotError::Io`] if writing fails.
pub fn export_report(
    state: &AppState,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<Vec<u8>, SnapshotError> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice("\u{FEFF}".as_bytes());
    buffer.extend_from_slice(REPORT_HEADER.as_bytes());
    buffer.push(b'\n');

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::NonNumeric)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(buffer);

    let ts = |at: Option<DateTime<Utc>>| at.map(|t| format_timestamp(t, offset)).unwrap_or_default();

    for slot in &state.slots {
        let (Some(name), Some(entry)) = (&slot.participant_name, slot.entry_time) else {
            continue;
        };
        writer.write_record([
            STATUS_IN_PROGRESS.to_string(),
            slot.number().to_string(),
            name.clone(),
            String::new(),
            slot.memo.clone().unwrap_or_default(),
            ts(Some(entry)),
            String::new(),
            format_duration(entry, now).unwrap_or_default(),
            String::new(),
            String::new(),
        ])?;
    }

    for waiter in &state.waiting_list {
        writer.write_record([
            STATUS_WAITING.to_string(),
            String::new(),
            waiter.name.clone(),
            waiter.phone_number.clone(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            (if waiter.notified { YES } else { NO }).to_string(),
            ts(waiter.notified_at),
        ])?;
    }

    let mut completed: Vec<_> = state
        .history
        .iter()
        .filter_map(|h| h.exit_time.map(|exit| (h, exit)))
        .collect();
    completed.sort_by(|a, b| b.1.cmp(&a.1));

    for (record, exit) in completed {
        writer.write_record([
            STATUS_COMPLETED.to_string(),
            record.slot_number.to_string(),
            record.participant_name.clone(),
            String::new(),
            record.memo.clone().unwrap_or_default(),
            ts(Some(record.entry_time)),
            ts(Some(exit)),
            format_duration(record.entry_time, exit).unwrap_or_default(),
            String::new(),
            String::new(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| SnapshotError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::model::{HistoryId, HistoryRecord, Slot, Waiter, WaiterId};
    use slotdesk_testing::test_epoch;

    fn kst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[test]
    fn duration_floors_to_seconds() {
        let start = test_epoch();
        assert_eq!(format_duration(start, start + secs(3661)).as_deref(), Some("01:01:01"));
        assert_eq!(
            format_duration(start, start + chrono::Duration::milliseconds(1999)).as_deref(),
            Some("00:00:01")
        );
        assert_eq!(format_duration(start + secs(5), start), None);
        assert_eq!(
            format_duration(start + chrono::Duration::milliseconds(500), start),
            None
        );
    }

    #[test]
    fn timestamps_use_korean_locale_style() {
        // 2025-01-01T00:00:00Z is 09:00 in Seoul
        assert_eq!(format_timestamp(test_epoch(), kst()), "2025. 1. 1. 오전 9:00:00");
        assert_eq!(
            format_timestamp(test_epoch() + secs(6 * 3600 + 4 * 60 + 5), kst()),
            "2025. 1. 1. 오후 3:04:05"
        );
        assert_eq!(
            format_timestamp(test_epoch() + secs(15 * 3600), kst()),
            "2025. 1. 2. 오전 12:00:00"
        );
    }

    #[test]
    fn file_names_use_date() {
        assert_eq!(backup_file_name(test_epoch()), "backup_2025-01-01.json");
        assert_eq!(report_file_name(test_epoch()), "전체_체험기록_2025-01-01.csv");
    }

    #[test]
    fn backup_round_trips() {
        let mut state = AppState::initial();
        state.slots[1] = Slot {
            id: 1,
            participant_name: Some("Kim".to_string()),
            memo: Some("memo".to_string()),
            entry_time: Some(test_epoch()),
        };
        state.history.push(HistoryRecord {
            id: HistoryId::new("h-1"),
            slot_number: 2,
            participant_name: "Kim".to_string(),
            memo: Some("memo".to_string()),
            entry_time: test_epoch(),
            exit_time: None,
        });

        let json = export_backup(&state).unwrap();
        assert_eq!(parse_state(&json).unwrap(), state);
    }

    #[test]
    fn missing_collection_is_rejected() {
        let err = parse_state(r#"{"slots": [], "history": []}"#).unwrap_err();
        assert!(matches!(err, SnapshotError::Structure { ref message } if message.contains("waitingList")));
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let raw = r#"{"slots":[{"id":0,"participantName":"Kim","memo":null,"entryTime":"yesterday"}],"history":[],"waitingList":[]}"#;
        assert!(matches!(parse_state(raw), Err(SnapshotError::Parse(_))));
    }

    #[test]
    fn gap_in_slot_ids_is_rejected() {
        let raw = r#"{"slots":[{"id":0,"participantName":null,"memo":null,"entryTime":null},{"id":2,"participantName":null,"memo":null,"entryTime":null}],"history":[],"waitingList":[]}"#;
        assert!(matches!(parse_state(raw), Err(SnapshotError::Structure { .. })));
    }

    #[test]
    fn occupant_without_entry_time_is_rejected() {
        let raw = r#"{"slots":[{"id":0,"participantName":"Kim","memo":null,"entryTime":null}],"history":[],"waitingList":[]}"#;
        assert!(matches!(parse_state(raw), Err(SnapshotError::Structure { .. })));
    }

    #[test]
    fn report_has_bom_header_and_row_families() {
        let t0 = test_epoch();
        let mut state = AppState::initial();
        state.slots[0] = Slot {
            id: 0,
            participant_name: Some("김철수".to_string()),
            memo: None,
            entry_time: Some(t0),
        };
        state.waiting_list.push(Waiter {
            id: WaiterId::new("w-1"),
            name: "이영희".to_string(),
            phone_number: "010-1234-5678".to_string(),
            notified: true,
            notified_at: Some(t0 + secs(60)),
        });
        state.history = vec![
            HistoryRecord {
                id: HistoryId::new("h-3"),
                slot_number: 1,
                participant_name: "김철수".to_string(),
                memo: None,
                entry_time: t0,
                exit_time: None,
            },
            HistoryRecord {
                id: HistoryId::new("h-2"),
                slot_number: 2,
                participant_name: "Early".to_string(),
                memo: None,
                entry_time: t0 - secs(7200),
                exit_time: Some(t0 - secs(3600)),
            },
            HistoryRecord {
                id: HistoryId::new("h-1"),
                slot_number: 3,
                participant_name: "Late".to_string(),
                memo: Some("note".to_string()),
                entry_time: t0 - secs(3661),
                exit_time: Some(t0),
            },
        ];

        let bytes = export_report(&state, t0 + secs(90), kst()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let text = text.strip_prefix('\u{FEFF}').expect("BOM");
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], REPORT_HEADER);
        assert_eq!(
            lines[1],
            r#""체험 중",1,"김철수","","","2025. 1. 1. 오전 9:00:00","","00:01:30","","""#
        );
        assert_eq!(
            lines[2],
            r#""대기 중","","이영희","010-1234-5678","","","","","예","2025. 1. 1. 오전 9:01:00""#
        );
        assert!(lines[3].starts_with(r#""체험 완료",3,"Late","","note""#));
        assert!(lines[3].ends_with(r#""01:01:01","","""#));
        assert!(lines[4].starts_with(r#""체험 완료",2,"Early""#));
        assert_eq!(lines.len(), 5);
    }
}
