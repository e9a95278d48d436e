//! Property tests for pool resizing and slot bookkeeping

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use proptest::prelude::*;
use slotdesk::model::{MAX_SLOTS, MIN_SLOTS};
use slotdesk::{
    AllocationReducer, AppState, CollectingDispatcher, DeskAction, DeskEnvironment, DeskState,
    MessageTemplates,
};
use slotdesk_core::reducer::Reducer;
use slotdesk_testing::{SequentialIdGenerator, test_clock};
use std::sync::Arc;

fn env() -> DeskEnvironment {
    DeskEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(SequentialIdGenerator::new("rec")),
        Arc::new(CollectingDispatcher::new()),
        MessageTemplates::default(),
    )
}

fn apply(state: &mut DeskState, action: DeskAction) {
    let _ = AllocationReducer::new().reduce(state, action, &env());
}

proptest! {
    #[test]
    fn resize_in_range_yields_contiguous_ids(count in MIN_SLOTS..=MAX_SLOTS) {
        let mut state = DeskState::new(AppState::initial());
        apply(&mut state, DeskAction::Resize { count });

        prop_assert!(state.last_rejection.is_none());
        prop_assert_eq!(state.app.slots.len(), count);
        for (index, slot) in state.app.slots.iter().enumerate() {
            prop_assert_eq!(slot.id, index);
            prop_assert!(!slot.is_occupied());
        }
    }

    #[test]
    fn resize_out_of_range_is_refused(count in prop_oneof![Just(0_usize), 51_usize..500]) {
        let mut state = DeskState::new(AppState::initial());
        apply(&mut state, DeskAction::Resize { count });

        prop_assert!(state.last_rejection.is_some());
        prop_assert_eq!(state.app, AppState::initial());
    }

    #[test]
    fn shrink_never_evicts(occupied in 0_usize..20, count in MIN_SLOTS..=20) {
        let mut state = DeskState::new(AppState::initial());
        apply(&mut state, DeskAction::Resize { count: 20 });
        apply(&mut state, DeskAction::Admit {
            slot_id: occupied,
            name: "Kim".to_string(),
            memo: None,
            from_waitlist: false,
        });
        apply(&mut state, DeskAction::Resize { count });

        let kim = state.app.slots.iter().filter(|s| s.is_occupied()).count();
        prop_assert_eq!(kim, 1);
        if occupied < count {
            prop_assert_eq!(state.app.slots.len(), count);
        } else {
            prop_assert_eq!(state.app.slots.len(), 20);
        }
    }

    #[test]
    fn occupancy_matches_open_history(ops in proptest::collection::vec((0_usize..3, any::<bool>()), 0..40)) {
        let mut state = DeskState::new(AppState::initial());
        for (slot_id, admit) in ops {
            let action = if admit {
                DeskAction::Admit {
                    slot_id,
                    name: format!("P{slot_id}"),
                    memo: None,
                    from_waitlist: false,
                }
            } else {
                DeskAction::Release { slot_id }
            };
            apply(&mut state, action);
        }

        for slot in &state.app.slots {
            prop_assert!(slot.is_consistent());
            let open = state.app.open_records(slot.number()).count();
            prop_assert_eq!(open, usize::from(slot.is_occupied()));
        }
    }
}
