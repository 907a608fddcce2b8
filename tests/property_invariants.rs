use std::collections::BTreeSet;

use proptest::prelude::*;

use jumplog::{
    core::{
        numbering::{duplicate_numbers, find_conflict, plan_shift},
        state::JumpListState,
        view::DateDisplay,
    },
    jump::JumpRecord,
    persist::{memory::MemoryRepository, JumpRepository},
};

const NOTES: &[&str] = &["", "sunset load", "Tracking 2 way", "night jump", "canopy 12"];
const QUERIES: &[&str] = &["", " ", "1", "2", "12", "load", "JUMP", "x", "2 way"];

#[derive(Debug, Clone)]
enum Action {
    Toggle { target: u8 },
    Query { idx: u8 },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0u8..32).prop_map(|target| Action::Toggle { target }),
        (0u8..32).prop_map(|idx| Action::Query { idx }),
    ]
}

fn records_strategy() -> impl Strategy<Value = Vec<JumpRecord>> {
    prop::collection::vec((prop::option::of(0i64..200), 0usize..NOTES.len()), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (number, note))| JumpRecord {
                id: Some(i as i64 + 1),
                jump_number: number,
                notes: Some(NOTES[note].to_string()).filter(|n| !n.is_empty()),
                ..JumpRecord::default()
            })
            .collect()
    })
}

fn loaded(records: Vec<JumpRecord>) -> JumpListState {
    let mut state = JumpListState::new(DateDisplay {
        utc_offset_seconds: Some(0),
        ..DateDisplay::default()
    });
    state.replace_all(records);
    state
}

fn is_subsequence(sub: &[i64], full: &[i64]) -> bool {
    let mut it = full.iter();
    sub.iter().all(|s| it.any(|f| f == s))
}

proptest! {
    #[test]
    fn filtered_is_ordered_subset_and_idempotent(records in records_strategy(), q in 0usize..QUERIES.len()) {
        let mut state = loaded(records);
        let full: Vec<i64> = state.entries().iter().map(|e| e.id()).collect();

        state.set_query("");
        prop_assert_eq!(state.filtered_ids(), full.as_slice());

        let first = state.set_query(QUERIES[q]);
        let first_ids = state.filtered_ids().to_vec();
        prop_assert!(is_subsequence(&first_ids, &full));
        prop_assert_eq!(first.total, full.len());
        prop_assert_eq!(first.filtered, first_ids.len());

        let second = state.set_query(QUERIES[q]);
        prop_assert_eq!(first, second);
        prop_assert_eq!(state.filtered_ids(), first_ids.as_slice());
    }

    #[test]
    fn at_most_one_entry_is_expanded(records in records_strategy(), actions in prop::collection::vec(action_strategy(), 1..100)) {
        let mut state = loaded(records);
        let ids: Vec<i64> = state.entries().iter().map(|e| e.id()).collect();

        for action in actions {
            match action {
                Action::Toggle { target } => {
                    if ids.is_empty() {
                        continue;
                    }
                    state.toggle_expand(ids[usize::from(target) % ids.len()]);
                }
                Action::Query { idx } => {
                    state.set_query(QUERIES[usize::from(idx) % QUERIES.len()]);
                }
            }

            let expanded = state.entries().iter().filter(|e| e.is_expanded()).count();
            prop_assert!(expanded <= 1);

            if let Some(id) = state.expanded_id() {
                prop_assert!(state.get(id).is_some_and(|e| e.is_expanded()));
                prop_assert!(state.filtered_ids().contains(&id));
            }
        }
    }

    #[test]
    fn shift_then_upsert_keeps_numbers_unique(
        numbers in prop::collection::btree_set(1i64..60, 0..30),
        candidate in 1i64..65,
        edit in prop::option::of(0usize..30),
    ) {
        let repo = MemoryRepository::new();
        let mut ids = Vec::new();
        for n in &numbers {
            let id = repo.upsert(&JumpRecord { jump_number: Some(*n), ..JumpRecord::default() }).expect("seed");
            ids.push(id);
        }

        let exclude = edit.and_then(|i| ids.get(i).copied());
        let current: Vec<_> = repo.get_all().expect("all").iter().map(|r| (r.id.expect("id"), r.jump_number)).collect();

        if find_conflict(current.clone(), candidate, exclude).is_some() {
            let planned = plan_shift(current, candidate, exclude).len();
            let shifted = repo.shift_numbers_up_from(candidate, exclude).expect("shift");
            prop_assert_eq!(planned, shifted);
        }

        let record = match exclude {
            Some(id) => JumpRecord { jump_number: Some(candidate), ..repo.get_by_id(id).expect("get").expect("record") },
            None => JumpRecord { jump_number: Some(candidate), ..JumpRecord::default() },
        };
        repo.upsert(&record).expect("upsert");

        let after: Vec<_> = repo.get_all().expect("all").into_iter().map(|r| r.jump_number).collect();
        prop_assert!(duplicate_numbers(after.clone()).is_empty());
        prop_assert!(after.contains(&Some(candidate)));

        let expected_len = numbers.len() + usize::from(exclude.is_none());
        prop_assert_eq!(after.len(), expected_len);

        let untouched: BTreeSet<i64> = numbers.iter().copied().filter(|n| *n < candidate).collect();
        for n in untouched {
            prop_assert!(after.contains(&Some(n)) || exclude.is_some());
        }
    }
}
