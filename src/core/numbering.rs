//! Pure jump-number conflict detection and shift planning.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::types::{JumpId, JumpNumber};

/// Another record already carries the requested number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberConflict {
    /// Requested number.
    pub number: JumpNumber,
    /// First record found holding it.
    pub conflicting_id: JumpId,
}

/// One renumbering step of a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftMove {
    /// Record to renumber.
    pub id: JumpId,
    /// Current number.
    pub from: JumpNumber,
    /// Number after the shift (`from + 1`).
    pub to: JumpNumber,
}

/// Finds a record other than `exclude` that already uses `number`.
pub fn find_conflict<I>(records: I, number: JumpNumber, exclude: Option<JumpId>) -> Option<NumberConflict>
where
    I: IntoIterator<Item = (JumpId, Option<JumpNumber>)>,
{
    records
        .into_iter()
        .find(|(id, n)| *n == Some(number) && Some(*id) != exclude)
        .map(|(conflicting_id, _)| NumberConflict {
            number,
            conflicting_id,
        })
}

/// Plans a shift-up of every number `>= threshold` except `exclude`.
///
/// Moves are ordered by descending current number so applying them one by
/// one never produces a transient duplicate.
pub fn plan_shift<I>(records: I, threshold: JumpNumber, exclude: Option<JumpId>) -> Vec<ShiftMove>
where
    I: IntoIterator<Item = (JumpId, Option<JumpNumber>)>,
{
    let mut moves: Vec<ShiftMove> = records
        .into_iter()
        .filter(|(id, _)| Some(*id) != exclude)
        .filter_map(|(id, n)| {
            let from = n.filter(|n| *n >= threshold)?;
            Some(ShiftMove {
                id,
                from,
                to: from.saturating_add(1),
            })
        })
        .collect();
    moves.sort_by(|a, b| b.from.cmp(&a.from).then_with(|| b.id.cmp(&a.id)));
    moves
}

/// Whether a planned shift lands on the excluded record's current number.
///
/// The excluded record must then release its number before the moves are
/// applied, or the store would briefly hold two records with the same number.
pub fn lands_on_excluded(moves: &[ShiftMove], excluded_number: Option<JumpNumber>) -> bool {
    excluded_number.is_some_and(|n| moves.iter().any(|mv| mv.to == n))
}

/// Suggested number for a new jump: highest existing number plus one.
pub fn next_number<I>(numbers: I) -> JumpNumber
where
    I: IntoIterator<Item = Option<JumpNumber>>,
{
    numbers
        .into_iter()
        .flatten()
        .max()
        .map_or(1, |n| n.saturating_add(1))
}

/// Returns numbers held by more than one record.
pub fn duplicate_numbers<I>(numbers: I) -> Vec<JumpNumber>
where
    I: IntoIterator<Item = Option<JumpNumber>>,
{
    let mut seen = HashSet::new();
    let mut dupes = Vec::new();
    for n in numbers.into_iter().flatten() {
        if !seen.insert(n) && !dupes.contains(&n) {
            dupes.push(n);
        }
    }
    dupes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> Vec<(JumpId, Option<JumpNumber>)> {
        vec![(10, Some(1)), (11, Some(2)), (12, Some(3)), (13, None)]
    }

    #[test]
    fn conflict_ignores_excluded_record() {
        assert_eq!(
            find_conflict(set(), 2, None),
            Some(NumberConflict {
                number: 2,
                conflicting_id: 11
            })
        );
        assert_eq!(find_conflict(set(), 2, Some(11)), None);
        assert_eq!(find_conflict(set(), 9, None), None);
    }

    #[test]
    fn shift_plan_is_descending_and_skips_excluded() {
        let moves = plan_shift(set(), 2, Some(10));
        let ids: Vec<_> = moves.iter().map(|m| (m.id, m.from, m.to)).collect();
        assert_eq!(ids, vec![(12, 3, 4), (11, 2, 3)]);

        let moves = plan_shift(set(), 2, Some(11));
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].id, 12);
    }

    #[test]
    fn shift_onto_edited_record_is_detected() {
        // Editing id 12 (number 3) down to 2: id 11 moves 2 -> 3.
        let moves = plan_shift(set(), 2, Some(12));
        assert!(lands_on_excluded(&moves, Some(3)));
        assert!(!lands_on_excluded(&moves, Some(1)));
        assert!(!lands_on_excluded(&moves, None));
    }

    #[test]
    fn next_number_defaults_to_one() {
        assert_eq!(next_number(Vec::<Option<JumpNumber>>::new()), 1);
        assert_eq!(next_number(vec![None, Some(7), Some(3)]), 8);
    }

    #[test]
    fn duplicates_are_reported_once() {
        assert_eq!(duplicate_numbers(vec![Some(1), Some(2), Some(1), Some(1), None, None]), vec![1]);
    }
}
