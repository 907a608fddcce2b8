//! At-most-one expanded entry tracking.

use serde::{Deserialize, Serialize};

use crate::types::JumpId;

/// Entries whose `is_expanded` flag changed in one toggle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpansionChange {
    /// Entries collapsed, in order.
    pub collapsed: Vec<JumpId>,
    /// Entry expanded, if any.
    pub expanded: Option<JumpId>,
}

/// Tracks the single expanded entry by id.
///
/// `current` is the visible expanded entry. When filtering hides it, it moves
/// to `parked`: its flag stays set, but it is no longer the current pointer.
/// Expanding anything else collapses both, so the full set never holds two
/// expanded entries.
#[derive(Debug, Clone, Default)]
pub struct ExpansionTracker {
    current: Option<JumpId>,
    parked: Option<JumpId>,
}

impl ExpansionTracker {
    /// The visible expanded entry.
    pub fn current(&self) -> Option<JumpId> {
        self.current
    }

    /// The expanded entry hidden by the current filter.
    pub fn parked(&self) -> Option<JumpId> {
        self.parked
    }

    /// Flips `id`. `set_expanded` writes the flag on an entry.
    pub fn toggle<F>(&mut self, id: JumpId, currently_expanded: bool, mut set_expanded: F) -> ExpansionChange
    where
        F: FnMut(JumpId, bool),
    {
        let mut change = ExpansionChange::default();

        if currently_expanded {
            set_expanded(id, false);
            change.collapsed.push(id);
            if self.current == Some(id) {
                self.current = None;
            }
            if self.parked == Some(id) {
                self.parked = None;
            }
            return change;
        }

        for prev in [self.current.take(), self.parked.take()].into_iter().flatten() {
            if prev != id {
                set_expanded(prev, false);
                change.collapsed.push(prev);
            }
        }
        set_expanded(id, true);
        self.current = Some(id);
        change.expanded = Some(id);
        change
    }

    /// Re-evaluates the pointer after the visible subset changed.
    pub fn on_visibility<F>(&mut self, is_visible: F)
    where
        F: Fn(JumpId) -> bool,
    {
        match (self.current, self.parked) {
            (Some(id), _) if !is_visible(id) => {
                self.parked = Some(id);
                self.current = None;
            }
            (None, Some(id)) if is_visible(id) => {
                self.current = Some(id);
                self.parked = None;
            }
            _ => {}
        }
    }

    /// Drops any reference to `id`, e.g. after it was deleted.
    pub fn forget(&mut self, id: JumpId) {
        if self.current == Some(id) {
            self.current = None;
        }
        if self.parked == Some(id) {
            self.parked = None;
        }
    }

    /// Carries the expanded id across a reload when it still exists.
    ///
    /// Returns the id whose flag must be set on the fresh entries.
    pub fn carry_over<F>(&mut self, exists: F) -> Option<JumpId>
    where
        F: Fn(JumpId) -> bool,
    {
        let kept = self.current.or(self.parked).filter(|id| exists(*id));
        self.current = kept;
        self.parked = None;
        kept
    }
}

#[cfg(test)]
mod tests {
    use hashbrown::HashSet;

    use super::*;

    #[test]
    fn toggling_another_collapses_previous() {
        let mut tracker = ExpansionTracker::default();
        let mut expanded = HashSet::new();

        let change = tracker.toggle(1, false, |id, on| {
            if on {
                expanded.insert(id);
            } else {
                expanded.remove(&id);
            }
        });
        assert_eq!(change.expanded, Some(1));

        let change = tracker.toggle(2, false, |id, on| {
            if on {
                expanded.insert(id);
            } else {
                expanded.remove(&id);
            }
        });
        assert_eq!(change.collapsed, vec![1]);
        assert_eq!(tracker.current(), Some(2));
        assert_eq!(expanded.len(), 1);
    }

    #[test]
    fn hidden_entry_is_parked_then_restored() {
        let mut tracker = ExpansionTracker::default();
        tracker.toggle(5, false, |_, _| {});

        tracker.on_visibility(|id| id != 5);
        assert_eq!(tracker.current(), None);
        assert_eq!(tracker.parked(), Some(5));

        tracker.on_visibility(|_| true);
        assert_eq!(tracker.current(), Some(5));
        assert_eq!(tracker.parked(), None);
    }

    #[test]
    fn expanding_while_parked_collapses_parked() {
        let mut tracker = ExpansionTracker::default();
        tracker.toggle(5, false, |_, _| {});
        tracker.on_visibility(|id| id != 5);

        let change = tracker.toggle(6, false, |_, _| {});
        assert_eq!(change.collapsed, vec![5]);
        assert_eq!(tracker.parked(), None);
    }

    #[test]
    fn carry_over_drops_missing_ids() {
        let mut tracker = ExpansionTracker::default();
        tracker.toggle(5, false, |_, _| {});
        assert_eq!(tracker.carry_over(|_| false), None);
        assert_eq!(tracker.current(), None);
    }
}
