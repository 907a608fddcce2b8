//! Authoritative list state: full set, filtered subset, query, expansion.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    jump::{listing_order, JumpRecord},
    types::{Generation, JumpId, JumpNumber},
};

use super::{
    expansion::{ExpansionChange, ExpansionTracker},
    filter::{filter_ids, JumpQuery},
    numbering::{self, NumberConflict},
    view::{DateDisplay, Hydration, HydrationJob, JumpViewEntry},
};

/// Total and visible entry counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counts {
    /// Size of the full set.
    pub total: usize,
    /// Size of the filtered subset.
    pub filtered: usize,
}

/// Outcome of applying one hydration result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrationApplied {
    /// The entry was updated.
    pub applied: bool,
    /// This was the last outstanding job of the current generation.
    pub finished: bool,
    /// The entry's filter membership changed and the subset was recomputed.
    pub filter_changed: bool,
}

/// Authoritative in-memory jump list.
///
/// The full set is only replaced by [`JumpListState::replace_all`]; the
/// filtered subset is recomputed from it after every mutation.
#[derive(Debug, Default)]
pub struct JumpListState {
    entries: Vec<JumpViewEntry>,
    pos: HashMap<JumpId, usize>,
    filtered: Vec<JumpId>,
    query: JumpQuery,
    expansion: ExpansionTracker,
    generation: Generation,
    pending_hydrations: usize,
    hydration_finished: bool,
    busy: bool,
    display: DateDisplay,
}

impl JumpListState {
    /// Empty state rendering dates with `display`.
    pub fn new(display: DateDisplay) -> Self {
        Self {
            display,
            hydration_finished: true,
            ..Self::default()
        }
    }

    /// Marks a load as started. Returns false when one is already running.
    pub fn try_begin_load(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Clears the busy flag.
    pub fn end_load(&mut self) {
        self.busy = false;
    }

    /// Replaces the full set with a fresh generation built from `records`.
    ///
    /// Returns one hydration job per entry.
    pub fn replace_all(&mut self, records: Vec<JumpRecord>) -> Vec<HydrationJob> {
        self.generation += 1;
        let generation = self.generation;

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            match JumpViewEntry::new(record, generation, &self.display) {
                Some(entry) => entries.push(entry),
                None => warn!("skipping jump record without id"),
            }
        }

        let dupes = numbering::duplicate_numbers(entries.iter().map(|e| e.record().jump_number));
        if !dupes.is_empty() {
            warn!(?dupes, "loaded jumps share numbers");
        }

        self.entries = entries;
        self.rebuild_positions();

        let pos = &self.pos;
        if let Some(id) = self.expansion.carry_over(|id| pos.contains_key(&id)) {
            if let Some(&i) = self.pos.get(&id) {
                self.entries[i].set_expanded(true);
            }
        }

        self.recompute_filter();

        let jobs: Vec<HydrationJob> = self.entries.iter().map(JumpViewEntry::hydration_job).collect();
        self.pending_hydrations = jobs.len();
        self.hydration_finished = jobs.is_empty();
        jobs
    }

    /// Applies a hydration result if it still belongs to the current full set.
    ///
    /// `finished` is reported once per generation; jobs issued by
    /// [`JumpListState::upsert_record`] after that do not report it again.
    pub fn apply_hydration(&mut self, job: &HydrationJob, hydration: Hydration) -> HydrationApplied {
        if job.generation != self.generation {
            debug!(
                id = job.id,
                job_generation = job.generation,
                current = self.generation,
                "discarding stale hydration"
            );
            return HydrationApplied {
                applied: false,
                finished: false,
                filter_changed: false,
            };
        }

        let counted = !self.hydration_finished;
        if counted {
            self.pending_hydrations = self.pending_hydrations.saturating_sub(1);
        }
        let finished = counted && self.pending_hydrations == 0;
        if finished {
            self.hydration_finished = true;
        }

        let mut filter_changed = false;
        let applied = match self.pos.get(&job.id) {
            Some(&i) if self.entries[i].record().linked_object() == job.object_id => {
                let was_visible = self.query.matches(&self.entries[i]);
                self.entries[i].apply_hydration(hydration);
                if self.query.matches(&self.entries[i]) != was_visible {
                    self.recompute_filter();
                    filter_changed = true;
                }
                true
            }
            _ => {
                debug!(id = job.id, "hydration target changed or removed");
                false
            }
        };

        HydrationApplied {
            applied,
            finished,
            filter_changed,
        }
    }

    /// Sets the query and recomputes the filtered subset.
    pub fn set_query(&mut self, raw: &str) -> Counts {
        self.query = JumpQuery::parse(raw);
        self.recompute_filter();
        self.counts()
    }

    /// Flips the expansion of `id`. `None` when the id is unknown.
    pub fn toggle_expand(&mut self, id: JumpId) -> Option<ExpansionChange> {
        let &i = self.pos.get(&id)?;
        let currently_expanded = self.entries[i].is_expanded();

        let entries = &mut self.entries;
        let pos = &self.pos;
        let change = self.expansion.toggle(id, currently_expanded, |target, on| {
            if let Some(&j) = pos.get(&target) {
                entries[j].set_expanded(on);
            }
        });
        let visible = &self.filtered;
        self.expansion.on_visibility(|id| visible.contains(&id));
        Some(change)
    }

    /// Another loaded record already using `number`, ignoring `exclude`.
    pub fn find_conflict(&self, number: JumpNumber, exclude: Option<JumpId>) -> Option<NumberConflict> {
        numbering::find_conflict(self.number_pairs(), number, exclude)
    }

    /// Highest loaded number plus one.
    pub fn next_jump_number(&self) -> JumpNumber {
        numbering::next_number(self.entries.iter().map(|e| e.record().jump_number))
    }

    /// Mirrors a committed store shift onto the loaded entries.
    pub fn apply_shift(&mut self, threshold: JumpNumber, exclude: Option<JumpId>) -> usize {
        let moves = numbering::plan_shift(self.number_pairs(), threshold, exclude);
        if let Some(&i) = exclude.and_then(|id| self.pos.get(&id)) {
            if numbering::lands_on_excluded(&moves, self.entries[i].record().jump_number) {
                self.entries[i].set_jump_number(None);
            }
        }
        for mv in &moves {
            if let Some(&i) = self.pos.get(&mv.id) {
                self.entries[i].set_jump_number(Some(mv.to));
            }
        }
        self.sort_entries();
        moves.len()
    }

    /// Inserts or replaces the entry for a saved record.
    ///
    /// Returns a job when the entry needs (re)hydration.
    pub fn upsert_record(&mut self, record: JumpRecord) -> Option<HydrationJob> {
        let mut entry = JumpViewEntry::new(record, self.generation, &self.display)?;
        let existing = self.pos.get(&entry.id()).copied();
        if let Some(i) = existing {
            entry.inherit_from(&self.entries[i]);
        }

        let job = (!entry.is_hydrated()).then(|| entry.hydration_job());
        match existing {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
        self.sort_entries();

        if job.is_some() && !self.hydration_finished {
            self.pending_hydrations += 1;
        }
        job
    }

    /// Removes an entry. Returns false when it was not loaded.
    pub fn remove(&mut self, id: JumpId) -> bool {
        let Some(i) = self.pos.get(&id).copied() else {
            return false;
        };
        self.entries.remove(i);
        self.expansion.forget(id);
        self.rebuild_positions();
        self.recompute_filter();
        true
    }

    /// Full set in listing order.
    pub fn entries(&self) -> &[JumpViewEntry] {
        &self.entries
    }

    /// Filtered subset in listing order.
    pub fn filtered_entries(&self) -> Vec<&JumpViewEntry> {
        self.filtered
            .iter()
            .filter_map(|id| self.get(*id))
            .collect()
    }

    /// Filtered ids in listing order.
    pub fn filtered_ids(&self) -> &[JumpId] {
        &self.filtered
    }

    /// One loaded entry.
    pub fn get(&self, id: JumpId) -> Option<&JumpViewEntry> {
        self.pos.get(&id).map(|&i| &self.entries[i])
    }

    /// Current counts.
    pub fn counts(&self) -> Counts {
        Counts {
            total: self.entries.len(),
            filtered: self.filtered.len(),
        }
    }

    /// Current query.
    pub fn query(&self) -> &JumpQuery {
        &self.query
    }

    /// Whether a load is running.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Generation of the current full set.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Visible expanded entry.
    pub fn expanded_id(&self) -> Option<JumpId> {
        self.expansion.current()
    }

    /// Outstanding hydration jobs of the current generation.
    pub fn pending_hydrations(&self) -> usize {
        self.pending_hydrations
    }

    fn number_pairs(&self) -> impl Iterator<Item = (JumpId, Option<JumpNumber>)> + '_ {
        self.entries.iter().map(|e| (e.id(), e.record().jump_number))
    }

    fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| listing_order(a.record(), b.record()));
        self.rebuild_positions();
        self.recompute_filter();
    }

    fn rebuild_positions(&mut self) {
        self.pos.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.pos.insert(entry.id(), i);
        }
    }

    fn recompute_filter(&mut self) {
        self.filtered = filter_ids(&self.entries, &self.query);
        let visible: hashbrown::HashSet<JumpId> = self.filtered.iter().copied().collect();
        self.expansion.on_visibility(|id| visible.contains(&id));
    }
}
