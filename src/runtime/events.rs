//! Runtime event stream payloads.

use crate::{
    core::{state::Counts, view::EntryField},
    types::{Generation, JumpId},
};

/// Events emitted from the single-writer runtime loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpEvent {
    /// The busy flag changed.
    BusyChanged {
        /// New value.
        busy: bool,
    },
    /// A load replaced the full set; entries are not hydrated yet.
    Loaded {
        /// Generation of the new full set.
        generation: Generation,
        /// Counts after the load.
        counts: Counts,
    },
    /// A load failed; the previous full set is still in place.
    LoadFailed {
        /// Error text.
        message: String,
    },
    /// The filtered subset was recomputed.
    FilterChanged {
        /// Query as entered.
        query: String,
        /// Counts after the recompute.
        counts: Counts,
    },
    /// Fields of one entry changed.
    EntryChanged {
        /// Entry id.
        id: JumpId,
        /// Changed fields.
        fields: Vec<EntryField>,
    },
    /// Hydration of one entry failed; it was shown without exit data.
    HydrationFailed {
        /// Entry id.
        id: JumpId,
        /// Error text.
        message: String,
    },
    /// Every hydration job of a generation has completed.
    HydrationFinished {
        /// Generation that finished.
        generation: Generation,
    },
    /// A record was saved.
    Saved {
        /// Saved id.
        id: JumpId,
        /// Other records renumbered by the save.
        shifted: usize,
    },
    /// A record was deleted.
    Deleted {
        /// Deleted id.
        id: JumpId,
    },
}
