//! Synchronous list state and the pure helpers it is built from.

/// Single expanded entry tracking.
pub mod expansion;
/// Query parsing and matching.
pub mod filter;
/// Jump-number conflict detection and shift planning.
pub mod numbering;
/// Full set, filtered subset and counts.
pub mod state;
/// View entries and hydration payloads.
pub mod view;
