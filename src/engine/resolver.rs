//! Save pipeline: conflict check, capability query, atomic shift, upsert.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    core::numbering::NumberConflict,
    jump::JumpRecord,
    persist::{JumpRepository, StorageError},
    types::{JumpId, JumpNumber},
};

use super::blocking;

/// What to do when the requested number is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShiftPolicy {
    /// Fail with [`SaveError::NumberConflict`].
    #[default]
    Reject,
    /// Shift conflicting and later numbers up by one, when the store allows it.
    Shift,
}

/// Why a save did not complete.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The number is taken and no shift was performed.
    #[error("jump number {} is already used by jump {}", .conflict.number, .conflict.conflicting_id)]
    NumberConflict {
        /// The detected conflict.
        conflict: NumberConflict,
        /// Whether retrying with [`ShiftPolicy::Shift`] can succeed.
        shift_supported: bool,
    },
    /// The atomic shift failed; nothing was renumbered.
    #[error("shifting jump numbers failed: {0}")]
    ShiftFailed(#[source] StorageError),
    /// The capability query or the final upsert failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A shift the store committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedShift {
    /// Lowest renumbered value.
    pub threshold: JumpNumber,
    /// Record kept out of the shift.
    pub exclude: Option<JumpId>,
    /// Records renumbered.
    pub shifted: usize,
}

/// Result of [`save_with_resolution`].
///
/// `shift` is reported even when the upsert afterwards fails, so callers can
/// mirror the committed renumbering.
#[derive(Debug)]
pub struct SaveReport {
    /// Shift committed during this save.
    pub shift: Option<CommittedShift>,
    /// Saved id, or the failure.
    pub result: Result<JumpId, SaveError>,
}

/// Whether the store can renumber.
pub async fn shift_capability(repo: &Arc<dyn JumpRepository>) -> Result<bool, StorageError> {
    blocking(repo, |r| Ok(r.supports_number_shift())).await
}

/// Runs the all-or-nothing shift of every number `>= threshold` except `exclude`.
pub async fn shift_up(
    repo: &Arc<dyn JumpRepository>,
    threshold: JumpNumber,
    exclude: Option<JumpId>,
) -> Result<CommittedShift, SaveError> {
    let shifted = blocking(repo, move |r| r.shift_numbers_up_from(threshold, exclude))
        .await
        .map_err(SaveError::ShiftFailed)?;
    Ok(CommittedShift {
        threshold,
        exclude,
        shifted,
    })
}

/// Saves `record`, resolving `conflict` (detected against the loaded set) per `policy`.
pub async fn save_with_resolution(
    repo: &Arc<dyn JumpRepository>,
    conflict: Option<NumberConflict>,
    record: JumpRecord,
    policy: ShiftPolicy,
) -> SaveReport {
    let mut shift = None;

    if let Some(conflict) = conflict {
        let supported = match shift_capability(repo).await {
            Ok(supported) => supported,
            Err(err) => {
                return SaveReport {
                    shift,
                    result: Err(err.into()),
                };
            }
        };

        if !supported || policy == ShiftPolicy::Reject {
            debug!(
                number = conflict.number,
                conflicting_id = conflict.conflicting_id,
                shift_supported = supported,
                "rejecting save on number conflict"
            );
            return SaveReport {
                shift,
                result: Err(SaveError::NumberConflict {
                    conflict,
                    shift_supported: supported,
                }),
            };
        }

        match shift_up(repo, conflict.number, record.id).await {
            Ok(committed) => {
                info!(
                    threshold = committed.threshold,
                    shifted = committed.shifted,
                    "shifted jump numbers"
                );
                shift = Some(committed);
            }
            Err(err) => {
                return SaveReport {
                    shift,
                    result: Err(err),
                };
            }
        }
    }

    let result = blocking(repo, move |r| r.upsert(&record))
        .await
        .map_err(SaveError::from);
    SaveReport { shift, result }
}
