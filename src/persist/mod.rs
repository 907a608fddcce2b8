//! Repository contract consumed by the logbook core.

/// Hashbrown-backed repository.
pub mod memory;
/// SQLite-backed repository.
pub mod sqlite;

use thiserror::Error;

use crate::{
    jump::{ExitObject, JumpRecord, JumpType},
    types::{JumpId, JumpNumber, JumpTypeId, ObjectId},
};

/// Failure of any repository operation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// An update referenced a record that does not exist.
    #[error("jump {0} not found")]
    MissingJump(JumpId),
    /// Another record already holds this jump number.
    #[error("jump number {0} is already taken")]
    DuplicateNumber(JumpNumber),
    /// The store cannot renumber jumps.
    #[error("number shift is not supported by this store")]
    ShiftUnsupported,
    /// The repository lock was poisoned by a panicking writer.
    #[error("repository lock poisoned")]
    Poisoned,
    /// A blocking worker failed before producing a result.
    #[error("storage worker failed: {0}")]
    Worker(String),
    /// Any other store-specific failure.
    #[error("{0}")]
    Message(String),
}

/// Result alias for repository calls.
pub type RepoResult<T> = Result<T, StorageError>;

/// Generic CRUD contract for jump storage.
///
/// Implementations are synchronous; the runtime drives them from
/// `spawn_blocking` workers so callers never block.
pub trait JumpRepository: Send + Sync {
    /// All jump records in [`crate::jump::listing_order`].
    fn get_all(&self) -> RepoResult<Vec<JumpRecord>>;
    /// One jump record by id.
    fn get_by_id(&self, id: JumpId) -> RepoResult<Option<JumpRecord>>;
    /// Inserts when `record.id` is `None`, otherwise updates. Returns the id.
    fn upsert(&self, record: &JumpRecord) -> RepoResult<JumpId>;
    /// Removes a record, returning how many rows went away.
    fn delete(&self, id: JumpId) -> RepoResult<usize>;
    /// Exit object by id.
    fn get_object(&self, id: ObjectId) -> RepoResult<Option<ExitObject>>;
    /// Thumbnail image bytes for an exit object.
    fn get_object_thumbnail(&self, object_id: ObjectId) -> RepoResult<Option<Vec<u8>>>;
    /// Jump type by id.
    fn get_jump_type(&self, id: JumpTypeId) -> RepoResult<Option<JumpType>>;

    /// Whether [`JumpRepository::shift_numbers_up_from`] may be used.
    fn supports_number_shift(&self) -> bool {
        false
    }

    /// Adds one to every jump number `>= threshold`, skipping `exclude`.
    ///
    /// Must be all-or-nothing. When a shifted number lands on the current
    /// number of `exclude`, that record's number is cleared so the caller can
    /// reassign it. Returns the number of shifted records.
    fn shift_numbers_up_from(
        &self,
        _threshold: JumpNumber,
        _exclude: Option<JumpId>,
    ) -> RepoResult<usize> {
        Err(StorageError::ShiftUnsupported)
    }
}
