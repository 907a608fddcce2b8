//! In-memory repository for hosts without a database, and for tests.

use std::sync::{Mutex, MutexGuard};

use hashbrown::HashMap;

use crate::{
    core::numbering::{find_conflict, lands_on_excluded, plan_shift},
    jump::{listing_order, ExitObject, JumpRecord, JumpType},
    types::{JumpId, JumpNumber, JumpTypeId, ObjectId},
};

use super::{JumpRepository, RepoResult, StorageError};

#[derive(Debug, Default)]
struct Tables {
    jumps: HashMap<JumpId, JumpRecord>,
    objects: HashMap<ObjectId, ExitObject>,
    thumbnails: HashMap<ObjectId, Vec<u8>>,
    jump_types: HashMap<JumpTypeId, JumpType>,
    next_jump_id: JumpId,
}

/// Hashbrown-backed [`JumpRepository`].
///
/// Enforces unique jump numbers on upsert, like the SQLite schema does.
#[derive(Debug)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    number_shift: bool,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    /// Empty repository that supports number shifting.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                next_jump_id: 1,
                ..Tables::default()
            }),
            number_shift: true,
        }
    }

    /// Empty repository that reports no shift capability.
    pub fn without_number_shift() -> Self {
        Self {
            number_shift: false,
            ..Self::new()
        }
    }

    /// Adds or replaces an exit object.
    pub fn put_object(&self, object: ExitObject) -> RepoResult<()> {
        self.lock()?.objects.insert(object.id, object);
        Ok(())
    }

    /// Removes an exit object and its thumbnail. Jumps keep their dangling reference.
    pub fn remove_object(&self, id: ObjectId) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        tables.thumbnails.remove(&id);
        Ok(tables.objects.remove(&id).is_some())
    }

    /// Sets the thumbnail bytes of an exit object.
    pub fn put_thumbnail(&self, object_id: ObjectId, bytes: Vec<u8>) -> RepoResult<()> {
        self.lock()?.thumbnails.insert(object_id, bytes);
        Ok(())
    }

    /// Adds or replaces a jump type.
    pub fn put_jump_type(&self, jump_type: JumpType) -> RepoResult<()> {
        self.lock()?.jump_types.insert(jump_type.id, jump_type);
        Ok(())
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl JumpRepository for MemoryRepository {
    fn get_all(&self) -> RepoResult<Vec<JumpRecord>> {
        let tables = self.lock()?;
        let mut out: Vec<JumpRecord> = tables.jumps.values().cloned().collect();
        out.sort_by(listing_order);
        Ok(out)
    }

    fn get_by_id(&self, id: JumpId) -> RepoResult<Option<JumpRecord>> {
        Ok(self.lock()?.jumps.get(&id).cloned())
    }

    fn upsert(&self, record: &JumpRecord) -> RepoResult<JumpId> {
        let mut tables = self.lock()?;

        if let Some(number) = record.jump_number {
            let taken = find_conflict(
                tables.jumps.values().filter_map(|r| Some((r.id?, r.jump_number))),
                number,
                record.id,
            );
            if taken.is_some() {
                return Err(StorageError::DuplicateNumber(number));
            }
        }

        let id = match record.id {
            Some(id) => {
                if !tables.jumps.contains_key(&id) {
                    return Err(StorageError::MissingJump(id));
                }
                id
            }
            None => {
                let id = tables.next_jump_id;
                tables.next_jump_id += 1;
                id
            }
        };

        let mut stored = record.clone();
        stored.id = Some(id);
        tables.jumps.insert(id, stored);
        Ok(id)
    }

    fn delete(&self, id: JumpId) -> RepoResult<usize> {
        Ok(usize::from(self.lock()?.jumps.remove(&id).is_some()))
    }

    fn get_object(&self, id: ObjectId) -> RepoResult<Option<ExitObject>> {
        Ok(self.lock()?.objects.get(&id).cloned())
    }

    fn get_object_thumbnail(&self, object_id: ObjectId) -> RepoResult<Option<Vec<u8>>> {
        Ok(self.lock()?.thumbnails.get(&object_id).cloned())
    }

    fn get_jump_type(&self, id: JumpTypeId) -> RepoResult<Option<JumpType>> {
        Ok(self.lock()?.jump_types.get(&id).cloned())
    }

    fn supports_number_shift(&self) -> bool {
        self.number_shift
    }

    fn shift_numbers_up_from(&self, threshold: JumpNumber, exclude: Option<JumpId>) -> RepoResult<usize> {
        if !self.number_shift {
            return Err(StorageError::ShiftUnsupported);
        }
        let mut tables = self.lock()?;
        let moves = plan_shift(
            tables.jumps.values().filter_map(|r| Some((r.id?, r.jump_number))),
            threshold,
            exclude,
        );

        // Staged on a copy and swapped in whole.
        let mut staged = tables.jumps.clone();
        if let Some(rec) = exclude.and_then(|id| staged.get_mut(&id)) {
            if lands_on_excluded(&moves, rec.jump_number) {
                rec.jump_number = None;
            }
        }
        for mv in &moves {
            let rec = staged.get_mut(&mv.id).ok_or(StorageError::MissingJump(mv.id))?;
            rec.jump_number = Some(mv.to);
        }
        tables.jumps = staged;
        Ok(moves.len())
    }
}
