//! SQLite-backed jump repository.

use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::{
    core::numbering::{lands_on_excluded, plan_shift},
    jump::{listing_order, ExitObject, JumpRecord, JumpType},
    types::{JumpId, JumpNumber, JumpTypeId, ObjectId},
};

use super::{JumpRepository, RepoResult, StorageError};

const JUMP_COLUMNS: &str = "id, jump_number, jump_date, notes, object_id, delay_seconds, \
     jump_type_id, deployment_type_id, slider_type_id";

/// Open-time options for [`SqliteRepository`].
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    /// Allow renumbering. This is the store's whole shift capability; the
    /// schema is fixed, so a database missing `jumps.jump_number` fails to open.
    pub allow_number_shift: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            allow_number_shift: true,
        }
    }
}

/// SQLite implementation of [`crate::persist::JumpRepository`].
///
/// The connection sits behind a mutex so the repository can be shared as
/// `Arc<dyn JumpRepository>` across blocking workers.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
    number_shift: bool,
}

impl SqliteRepository {
    /// Opens or creates a database at `path` with default options.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::open_with(path, SqliteOptions::default())
    }

    /// Opens or creates a database at `path`.
    pub fn open_with(path: impl AsRef<Path>, options: SqliteOptions) -> RepoResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn, options)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn, SqliteOptions::default())
    }

    fn init_connection(conn: Connection, options: SqliteOptions) -> RepoResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self {
            conn: Mutex::new(conn),
            number_shift: options.allow_number_shift,
        })
    }

    /// Adds or replaces an exit object, keeping any stored thumbnail.
    pub fn put_object(&self, object: &ExitObject) -> RepoResult<()> {
        self.lock()?.execute(
            "INSERT INTO exit_objects(id, name, region, latitude, longitude, height) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(id) DO UPDATE SET \
              name=excluded.name, region=excluded.region, latitude=excluded.latitude, \
              longitude=excluded.longitude, height=excluded.height",
            params![
                object.id,
                object.name,
                object.region,
                object.latitude,
                object.longitude,
                object.height,
            ],
        )?;
        Ok(())
    }

    /// Stores thumbnail bytes on an existing exit object.
    pub fn put_thumbnail(&self, object_id: ObjectId, bytes: &[u8]) -> RepoResult<()> {
        let changed = self.lock()?.execute(
            "UPDATE exit_objects SET thumbnail = ?1 WHERE id = ?2",
            params![bytes, object_id],
        )?;
        if changed == 0 {
            return Err(StorageError::Message(format!("exit object {object_id} not found")));
        }
        Ok(())
    }

    /// Removes an exit object. Jumps keep their dangling reference.
    pub fn remove_object(&self, id: ObjectId) -> RepoResult<bool> {
        let changed = self
            .lock()?
            .execute("DELETE FROM exit_objects WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Adds or replaces a jump type.
    pub fn put_jump_type(&self, jump_type: &JumpType) -> RepoResult<()> {
        self.lock()?.execute(
            "INSERT INTO jump_types(id, name) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET name=excluded.name",
            params![jump_type.id, jump_type.name],
        )?;
        Ok(())
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl JumpRepository for SqliteRepository {
    fn get_all(&self) -> RepoResult<Vec<JumpRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {JUMP_COLUMNS} FROM jumps"))?;
        let rows = stmt.query_map([], jump_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        out.sort_by(listing_order);
        Ok(out)
    }

    fn get_by_id(&self, id: JumpId) -> RepoResult<Option<JumpRecord>> {
        let rec = self
            .lock()?
            .query_row(
                &format!("SELECT {JUMP_COLUMNS} FROM jumps WHERE id = ?1"),
                params![id],
                jump_from_row,
            )
            .optional()?;
        Ok(rec)
    }

    fn upsert(&self, record: &JumpRecord) -> RepoResult<JumpId> {
        let conn = self.lock()?;
        let result = match record.id {
            None => conn
                .execute(
                    "INSERT INTO jumps(jump_number, jump_date, notes, object_id, delay_seconds, \
                      jump_type_id, deployment_type_id, slider_type_id) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        record.jump_number,
                        record.jump_date_raw,
                        record.notes,
                        record.object_id,
                        record.delay_seconds,
                        record.jump_type_id,
                        record.deployment_type_id,
                        record.slider_type_id,
                    ],
                )
                .map(|_| conn.last_insert_rowid()),
            Some(id) => conn
                .execute(
                    "UPDATE jumps SET jump_number = ?1, jump_date = ?2, notes = ?3, object_id = ?4, \
                      delay_seconds = ?5, jump_type_id = ?6, deployment_type_id = ?7, \
                      slider_type_id = ?8 \
                     WHERE id = ?9",
                    params![
                        record.jump_number,
                        record.jump_date_raw,
                        record.notes,
                        record.object_id,
                        record.delay_seconds,
                        record.jump_type_id,
                        record.deployment_type_id,
                        record.slider_type_id,
                        id,
                    ],
                )
                .and_then(|changed| {
                    if changed == 0 {
                        Err(rusqlite::Error::QueryReturnedNoRows)
                    } else {
                        Ok(id)
                    }
                }),
        };

        result.map_err(|err| match (err, record.id, record.jump_number) {
            (rusqlite::Error::QueryReturnedNoRows, Some(id), _) => StorageError::MissingJump(id),
            (rusqlite::Error::SqliteFailure(e, _), _, Some(n)) if e.code == ErrorCode::ConstraintViolation => {
                StorageError::DuplicateNumber(n)
            }
            (other, _, _) => StorageError::Sqlite(other),
        })
    }

    fn delete(&self, id: JumpId) -> RepoResult<usize> {
        let count = self
            .lock()?
            .execute("DELETE FROM jumps WHERE id = ?1", params![id])?;
        Ok(count)
    }

    fn get_object(&self, id: ObjectId) -> RepoResult<Option<ExitObject>> {
        let object = self
            .lock()?
            .query_row(
                "SELECT id, name, region, latitude, longitude, height FROM exit_objects WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ExitObject {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        region: row.get(2)?,
                        latitude: row.get(3)?,
                        longitude: row.get(4)?,
                        height: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(object)
    }

    fn get_object_thumbnail(&self, object_id: ObjectId) -> RepoResult<Option<Vec<u8>>> {
        let bytes: Option<Option<Vec<u8>>> = self
            .lock()?
            .query_row(
                "SELECT thumbnail FROM exit_objects WHERE id = ?1",
                params![object_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.flatten())
    }

    fn get_jump_type(&self, id: JumpTypeId) -> RepoResult<Option<JumpType>> {
        let jump_type = self
            .lock()?
            .query_row(
                "SELECT id, name FROM jump_types WHERE id = ?1",
                params![id],
                |row| {
                    Ok(JumpType {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(jump_type)
    }

    fn supports_number_shift(&self) -> bool {
        self.number_shift
    }

    fn shift_numbers_up_from(&self, threshold: JumpNumber, exclude: Option<JumpId>) -> RepoResult<usize> {
        if !self.number_shift {
            return Err(StorageError::ShiftUnsupported);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let moves = {
            let mut stmt = tx.prepare("SELECT id, jump_number FROM jumps WHERE jump_number >= ?1")?;
            let rows = stmt.query_map(params![threshold], |row| {
                Ok((row.get::<_, JumpId>(0)?, row.get::<_, Option<JumpNumber>>(1)?))
            })?;
            let mut current = Vec::new();
            for row in rows {
                current.push(row?);
            }
            plan_shift(current, threshold, exclude)
        };

        if let Some(id) = exclude {
            let excluded_number: Option<JumpNumber> = tx
                .query_row("SELECT jump_number FROM jumps WHERE id = ?1", params![id], |row| {
                    row.get::<_, Option<JumpNumber>>(0)
                })
                .optional()?
                .flatten();
            if lands_on_excluded(&moves, excluded_number) {
                tx.execute("UPDATE jumps SET jump_number = NULL WHERE id = ?1", params![id])?;
            }
        }

        // Row-at-a-time in descending order: the unique index is checked per row.
        {
            let mut stmt = tx.prepare("UPDATE jumps SET jump_number = ?1 WHERE id = ?2")?;
            for mv in &moves {
                stmt.execute(params![mv.to, mv.id])?;
            }
        }
        tx.commit()?;

        Ok(moves.len())
    }
}

fn jump_from_row(row: &Row<'_>) -> rusqlite::Result<JumpRecord> {
    Ok(JumpRecord {
        id: row.get(0)?,
        jump_number: row.get(1)?,
        jump_date_raw: row.get(2)?,
        notes: row.get(3)?,
        object_id: row.get(4)?,
        delay_seconds: row.get(5)?,
        jump_type_id: row.get(6)?,
        deployment_type_id: row.get(7)?,
        slider_type_id: row.get(8)?,
    })
}
