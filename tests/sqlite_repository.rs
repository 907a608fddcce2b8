use jumplog::{
    jump::{ExitObject, JumpRecord, JumpType},
    persist::{
        sqlite::{SqliteOptions, SqliteRepository},
        JumpRepository, StorageError,
    },
};
use tempfile::TempDir;

fn seeded(dir: &TempDir, numbers: &[i64]) -> SqliteRepository {
    let repo = SqliteRepository::open(dir.path().join("logbook.db")).expect("open");
    for n in numbers {
        repo.upsert(&JumpRecord {
            jump_number: Some(*n),
            ..JumpRecord::default()
        })
        .expect("seed");
    }
    repo
}

fn numbers(repo: &SqliteRepository) -> Vec<(i64, Option<i64>)> {
    repo.get_all()
        .expect("all")
        .into_iter()
        .map(|r| (r.id.expect("id"), r.jump_number))
        .collect()
}

#[test]
fn crud_round_trip_and_listing_order() {
    let dir = TempDir::new().expect("tempdir");
    let repo = seeded(&dir, &[]);

    let first = repo
        .upsert(&JumpRecord {
            jump_number: Some(1),
            jump_date_raw: Some(500_000_000),
            notes: Some("first".to_string()),
            object_id: Some(3),
            delay_seconds: Some(45),
            jump_type_id: Some(2),
            ..JumpRecord::default()
        })
        .expect("insert");
    let undated = repo
        .upsert(&JumpRecord {
            jump_number: None,
            ..JumpRecord::default()
        })
        .expect("insert");
    let second = repo
        .upsert(&JumpRecord {
            jump_number: Some(2),
            ..JumpRecord::default()
        })
        .expect("insert");

    let loaded = repo.get_by_id(first).expect("get").expect("exists");
    assert_eq!(loaded.notes.as_deref(), Some("first"));
    assert_eq!(loaded.delay_seconds, Some(45));
    assert_eq!(loaded.jump_date_raw, Some(500_000_000));

    let order: Vec<_> = numbers(&repo).into_iter().map(|(id, _)| id).collect();
    assert_eq!(order, vec![second, first, undated]);

    let mut edited = loaded;
    edited.notes = Some("edited".to_string());
    assert_eq!(repo.upsert(&edited).expect("update"), first);
    assert_eq!(
        repo.get_by_id(first).expect("get").expect("exists").notes.as_deref(),
        Some("edited")
    );

    assert_eq!(repo.delete(first).expect("delete"), 1);
    assert_eq!(repo.delete(first).expect("delete"), 0);
    assert!(repo.get_by_id(first).expect("get").is_none());
}

#[test]
fn update_of_missing_row_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let repo = seeded(&dir, &[]);
    let err = repo
        .upsert(&JumpRecord {
            id: Some(77),
            jump_number: Some(1),
            ..JumpRecord::default()
        })
        .expect_err("missing");
    assert!(matches!(err, StorageError::MissingJump(77)));
}

#[test]
fn duplicate_number_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let repo = seeded(&dir, &[1, 2]);
    let err = repo
        .upsert(&JumpRecord {
            jump_number: Some(2),
            ..JumpRecord::default()
        })
        .expect_err("duplicate");
    assert!(matches!(err, StorageError::DuplicateNumber(2)));
    assert_eq!(numbers(&repo).len(), 2);
}

#[test]
fn shift_moves_numbers_through_the_unique_index() {
    let dir = TempDir::new().expect("tempdir");
    let repo = seeded(&dir, &[1, 2, 3, 4]);
    assert!(repo.supports_number_shift());

    assert_eq!(repo.shift_numbers_up_from(2, None).expect("shift"), 3);
    assert_eq!(
        numbers(&repo),
        vec![(4, Some(5)), (3, Some(4)), (2, Some(3)), (1, Some(1))]
    );

    repo.upsert(&JumpRecord {
        jump_number: Some(2),
        ..JumpRecord::default()
    })
    .expect("insert at freed number");
}

#[test]
fn shift_onto_edited_record_releases_its_number() {
    let dir = TempDir::new().expect("tempdir");
    // ids 1..=3 hold numbers 1..=3; jump 3 is being renumbered to 2.
    let repo = seeded(&dir, &[1, 2, 3]);

    assert_eq!(repo.shift_numbers_up_from(2, Some(3)).expect("shift"), 1);
    let after = repo.get_by_id(3).expect("get").expect("exists");
    assert_eq!(after.jump_number, None);

    repo.upsert(&JumpRecord {
        jump_number: Some(2),
        ..after
    })
    .expect("reassign");
    assert_eq!(numbers(&repo), vec![(2, Some(3)), (3, Some(2)), (1, Some(1))]);
}

#[test]
fn failed_shift_rolls_back_every_row() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("logbook.db");
    let repo = SqliteRepository::open(&path).expect("open");
    for n in 1..=5 {
        repo.upsert(&JumpRecord {
            jump_number: Some(n),
            ..JumpRecord::default()
        })
        .expect("seed");
    }

    let side = rusqlite::Connection::open(&path).expect("second connection");
    side.execute_batch(
        "CREATE TRIGGER fail_on_three BEFORE UPDATE OF jump_number ON jumps \
         WHEN NEW.jump_number = 3 \
         BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;",
    )
    .expect("trigger");
    drop(side);

    let before = numbers(&repo);
    let err = repo.shift_numbers_up_from(2, None).expect_err("aborted");
    assert!(matches!(err, StorageError::Sqlite(_)));
    assert_eq!(numbers(&repo), before);
}

#[test]
fn disabled_shift_is_unsupported() {
    let dir = TempDir::new().expect("tempdir");
    let repo = SqliteRepository::open_with(
        dir.path().join("logbook.db"),
        SqliteOptions {
            allow_number_shift: false,
        },
    )
    .expect("open");
    assert!(!repo.supports_number_shift());
    assert!(matches!(
        repo.shift_numbers_up_from(1, None),
        Err(StorageError::ShiftUnsupported)
    ));
}

#[test]
fn objects_thumbnails_and_jump_types() {
    let repo = SqliteRepository::open_in_memory().expect("open");
    repo.put_object(&ExitObject {
        id: 3,
        name: "Kjerag".to_string(),
        region: Some("Rogaland".to_string()),
        latitude: Some(59.03),
        longitude: Some(6.59),
        height: Some(984.0),
    })
    .expect("object");
    repo.put_thumbnail(3, &[9, 8, 7]).expect("thumbnail");
    assert!(repo.put_thumbnail(4, &[1]).is_err());

    let object = repo.get_object(3).expect("get").expect("exists");
    assert_eq!(object.region.as_deref(), Some("Rogaland"));
    assert_eq!(repo.get_object_thumbnail(3).expect("thumb"), Some(vec![9, 8, 7]));

    repo.put_jump_type(&JumpType {
        id: 1,
        name: "BASE".to_string(),
    })
    .expect("jump type");
    assert_eq!(repo.get_jump_type(1).expect("get").expect("exists").name, "BASE");

    assert!(repo.remove_object(3).expect("remove"));
    assert!(repo.get_object(3).expect("get").is_none());
    assert_eq!(repo.get_object_thumbnail(3).expect("thumb"), None);
}

#[test]
fn reopening_keeps_data() {
    let dir = TempDir::new().expect("tempdir");
    {
        seeded(&dir, &[1, 2]);
    }
    let repo = SqliteRepository::open(dir.path().join("logbook.db")).expect("reopen");
    assert_eq!(numbers(&repo).len(), 2);
}

#[test]
fn legacy_table_without_jump_number_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("legacy.db");
    let legacy = rusqlite::Connection::open(&path).expect("legacy db");
    legacy
        .execute_batch("CREATE TABLE jumps (id INTEGER PRIMARY KEY, jump_date INTEGER, notes TEXT);")
        .expect("legacy schema");
    drop(legacy);

    assert!(matches!(
        SqliteRepository::open(&path),
        Err(StorageError::Sqlite(_))
    ));
}

#[test]
fn shift_capability_follows_options() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("logbook.db");
    let repo = SqliteRepository::open_with(&path, SqliteOptions::default()).expect("open");
    assert!(repo.supports_number_shift());
    drop(repo);

    let repo = SqliteRepository::open_with(
        &path,
        SqliteOptions {
            allow_number_shift: false,
        },
    )
    .expect("reopen");
    assert!(!repo.supports_number_shift());
}
