//! Concurrent migration tests
//!
//! Two runners pointed at the same database must never both compute a batch
//! number and apply the same files. The advisory lock makes the loser fail
//! fast with `Error::Locked` instead.
//!
//! Run with: cargo test --test concurrent_migration_test -- --nocapture

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::TempDir;

use oxygen_core::adapters::{DirectoryListing, DuckDbHandle, MigrationLock};
use oxygen_core::services::{MigrationLedger, MigrationRunner};
use oxygen_core::{Error, MigrationRegistry};

/// Number of concurrent runners
const THREAD_COUNT: usize = 6;

fn write_migrations(dir: &std::path::Path, count: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        let name = format!("2024_01_{:02}_000000_create_table_{}.sql", i + 1, i);
        let sql = format!(
            "-- up\nCREATE TABLE table_{i} (id INTEGER);\n-- down\nDROP TABLE table_{i};\n",
            i = i
        );
        std::fs::write(dir.join(name), sql).unwrap();
    }
}

/// A held lock makes migrate and rollback fail fast without touching the ledger
#[test]
fn test_held_lock_blocks_runner() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("app.duckdb");
    let migrations_dir = temp_dir.path().join("migrations");
    write_migrations(&migrations_dir, 2);

    let handle = DuckDbHandle::open(&db_path).unwrap();
    let mut registry = MigrationRegistry::new();
    registry.load_sql_dir(&migrations_dir).unwrap();
    let listing = DirectoryListing::new(&migrations_dir);
    let lock_path = MigrationLock::path_for_database(&db_path);
    let runner =
        MigrationRunner::new(&handle, &listing, &registry).with_lock_file(lock_path.clone());

    {
        let _held = MigrationLock::acquire(&lock_path).unwrap();
        assert!(matches!(runner.migrate(), Err(Error::Locked(_))));
        assert!(matches!(runner.rollback(), Err(Error::Locked(_))));
    }

    // Released on drop
    let report = runner.migrate().unwrap();
    assert_eq!(report.applied.len(), 2);
    assert!(lock_path.exists());
}

/// Several runners racing on one database apply every file exactly once
#[test]
fn test_concurrent_runners_apply_each_file_once() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("app.duckdb");
    let migrations_dir = temp_dir.path().join("migrations");
    write_migrations(&migrations_dir, 5);

    let handle = Arc::new(DuckDbHandle::open(&db_path).unwrap());
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));

    let workers: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let handle = Arc::clone(&handle);
            let barrier = Arc::clone(&barrier);
            let db_path = db_path.clone();
            let migrations_dir = migrations_dir.clone();

            thread::spawn(move || {
                let mut registry = MigrationRegistry::new();
                registry.load_sql_dir(&migrations_dir).unwrap();
                let listing = DirectoryListing::new(&migrations_dir);
                let runner = MigrationRunner::new(handle.as_ref(), &listing, &registry)
                    .with_lock_file(MigrationLock::path_for_database(&db_path));

                barrier.wait();
                runner.migrate().map(|report| report.applied)
            })
        })
        .collect();

    let mut applied = Vec::new();
    for worker in workers {
        match worker.join().unwrap() {
            Ok(names) => applied.extend(names),
            Err(Error::Locked(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    let ledger = MigrationLedger::new(handle.as_ref()).unwrap();
    let names = ledger.all_names().unwrap();
    let unique: HashSet<_> = names.iter().collect();

    assert_eq!(names.len(), 5, "every file recorded once: {:?}", names);
    assert_eq!(unique.len(), 5);
    // Whatever won, nothing was applied twice
    let applied_unique: HashSet<_> = applied.iter().collect();
    assert_eq!(applied.len(), applied_unique.len());
}
