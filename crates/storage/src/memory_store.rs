// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! A [`TableStore`] implementation good enough to run the whole system
//! end-to-end: in-memory tables, snapshotted to one JSON file per database
//! under `root`. Modeled on the `oj-storage` snapshot-to-disk idiom seen in
//! its `wal_tests.rs`/`migration_tests.rs` (a `Wal`/snapshot pair), here
//! collapsed to "snapshot after every mutation" since callers treat this
//! backend as opaque — durability matters, a replay log does not.
//!
//! More than one process (the `spiderd` daemon and a short-lived
//! `spiderd-cli` invocation) can have a `JsonTableStore` open over the same
//! `root` at once, so every operation reloads the relevant database's
//! snapshot from disk under an `fs2` advisory file lock before touching it
//! — one `<db>.lock` file per database, shared for reads and exclusive for
//! writes — so a read always sees the latest committed snapshot and a
//! write's read-modify-write cycle can't interleave with another process's.

use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use spiderd_core::store::{Row, RowFilter, StoreError, TableStore};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    tables: BTreeMap<String, Vec<Row>>,
}

pub struct JsonTableStore {
    root: PathBuf,
    databases: RwLock<BTreeMap<String, Database>>,
}

impl JsonTableStore {
    /// Open (creating if absent) a store rooted at `root`, loading any
    /// `<root>/<db>.json` snapshots already on disk.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let mut databases = BTreeMap::new();
        if root.is_dir() {
            for entry in std::fs::read_dir(&root)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else { continue };
                let contents = std::fs::read_to_string(&path)?;
                let db: Database = serde_json::from_str(&contents)?;
                databases.insert(name.to_string(), db);
            }
        }
        Ok(Self { root, databases: RwLock::new(databases) })
    }

    fn snapshot_path(&self, db: &str) -> PathBuf {
        self.root.join(format!("{db}.json"))
    }

    fn lock_path(&self, db: &str) -> PathBuf {
        self.root.join(format!("{db}.lock"))
    }

    fn open_lock_file(&self, db: &str) -> Result<File, StoreError> {
        Ok(OpenOptions::new().read(true).write(true).create(true).open(self.lock_path(db))?)
    }

    /// Reload `db`'s on-disk snapshot into the in-process cache, replacing
    /// whatever this process last saw. Only called while holding `db`'s file
    /// lock, so the read can't race another process's in-flight flush. A
    /// database with no snapshot file yet is left untouched (absent, or
    /// whatever this process already has cached from a `create_database`
    /// still in flight in the same call).
    fn reload(&self, db: &str) -> Result<(), StoreError> {
        let path = self.snapshot_path(db);
        if !path.is_file() {
            return Ok(());
        }
        let contents = std::fs::read_to_string(&path)?;
        let database: Database = serde_json::from_str(&contents)?;
        self.databases.write().insert(db.to_string(), database);
        Ok(())
    }

    fn flush(&self, db: &str) -> Result<(), StoreError> {
        let guard = self.databases.read();
        let Some(database) = guard.get(db) else { return Ok(()) };
        let json = serde_json::to_string_pretty(database)?;
        std::fs::write(self.snapshot_path(db), json)?;
        Ok(())
    }

    /// Run `f` against `db` with its on-disk snapshot freshly reloaded and an
    /// exclusive cross-process lock held for the duration — the shape every
    /// mutating [`TableStore`] method uses.
    fn with_exclusive<R>(&self, db: &str, f: impl FnOnce(&Self) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let lock_file = self.open_lock_file(db)?;
        lock_file.lock_exclusive()?;
        self.reload(db)?;
        f(self)
    }

    /// Same as [`Self::with_exclusive`] but with a shared lock, for methods
    /// that only read `db`.
    fn with_shared<R>(&self, db: &str, f: impl FnOnce(&Self) -> Result<R, StoreError>) -> Result<R, StoreError> {
        let lock_file = self.open_lock_file(db)?;
        lock_file.lock_shared()?;
        self.reload(db)?;
        f(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TableStore for JsonTableStore {
    fn create_database(&self, name: &str) -> Result<(), StoreError> {
        self.with_exclusive(name, |this| {
            let mut guard = this.databases.write();
            if guard.contains_key(name) {
                drop(guard);
                tracing::warn!(database = name, "database already exists, treating create as success");
                return Ok(());
            }
            guard.insert(name.to_string(), Database::default());
            drop(guard);
            this.flush(name)
        })
    }

    fn drop_database(&self, name: &str) -> Result<(), StoreError> {
        self.with_exclusive(name, |this| {
            let mut guard = this.databases.write();
            if guard.remove(name).is_none() {
                return Err(StoreError::DbNotExists(name.to_string()));
            }
            drop(guard);
            let _ = std::fs::remove_file(this.snapshot_path(name));
            Ok(())
        })
    }

    fn database_exists(&self, name: &str) -> bool {
        self.with_shared(name, |this| Ok(this.databases.read().contains_key(name))).unwrap_or(false)
    }

    fn create_table(&self, db: &str, table: &str, _sample: &Row) -> Result<(), StoreError> {
        self.with_exclusive(db, |this| {
            let mut guard = this.databases.write();
            let database = guard.get_mut(db).ok_or_else(|| StoreError::DbNotExists(db.to_string()))?;
            if database.tables.contains_key(table) {
                drop(guard);
                tracing::warn!(database = db, table, "table already exists, treating create as success");
                return Ok(());
            }
            database.tables.insert(table.to_string(), Vec::new());
            drop(guard);
            this.flush(db)
        })
    }

    fn table_exists(&self, db: &str, table: &str) -> bool {
        self.with_shared(db, |this| {
            Ok(this.databases.read().get(db).map(|d| d.tables.contains_key(table)).unwrap_or(false))
        })
        .unwrap_or(false)
    }

    fn select(&self, db: &str, table: &str, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        self.with_shared(db, |this| {
            let guard = this.databases.read();
            let database = guard.get(db).ok_or_else(|| StoreError::DbNotExists(db.to_string()))?;
            let rows = database.tables.get(table).ok_or_else(|| StoreError::TbNotExists(table.to_string()))?;
            Ok(rows.iter().filter(|row| filter.matches(row)).cloned().collect())
        })
    }

    fn insert(&self, db: &str, table: &str, row: Row) -> Result<(), StoreError> {
        self.with_exclusive(db, |this| {
            {
                let mut guard = this.databases.write();
                let database = guard.get_mut(db).ok_or_else(|| StoreError::DbNotExists(db.to_string()))?;
                let rows =
                    database.tables.get_mut(table).ok_or_else(|| StoreError::TbNotExists(table.to_string()))?;
                rows.push(row);
            }
            this.flush(db)
        })
    }

    fn update(&self, db: &str, table: &str, patch: Row, filter: &RowFilter) -> Result<(), StoreError> {
        self.with_exclusive(db, |this| {
            {
                let mut guard = this.databases.write();
                let database = guard.get_mut(db).ok_or_else(|| StoreError::DbNotExists(db.to_string()))?;
                let rows =
                    database.tables.get_mut(table).ok_or_else(|| StoreError::TbNotExists(table.to_string()))?;
                for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                    for (key, value) in &patch {
                        row.insert(key.clone(), value.clone());
                    }
                }
            }
            this.flush(db)
        })
    }

    fn delete(&self, db: &str, table: &str, filter: &RowFilter) -> Result<(), StoreError> {
        self.with_exclusive(db, |this| {
            {
                let mut guard = this.databases.write();
                let database = guard.get_mut(db).ok_or_else(|| StoreError::DbNotExists(db.to_string()))?;
                let rows =
                    database.tables.get_mut(table).ok_or_else(|| StoreError::TbNotExists(table.to_string()))?;
                rows.retain(|row| !filter.matches(row));
            }
            this.flush(db)
        })
    }

    fn transaction(&self, db: &str, table: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        self.with_exclusive(db, |this| {
            {
                let mut guard = this.databases.write();
                let database = guard.get_mut(db).ok_or_else(|| StoreError::DbNotExists(db.to_string()))?;
                let existing =
                    database.tables.get_mut(table).ok_or_else(|| StoreError::TbNotExists(table.to_string()))?;
                existing.extend(rows);
            }
            this.flush(db)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row(x: i64) -> Row {
        Row::from([("x".to_string(), json!(x))])
    }

    #[test]
    fn create_database_is_idempotent_with_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTableStore::open(dir.path()).unwrap();
        store.create_database("d").unwrap();
        store.create_database("d").unwrap();
        assert!(store.database_exists("d"));
    }

    #[test]
    fn insert_then_select_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTableStore::open(dir.path()).unwrap();
        store.create_database("d").unwrap();
        store.create_table("d", "t", &sample_row(1)).unwrap();
        store.insert("d", "t", sample_row(42)).unwrap();

        let rows = store.select("d", "t", &RowFilter::All).unwrap();
        assert_eq!(rows, vec![sample_row(42)]);
    }

    #[test]
    fn select_on_missing_table_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTableStore::open(dir.path()).unwrap();
        store.create_database("d").unwrap();
        assert!(matches!(
            store.select("d", "missing", &RowFilter::All),
            Err(StoreError::TbNotExists(_))
        ));
    }

    #[test]
    fn transaction_commits_all_rows_in_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTableStore::open(dir.path()).unwrap();
        store.create_database("d").unwrap();
        store.create_table("d", "t", &sample_row(1)).unwrap();

        let batch = vec![sample_row(1), sample_row(2), sample_row(3)];
        store.transaction("d", "t", batch.clone()).unwrap();

        let rows = store.select("d", "t", &RowFilter::All).unwrap();
        assert_eq!(rows, batch);
    }

    #[test]
    fn a_second_store_over_the_same_root_sees_committed_writes() {
        let dir = tempfile::tempdir().unwrap();
        let first = JsonTableStore::open(dir.path()).unwrap();
        first.create_database("d").unwrap();
        first.create_table("d", "t", &sample_row(1)).unwrap();
        first.insert("d", "t", sample_row(1)).unwrap();

        // A second store over the same root, as `spiderd-cli` and `spiderd`
        // each opening their own `JsonTableStore` over the same catalog dir.
        let second = JsonTableStore::open(dir.path()).unwrap();
        second.insert("d", "t", sample_row(2)).unwrap();

        // `first` reloads from disk on every call, so it sees `second`'s
        // write too, rather than clobbering it on its next flush.
        let rows = first.select("d", "t", &RowFilter::All).unwrap();
        assert_eq!(rows, vec![sample_row(1), sample_row(2)]);
    }

    #[test]
    fn reopening_the_store_recovers_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonTableStore::open(dir.path()).unwrap();
            store.create_database("d").unwrap();
            store.create_table("d", "t", &sample_row(1)).unwrap();
            store.insert("d", "t", sample_row(7)).unwrap();
        }
        let reopened = JsonTableStore::open(dir.path()).unwrap();
        let rows = reopened.select("d", "t", &RowFilter::All).unwrap();
        assert_eq!(rows, vec![sample_row(7)]);
    }
}
