// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Per-container operational database: the `stores` key/value table backing
//! `SpiderContext::read_kv`/`write_kv`, and the `logs` table the worker's
//! log sink mirrors every line into (used to answer a `logs_request` once
//! the in-memory ring buffer has rolled over).

use chrono::Utc;
use serde_json::{json, Value};
use spiderd_core::store::{Row, RowFilter, StoreError, TableStore};

pub const OPERATIONAL_DB_PREFIX: &str = "spider_";

/// The operational database name for a given container id.
pub fn operational_db_name(container_id: &str) -> String {
    format!("{OPERATIONAL_DB_PREFIX}{container_id}")
}

/// Create the `stores`/`logs` tables for one container's operational
/// database. Called once when a container's worker first starts.
pub fn init_operational_schema(store: &dyn TableStore, db: &str) -> Result<(), StoreError> {
    store.create_database(db)?;
    store.create_table(db, "stores", &Row::from([("Key".to_string(), json!("")), ("Value".to_string(), json!(""))]))?;
    store.create_table(
        db,
        "logs",
        &Row::from([("Timestamp".to_string(), json!("")), ("Line".to_string(), json!(""))]),
    )?;
    Ok(())
}

/// `SpiderContext::read_kv`: the last value written for `key`, or `None`.
pub fn read_kv(store: &dyn TableStore, db: &str, key: &str) -> Result<Option<String>, StoreError> {
    let rows = store.select(db, "stores", &RowFilter::eq("Key", json!(key)))?;
    Ok(rows.last().and_then(|row| row.get("Value")).and_then(Value::as_str).map(str::to_string))
}

/// `SpiderContext::write_kv`: appends a new row rather than updating in
/// place, so `read_kv` always returns the most recently inserted value —
/// the same append-only discipline the `logs` table uses.
pub fn write_kv(store: &dyn TableStore, db: &str, key: &str, value: &str) -> Result<(), StoreError> {
    store.insert(db, "stores", Row::from([("Key".to_string(), json!(key)), ("Value".to_string(), json!(value))]))
}

/// Append one log line, timestamped at the moment it's recorded.
pub fn append_log_line(store: &dyn TableStore, db: &str, line: &str) -> Result<(), StoreError> {
    store.insert(
        db,
        "logs",
        Row::from([("Timestamp".to_string(), json!(Utc::now().to_rfc3339())), ("Line".to_string(), json!(line))]),
    )
}

/// All log lines recorded so far, oldest first — served back through the
/// Shared Control Block's `logs_request`/`fulfil_logs_request` handover.
pub fn read_all_logs(store: &dyn TableStore, db: &str) -> Result<Vec<String>, StoreError> {
    let rows = store.select(db, "logs", &RowFilter::All)?;
    Ok(rows.iter().filter_map(|row| row.get("Line").and_then(Value::as_str).map(str::to_string)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::JsonTableStore;

    fn store() -> (tempfile::TempDir, JsonTableStore, String) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTableStore::open(dir.path().to_path_buf()).unwrap();
        let db = operational_db_name("abc123");
        init_operational_schema(&store, &db).unwrap();
        (dir, store, db)
    }

    #[test]
    fn write_then_read_returns_latest_value() {
        let (_dir, store, db) = store();
        write_kv(&store, &db, "count", "1").unwrap();
        write_kv(&store, &db, "count", "2").unwrap();
        assert_eq!(read_kv(&store, &db, "count").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn read_missing_key_is_none() {
        let (_dir, store, db) = store();
        assert_eq!(read_kv(&store, &db, "missing").unwrap(), None);
    }

    #[test]
    fn logs_accumulate_in_insertion_order() {
        let (_dir, store, db) = store();
        append_log_line(&store, &db, "starting up").unwrap();
        append_log_line(&store, &db, "fetched page 1").unwrap();
        assert_eq!(read_all_logs(&store, &db).unwrap(), vec!["starting up", "fetched page 1"]);
    }
}
