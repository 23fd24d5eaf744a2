// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Naming for the shared, multi-tenant data store user spiders write rows
//! into via `declare_table`/`emit_row`. Unlike the operational store (fixed
//! `stores`/`logs` tables), the data store's tables are entirely
//! user-defined, so there is no fixed schema to initialize beyond the
//! per-container database itself — one database per container keeps two
//! containers from colliding on an identically-named table.

use spiderd_core::store::{StoreError, TableStore};

pub const DATA_DB_PREFIX: &str = "data_";

pub fn data_db_name(container_id: &str) -> String {
    format!("{DATA_DB_PREFIX}{container_id}")
}

pub fn init_data_schema(store: &dyn TableStore, db: &str) -> Result<(), StoreError> {
    store.create_database(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::JsonTableStore;

    #[test]
    fn init_then_create_table_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTableStore::open(dir.path()).unwrap();
        let db = data_db_name("abc123");
        init_data_schema(&store, &db).unwrap();
        assert!(store.database_exists(&db));
    }
}
