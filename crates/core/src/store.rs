// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The opaque tabular-backend boundary.
//!
//! The underlying catalog/data stores are explicitly out of scope for the
//! core — this module only defines the interface the core programs against.
//! `spiderd_storage` supplies the one concrete implementation used to run
//! the system end-to-end.

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database '{0}' already exists")]
    DbExists(String),
    #[error("database '{0}' does not exist")]
    DbNotExists(String),
    #[error("table '{0}' already exists")]
    TbExists(String),
    #[error("table '{0}' does not exist")]
    TbNotExists(String),
    #[error("row for table '{table}' does not match its recorded column types")]
    TypeMismatch { table: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// A row-selection predicate. Mirrors the small set of `WHERE`-clause shapes
/// the core actually needs (exact-match and the `LIKE '%ref%'` prefix/substring
/// match used by container-ref resolution).
#[derive(Debug, Clone)]
pub enum RowFilter {
    All,
    Eq(String, Value),
    Like(String, String),
    Or(Box<RowFilter>, Box<RowFilter>),
}

impl RowFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn like(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Like(column.into(), needle.into())
    }

    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            RowFilter::All => true,
            RowFilter::Eq(column, value) => row.get(column) == Some(value),
            RowFilter::Like(column, needle) => row
                .get(column)
                .and_then(Value::as_str)
                .map(|s| s.contains(needle.as_str()))
                .unwrap_or(false),
            RowFilter::Or(a, b) => a.matches(row) || b.matches(row),
        }
    }
}

/// One logical database's create/switch/select/insert/update/delete surface.
///
/// Implementations are free to be in-memory, file-backed, or a real RDBMS;
/// the core only ever talks to this trait.
///
/// There is no "current database" state and so no `DbNotSelected` error: every
/// method takes `db` explicitly rather than operating against a previously
/// `use`d database. A caller simply cannot reach the no-db-selected state, so
/// that error kind has no constructor here — see `DESIGN.md`.
pub trait TableStore: Send + Sync {
    fn create_database(&self, name: &str) -> Result<(), StoreError>;
    fn drop_database(&self, name: &str) -> Result<(), StoreError>;
    fn database_exists(&self, name: &str) -> bool;

    fn create_table(&self, db: &str, table: &str, sample: &Row) -> Result<(), StoreError>;
    fn table_exists(&self, db: &str, table: &str) -> bool;

    fn select(&self, db: &str, table: &str, filter: &RowFilter) -> Result<Vec<Row>, StoreError>;
    fn insert(&self, db: &str, table: &str, row: Row) -> Result<(), StoreError>;
    fn update(&self, db: &str, table: &str, patch: Row, filter: &RowFilter) -> Result<(), StoreError>;
    fn delete(&self, db: &str, table: &str, filter: &RowFilter) -> Result<(), StoreError>;

    /// Run `body` inside one transaction against `db`. `body` receives a
    /// scratch buffer of rows to insert into `table`; on `Ok`, all rows are
    /// committed in one batch in FIFO order; on `Err`, none
    /// are written.
    fn transaction(
        &self,
        db: &str,
        table: &str,
        rows: Vec<Row>,
    ) -> Result<(), StoreError>;
}
