// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The `SpiderContext` a running spider is given: the one handle through
//! which it reaches the data store, the per-container kv store, additional
//! worker threads, and the stop checkpoint.

use crate::queue::EmittedRowQueue;
use crate::watchdog::Watchdog;
use spiderd_core::row::TypeMapCache;
use spiderd_core::spider::SpiderContext;
use spiderd_core::store::{Row, TableStore};
use spiderd_scb::Scb;
use spiderd_storage::operational;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Unwind marker thrown by [`WorkerContext::checkpoint`] when `stop_event`
/// has been observed. Caught at the spider's thread boundary, never allowed
/// to escape a process — this is the Rust-native rendering of "the user
/// thread must unwind its `unload()` hook and terminate."
pub struct StopSignal;

pub struct WorkerContext {
    data_store: Arc<dyn TableStore>,
    data_db: String,
    operational_store: Arc<dyn TableStore>,
    operational_db: String,
    queue: Arc<EmittedRowQueue>,
    type_map: TypeMapCache,
    scb: Arc<Scb>,
    watchdog: Option<Arc<Watchdog>>,
    thread_maximum: usize,
    threads: parking_lot::Mutex<BTreeMap<String, JoinHandle<()>>>,
    anonymous_thread_seq: AtomicU64,
    exception_occurred: AtomicBool,
}

impl WorkerContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data_store: Arc<dyn TableStore>,
        data_db: String,
        operational_store: Arc<dyn TableStore>,
        operational_db: String,
        queue: Arc<EmittedRowQueue>,
        scb: Arc<Scb>,
        watchdog: Option<Arc<Watchdog>>,
        thread_maximum: usize,
    ) -> Self {
        Self {
            data_store,
            data_db,
            operational_store,
            operational_db,
            queue,
            type_map: TypeMapCache::new(),
            scb,
            watchdog,
            thread_maximum,
            threads: parking_lot::Mutex::new(BTreeMap::new()),
            anonymous_thread_seq: AtomicU64::new(0),
            exception_occurred: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &EmittedRowQueue {
        &self.queue
    }

    pub fn data_store(&self) -> &dyn TableStore {
        self.data_store.as_ref()
    }

    pub fn data_db(&self) -> &str {
        &self.data_db
    }

    pub fn type_map(&self) -> &TypeMapCache {
        &self.type_map
    }

    pub fn mark_exception(&self) {
        self.exception_occurred.store(true, Ordering::SeqCst);
    }

    pub fn exception_occurred(&self) -> bool {
        self.exception_occurred.load(Ordering::SeqCst)
    }

    /// Observed after every user-visible API call: unwind the calling
    /// thread if stop has been requested, otherwise feed the watchdog.
    fn checkpoint(&self) {
        if self.scb.stop_event() {
            std::panic::panic_any(StopSignal);
        }
        if let Some(watchdog) = &self.watchdog {
            watchdog.feed();
        }
    }
}

impl SpiderContext for WorkerContext {
    fn declare_table(&self, table: &str, sample: Row) {
        self.type_map.declare(table, &sample);
        if let Err(err) = self.data_store.create_table(&self.data_db, table, &sample) {
            tracing::warn!(table, error = %err, "declare_table failed");
        }
        self.checkpoint();
    }

    fn emit_row(&self, table: &str, row: Row) {
        if !self.type_map.check_and_learn(table, &row) {
            tracing::warn!(table, "emit_row rejected: row does not match the table's recorded column types");
            self.checkpoint();
            return;
        }
        self.queue.push(table.to_string(), row);
        self.checkpoint();
    }

    fn read_kv(&self, key: &str) -> Option<Vec<u8>> {
        let result = operational::read_kv(self.operational_store.as_ref(), &self.operational_db, key)
            .unwrap_or_else(|err| {
                tracing::warn!(key, error = %err, "read_kv failed");
                None
            })
            .map(String::into_bytes);
        self.checkpoint();
        result
    }

    fn write_kv(&self, key: &str, value: Vec<u8>) {
        let encoded = String::from_utf8_lossy(&value).into_owned();
        if let Err(err) = operational::write_kv(self.operational_store.as_ref(), &self.operational_db, key, &encoded) {
            tracing::warn!(key, error = %err, "write_kv failed");
        }
        self.checkpoint();
    }

    fn spawn_worker(&self, name: Option<String>, f: Box<dyn FnOnce() + Send>) -> bool {
        let mut guard = self.threads.lock();
        guard.retain(|_, handle| !handle.is_finished());

        let name = name.unwrap_or_else(|| {
            let seq = self.anonymous_thread_seq.fetch_add(1, Ordering::SeqCst);
            format!("spider-worker-{seq}")
        });

        if guard.contains_key(&name) {
            tracing::warn!(thread = %name, "spawn_worker rejected: duplicate thread name");
            self.checkpoint();
            return false;
        }
        if guard.len() >= self.thread_maximum {
            tracing::warn!(limit = self.thread_maximum, "spawn_worker rejected: thread maximum reached");
            self.checkpoint();
            return false;
        }

        let spawned = std::thread::Builder::new().name(name.clone()).spawn(move || {
            // A secondary thread observing a stop request unwinds quietly;
            // it has no `unload()` hook of its own to run.
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
        });

        let ok = match spawned {
            Ok(handle) => {
                guard.insert(name, handle);
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "spawn_worker failed to spawn OS thread");
                false
            }
        };
        drop(guard);
        self.checkpoint();
        ok
    }

    fn stop_requested(&self) -> bool {
        self.scb.stop_event()
    }
}
