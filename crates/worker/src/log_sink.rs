// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The worker's two-sink logger: every `tracing` event formatted by this
//! process (worker diagnostics and user spider code alike, since user code
//! logs through the same injected subscriber rather than raw `print!`) is
//! mirrored into an in-memory ring buffer — used to answer a live
//! `logs_request` — and appended to the container's operational `logs`
//! table, so `logs()` still has something to print once the ring buffer has
//! rolled over.

use parking_lot::Mutex;
use spiderd_core::store::TableStore;
use spiderd_storage::operational;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

const RING_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct LogSink {
    ring: Arc<Mutex<VecDeque<String>>>,
    store: Arc<dyn TableStore>,
    db: String,
}

impl LogSink {
    pub fn new(store: Arc<dyn TableStore>, db: String) -> Self {
        Self { ring: Arc::new(Mutex::new(VecDeque::with_capacity(RING_CAPACITY))), store, db }
    }

    /// The live log snapshot served back through `fulfil_logs_request`.
    pub fn snapshot(&self) -> String {
        let guard = self.ring.lock();
        guard.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let line = String::from_utf8_lossy(buf).trim_end_matches('\n').to_string();
        if !line.is_empty() {
            {
                let mut guard = self.ring.lock();
                guard.push_back(line.clone());
                if guard.len() > RING_CAPACITY {
                    guard.pop_front();
                }
            }
            if let Err(err) = operational::append_log_line(self.store.as_ref(), &self.db, &line) {
                eprintln!("failed to persist log line to operational store: {err}");
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiderd_storage::memory_store::JsonTableStore;
    use std::io::Write;

    fn sink() -> (tempfile::TempDir, LogSink) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn TableStore> = Arc::new(JsonTableStore::open(dir.path()).unwrap());
        let db = operational::operational_db_name("abc123");
        operational::init_operational_schema(store.as_ref(), &db).unwrap();
        (dir, LogSink::new(store, db))
    }

    #[test]
    fn write_mirrors_into_ring_buffer() {
        let (_dir, mut sink) = sink();
        sink.write_all(b"hello world\n").unwrap();
        assert_eq!(sink.snapshot(), "hello world");
    }

    #[test]
    fn write_also_persists_to_operational_store() {
        let (_dir, mut sink) = sink();
        sink.write_all(b"line one\n").unwrap();
        sink.write_all(b"line two\n").unwrap();
        let logs = operational::read_all_logs(sink.store.as_ref(), &sink.db).unwrap();
        assert_eq!(logs, vec!["line one", "line two"]);
    }

    #[test]
    fn blank_writes_are_ignored() {
        let (_dir, mut sink) = sink();
        sink.write_all(b"\n").unwrap();
        assert_eq!(sink.snapshot(), "");
    }
}
