// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! spiderd-scb: the Shared Control Block.
//!
//! A small, fixed-schema record living in a POSIX shared-memory segment
//! (via the `shared_memory` crate), used for parent↔child coordination
//! between the Container Manager and a running Worker process. Every field
//! is an independent atomic — no field requires cross-field atomicity
//! — except the two variable-length fields
//! (`spider_db_dir`, `logs_buffer`), which use the fixed-buffer-plus-length
//! handover pattern documented on [`ScbLayout`].

use shared_memory::{Shmem, ShmemConf, ShmemError};
use spiderd_core::container::ReturnCode;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use thiserror::Error;

/// Max bytes for the immutable operational-db-dir path.
pub const DB_DIR_CAPACITY: usize = 512;
/// Max bytes for a logs snapshot handed back through `logs_request`.
pub const LOGS_CAPACITY: usize = 64 * 1024;

/// Sentinel meaning "child has not written `return_code` yet".
const RETURN_CODE_UNSET: i32 = -1;

/// The raw, `repr(C)` layout placed directly into the shared-memory region.
///
/// `db_dir_buf`/`logs_buf` are plain byte arrays, not atomics — but they are
/// only ever written by the child (when `logs_request` is set, for
/// `logs_buf`; once, before either side observes it, for `db_dir_buf`) and
/// only ever read by the parent after observing the corresponding flag
/// transition with `Acquire` ordering, so there is no concurrent access to
/// race on. This is the same handover discipline a lock-free SPSC ring
/// buffer uses, specialized to "one shot" instead of a ring.
#[repr(C)]
struct ScbLayout {
    stop_event: AtomicBool,
    is_daemon: AtomicBool,
    dog_triggered: AtomicBool,
    logs_request: AtomicBool,
    return_code: AtomicI32,
    db_dir_len: AtomicUsize,
    db_dir_buf: [u8; DB_DIR_CAPACITY],
    logs_len: AtomicUsize,
    logs_buf: [u8; LOGS_CAPACITY],
}

impl ScbLayout {
    fn init(&self, is_daemon: bool, db_dir: &str) {
        self.stop_event.store(false, Ordering::Relaxed);
        self.is_daemon.store(is_daemon, Ordering::Relaxed);
        self.dog_triggered.store(false, Ordering::Relaxed);
        self.logs_request.store(false, Ordering::Relaxed);
        self.return_code.store(RETURN_CODE_UNSET, Ordering::Relaxed);
        self.logs_len.store(0, Ordering::Relaxed);

        let bytes = db_dir.as_bytes();
        let n = bytes.len().min(DB_DIR_CAPACITY);
        // SAFETY: `init` runs exactly once, before the segment is shared
        // with any other process, so this write cannot race.
        unsafe {
            let dst = self.db_dir_buf.as_ptr() as *mut u8;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, n);
        }
        self.db_dir_len.store(n, Ordering::Release);
    }
}

#[derive(Debug, Error)]
pub enum ScbError {
    #[error("shared memory error: {0}")]
    SharedMemory(#[from] ShmemError),
    #[error("segment is too small for the SCB layout")]
    TooSmall,
}

/// Handle to one container's SCB. The parent creates it; the child opens it
/// by the same `os_id`. Drop removes the OS-level mapping on whichever side
/// owns it (the creator) — callers should keep exactly one `Scb` alive per
/// side and drop it once the worker is reaped.
pub struct Scb {
    shmem: Shmem,
}

// SAFETY: `Shmem` is not `Send`/`Sync` by default because it wraps a raw
// pointer, but every access into the mapped region goes through atomics
// (or the single-writer handover documented on `ScbLayout`), so sharing the
// handle across threads/processes is sound.
unsafe impl Send for Scb {}
unsafe impl Sync for Scb {}

impl Scb {
    pub fn layout_size() -> usize {
        std::mem::size_of::<ScbLayout>()
    }

    /// Create a fresh SCB for `os_id`, owned by this handle.
    pub fn create(os_id: &str, is_daemon: bool, spider_db_dir: &str) -> Result<Self, ScbError> {
        let shmem = ShmemConf::new().size(Self::layout_size()).os_id(os_id).create()?;
        let scb = Self { shmem };
        scb.layout().init(is_daemon, spider_db_dir);
        Ok(scb)
    }

    /// Open an SCB previously created elsewhere (the worker side).
    pub fn open(os_id: &str) -> Result<Self, ScbError> {
        let shmem = ShmemConf::new().os_id(os_id).open()?;
        if shmem.len() < Self::layout_size() {
            return Err(ScbError::TooSmall);
        }
        Ok(Self { shmem })
    }

    pub fn os_id(&self) -> &str {
        self.shmem.get_os_id()
    }

    fn layout(&self) -> &ScbLayout {
        // SAFETY: the segment was sized for `ScbLayout` by `create`, and
        // `open` checks the length before constructing `Self`.
        unsafe { &*(self.shmem.as_ptr() as *const ScbLayout) }
    }

    pub fn stop_event(&self) -> bool {
        self.layout().stop_event.load(Ordering::Acquire)
    }

    pub fn set_stop_event(&self) {
        self.layout().stop_event.store(true, Ordering::Release);
    }

    pub fn is_daemon(&self) -> bool {
        self.layout().is_daemon.load(Ordering::Acquire)
    }

    pub fn dog_triggered(&self) -> bool {
        self.layout().dog_triggered.load(Ordering::Acquire)
    }

    pub fn set_dog_triggered(&self) {
        self.layout().dog_triggered.store(true, Ordering::Release);
    }

    pub fn logs_requested(&self) -> bool {
        self.layout().logs_request.load(Ordering::Acquire)
    }

    pub fn request_logs(&self) {
        self.layout().logs_request.store(true, Ordering::Release);
    }

    /// Child-side: publish a logs snapshot and clear the request flag.
    pub fn fulfil_logs_request(&self, logs: &str) {
        let layout = self.layout();
        let bytes = logs.as_bytes();
        let n = bytes.len().min(LOGS_CAPACITY);
        // SAFETY: only the child calls this, and only while
        // `logs_request` is still set — the parent does not read
        // `logs_buf` until it observes `logs_request == false`.
        unsafe {
            let dst = layout.logs_buf.as_ptr() as *mut u8;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, n);
        }
        layout.logs_len.store(n, Ordering::Release);
        layout.logs_request.store(false, Ordering::Release);
    }

    /// Parent-side: read whatever the child last published via
    /// [`Self::fulfil_logs_request`]. Call only after `logs_requested()`
    /// has transitioned back to `false`.
    pub fn read_logs_buffer(&self) -> String {
        let layout = self.layout();
        let n = layout.logs_len.load(Ordering::Acquire);
        String::from_utf8_lossy(&layout.logs_buf[..n]).into_owned()
    }

    pub fn spider_db_dir(&self) -> String {
        let layout = self.layout();
        let n = layout.db_dir_len.load(Ordering::Acquire);
        String::from_utf8_lossy(&layout.db_dir_buf[..n]).into_owned()
    }

    pub fn return_code(&self) -> Option<ReturnCode> {
        let raw = self.layout().return_code.load(Ordering::Acquire);
        if raw == RETURN_CODE_UNSET {
            None
        } else {
            ReturnCode::from_i32(raw)
        }
    }

    /// Written by the child exactly once before it exits.
    pub fn set_return_code(&self, code: ReturnCode) {
        self.layout().return_code.store(code as i32, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_id(suffix: &str) -> String {
        format!("spiderd-scb-test-{}-{}-{suffix}", std::process::id(), nanoid())
    }

    fn nanoid() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos() as u64
    }

    #[test]
    fn create_then_open_shares_state() {
        let id = unique_id("create-open");
        let parent = Scb::create(&id, false, "/tmp/spider/db").unwrap();
        let child = Scb::open(&id).unwrap();

        assert!(!child.is_daemon());
        assert_eq!(child.spider_db_dir(), "/tmp/spider/db");

        parent.set_stop_event();
        assert!(child.stop_event());

        child.set_return_code(ReturnCode::Success);
        assert_eq!(parent.return_code(), Some(ReturnCode::Success));
    }

    #[test]
    fn return_code_starts_unset() {
        let id = unique_id("unset");
        let scb = Scb::create(&id, true, "/tmp/db").unwrap();
        assert_eq!(scb.return_code(), None);
    }

    #[test]
    fn logs_request_round_trip() {
        let id = unique_id("logs");
        let parent = Scb::create(&id, false, "/tmp/db").unwrap();
        let child = Scb::open(&id).unwrap();

        parent.request_logs();
        assert!(child.logs_requested());

        child.fulfil_logs_request("hello\nworld\n");
        assert!(!parent.logs_requested());
        assert_eq!(parent.read_logs_buffer(), "hello\nworld\n");
    }

    #[test]
    fn dog_trigger_is_observed_across_handles() {
        let id = unique_id("dog");
        let parent = Scb::create(&id, false, "/tmp/db").unwrap();
        let child = Scb::open(&id).unwrap();

        child.set_dog_triggered();
        assert!(parent.dog_triggered());
    }
}
