// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Per-container inactivity timer. Every watchdog-feeding API call
//! cancels and re-arms it; on expiry it sets the Shared Control Block's
//! `dog_triggered` and `stop_event` flags so the supervisory loop tears the
//! worker down on its next poll.
//!
//! There is no OS-level resettable one-shot timer in `std`, so a re-arm
//! spawns a fresh sleeping thread and invalidates the previous one's
//! generation; only the most recently armed generation is allowed to fire.

use spiderd_scb::Scb;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct Watchdog {
    generation: Arc<AtomicU64>,
    timeout: Duration,
    scb: Arc<Scb>,
}

impl Watchdog {
    /// Arms a watchdog with the given timeout. Daemon containers must never
    /// construct one.
    pub fn spawn(scb: Arc<Scb>, timeout: Duration) -> Self {
        let watchdog = Self { generation: Arc::new(AtomicU64::new(0)), timeout, scb };
        watchdog.arm();
        watchdog
    }

    /// Cancel-and-rearm, invoked by every watchdog-feeding API call.
    pub fn feed(&self) {
        self.arm();
    }

    fn arm(&self) {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let scb = Arc::clone(&self.scb);
        let timeout = self.timeout;
        std::thread::spawn(move || {
            std::thread::sleep(timeout);
            if generation.load(Ordering::SeqCst) == my_generation {
                tracing::warn!("watchdog expired, triggering forced stop");
                scb.set_dog_triggered();
                scb.set_stop_event();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scb(suffix: &str) -> Arc<Scb> {
        let id = format!("spiderd-watchdog-test-{}-{suffix}", std::process::id());
        Arc::new(Scb::create(&id, false, "/tmp/db").unwrap())
    }

    #[test]
    fn expires_and_triggers_when_never_fed() {
        let scb = scb("expires");
        let _watchdog = Watchdog::spawn(Arc::clone(&scb), Duration::from_millis(20));
        std::thread::sleep(Duration::from_millis(100));
        assert!(scb.dog_triggered());
        assert!(scb.stop_event());
    }

    #[test]
    fn feeding_before_expiry_prevents_trigger() {
        let scb = scb("fed");
        let watchdog = Watchdog::spawn(Arc::clone(&scb), Duration::from_millis(60));
        std::thread::sleep(Duration::from_millis(30));
        watchdog.feed();
        std::thread::sleep(Duration::from_millis(50));
        assert!(!scb.dog_triggered());
    }
}
