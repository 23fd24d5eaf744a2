// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Containers — launched instances of a [`Package`](crate::package::Package).

use crate::clock::Clock;
use crate::define_hex_id;
use crate::simple_display;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

define_hex_id! {
    /// `hex(md5(current_time_ns))`. Collisions are
    /// possible in principle but require two containers launched at the
    /// same nanosecond, which `run`'s single-threaded catalog section makes
    /// vanishingly unlikely in practice.
    pub struct ContainerId;
}

impl ContainerId {
    pub fn generate(clock: &impl Clock) -> Self {
        let ns = clock.epoch_ns();
        Self(crate::id::HexId::from_digest(md5::compute(ns.to_le_bytes()).0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    Created,
    Running,
    TimerWaiting,
    Terminated,
}

simple_display! {
    ContainerStatus {
        Created => "CREATED",
        Running => "RUNNING",
        TimerWaiting => "TIMER_WAITING",
        Terminated => "TERMINATED",
    }
}

/// `STATUS_SUCCESS=0`, `STATUS_EXIT_UNEXPECTED=1`,
/// `STATUS_DOG_TRIGGER=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ReturnCode {
    Success = 0,
    ExitUnexpected = 1,
    DogTrigger = 2,
}

simple_display! {
    ReturnCode {
        Success => "STATUS_SUCCESS",
        ExitUnexpected => "STATUS_EXIT_UNEXPECTED",
        DogTrigger => "STATUS_DOG_TRIGGER",
    }
}

impl ReturnCode {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::Success),
            1 => Some(Self::ExitUnexpected),
            2 => Some(Self::DogTrigger),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub package_ref: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub entry: String,
    pub daemon: bool,
    pub envs: BTreeMap<String, String>,
    pub cron: String,
    pub status: ContainerStatus,
    pub last_return_code: Option<ReturnCode>,
}

const ADJECTIVES: &[&str] =
    &["quiet", "amber", "brisk", "lucid", "dusty", "wry", "swift", "mellow", "terse", "vivid"];
const ANIMALS: &[&str] =
    &["mantis", "heron", "otter", "lynx", "jay", "vole", "tern", "gecko", "shrike", "finch"];

/// Adjective-animal-millisecond name pool, recovered from
/// `original_source/src/TSDAP/utils/dockerstyle.py::generate_unique_docker_style_name`.
/// Collisions are tolerated by design since `ContainerId`,
/// not `name`, is the primary key.
pub fn generate_name(clock: &impl Clock) -> String {
    let ms = (clock.epoch_ns() / 1_000_000) as u64;
    let adjective = ADJECTIVES[(ms as usize / 7) % ADJECTIVES.len()];
    let animal = ANIMALS[(ms as usize / 13) % ANIMALS.len()];
    format!("{adjective}-{animal}-{ms}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    #[test]
    fn container_id_is_32_hex_chars() {
        let clock = FakeClock::new();
        let id = ContainerId::generate(&clock);
        assert_eq!(id.as_str().len(), 32);
    }

    #[test]
    fn same_instant_yields_same_id_tie_break_first_row_wins() {
        // Resolving by id prefix picks the first matching row, which is
        // why two containers launched at the identical nanosecond collide.
        let clock = FakeClock::new();
        assert_eq!(ContainerId::generate(&clock), ContainerId::generate(&clock));
    }

    #[test]
    fn return_code_round_trips_through_i32() {
        for code in [ReturnCode::Success, ReturnCode::ExitUnexpected, ReturnCode::DogTrigger] {
            assert_eq!(ReturnCode::from_i32(code as i32), Some(code));
        }
        assert_eq!(ReturnCode::from_i32(99), None);
    }

    #[test]
    fn generate_name_has_three_hyphenated_parts() {
        let clock = FakeClock::new();
        let name = generate_name(&clock);
        assert_eq!(name.split('-').count(), 3);
    }
}
