// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! spiderd-core: shared domain types for the spiderd orchestrator.
//!
//! Defines the data model, the trait boundaries toward the
//! components that are deliberately out of scope for the core (tabular
//! stores, cron parsing, the spider API surface, the dependency installer),
//! and the small bits of generic infrastructure (ids, clock) everything
//! else is built on.

pub mod clock;
pub mod config;
pub mod container;
pub mod cron;
pub mod dependency;
pub mod error;
pub mod id;
pub mod macros;
pub mod manifest;
pub mod package;
pub mod row;
pub mod spider;
pub mod store;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, ConfigFile, RuntimeConfig};
pub use container::{Container, ContainerId, ContainerStatus, ReturnCode};
pub use cron::{CronError, CronSchedule, SystemCron};
pub use dependency::{DependencyError, DependencyInstaller, NoopDependencyInstaller};
pub use error::RefError;
pub use id::{short, HexId};
pub use manifest::{EffectiveSettings, Manifest, ManifestInfos, ManifestRuntimes, ManifestSchedules, RunOverrides};
pub use package::{split_package_ref, Package, PackageId};
pub use row::{ColumnType, EmittedRow, TypeMapCache, TypeTree};
pub use spider::{Spider, SpiderContext, SpiderEntryFn, SPIDER_ENTRY_SYMBOL};
pub use store::{Row, RowFilter, StoreError, TableStore};
