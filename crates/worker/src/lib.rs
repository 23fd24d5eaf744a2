// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! spiderd-worker: the in-child-process runtime that loads a user spider,
//! runs it, services its API calls, and reports a terminal return code back
//! to the parent over the Shared Control Block.

pub mod context;
pub mod error;
pub mod log_sink;
pub mod plugin;
pub mod queue;
pub mod supervisor;
pub mod watchdog;

pub use context::{StopSignal, WorkerContext};
pub use error::WorkerError;
pub use log_sink::LogSink;
pub use plugin::load_spider_plugin;
pub use queue::EmittedRowQueue;
pub use watchdog::Watchdog;
