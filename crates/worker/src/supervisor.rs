// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The worker's supervisory loop: runs on the process's main thread, while
//! the user spider runs on its own `spider_<container>_main` thread. Every
//! poll tick it drains a full queue, services a live `logs_request`, and
//! watches for `stop_event`/the spider thread's own exit to decide the
//! container's terminal `return_code`.

use crate::context::{StopSignal, WorkerContext};
use crate::error::WorkerError;
use crate::log_sink::LogSink;
use spiderd_core::container::ReturnCode;
use spiderd_core::spider::Spider;
use spiderd_core::store::TableStore;
use spiderd_scb::Scb;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn drain(ctx: &WorkerContext) {
    let drained = ctx.queue().drain_all();
    if drained.is_empty() {
        return;
    }
    // The data store's `transaction` is scoped to one table, so a queue
    // drain spanning several tables commits as one grouped batch per table
    // rather than a single cross-table transaction. Each group still
    // commits in the FIFO order rows were emitted.
    let mut grouped: BTreeMap<String, Vec<spiderd_core::store::Row>> = BTreeMap::new();
    for (table, row) in drained {
        grouped.entry(table).or_default().push(row);
    }
    for (table, rows) in grouped {
        if let Err(err) = ctx.data_store().transaction(ctx.data_db(), &table, rows) {
            tracing::warn!(table, error = %err, "drain transaction failed");
        }
    }
}

/// Spawn the spider's `run` on its own thread and drive the supervisory
/// loop until a terminal return code is reached.
pub fn run(
    mut spider: Box<dyn Spider>,
    ctx: Arc<WorkerContext>,
    scb: Arc<Scb>,
    log_sink: LogSink,
    container_id: &str,
    poll_interval: Duration,
) -> Result<ReturnCode, WorkerError> {
    let thread_ctx = Arc::clone(&ctx);
    let main_handle = std::thread::Builder::new()
        .name(format!("spider_{container_id}_main"))
        .spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                spider.run(thread_ctx.as_ref());
            }));
            if let Err(payload) = result {
                if payload.downcast_ref::<StopSignal>().is_some() {
                    spider.unload(thread_ctx.as_ref());
                } else {
                    tracing::error!(panic = %panic_message(&payload), "spider run() panicked");
                    thread_ctx.mark_exception();
                }
            }
        })?;

    let return_code = loop {
        std::thread::sleep(poll_interval);

        if ctx.queue().is_full() {
            drain(&ctx);
        }

        if scb.logs_requested() {
            scb.fulfil_logs_request(&log_sink.snapshot());
        }

        if scb.stop_event() {
            drain(&ctx);
            if scb.dog_triggered() {
                break ReturnCode::DogTrigger;
            }
            while !main_handle.is_finished() {
                std::thread::sleep(Duration::from_millis(500));
            }
            break ReturnCode::Success;
        }

        if main_handle.is_finished() {
            drain(&ctx);
            break if ctx.exception_occurred() { ReturnCode::ExitUnexpected } else { ReturnCode::Success };
        }
    };

    let _ = main_handle.join();
    scb.set_return_code(return_code);
    Ok(return_code)
}
