// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The `spiderd-worker` binary: the process the Container Manager execs as
//! a container's child. Argument layout:
//!
//! `spiderd-worker <entry_full_path> <scb_os_id> <data_store_root> <container_id> [K=V ...]`
//!
//! `entry_full_path` is the user package's compiled plugin; `scb_os_id`
//! names the Shared Control Block segment the parent already created (its
//! `is_daemon`/`spider_db_dir` fields are read from there, not argv); the
//! trailing `K=V` pairs are the container's effective `envs`, exported into
//! this process's environment before the plugin is loaded.

use spiderd_core::config::RuntimeConfig;
use spiderd_core::container::ReturnCode;
use spiderd_core::store::TableStore;
use spiderd_scb::Scb;
use spiderd_storage::memory_store::JsonTableStore;
use spiderd_storage::{data, operational};
use spiderd_worker::{load_spider_plugin, LogSink, WorkerContext, WorkerError, Watchdog};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> std::process::ExitCode {
    match real_main() {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("spiderd-worker failed: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn real_main() -> Result<ReturnCode, WorkerError> {
    let args: Vec<String> = std::env::args().collect();
    let [_, entry_full_path, scb_os_id, data_store_root, container_id, rest @ ..] = args.as_slice() else {
        return Err(WorkerError::BadArgs);
    };

    for pair in rest {
        if let Some((key, value)) = pair.split_once('=') {
            std::env::set_var(key, value);
        }
    }

    let scb = Arc::new(Scb::open(scb_os_id)?);

    let config_path =
        std::env::var("SPIDERD_CONFIG_PATH").unwrap_or_else(|_| "spiderd.toml".to_string());
    let config = RuntimeConfig::load(Path::new(&config_path))
        .unwrap_or_else(|err| {
            eprintln!("failed to load spiderd.toml, using defaults: {err}");
            RuntimeConfig::default()
        });

    let operational_db = operational::operational_db_name(container_id);
    let operational_store: Arc<dyn TableStore> = Arc::new(JsonTableStore::open(scb.spider_db_dir())?);
    operational::init_operational_schema(operational_store.as_ref(), &operational_db)?;

    let data_db = data::data_db_name(container_id);
    let data_store: Arc<dyn TableStore> = Arc::new(JsonTableStore::open(data_store_root)?);
    data::init_data_schema(data_store.as_ref(), &data_db)?;

    let log_sink = LogSink::new(Arc::clone(&operational_store), operational_db.clone());
    tracing_subscriber::fmt()
        .with_writer(log_sink.clone())
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let watchdog = if scb.is_daemon() {
        None
    } else {
        Some(Arc::new(Watchdog::spawn(Arc::clone(&scb), config.watchdog_timeout)))
    };

    let queue = Arc::new(spiderd_worker::EmittedRowQueue::new(config.emitted_row_queue_capacity));
    let ctx = Arc::new(WorkerContext::new(
        data_store,
        data_db,
        operational_store,
        operational_db,
        queue,
        Arc::clone(&scb),
        watchdog,
        config.thread_maximum,
    ));

    let spider = load_spider_plugin(Path::new(entry_full_path))?;

    spiderd_worker::supervisor::run(spider, ctx, scb, log_sink, container_id, config.worker_poll)
}
