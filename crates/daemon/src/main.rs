// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The `spiderd` daemon binary: owns one [`Manager`] for the process
//! lifetime and runs the Supervisor Monitor until asked to shut down.
//!
//! Business logic for the interactive/CLI surface lives entirely in
//! `spiderd-cli`; this binary is the long-running supervisor half of the
//! system — the half that actually needs a process lifetime longer than a
//! single command.

use spiderd_core::clock::SystemClock;
use spiderd_core::config::RuntimeConfig;
use spiderd_core::cron::SystemCron;
use spiderd_core::dependency::NoopDependencyInstaller;
use spiderd_daemon::{Manager, ManagerError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    match real_main().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("spiderd failed: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn real_main() -> Result<(), ManagerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path =
        std::env::var("SPIDERD_CONFIG_PATH").unwrap_or_else(|_| "spiderd.toml".to_string());
    let config = RuntimeConfig::load(Path::new(&config_path)).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to load spiderd.toml, using defaults");
        RuntimeConfig::default()
    });

    let worker_bin = std::env::var("SPIDERD_WORKER_BIN")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("spiderd-worker"));

    let manager = Arc::new(Manager::new(
        config,
        worker_bin,
        Arc::new(NoopDependencyInstaller),
        Arc::new(SystemCron),
        SystemClock,
    )?);

    let monitor_handle = tokio::spawn(spiderd_daemon::monitor::run(Arc::clone(&manager)));

    tracing::info!("spiderd daemon started, supervising containers");
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler, shutting down anyway");
    }

    tracing::info!("shutdown requested, stopping all supervised containers");
    monitor_handle.abort();
    spiderd_daemon::monitor::safety_exit(manager.as_ref());
    Ok(())
}
