// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Errors raised while bringing up and running one worker process.

use spiderd_core::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("usage: spiderd-worker <entry_full_path> <scb_os_id> <data_store_root> <container_id> [K=V ...]")]
    BadArgs,
    #[error("failed to load plugin library {path}: {source}")]
    PluginLoad { path: PathBuf, source: libloading::Error },
    #[error("entry symbol not found in plugin {path}: {source}")]
    PluginSymbol { path: PathBuf, source: libloading::Error },
    #[error("plugin {path} returned a null spider instance")]
    PluginInitFailed { path: PathBuf },
    #[error(transparent)]
    Scb(#[from] spiderd_scb::ScbError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
