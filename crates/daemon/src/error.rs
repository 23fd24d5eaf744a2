// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! `ManagerError`: the one error type every public Container Manager method
//! returns.

use spiderd_core::{CronError, DependencyError, RefError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Scb(#[from] spiderd_scb::ScbError),
    #[error(transparent)]
    Dependency(#[from] DependencyError),
    #[error(transparent)]
    Cron(#[from] CronError),
    #[error("{0}")]
    PackageNotFound(String),
    #[error("{0}")]
    ResolveAmbiguous(String),
    #[error("refusing to remove container '{0}': not TERMINATED (use force)")]
    RefusedNotTerminated(String),
}

impl From<RefError> for ManagerError {
    fn from(err: RefError) -> Self {
        match err {
            RefError::PackageNotFound(r) => Self::PackageNotFound(r),
            RefError::ResolveAmbiguous(r) => Self::ResolveAmbiguous(r),
        }
    }
}
