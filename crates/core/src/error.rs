// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The two user-visible, non-exception error cases that aren't store
//! errors: `PackageNotFound` and `ResolveAmbiguous`. Both are
//! "print a message, take no action" paths rather than hard failures, so
//! callers are expected to match on them rather than bubble them up as a
//! generic internal error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefError {
    #[error("package '{0}' not found")]
    PackageNotFound(String),
    #[error("no container matches '{0}'")]
    ResolveAmbiguous(String),
}
