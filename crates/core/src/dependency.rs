// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Dependency installer boundary, recovered from
//! `original_source/src/TSDAP/spider/manager.py::__install_modules`.
//!
//! There is no runtime package manager for compiled Rust code, so the
//! default implementation only records that a dependency was declared but
//! unavailable; a real deployment can supply its own (e.g. one that
//! triggers a container-image rebuild).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("failed to ensure dependency '{module}': {reason}")]
    InstallFailed { module: String, reason: String },
}

pub trait DependencyInstaller: Send + Sync {
    /// Called once per package `run`, with the full declared dependency
    /// list; implementations should only act on ones not already present.
    fn ensure_present(&self, modules: &[String]) -> Result<(), DependencyError>;
}

/// Default installer: warns and continues. Preserves the "invoke once per
/// missing module" call contract without inventing a fake package manager.
#[derive(Default)]
pub struct NoopDependencyInstaller;

impl DependencyInstaller for NoopDependencyInstaller {
    fn ensure_present(&self, modules: &[String]) -> Result<(), DependencyError> {
        for module in modules {
            tracing::warn!(module, "dependency declared but not installed (no-op installer)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_installer_never_fails() {
        let installer = NoopDependencyInstaller;
        assert!(installer.ensure_present(&["requests".to_string()]).is_ok());
    }
}
