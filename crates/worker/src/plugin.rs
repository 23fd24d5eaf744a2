// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Dynamic loading of the user package's compiled spider.
//!
//! A package's `entry` names a `cdylib` built against
//! `spiderd_core::declare_spider_plugin!`, exporting one
//! `spiderd_plugin_entry` symbol. Loading it is the Rust-native analogue of
//! "the loaded module must declare exactly one subclass of the Spider
//! base" — the macro enforces "exactly one" at the user's compile time, so
//! here there is only "the symbol resolves" or "it does not."

use crate::error::WorkerError;
use libloading::{Library, Symbol};
use spiderd_core::spider::{Spider, SpiderEntryFn, SPIDER_ENTRY_SYMBOL};
use std::path::Path;

pub fn load_spider_plugin(path: &Path) -> Result<Box<dyn Spider>, WorkerError> {
    // SAFETY: `path` is expected to point at a `cdylib` built against this
    // crate's `declare_spider_plugin!` macro, which exports exactly one
    // symbol of type `SpiderEntryFn`. We trust the manifest's `entry`, the
    // same trust boundary the original module loader had toward user code.
    unsafe {
        let library = Library::new(path)
            .map_err(|source| WorkerError::PluginLoad { path: path.to_path_buf(), source })?;
        let entry: Symbol<SpiderEntryFn> = library
            .get(SPIDER_ENTRY_SYMBOL)
            .map_err(|source| WorkerError::PluginSymbol { path: path.to_path_buf(), source })?;

        let raw = entry();
        if raw.is_null() {
            return Err(WorkerError::PluginInitFailed { path: path.to_path_buf() });
        }
        let spider = Box::from_raw(raw);

        // Leak the library handle: the boxed trait object's vtable points
        // into it, so dropping `library` here would unmap code the spider
        // still calls into for the rest of the process's life.
        std::mem::forget(library);

        Ok(spider)
    }
}
