// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The supervised-contexts map: every container the Manager currently
//! considers live, keyed by container id. Guarded by a single mutex covering
//! insert/delete/iterate, per the concurrency model's resource-sharing rule.

use parking_lot::Mutex;
use spiderd_scb::Scb;
use std::collections::HashMap;
use std::sync::Arc;

pub struct SupervisedContext {
    pub cron: String,
    pub scb: Arc<Scb>,
    pub process: std::process::Child,
}

impl SupervisedContext {
    /// `Ok(true)` if the worker process has already exited.
    pub fn is_dead(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(Some(_)))
    }
}

#[derive(Default, Clone)]
pub struct SupervisedContexts {
    inner: Arc<Mutex<HashMap<String, SupervisedContext>>>,
}

impl SupervisedContexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, container_id: String, context: SupervisedContext) {
        self.inner.lock().insert(container_id, context);
    }

    pub fn remove(&self, container_id: &str) -> Option<SupervisedContext> {
        self.inner.lock().remove(container_id)
    }

    pub fn contains(&self, container_id: &str) -> bool {
        self.inner.lock().contains_key(container_id)
    }

    pub fn get_scb(&self, container_id: &str) -> Option<Arc<Scb>> {
        self.inner.lock().get(container_id).map(|context| Arc::clone(&context.scb))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Set `stop_event` on every currently-supervised container's SCB.
    pub fn stop_all(&self) {
        for context in self.inner.lock().values() {
            context.scb.set_stop_event();
        }
    }

    /// Remove and return every entry whose worker process has already died.
    pub fn drain_dead(&self) -> Vec<(String, SupervisedContext)> {
        let mut guard = self.inner.lock();
        let dead_ids: Vec<String> =
            guard.iter_mut().filter(|(_, context)| context.is_dead()).map(|(id, _)| id.clone()).collect();
        dead_ids.into_iter().filter_map(|id| guard.remove(&id).map(|context| (id.clone(), context))).collect()
    }
}
