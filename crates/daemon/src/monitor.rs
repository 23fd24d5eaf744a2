// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The Supervisor Monitor: a background task that polls supervised worker
//! processes for exit, classifies the terminal transition, and either
//! schedules the next cron fire or leaves the container TERMINATED.

use crate::manager::Manager;
use crate::supervised::SupervisedContext;
use spiderd_core::clock::Clock;
use spiderd_core::container::{ContainerId, ContainerStatus, ReturnCode};
use std::sync::Arc;
use std::time::Duration;

/// Runs until the process exits; intended to be spawned once via
/// `tokio::spawn` right after a [`Manager`] is constructed.
pub async fn run<C: Clock>(manager: Arc<Manager<C>>) {
    loop {
        tokio::time::sleep(manager.config().monitor_poll).await;
        for (id, context) in manager.contexts().drain_dead() {
            if let Err(err) = handle_exit(&manager, &id, context) {
                tracing::error!(container_id = id, error = %err, "failed to process container exit");
            }
        }
    }
}

/// `true` if a clean, non-daemon exit should be offered a cron reschedule
/// instead of being left `TERMINATED`. A daemon container or a non-success
/// return code always terminates outright.
fn should_reschedule(return_code: ReturnCode, is_daemon: bool) -> bool {
    return_code == ReturnCode::Success && !is_daemon
}

fn handle_exit<C: Clock>(
    manager: &Arc<Manager<C>>,
    container_id: &str,
    context: SupervisedContext,
) -> Result<(), crate::error::ManagerError> {
    let return_code = context.scb.return_code().unwrap_or(ReturnCode::ExitUnexpected);
    let is_daemon = context.scb.is_daemon();
    let id = ContainerId::from_str_exact(container_id);

    tracing::info!(container_id, %return_code, is_daemon, "worker process exited");

    let new_status = if should_reschedule(return_code, is_daemon) {
        match manager.cron().next_fire_time(&context.cron, manager.clock().utc_now())? {
            Some(next_fire) => {
                schedule_reschedule(manager, container_id.to_string(), context.cron.clone(), next_fire);
                ContainerStatus::TimerWaiting
            }
            None => ContainerStatus::Terminated,
        }
    } else {
        ContainerStatus::Terminated
    };

    spiderd_storage::catalog::update_container_runtime(
        manager.catalog().as_ref(),
        &id,
        new_status,
        Some(return_code),
    )?;
    Ok(())
}

fn schedule_reschedule<C: Clock>(
    manager: &Arc<Manager<C>>,
    container_id: String,
    cron: String,
    next_fire: chrono::DateTime<chrono::Utc>,
) {
    let delay = (next_fire - manager.clock().utc_now()).to_std().unwrap_or(Duration::ZERO);
    let task_manager = Arc::clone(manager);
    let id_for_timer = container_id.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(err) = task_manager.start(&container_id) {
            tracing::error!(container_id, cron, error = %err, "scheduled cron restart failed");
        }
    });
    manager.set_timer(id_for_timer, handle);
}

/// Shut down every supervised container: set `stop_event` on each, then
/// block until the supervised-contexts map has drained — the Monitor's own
/// poll loop is what actually reaps each one and empties the map.
pub fn safety_exit<C: Clock>(manager: &Manager<C>) {
    manager.contexts().stop_all();
    while !manager.contexts().is_empty() {
        std::thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        success_non_daemon = { ReturnCode::Success, false, true },
        success_daemon = { ReturnCode::Success, true, false },
        exit_unexpected = { ReturnCode::ExitUnexpected, false, false },
        dog_trigger = { ReturnCode::DogTrigger, false, false },
        dog_trigger_daemon = { ReturnCode::DogTrigger, true, false },
    )]
    fn classifies_reschedule_eligibility(return_code: ReturnCode, is_daemon: bool, expected: bool) {
        assert_eq!(should_reschedule(return_code, is_daemon), expected);
    }
}
