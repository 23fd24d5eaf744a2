// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! The Container Manager: the `load/run/start/stop/restart/rm/ps/logs/packages/rmi`
//! façade against the persistent catalog, and owner of the supervised-contexts
//! map every other running piece reads from.

use crate::archive::{self, ExtractedPackage};
use crate::error::ManagerError;
use crate::supervised::{SupervisedContext, SupervisedContexts};
use chrono::{DateTime, Utc};
use spiderd_core::clock::{Clock, SystemClock};
use spiderd_core::config::RuntimeConfig;
use spiderd_core::container::{generate_name, Container, ContainerId, ContainerStatus};
use spiderd_core::cron::CronSchedule;
use spiderd_core::dependency::DependencyInstaller;
use spiderd_core::manifest::RunOverrides;
use spiderd_core::package::{split_package_ref, Package};
use spiderd_core::store::TableStore;
use spiderd_scb::Scb;
use spiderd_storage::memory_store::JsonTableStore;
use spiderd_storage::{catalog, operational};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

/// One `ps` row, already rendered the way the CLI prints it.
#[derive(Debug, Clone)]
pub struct ContainerRow {
    pub id: String,
    pub name: String,
    pub package_ref: String,
    pub created: String,
    pub status: String,
}

fn cdylib_filename(entry_stem: &str) -> String {
    format!("{}{}{}", std::env::consts::DLL_PREFIX, entry_stem, std::env::consts::DLL_SUFFIX)
}

/// The SCB segment name for a container, derived purely from its id so
/// any process (the daemon that spawned it, or a separate `spiderd-cli`
/// invocation) can reopen the same segment without shared in-memory state.
fn scb_os_id(container_id: &str) -> String {
    format!("spiderd-{container_id}")
}

fn relative_time(from: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - from).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86400),
    }
}

fn annotated_status(container: &Container) -> String {
    match (container.status, container.last_return_code) {
        (ContainerStatus::Terminated, Some(code)) => format!("TERMINATED({code})"),
        (status, _) => status.to_string(),
    }
}

pub struct Manager<C: Clock = SystemClock> {
    config: RuntimeConfig,
    worker_bin: PathBuf,
    catalog: Arc<dyn TableStore>,
    dependency_installer: Arc<dyn DependencyInstaller>,
    cron: Arc<dyn CronSchedule>,
    clock: C,
    contexts: SupervisedContexts,
    /// Pending cron-reschedule timers, keyed by container id, so `rm` can
    /// cancel one before it fires.
    timers: parking_lot::Mutex<std::collections::HashMap<String, tokio::task::JoinHandle<()>>>,
}

impl<C: Clock> Manager<C> {
    pub fn new(
        config: RuntimeConfig,
        worker_bin: PathBuf,
        dependency_installer: Arc<dyn DependencyInstaller>,
        cron: Arc<dyn CronSchedule>,
        clock: C,
    ) -> Result<Self, ManagerError> {
        std::fs::create_dir_all(&config.packages_dir)?;
        std::fs::create_dir_all(&config.containers_dir)?;
        let catalog_dir = config.db_root.join("catalog");
        let catalog: Arc<dyn TableStore> = Arc::new(JsonTableStore::open(catalog_dir)?);
        catalog::init_schema(catalog.as_ref())?;

        Ok(Self {
            config,
            worker_bin,
            catalog,
            dependency_installer,
            cron,
            clock,
            contexts: SupervisedContexts::new(),
            timers: parking_lot::Mutex::new(std::collections::HashMap::new()),
        })
    }

    pub fn contexts(&self) -> &SupervisedContexts {
        &self.contexts
    }

    pub(crate) fn catalog(&self) -> &Arc<dyn TableStore> {
        &self.catalog
    }

    pub(crate) fn cron(&self) -> &Arc<dyn CronSchedule> {
        &self.cron
    }

    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }

    /// Replace any existing pending timer for `container_id` with `handle`.
    pub(crate) fn set_timer(&self, container_id: String, handle: tokio::task::JoinHandle<()>) {
        if let Some(old) = self.timers.lock().insert(container_id, handle) {
            old.abort();
        }
    }

    fn cancel_timer(&self, container_id: &str) {
        if let Some(handle) = self.timers.lock().remove(container_id) {
            handle.abort();
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn operational_dir(&self, container_id: &str) -> PathBuf {
        self.config.db_root.join("operational").join(container_id)
    }

    fn data_root(&self) -> PathBuf {
        self.config.db_root.join("data")
    }

    fn resolve_package(&self, package_ref: &str) -> Result<Package, ManagerError> {
        let packages = catalog::list_packages(self.catalog.as_ref())?;
        packages
            .into_iter()
            .find(|p| p.package_ref() == package_ref || p.id.as_str().starts_with(package_ref))
            .ok_or_else(|| ManagerError::PackageNotFound(package_ref.to_string()))
    }

    /// `load <path>`: extract the archive into `<packages>/<id>/` and
    /// record it in the catalog. Idempotent on an already-loaded id.
    pub fn load(&self, archive_path: &std::path::Path) -> Result<Package, ManagerError> {
        let ExtractedPackage { id, manifest, size_bytes, dir: _, already_loaded } =
            archive::load_archive(archive_path, &self.config.packages_dir)?;

        if already_loaded {
            let packages = catalog::list_packages(self.catalog.as_ref())?;
            if let Some(existing) = packages.into_iter().find(|p| p.id == id) {
                return Ok(existing);
            }
        }

        let package = Package {
            id,
            name: manifest.infos.name.clone(),
            tag: manifest.infos.tag.clone(),
            created_at: self.clock.utc_now(),
            size_bytes,
            author: manifest.infos.author.clone(),
            description: manifest.infos.desc.clone(),
            manifest,
        };
        catalog::insert_package(self.catalog.as_ref(), &package)?;
        Ok(package)
    }

    pub fn packages(&self) -> Result<Vec<Package>, ManagerError> {
        Ok(catalog::list_packages(self.catalog.as_ref())?)
    }

    /// `run [overrides] name:tag`: install declared dependencies, compute
    /// effective settings, materialize a private container directory, then
    /// hand off to [`Self::start`].
    pub fn run(&self, package_ref: &str, overrides: RunOverrides) -> Result<Container, ManagerError> {
        let package = self.resolve_package(package_ref)?;
        self.dependency_installer.ensure_present(&package.manifest.runtimes.dependencies)?;

        let effective = package.manifest.effective_settings(&overrides);
        let id = ContainerId::generate(&self.clock);
        let name = overrides.name.clone().unwrap_or_else(|| generate_name(&self.clock));

        let container_dir = self.config.containers_dir.join(id.as_str());
        let package_dir = self.config.packages_dir.join(package.id.as_str());
        archive::copy_tree(&package_dir, &container_dir.join(&package.name))?;
        std::fs::create_dir_all(container_dir.join("db"))?;

        let container = Container {
            id,
            package_ref: package.package_ref(),
            name,
            created_at: self.clock.utc_now(),
            entry: effective.entry,
            daemon: effective.daemon,
            envs: effective.envs,
            cron: effective.cron,
            status: ContainerStatus::Created,
            last_return_code: None,
        };
        catalog::insert_container(self.catalog.as_ref(), &container)?;

        self.start(container.id.as_str())?;
        let started = catalog::resolve_container(self.catalog.as_ref(), container.id.as_str())?;
        Ok(started)
    }

    /// `start <ref>`: no-op if the catalog already reports `RUNNING`
    /// (catalog state, not the in-process supervised-contexts map, is the
    /// source of truth here — a separate `spiderd-cli` invocation has its
    /// own empty map but shares the same catalog and SCB segment naming).
    pub fn start(&self, container_ref: &str) -> Result<(), ManagerError> {
        let container = catalog::resolve_container(self.catalog.as_ref(), container_ref)?;
        if container.status == ContainerStatus::Running {
            return Ok(());
        }

        let db_dir = self.operational_dir(container.id.as_str());
        std::fs::create_dir_all(&db_dir)?;
        let os_id = scb_os_id(container.id.as_str());
        let scb = Arc::new(Scb::create(&os_id, container.daemon, &db_dir.to_string_lossy())?);

        let package_name = split_package_ref(&container.package_ref).map(|(n, _)| n).unwrap_or_default();
        let entry_full_path = self
            .config
            .containers_dir
            .join(container.id.as_str())
            .join(package_name)
            .join(cdylib_filename(&container.entry));

        let mut command = Command::new(&self.worker_bin);
        command.arg(&entry_full_path).arg(&os_id).arg(self.data_root()).arg(container.id.as_str());
        for (key, value) in &container.envs {
            command.arg(format!("{key}={value}"));
        }
        let process = command.spawn()?;

        self.contexts.insert(
            container.id.as_str().to_string(),
            SupervisedContext { cron: container.cron.clone(), scb, process },
        );
        catalog::update_container_runtime(self.catalog.as_ref(), &container.id, ContainerStatus::Running, None)?;
        Ok(())
    }

    /// `stop <ref>`: a no-op if the container isn't currently `RUNNING`.
    pub fn stop(&self, container_ref: &str) -> Result<(), ManagerError> {
        let container = catalog::resolve_container(self.catalog.as_ref(), container_ref)?;
        if container.status != ContainerStatus::Running {
            return Ok(());
        }
        Scb::open(&scb_os_id(container.id.as_str()))?.set_stop_event();
        Ok(())
    }

    /// `restart <ref>`: stop then start, with no wait between the two —
    /// `start` always allocates a fresh SCB and process, so an in-flight
    /// stop cannot be confused with the new instance.
    pub fn restart(&self, container_ref: &str) -> Result<(), ManagerError> {
        let container = catalog::resolve_container(self.catalog.as_ref(), container_ref)?;
        if container.status != ContainerStatus::Terminated {
            self.stop(container_ref)?;
        }
        self.start(container_ref)
    }

    /// `rm [-f] <ref>`: refuses a non-`TERMINATED` container unless `force`,
    /// in which case the worker process is killed outright rather than
    /// waited on.
    pub fn rm(&self, container_ref: &str, force: bool) -> Result<(), ManagerError> {
        let container = catalog::resolve_container(self.catalog.as_ref(), container_ref)?;
        if container.status != ContainerStatus::Terminated && !force {
            return Err(ManagerError::RefusedNotTerminated(container_ref.to_string()));
        }

        if let Some(mut context) = self.contexts.remove(container.id.as_str()) {
            context.scb.set_stop_event();
            let _ = context.process.kill();
        } else if container.status == ContainerStatus::Running {
            if let Ok(scb) = Scb::open(&scb_os_id(container.id.as_str())) {
                scb.set_stop_event();
            }
        }
        self.cancel_timer(container.id.as_str());

        catalog::delete_container(self.catalog.as_ref(), &container.id)?;
        let container_dir = self.config.containers_dir.join(container.id.as_str());
        if container_dir.is_dir() {
            std::fs::remove_dir_all(&container_dir)?;
        }
        let _ = std::fs::remove_dir_all(self.operational_dir(container.id.as_str()));
        Ok(())
    }

    /// `rmi <name:tag>`: delete the package's catalog rows and its
    /// directory. Does not touch any container already copied from it.
    pub fn rmi(&self, package_ref: &str) -> Result<(), ManagerError> {
        let package = self.resolve_package(package_ref)?;
        catalog::delete_package(self.catalog.as_ref(), &package.id)?;
        let package_dir = self.config.packages_dir.join(package.id.as_str());
        if package_dir.is_dir() {
            std::fs::remove_dir_all(&package_dir)?;
        }
        Ok(())
    }

    /// `ps [-a]`: excludes `TERMINATED` rows unless `all`.
    pub fn ps(&self, all: bool) -> Result<Vec<ContainerRow>, ManagerError> {
        let now = self.clock.utc_now();
        let containers = catalog::list_containers(self.catalog.as_ref(), all)?;
        Ok(containers
            .into_iter()
            .map(|container| ContainerRow {
                id: container.id.short(12).to_string(),
                name: container.name.clone(),
                package_ref: container.package_ref.clone(),
                created: relative_time(container.created_at, now),
                status: annotated_status(&container),
            })
            .collect())
    }

    /// `logs <ref>`: if the container is currently `RUNNING`, requests a
    /// fresh ring-buffer snapshot (which already contains the full history,
    /// the sink having mirrored every line into it); otherwise falls back
    /// to the operational `logs` table, which every line was also
    /// persisted into as it was written.
    pub fn logs(&self, container_ref: &str) -> Result<String, ManagerError> {
        let container = catalog::resolve_container(self.catalog.as_ref(), container_ref)?;

        if container.status == ContainerStatus::Running {
            if let Ok(scb) = Scb::open(&scb_os_id(container.id.as_str())) {
                scb.request_logs();
                while scb.logs_requested() {
                    std::thread::sleep(Duration::from_millis(50));
                }
                return Ok(scb.read_logs_buffer());
            }
        }

        let db_dir = self.operational_dir(container.id.as_str());
        let store = JsonTableStore::open(db_dir)?;
        let db = operational::operational_db_name(container.id.as_str());
        let lines = operational::read_all_logs(&store, &db)?;
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spiderd_core::clock::FakeClock;
    use spiderd_core::dependency::NoopDependencyInstaller;
    use spiderd_core::cron::SystemCron;
    use std::io::Write;

    fn sample_archive(dir: &std::path::Path) -> PathBuf {
        let manifest = serde_json::json!({
            "infos": {"name": "demo", "tag": "1.0", "author": "a", "desc": "d"},
            "runtimes": {"entry": "main", "daemon": false, "envs": {}, "dependencies": []},
            "schedules": {"cron": ""},
        });
        let archive_path = dir.join("demo.zip");
        let file = std::fs::File::create(&archive_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("compose.json", zip::write::SimpleFileOptions::default()).unwrap();
        zip.write_all(manifest.to_string().as_bytes()).unwrap();
        zip.finish().unwrap();
        archive_path
    }

    fn manager(dir: &std::path::Path) -> Manager<FakeClock> {
        let config = RuntimeConfig {
            db_root: dir.join("db"),
            packages_dir: dir.join("packages"),
            containers_dir: dir.join("containers"),
            ..RuntimeConfig::default()
        };
        Manager::new(
            config,
            PathBuf::from("spiderd-worker"),
            Arc::new(NoopDependencyInstaller),
            Arc::new(SystemCron),
            FakeClock::new(),
        )
        .unwrap()
    }

    #[test]
    fn load_then_packages_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let archive_path = sample_archive(dir.path());

        let package = manager.load(&archive_path).unwrap();
        assert_eq!(package.name, "demo");

        let packages = manager.packages().unwrap();
        assert_eq!(packages.len(), 1);
    }

    #[test]
    fn load_is_idempotent_on_repeat_of_same_archive() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let archive_path = sample_archive(dir.path());

        let first = manager.load(&archive_path).unwrap();
        let second = manager.load(&archive_path).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(manager.packages().unwrap().len(), 1);
    }

    #[test]
    fn rm_refuses_non_terminated_container_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let archive_path = sample_archive(dir.path());
        manager.load(&archive_path).unwrap();

        let container = Container {
            id: ContainerId::generate(&FakeClock::new()),
            package_ref: "demo:1.0".into(),
            name: "quiet-otter-1".into(),
            created_at: FakeClock::new().utc_now(),
            entry: "main".into(),
            daemon: false,
            envs: Default::default(),
            cron: String::new(),
            status: ContainerStatus::Running,
            last_return_code: None,
        };
        catalog::insert_container(manager.catalog.as_ref(), &container).unwrap();

        let err = manager.rm(container.id.as_str(), false).unwrap_err();
        assert!(matches!(err, ManagerError::RefusedNotTerminated(_)));
    }

    #[test]
    fn rmi_deletes_package_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let archive_path = sample_archive(dir.path());
        let package = manager.load(&archive_path).unwrap();

        manager.rmi(&package.package_ref()).unwrap();
        assert!(manager.packages().unwrap().is_empty());
        assert!(!manager.config.packages_dir.join(package.id.as_str()).is_dir());
    }
}
