// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Catalog schema and queries: the two logical databases
//! (`packages`, `containers`), each split into `infos`/`runtimes`/`schedules`
//! tables, plus the name-resolution rule used by every `spider_ref` lookup.

use chrono::Utc;
use serde_json::{json, Value};
use spiderd_core::container::{Container, ContainerId, ContainerStatus, ReturnCode};
use spiderd_core::error::RefError;
use spiderd_core::manifest::{Manifest, ManifestInfos, ManifestRuntimes, ManifestSchedules};
use spiderd_core::package::{Package, PackageId};
use spiderd_core::store::{Row, RowFilter, StoreError, TableStore};
use std::collections::BTreeMap;

pub const PACKAGES_DB: &str = "packages";
pub const CONTAINERS_DB: &str = "containers";

fn dummy_row(fields: &[(&str, Value)]) -> Row {
    fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Create both catalog databases and their tables if they don't already
/// exist. Idempotent.
pub fn init_schema(store: &dyn TableStore) -> Result<(), StoreError> {
    store.create_database(PACKAGES_DB)?;
    store.create_table(
        PACKAGES_DB,
        "infos",
        &dummy_row(&[
            ("Name", json!("")),
            ("Tag", json!("")),
            ("ID", json!("")),
            ("Created", json!("")),
            ("Size", json!(0)),
            ("Author", json!("")),
            ("Desc", json!("")),
        ]),
    )?;
    store.create_table(
        PACKAGES_DB,
        "runtimes",
        &dummy_row(&[
            ("ID", json!("")),
            ("Entry", json!("")),
            ("Daemon", json!(false)),
            ("Envs", json!("{}")),
            ("Dependencies", json!("[]")),
        ]),
    )?;
    store.create_table(PACKAGES_DB, "schedules", &dummy_row(&[("ID", json!("")), ("Cron", json!(""))]))?;

    store.create_database(CONTAINERS_DB)?;
    store.create_table(
        CONTAINERS_DB,
        "infos",
        &dummy_row(&[
            ("ID", json!("")),
            ("Package", json!("")),
            ("Created", json!("")),
            ("Name", json!("")),
        ]),
    )?;
    store.create_table(
        CONTAINERS_DB,
        "runtimes",
        &dummy_row(&[
            ("ID", json!("")),
            ("Status", json!("CREATED")),
            ("RetCode", Value::Null),
            ("Entry", json!("")),
            ("Daemon", json!(false)),
            ("Envs", json!("{}")),
        ]),
    )?;
    store.create_table(CONTAINERS_DB, "schedules", &dummy_row(&[("ID", json!("")), ("Cron", json!(""))]))?;
    Ok(())
}

pub fn insert_package(store: &dyn TableStore, package: &Package) -> Result<(), StoreError> {
    store.insert(
        PACKAGES_DB,
        "infos",
        dummy_row(&[
            ("Name", json!(package.name)),
            ("Tag", json!(package.tag)),
            ("ID", json!(package.id.as_str())),
            ("Created", json!(package.created_at.to_rfc3339())),
            ("Size", json!(package.size_bytes)),
            ("Author", json!(package.author)),
            ("Desc", json!(package.description)),
        ]),
    )?;
    store.insert(
        PACKAGES_DB,
        "runtimes",
        dummy_row(&[
            ("ID", json!(package.id.as_str())),
            ("Entry", json!(package.manifest.runtimes.entry)),
            ("Daemon", json!(package.manifest.runtimes.daemon)),
            ("Envs", json!(serde_json::to_string(&package.manifest.runtimes.envs)?)),
            ("Dependencies", json!(serde_json::to_string(&package.manifest.runtimes.dependencies)?)),
        ]),
    )?;
    store.insert(
        PACKAGES_DB,
        "schedules",
        dummy_row(&[("ID", json!(package.id.as_str())), ("Cron", json!(package.manifest.schedules.cron))]),
    )
}

fn str_field(row: &Row, key: &str) -> String {
    row.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

pub fn list_packages(store: &dyn TableStore) -> Result<Vec<Package>, StoreError> {
    let infos = store.select(PACKAGES_DB, "infos", &RowFilter::All)?;
    let runtimes = store.select(PACKAGES_DB, "runtimes", &RowFilter::All)?;
    let schedules = store.select(PACKAGES_DB, "schedules", &RowFilter::All)?;

    let runtimes_by_id: BTreeMap<String, &Row> =
        runtimes.iter().map(|r| (str_field(r, "ID"), r)).collect();
    let schedules_by_id: BTreeMap<String, &Row> =
        schedules.iter().map(|r| (str_field(r, "ID"), r)).collect();

    let mut packages = Vec::new();
    for info in &infos {
        let id = str_field(info, "ID");
        let Some(runtime) = runtimes_by_id.get(&id) else { continue };
        let cron = schedules_by_id.get(&id).map(|s| str_field(s, "Cron")).unwrap_or_default();

        let envs = serde_json::from_str(&str_field(runtime, "Envs")).unwrap_or_default();
        let dependencies = serde_json::from_str(&str_field(runtime, "Dependencies")).unwrap_or_default();

        packages.push(Package {
            id: PackageId::from_str_exact(&id),
            name: str_field(info, "Name"),
            tag: str_field(info, "Tag"),
            created_at: str_field(info, "Created").parse().unwrap_or_else(|_| Utc::now()),
            size_bytes: info.get("Size").and_then(Value::as_u64).unwrap_or(0),
            author: str_field(info, "Author"),
            description: str_field(info, "Desc"),
            manifest: Manifest {
                infos: ManifestInfos {
                    name: str_field(info, "Name"),
                    tag: str_field(info, "Tag"),
                    author: str_field(info, "Author"),
                    desc: str_field(info, "Desc"),
                },
                runtimes: ManifestRuntimes {
                    entry: str_field(runtime, "Entry"),
                    daemon: runtime.get("Daemon").and_then(Value::as_bool).unwrap_or(false),
                    envs,
                    dependencies,
                },
                schedules: ManifestSchedules { cron },
            },
        });
    }
    Ok(packages)
}

pub fn delete_package(store: &dyn TableStore, id: &PackageId) -> Result<(), StoreError> {
    let filter = RowFilter::eq("ID", json!(id.as_str()));
    store.delete(PACKAGES_DB, "infos", &filter)?;
    store.delete(PACKAGES_DB, "runtimes", &filter)?;
    store.delete(PACKAGES_DB, "schedules", &filter)
}

pub fn insert_container(store: &dyn TableStore, container: &Container) -> Result<(), StoreError> {
    store.insert(
        CONTAINERS_DB,
        "infos",
        dummy_row(&[
            ("ID", json!(container.id.as_str())),
            ("Package", json!(container.package_ref)),
            ("Created", json!(container.created_at.to_rfc3339())),
            ("Name", json!(container.name)),
        ]),
    )?;
    store.insert(
        CONTAINERS_DB,
        "runtimes",
        dummy_row(&[
            ("ID", json!(container.id.as_str())),
            ("Status", json!(container.status.to_string())),
            ("RetCode", container.last_return_code.map(|c| json!(c as i32)).unwrap_or(Value::Null)),
            ("Entry", json!(container.entry)),
            ("Daemon", json!(container.daemon)),
            ("Envs", json!(serde_json::to_string(&container.envs)?)),
        ]),
    )?;
    store.insert(
        CONTAINERS_DB,
        "schedules",
        dummy_row(&[("ID", json!(container.id.as_str())), ("Cron", json!(container.cron))]),
    )
}

fn parse_status(s: &str) -> ContainerStatus {
    match s {
        "RUNNING" => ContainerStatus::Running,
        "TIMER_WAITING" => ContainerStatus::TimerWaiting,
        "TERMINATED" => ContainerStatus::Terminated,
        _ => ContainerStatus::Created,
    }
}

fn row_to_container(info: &Row, runtime: &Row, cron: String) -> Container {
    let envs = serde_json::from_str(&str_field(runtime, "Envs")).unwrap_or_default();
    Container {
        id: ContainerId::from_str_exact(&str_field(info, "ID")),
        package_ref: str_field(info, "Package"),
        name: str_field(info, "Name"),
        created_at: str_field(info, "Created").parse().unwrap_or_else(|_| Utc::now()),
        entry: str_field(runtime, "Entry"),
        daemon: runtime.get("Daemon").and_then(Value::as_bool).unwrap_or(false),
        envs,
        cron,
        status: parse_status(&str_field(runtime, "Status")),
        last_return_code: runtime.get("RetCode").and_then(Value::as_i64).and_then(|v| ReturnCode::from_i32(v as i32)),
    }
}

/// Inner-join `infos`/`runtimes`, excluding `TERMINATED` unless `all`.
pub fn list_containers(store: &dyn TableStore, all: bool) -> Result<Vec<Container>, StoreError> {
    let infos = store.select(CONTAINERS_DB, "infos", &RowFilter::All)?;
    let runtimes = store.select(CONTAINERS_DB, "runtimes", &RowFilter::All)?;
    let schedules = store.select(CONTAINERS_DB, "schedules", &RowFilter::All)?;

    let runtimes_by_id: BTreeMap<String, &Row> =
        runtimes.iter().map(|r| (str_field(r, "ID"), r)).collect();
    let schedules_by_id: BTreeMap<String, &Row> =
        schedules.iter().map(|r| (str_field(r, "ID"), r)).collect();

    let mut out = Vec::new();
    for info in &infos {
        let id = str_field(info, "ID");
        let Some(runtime) = runtimes_by_id.get(&id) else { continue };
        let cron = schedules_by_id.get(&id).map(|s| str_field(s, "Cron")).unwrap_or_default();
        let container = row_to_container(info, runtime, cron);
        if !all && container.status == ContainerStatus::Terminated {
            continue;
        }
        out.push(container);
    }
    Ok(out)
}

/// Match `ID LIKE '%ref%' OR Name = ref`; id collisions are resolved by
/// taking the first row.
pub fn resolve_container(store: &dyn TableStore, spider_ref: &str) -> Result<Container, RefError> {
    let filter = RowFilter::like("ID", spider_ref.to_string()).or(RowFilter::eq("Name", json!(spider_ref)));
    let infos = store
        .select(CONTAINERS_DB, "infos", &filter)
        .map_err(|_| RefError::ResolveAmbiguous(spider_ref.to_string()))?;
    let Some(info) = infos.first() else {
        return Err(RefError::ResolveAmbiguous(spider_ref.to_string()));
    };
    let id = str_field(info, "ID");
    let runtime_rows = store
        .select(CONTAINERS_DB, "runtimes", &RowFilter::eq("ID", json!(id.clone())))
        .map_err(|_| RefError::ResolveAmbiguous(spider_ref.to_string()))?;
    let Some(runtime) = runtime_rows.first() else {
        return Err(RefError::ResolveAmbiguous(spider_ref.to_string()));
    };
    let cron = store
        .select(CONTAINERS_DB, "schedules", &RowFilter::eq("ID", json!(id)))
        .ok()
        .and_then(|rows| rows.first().map(|r| str_field(r, "Cron")))
        .unwrap_or_default();
    Ok(row_to_container(info, runtime, cron))
}

pub fn update_container_runtime(
    store: &dyn TableStore,
    id: &ContainerId,
    status: ContainerStatus,
    ret_code: Option<ReturnCode>,
) -> Result<(), StoreError> {
    let patch = dummy_row(&[
        ("Status", json!(status.to_string())),
        ("RetCode", ret_code.map(|c| json!(c as i32)).unwrap_or(Value::Null)),
    ]);
    store.update(CONTAINERS_DB, "runtimes", patch, &RowFilter::eq("ID", json!(id.as_str())))
}

pub fn delete_container(store: &dyn TableStore, id: &ContainerId) -> Result<(), StoreError> {
    let filter = RowFilter::eq("ID", json!(id.as_str()));
    store.delete(CONTAINERS_DB, "infos", &filter)?;
    store.delete(CONTAINERS_DB, "runtimes", &filter)?;
    store.delete(CONTAINERS_DB, "schedules", &filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::JsonTableStore;
    use spiderd_core::clock::{Clock, FakeClock};

    fn store() -> (tempfile::TempDir, JsonTableStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTableStore::open(dir.path().to_path_buf()).unwrap();
        init_schema(&store).unwrap();
        (dir, store)
    }

    fn sample_container(clock: &FakeClock) -> Container {
        Container {
            id: ContainerId::generate(clock),
            package_ref: "demo:1.0".into(),
            name: "quiet-otter-1".into(),
            created_at: clock.utc_now(),
            entry: "main".into(),
            daemon: false,
            envs: Default::default(),
            cron: String::new(),
            status: ContainerStatus::Created,
            last_return_code: None,
        }
    }

    #[test]
    fn insert_then_list_round_trips() {
        let (_dir, store) = store();
        let clock = FakeClock::new();
        let container = sample_container(&clock);
        insert_container(&store, &container).unwrap();

        let listed = list_containers(&store, true).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, container.id);
    }

    #[test]
    fn ps_excludes_terminated_unless_all() {
        let (_dir, store) = store();
        let clock = FakeClock::new();
        let mut container = sample_container(&clock);
        container.status = ContainerStatus::Terminated;
        insert_container(&store, &container).unwrap();

        assert!(list_containers(&store, false).unwrap().is_empty());
        assert_eq!(list_containers(&store, true).unwrap().len(), 1);
    }

    #[test]
    fn resolve_by_name_prefix_or_exact_name() {
        let (_dir, store) = store();
        let clock = FakeClock::new();
        let container = sample_container(&clock);
        insert_container(&store, &container).unwrap();

        let by_name = resolve_container(&store, "quiet-otter-1").unwrap();
        assert_eq!(by_name.id, container.id);

        let by_id_prefix = resolve_container(&store, &container.id.as_str()[..6]).unwrap();
        assert_eq!(by_id_prefix.id, container.id);
    }

    #[test]
    fn resolve_unknown_ref_is_ambiguous_error() {
        let (_dir, store) = store();
        assert!(matches!(resolve_container(&store, "nope"), Err(RefError::ResolveAmbiguous(_))));
    }

    #[test]
    fn update_runtime_then_list_reflects_new_status() {
        let (_dir, store) = store();
        let clock = FakeClock::new();
        let container = sample_container(&clock);
        insert_container(&store, &container).unwrap();

        update_container_runtime(&store, &container.id, ContainerStatus::Terminated, Some(ReturnCode::Success))
            .unwrap();

        let listed = list_containers(&store, true).unwrap();
        assert_eq!(listed[0].status, ContainerStatus::Terminated);
        assert_eq!(listed[0].last_return_code, Some(ReturnCode::Success));
    }
}
