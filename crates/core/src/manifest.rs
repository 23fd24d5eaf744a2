// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! `compose.json` manifest shape.
//!
//! Parsing the archive itself is an external collaborator;
//! this module only defines the shape the parsed manifest takes and the
//! per-field fallback rule used by `run` to compute a
//! container's effective settings from package defaults plus overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestInfos {
    pub name: String,
    pub tag: String,
    pub author: String,
    pub desc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRuntimes {
    /// File stem of the cdylib entry point (no extension, no `lib` prefix).
    pub entry: String,
    #[serde(default)]
    pub daemon: bool,
    #[serde(default)]
    pub envs: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestSchedules {
    #[serde(default)]
    pub cron: String,
}

/// The full `compose.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub infos: ManifestInfos,
    pub runtimes: ManifestRuntimes,
    #[serde(default)]
    pub schedules: ManifestSchedules,
}

/// Per-field overrides a caller can supply to `run`.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub name: Option<String>,
    pub entry: Option<String>,
    pub daemon: Option<bool>,
    pub envs: BTreeMap<String, String>,
    pub cron: Option<String>,
}

/// A package's defaults merged with per-run overrides, producing the
/// settings a container actually launches with.
#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub entry: String,
    pub daemon: bool,
    pub envs: BTreeMap<String, String>,
    pub cron: String,
}

impl Manifest {
    /// Merge `overrides` onto this manifest's runtime defaults. Every field
    /// falls back independently: `envs` replaces the package defaults
    /// wholesale when an override is given, same as `entry`/`daemon`/`cron`,
    /// rather than merging key-by-key.
    pub fn effective_settings(&self, overrides: &RunOverrides) -> EffectiveSettings {
        let envs = if overrides.envs.is_empty() { self.runtimes.envs.clone() } else { overrides.envs.clone() };

        EffectiveSettings {
            entry: overrides.entry.clone().unwrap_or_else(|| self.runtimes.entry.clone()),
            daemon: overrides.daemon.unwrap_or(self.runtimes.daemon),
            envs,
            cron: overrides.cron.clone().unwrap_or_else(|| self.schedules.cron.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Manifest {
        Manifest {
            infos: ManifestInfos {
                name: "demo".into(),
                tag: "1.0".into(),
                author: "a".into(),
                desc: "d".into(),
            },
            runtimes: ManifestRuntimes {
                entry: "main".into(),
                daemon: false,
                envs: BTreeMap::from([("A".into(), "1".into())]),
                dependencies: vec![],
            },
            schedules: ManifestSchedules { cron: String::new() },
        }
    }

    #[test]
    fn overrides_fall_back_to_package_defaults() {
        let manifest = sample();
        let effective = manifest.effective_settings(&RunOverrides::default());
        assert_eq!(effective.entry, "main");
        assert!(!effective.daemon);
        assert_eq!(effective.cron, "");
    }

    #[test]
    fn overrides_win_and_envs_replace_wholesale() {
        let manifest = sample();
        let overrides = RunOverrides {
            entry: Some("other".into()),
            daemon: Some(true),
            envs: BTreeMap::from([("B".into(), "2".into())]),
            cron: Some("0 * * * * *".into()),
            ..Default::default()
        };
        let effective = manifest.effective_settings(&overrides);
        assert_eq!(effective.entry, "other");
        assert!(effective.daemon);
        assert_eq!(effective.envs, BTreeMap::from([("B".into(), "2".into())]));
        assert_eq!(effective.cron, "0 * * * * *");
    }
}
