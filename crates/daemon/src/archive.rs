// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Thin adapter around package archives: just enough zip-reading and
//! recursive directory copying to make `load`/`run` runnable. Full archive
//! format validation is deliberately out of scope.

use crate::error::ManagerError;
use spiderd_core::manifest::Manifest;
use spiderd_core::package::PackageId;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// A package already extracted on disk, ready for cataloging.
pub struct ExtractedPackage {
    pub id: PackageId,
    pub manifest: Manifest,
    pub size_bytes: u64,
    pub dir: PathBuf,
    /// `true` if this id's directory already existed (idempotent `load`).
    pub already_loaded: bool,
}

/// `package_id = md5(first line of the archive's bytes)`, per the
/// documented (if dubious) upstream behavior.
fn compute_package_id(archive_path: &Path) -> Result<PackageId, ManagerError> {
    let mut file = File::open(archive_path)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let first_line = buf.iter().position(|&b| b == b'\n').map_or(&buf[..], |i| &buf[..=i]);
    Ok(PackageId::from_first_line(first_line))
}

/// Extract `archive_path` (a zip) into `<packages_dir>/<package_id>/`,
/// parsing its `compose.json` into a [`Manifest`]. Idempotent: if the
/// destination directory already exists, the existing manifest is read back
/// and `already_loaded` is set instead of re-extracting.
pub fn load_archive(archive_path: &Path, packages_dir: &Path) -> Result<ExtractedPackage, ManagerError> {
    if !archive_path.exists() {
        return Err(ManagerError::PackageNotFound(archive_path.display().to_string()));
    }

    let id = compute_package_id(archive_path)?;
    let dest = packages_dir.join(id.as_str());
    let size_bytes = archive_path.metadata()?.len();

    if dest.is_dir() {
        tracing::warn!(package_id = id.as_str(), "package already loaded, treating load as success");
        let manifest = read_manifest(&dest)?;
        return Ok(ExtractedPackage { id, manifest, size_bytes, dir: dest, already_loaded: true });
    }

    std::fs::create_dir_all(&dest)?;
    let file = File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(file)?;
    zip.extract(&dest)?;

    let manifest = read_manifest(&dest)?;
    Ok(ExtractedPackage { id, manifest, size_bytes, dir: dest, already_loaded: false })
}

fn read_manifest(package_dir: &Path) -> Result<Manifest, ManagerError> {
    let contents = std::fs::read_to_string(package_dir.join("compose.json"))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Recursively copy a directory tree, used to give each container its own
/// private copy of the package code it launches from.
pub fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dst_path = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_tree(&entry.path(), &dst_path)?;
        } else {
            std::fs::copy(entry.path(), dst_path)?;
        }
    }
    Ok(())
}
