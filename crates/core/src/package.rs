// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Packages — immutable `(name, tag)`-addressed code bundles.

use crate::define_hex_id;
use crate::manifest::Manifest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

define_hex_id! {
    /// Content hash of the archive's first descriptor line, hex-encoded.
    ///
    /// Deliberately weak (collisions across unrelated archives sharing a
    /// first line are possible) — this is documented upstream behavior, not
    /// a bug we're free to fix. See `DESIGN.md` Open Questions.
    pub struct PackageId;
}

impl PackageId {
    /// Compute a package id from the archive's first line of bytes.
    pub fn from_first_line(first_line: &[u8]) -> Self {
        Self(crate::id::HexId::from_digest(md5::compute(first_line).0))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub tag: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub author: String,
    pub description: String,
    pub manifest: Manifest,
}

impl Package {
    pub fn package_ref(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

/// Parse a `"name:tag"` reference into its parts.
pub fn split_package_ref(package_ref: &str) -> Option<(&str, &str)> {
    package_ref.split_once(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_id_is_deterministic_over_first_line_only() {
        let a = PackageId::from_first_line(b"PK\x03\x04 first line\n");
        let b = PackageId::from_first_line(b"PK\x03\x04 first line\nDIFFERENT REST OF FILE");
        assert_eq!(a, b, "only the first line feeds the hash, by documented design");
    }

    #[test]
    fn split_package_ref_splits_on_first_colon() {
        assert_eq!(split_package_ref("demo:1.0"), Some(("demo", "1.0")));
        assert_eq!(split_package_ref("no-tag"), None);
    }
}
