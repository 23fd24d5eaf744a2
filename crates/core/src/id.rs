// SPDX-License-Identifier: MIT
// Copyright (c) 2026 spiderd contributors

//! Fixed-capacity hex identifiers.
//!
//! Both [`crate::package::PackageId`] and [`crate::container::ContainerId`]
//! are 32-character lowercase hex strings (an MD5 digest),
//! never randomly generated. `HexId` is a `Copy`, stack-only buffer sized to
//! hold exactly one, so ids can be passed around and hashed without
//! allocating — the same trick `oj-core::id::IdBuf` uses for inline ids,
//! specialized to a fixed 32-byte payload instead of a variable one.

pub const HEX_ID_LEN: usize = 32;

/// Returns a string slice truncated to at most `n` characters.
pub fn short(s: &str, n: usize) -> &str {
    if s.len() <= n {
        s
    } else {
        &s[..n]
    }
}

/// A 32-character lowercase hex digest, stored inline.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexId([u8; HEX_ID_LEN]);

impl HexId {
    /// Build a `HexId` from raw bytes by hex-encoding them (lowercase).
    ///
    /// Only the first 16 bytes are used — an MD5 digest is exactly 16 bytes
    /// and hex-encodes to exactly 32 characters.
    pub fn from_digest(digest: [u8; 16]) -> Self {
        let mut buf = [0u8; HEX_ID_LEN];
        const HEX: &[u8; 16] = b"0123456789abcdef";
        for (i, byte) in digest.iter().enumerate() {
            buf[i * 2] = HEX[(byte >> 4) as usize];
            buf[i * 2 + 1] = HEX[(byte & 0x0f) as usize];
        }
        Self(buf)
    }

    /// Parse an existing hex string (e.g. read back from the catalog).
    ///
    /// Panics if `s` is not exactly [`HEX_ID_LEN`] ASCII hex characters —
    /// catalog rows are expected to already be well-formed.
    pub fn from_str_exact(s: &str) -> Self {
        assert_eq!(s.len(), HEX_ID_LEN, "hex id must be {HEX_ID_LEN} chars: {s:?}");
        let mut buf = [0u8; HEX_ID_LEN];
        buf.copy_from_slice(s.as_bytes());
        Self(buf)
    }

    pub fn as_str(&self) -> &str {
        // Invariant: only ever constructed from hex-encoded ASCII.
        std::str::from_utf8(&self.0).unwrap_or("")
    }

    /// First `n` characters, for truncated display (as `ps`/`packages` do).
    pub fn short(&self, n: usize) -> &str {
        short(self.as_str(), n)
    }
}

impl std::fmt::Debug for HexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for HexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::borrow::Borrow<str> for HexId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for HexId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl serde::Serialize for HexId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for HexId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <&str>::deserialize(deserializer)?;
        if s.len() != HEX_ID_LEN {
            return Err(serde::de::Error::custom(format!(
                "hex id must be {HEX_ID_LEN} chars: {s:?}"
            )));
        }
        Ok(Self::from_str_exact(s))
    }
}

/// Define a newtype wrapper around [`HexId`] for a specific domain id.
///
/// Generates `Display`, `From<HexId>`, `as_str`, `short`, and the trait impls
/// needed to use the id as a `HashMap`/`BTreeMap` key or borrow as `&str`.
#[macro_export]
macro_rules! define_hex_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $crate::id::HexId);

        impl $name {
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            pub fn short(&self, n: usize) -> &str {
                self.0.short(n)
            }

            pub fn from_str_exact(s: &str) -> Self {
                Self($crate::id::HexId::from_str_exact(s))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$crate::id::HexId> for $name {
            fn from(id: $crate::id::HexId) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0.as_str() == other
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_digest_round_trips_through_display() {
        let digest = md5::compute(b"hello world").0;
        let id = HexId::from_digest(digest);
        assert_eq!(id.as_str().len(), HEX_ID_LEN);
        assert_eq!(id.as_str(), format!("{:x}", md5::compute(b"hello world")));
    }

    #[test]
    fn short_truncates() {
        let id = HexId::from_digest([0u8; 16]);
        assert_eq!(id.short(8), "00000000");
    }

    #[test]
    fn from_str_exact_round_trips() {
        let original = HexId::from_digest([7u8; 16]);
        let parsed = HexId::from_str_exact(original.as_str());
        assert_eq!(original, parsed);
    }
}
