//! Cache key derivation.
//!
//! Request identifiers (usually URLs) are hashed into fixed-width hex keys
//! that are safe to use as filenames and cheap to compare.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// File extension for committed disk entries.
pub const ENTRY_EXTENSION: &str = "img";

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash algorithm used to derive cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAlgorithm {
    /// SHA-256, 64 hex characters.
    #[default]
    Sha256,
    /// FNV-1a 64-bit structural hash, 16 hex characters.
    ///
    /// Stable across builds and platforms, but collisions are far more
    /// likely than with SHA-256.
    Structural,
}

impl KeyAlgorithm {
    /// Length in hex characters of keys produced by this algorithm.
    pub fn key_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Structural => 16,
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "structural" | "fnv" | "fnv1a" => Ok(Self::Structural),
            other => Err(format!("unknown key algorithm '{}'", other)),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Structural => write!(f, "structural"),
        }
    }
}

/// Opaque, fixed-width identifier for a cached image.
///
/// Equal identifiers always produce equal keys. Different identifiers may
/// collide; every tier treats a colliding write as an overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an already-derived hex digest.
    ///
    /// Returns `None` unless `hex` is non-empty lowercase hexadecimal, which
    /// keeps every key usable as a filename.
    pub fn from_hex(hex: impl Into<String>) -> Option<Self> {
        let hex = hex.into();
        let valid = !hex.is_empty()
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then_some(Self(hex))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filename of the committed disk entry for this key.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, ENTRY_EXTENSION)
    }

    /// Parses a committed entry filename back into a key.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(ENTRY_EXTENSION)?.strip_suffix('.')?;
        Self::from_hex(stem)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the cache key for `identifier` using SHA-256.
pub fn derive_key(identifier: &str) -> CacheKey {
    derive_key_with(identifier, KeyAlgorithm::Sha256)
}

/// Derives the cache key for `identifier` using the given algorithm.
pub fn derive_key_with(identifier: &str, algorithm: KeyAlgorithm) -> CacheKey {
    match algorithm {
        KeyAlgorithm::Sha256 => {
            let digest = Sha256::digest(identifier.as_bytes());
            CacheKey(to_hex(&digest))
        }
        KeyAlgorithm::Structural => CacheKey(format!("{:016x}", fnv1a64(identifier.as_bytes()))),
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}
