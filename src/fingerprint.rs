//! Content-addressed identity for configurations.
//!
//! The digest is SHA-256 over the compact JSON rendering of the key-sorted
//! configuration (`{"a":"1","b":"x"}`), so it depends only on the set of
//! `(measure, option)` pairs and never on insertion order. It is a cache key,
//! not a security boundary, and is never persisted as an identity across
//! processes; logs carry it for cross-referencing only.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::configuration::Configuration;
use crate::error::{Error, Result};

/// A 32-byte SHA-256 digest of a canonicalized [`Configuration`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hexadecimal rendering (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64-character hexadecimal digest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `s` is not valid hex or does not decode
    /// to exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::Config(format!("bad fingerprint: {e}")))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            Error::Config(format!("bad fingerprint: expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Computes the order-independent digest of `config`.
///
/// Two configurations have equal fingerprints exactly when they hold the
/// same keys with the same values (up to SHA-256 collisions).
///
/// # Examples
///
/// ```
/// use retrofit_optimizer::{Configuration, fingerprint};
///
/// let a: Configuration = [("x", "1"), ("y", "2")].into_iter().collect();
/// let b: Configuration = [("y", "2"), ("x", "1")].into_iter().collect();
/// assert_eq!(fingerprint(&a), fingerprint(&b));
///
/// let c: Configuration = [("x", "1"), ("y", "3")].into_iter().collect();
/// assert_ne!(fingerprint(&a), fingerprint(&c));
/// ```
#[must_use]
pub fn fingerprint(config: &Configuration) -> Fingerprint {
    Fingerprint(Sha256::digest(canonical_bytes(config)).into())
}

/// Compact, key-sorted JSON rendering used as the hash preimage.
fn canonical_bytes(config: &Configuration) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 * config.len() + 2);
    out.push(b'{');
    for (i, (k, v)) in config.as_map().iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        push_json_string(&mut out, k);
        out.push(b':');
        push_json_string(&mut out, v);
    }
    out.push(b'}');
    out
}

fn push_json_string(out: &mut Vec<u8>, s: &str) {
    // serde_json never fails on a plain string.
    match serde_json::to_vec(s) {
        Ok(encoded) => out.extend_from_slice(&encoded),
        Err(_) => out.extend_from_slice(s.as_bytes()),
    }
}
