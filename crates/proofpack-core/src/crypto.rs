//! Dual hashing: SHA-256 and BLAKE3 over the same bytes.
//!
//! A [`Digest`] carries both 32-byte outputs and is exchanged as the
//! 129-character string `"<sha256 hex>:<blake3 hex>"`. Both algorithms are
//! always compiled in. There is no single-hash fallback.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, ValidationError};

/// Length of one hex-encoded half.
pub const HALF_HEX_LEN: usize = 64;

/// Length of the full `"<64 hex>:<64 hex>"` string.
pub const DIGEST_STR_LEN: usize = HALF_HEX_LEN * 2 + 1;

/// A dual SHA-256 / BLAKE3 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    sha256: [u8; 32],
    blake3: [u8; 32],
}

impl Digest {
    /// Assemble a digest from its two halves.
    pub const fn from_parts(sha256: [u8; 32], blake3: [u8; 32]) -> Self {
        Self { sha256, blake3 }
    }

    /// The SHA-256 half.
    pub const fn sha256(&self) -> &[u8; 32] {
        &self.sha256
    }

    /// The BLAKE3 half.
    pub const fn blake3(&self) -> &[u8; 32] {
        &self.blake3
    }

    /// Parse the `"<64 hex>:<64 hex>"` form.
    ///
    /// Only lower-case hex is accepted, so every digest has exactly one
    /// string form and string equality matches digest equality.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if s.len() != DIGEST_STR_LEN {
            return Err(ValidationError::MalformedDigest(format!(
                "expected {DIGEST_STR_LEN} characters, got {}",
                s.len()
            )));
        }
        if !s.is_ascii() {
            return Err(ValidationError::MalformedDigest("non-ASCII characters".into()));
        }
        let (sha_hex, rest) = s.split_at(HALF_HEX_LEN);
        let blake_hex = rest
            .strip_prefix(':')
            .ok_or_else(|| ValidationError::MalformedDigest("missing ':' separator".into()))?;

        Ok(Self {
            sha256: decode_half(sha_hex)?,
            blake3: decode_half(blake_hex)?,
        })
    }
}

fn decode_half(half: &str) -> Result<[u8; 32], ValidationError> {
    if !half.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(ValidationError::MalformedDigest(
            "digest halves must be lower-case hex".into(),
        ));
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(half, &mut out)
        .map_err(|e| ValidationError::MalformedDigest(e.to_string()))?;
    Ok(out)
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.sha256), hex::encode(self.blake3))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digest({}:{})",
            &hex::encode(self.sha256)[..16],
            &hex::encode(self.blake3)[..16]
        )
    }
}

impl FromStr for Digest {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute the dual digest of `data`. Total: every byte sequence, including
/// the empty one, has a digest.
pub fn dual_hash(data: impl AsRef<[u8]>) -> Digest {
    use sha2::Digest as _;

    let data = data.as_ref();
    Digest {
        sha256: Sha256::digest(data).into(),
        blake3: *blake3::hash(data).as_bytes(),
    }
}

/// Hash two child digests into their parent: the digest of the two
/// 129-character strings concatenated, left first.
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut joined = String::with_capacity(DIGEST_STR_LEN * 2);
    joined.push_str(&left.to_string());
    joined.push_str(&right.to_string());
    dual_hash(joined.as_bytes())
}

/// A hash algorithm that may appear in configuration or anchor manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Blake3,
}

impl HashAlgorithm {
    /// The algorithms every digest in this build is made of, in digest order.
    pub const DUAL: [HashAlgorithm; 2] = [HashAlgorithm::Sha256, HashAlgorithm::Blake3];

    /// Canonical upper-case name, as written into manifests.
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Blake3 => "BLAKE3",
        }
    }

    /// Resolve a name, ignoring case and `-`/`_` separators.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA256" => Some(HashAlgorithm::Sha256),
            "BLAKE3" => Some(HashAlgorithm::Blake3),
            _ => None,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Names of the dual-hash algorithms, as recorded in manifests.
pub fn dual_algorithm_names() -> Vec<String> {
    HashAlgorithm::DUAL.iter().map(|a| a.name().to_string()).collect()
}

/// Check that every named algorithm is computable by this build and that
/// together they cover both halves of the dual digest.
///
/// Fails with [`CoreError::UnavailableAlgorithm`] naming the first unknown
/// algorithm, or the missing half.
pub fn ensure_available<I>(names: I) -> Result<(), CoreError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen = Vec::new();
    for name in names {
        let name = name.as_ref();
        let algo = HashAlgorithm::from_name(name)
            .ok_or_else(|| CoreError::UnavailableAlgorithm(name.to_string()))?;
        seen.push(algo);
    }
    for required in HashAlgorithm::DUAL {
        if !seen.contains(&required) {
            return Err(CoreError::UnavailableAlgorithm(format!(
                "{required} missing from algorithm set"
            )));
        }
    }
    Ok(())
}
