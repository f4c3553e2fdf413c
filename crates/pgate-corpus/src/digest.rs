//! SHA-256 digests for sources and whole corpora
//!
//! [`Sha256Digest`] identifies one source file; [`DigestFold`] folds a digest
//! over the serialized corpus records in write order.

use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte SHA-256 digest, rendered as lowercase hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sha256Digest([u8; 32]);

impl Sha256Digest {
    /// Wrap raw digest bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Digest of arbitrary data
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// First 16 hex characters, for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for Sha256Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Sha256Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DigestError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl serde::Serialize for Sha256Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors parsing a hex digest
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// Not exactly 32 bytes
    #[error("invalid digest length: expected 32 bytes, got {0}")]
    InvalidLength(usize),

    /// Not valid hex
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Incremental digest over serialized records
///
/// Each record contributes its bytes followed by a newline, which is exactly
/// what lands in the JSON Lines file.
#[derive(Clone, Default)]
pub struct DigestFold {
    hasher: Sha256,
    records: usize,
}

impl fmt::Debug for DigestFold {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestFold")
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl DigestFold {
    /// Start an empty fold
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one serialized record
    pub fn push_record(&mut self, line: &str) {
        self.hasher.update(line.as_bytes());
        self.hasher.update(b"\n");
        self.records += 1;
    }

    /// Number of records folded so far
    #[must_use]
    pub fn records(&self) -> usize {
        self.records
    }

    /// Finish the fold
    #[must_use]
    pub fn finish(self) -> Sha256Digest {
        Sha256Digest(self.hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_matches_known_vector() {
        let digest = Sha256Digest::compute(b"abc");
        assert_eq!(
            digest.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn display_and_parse() {
        let digest = Sha256Digest::compute(b"policy");
        let parsed: Sha256Digest = digest.to_string().parse().unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn parse_rejects_short_input() {
        let result = "abcd".parse::<Sha256Digest>();
        assert!(matches!(result, Err(DigestError::InvalidLength(2))));
    }

    #[test]
    fn fold_is_order_sensitive() {
        let mut a = DigestFold::new();
        a.push_record("one");
        a.push_record("two");

        let mut b = DigestFold::new();
        b.push_record("two");
        b.push_record("one");

        assert_eq!(a.records(), 2);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn fold_equals_digest_of_file_bytes() {
        let mut fold = DigestFold::new();
        fold.push_record("{\"a\":1}");
        fold.push_record("{\"b\":2}");
        assert_eq!(
            fold.finish(),
            Sha256Digest::compute(b"{\"a\":1}\n{\"b\":2}\n")
        );
    }

    #[test]
    fn serde_uses_hex_string() {
        let digest = Sha256Digest::compute(b"x");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{digest}\""));
        let back: Sha256Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }
}
