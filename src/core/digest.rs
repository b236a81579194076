//! 128-bit content digests.
//!
//! Sample payloads are keyed by the first 16 bytes of their BLAKE3 hash.
//! Structural hashes of properties and objects are built with [`HashFold`],
//! which combines already-computed child digests with a node's own header
//! bytes; nothing is threaded through shared mutable state.

use std::fmt;

use crate::util::{Error, Result};

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleDigest([u8; SampleDigest::SIZE]);

impl SampleDigest {
    pub const SIZE: usize = 16;

    /// Digest of raw bytes.
    pub fn of(bytes: &[u8]) -> Self {
        Self::truncate(blake3::hash(bytes))
    }

    pub const fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    /// Read a digest from the first 16 bytes of `bytes`.
    pub fn from_prefix(bytes: &[u8]) -> Result<Self> {
        bytes
            .get(..Self::SIZE)
            .and_then(|b| b.try_into().ok())
            .map(Self)
            .ok_or_else(|| Error::invalid(format!("{} bytes is too short for a digest", bytes.len())))
    }

    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn truncate(hash: blake3::Hash) -> Self {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(&hash.as_bytes()[..Self::SIZE]);
        Self(out)
    }
}

impl fmt::Debug for SampleDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SampleDigest({})", self.to_hex())
    }
}

impl fmt::Display for SampleDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Order-sensitive fold of digests and header bytes into one digest.
pub struct HashFold {
    hasher: blake3::Hasher,
}

impl HashFold {
    /// Start a fold. `context` separates hash domains (samples of a
    /// property, properties of a compound, children of an object).
    pub fn new(context: &str) -> Self {
        Self {
            hasher: blake3::Hasher::new_derive_key(context),
        }
    }

    pub fn digest(mut self, digest: &SampleDigest) -> Self {
        self.hasher.update(digest.as_bytes());
        self
    }

    pub fn digests<'a>(mut self, digests: impl IntoIterator<Item = &'a SampleDigest>) -> Self {
        for d in digests {
            self.hasher.update(d.as_bytes());
        }
        self
    }

    /// Length-prefixed bytes, so adjacent fields cannot alias.
    pub fn bytes(mut self, bytes: &[u8]) -> Self {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    pub fn f64(mut self, value: f64) -> Self {
        self.hasher.update(&value.to_le_bytes());
        self
    }

    pub fn finish(self) -> SampleDigest {
        SampleDigest::truncate(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = SampleDigest::of(b"points");
        assert_eq!(a, SampleDigest::of(b"points"));
        assert_ne!(a, SampleDigest::of(b"normals"));
        assert_eq!(a.to_hex().len(), 32);
    }

    #[test]
    fn test_from_prefix() {
        let d = SampleDigest::of(b"x");
        let mut blob = d.as_bytes().to_vec();
        blob.extend_from_slice(b"payload");
        assert_eq!(SampleDigest::from_prefix(&blob).unwrap(), d);
        assert!(SampleDigest::from_prefix(&blob[..3]).is_err());
    }

    #[test]
    fn test_fold_is_order_sensitive() {
        let a = SampleDigest::of(b"a");
        let b = SampleDigest::of(b"b");
        let ab = HashFold::new("test").digest(&a).digest(&b).finish();
        let ba = HashFold::new("test").digest(&b).digest(&a).finish();
        assert_ne!(ab, ba);
        assert_eq!(ab, HashFold::new("test").digests([&a, &b]).finish());
        assert_ne!(ab, HashFold::new("other").digests([&a, &b]).finish());
    }

    #[test]
    fn test_length_prefix_separates_fields() {
        let x = HashFold::new("t").bytes(b"ab").bytes(b"c").finish();
        let y = HashFold::new("t").bytes(b"a").bytes(b"bc").finish();
        assert_ne!(x, y);
    }
}
