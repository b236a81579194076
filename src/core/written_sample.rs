//! Receipts for sample payloads already written in this session.
//!
//! Before writing a payload the writer builds its [`WrittenSampleKey`] and
//! probes the map. A hit means an identical payload is already stored and
//! the new sample records a reference to it. Keys are trusted: two samples
//! with the same key are treated as byte-identical without comparing bytes.

use std::collections::HashMap;

use super::SampleDigest;
use crate::repo::ObjectId;
use crate::util::PlainOldDataType;

/// Content key of one sample payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WrittenSampleKey {
    pub digest: SampleDigest,
    /// Declared number of PODs (strings count one each).
    pub num_elements: u64,
    /// Encoded payload size in bytes.
    pub num_bytes: u64,
    /// POD of the buffer handed to the writer.
    pub orig_pod: PlainOldDataType,
    /// POD the payload is decoded as.
    pub read_pod: PlainOldDataType,
}

/// Where a payload with a given key lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenSampleId {
    pub key: WrittenSampleKey,
    pub location: ObjectId,
    pub num_elements: u64,
}

impl WrittenSampleId {
    pub fn new(key: WrittenSampleKey, location: ObjectId) -> Self {
        Self {
            key,
            location,
            num_elements: key.num_elements,
        }
    }
}

/// Session-wide key to receipt map.
#[derive(Debug, Default)]
pub struct WrittenSampleMap {
    receipts: HashMap<WrittenSampleKey, WrittenSampleId>,
}

impl WrittenSampleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, key: &WrittenSampleKey) -> Option<&WrittenSampleId> {
        self.receipts.get(key)
    }

    /// Insert a receipt; an existing receipt for the same key is replaced.
    pub fn store(&mut self, receipt: WrittenSampleId) {
        self.receipts.insert(receipt.key, receipt);
    }

    pub fn clear(&mut self) {
        self.receipts.clear();
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(bytes: &[u8]) -> WrittenSampleKey {
        WrittenSampleKey {
            digest: SampleDigest::of(bytes),
            num_elements: bytes.len() as u64,
            num_bytes: bytes.len() as u64,
            orig_pod: PlainOldDataType::Uint8,
            read_pod: PlainOldDataType::Uint8,
        }
    }

    #[test]
    fn test_find_store_clear() {
        let mut map = WrittenSampleMap::new();
        let k = key(b"abc");
        assert!(map.find(&k).is_none());

        map.store(WrittenSampleId::new(k, ObjectId::for_payload(b"first")));
        map.store(WrittenSampleId::new(k, ObjectId::for_payload(b"second")));
        assert_eq!(map.len(), 1);
        assert_eq!(map.find(&k).unwrap().location, ObjectId::for_payload(b"second"));

        map.clear();
        assert!(map.find(&k).is_none());
    }

    #[test]
    fn test_pod_is_part_of_key() {
        let mut a = key(b"abcd");
        let b = WrittenSampleKey {
            orig_pod: PlainOldDataType::Int8,
            read_pod: PlainOldDataType::Int8,
            ..a
        };
        assert_ne!(a, b);
        a.num_elements = 1;
        assert_ne!(a, key(b"abcd"));
    }
}
