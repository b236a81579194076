//! Interning table for short metadata strings.
//!
//! Headers refer to metadata through a one-byte token:
//!
//! | token    | meaning                                           |
//! |----------|---------------------------------------------------|
//! | 0        | empty metadata                                    |
//! | 1..=254  | entry `token - 1` of the archive's table          |
//! | 255      | not interned; the header carries the string inline |
//!
//! The table is written once per archive as `[len u8][bytes]...`.

use std::collections::HashMap;

use crate::util::{Error, Result};

/// Token for empty metadata.
pub const EMPTY_METADATA_TOKEN: u8 = 0;

/// Token for metadata written inline.
pub const INLINE_METADATA_TOKEN: u8 = 255;

/// Maximum number of interned strings.
pub const MAX_INTERNED: usize = 254;

/// Strings this long or longer are never interned.
pub const MAX_INTERNED_LEN: usize = 255;

#[derive(Debug, Default, Clone)]
pub struct MetaDataMap {
    lookup: HashMap<String, usize>,
    entries: Vec<String>,
}

impl MetaDataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for `s`, interning it when there is room.
    pub fn get_index(&mut self, s: &str) -> u8 {
        if s.is_empty() {
            return EMPTY_METADATA_TOKEN;
        }
        if s.len() >= MAX_INTERNED_LEN {
            return INLINE_METADATA_TOKEN;
        }
        if let Some(&slot) = self.lookup.get(s) {
            return token(slot);
        }
        if self.entries.len() >= MAX_INTERNED {
            return INLINE_METADATA_TOKEN;
        }
        let slot = self.entries.len();
        self.entries.push(s.to_string());
        self.lookup.insert(s.to_string(), slot);
        token(slot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored form, or `None` when nothing was interned and the caller
    /// should record an explicit empty entry instead.
    pub fn serialize(&self) -> Option<Vec<u8>> {
        if self.entries.is_empty() {
            return None;
        }
        let mut out = Vec::with_capacity(self.entries.iter().map(|e| e.len() + 1).sum());
        for entry in &self.entries {
            out.push(entry.len() as u8);
            out.extend_from_slice(entry.as_bytes());
        }
        Some(out)
    }

    /// Strings of a stored table, in slot order.
    pub fn parse(bytes: &[u8]) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let len = bytes[pos] as usize;
            pos += 1;
            let raw = bytes
                .get(pos..pos + len)
                .ok_or_else(|| Error::invalid("indexed metadata entry truncated"))?;
            out.push(String::from_utf8(raw.to_vec())?);
            pos += len;
        }
        if out.len() > MAX_INTERNED {
            return Err(Error::invalid(format!(
                "indexed metadata table holds {} entries",
                out.len()
            )));
        }
        Ok(out)
    }
}

#[inline]
fn token(slot: usize) -> u8 {
    (slot + 1) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reserved_tokens() {
        let mut map = MetaDataMap::new();
        assert_eq!(map.get_index(""), EMPTY_METADATA_TOKEN);
        assert_eq!(map.get_index(&"x".repeat(255)), INLINE_METADATA_TOKEN);
        assert_eq!(map.get_index(&"x".repeat(256)), INLINE_METADATA_TOKEN);
        assert!(map.is_empty());
        assert_eq!(map.serialize(), None);
    }

    #[test]
    fn test_tokens_start_at_one_and_repeat() {
        let mut map = MetaDataMap::new();
        assert_eq!(map.get_index("schema=A"), 1);
        assert_eq!(map.get_index("schema=B"), 2);
        assert_eq!(map.get_index("schema=A"), 1);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_table_full() {
        let mut map = MetaDataMap::new();
        for i in 0..MAX_INTERNED {
            assert_eq!(map.get_index(&format!("k={i}")) as usize, i + 1);
        }
        assert_eq!(map.get_index("k=overflow"), INLINE_METADATA_TOKEN);
        assert_eq!(map.get_index("k=0"), 1);
        assert_eq!(map.len(), MAX_INTERNED);
    }

    #[test]
    fn test_serialize_parse() {
        let mut map = MetaDataMap::new();
        map.get_index("schema=AbcGeom_Xform_v3");
        map.get_index("interpretation=point");
        let bytes = map.serialize().unwrap();
        assert_eq!(bytes[0] as usize, "schema=AbcGeom_Xform_v3".len());
        assert_eq!(
            MetaDataMap::parse(&bytes).unwrap(),
            vec!["schema=AbcGeom_Xform_v3", "interpretation=point"]
        );
        assert!(MetaDataMap::parse(&[5, b'a']).is_err());
    }

    proptest! {
        #[test]
        fn requery_returns_same_token(strings in proptest::collection::vec("[a-z=;]{1,40}", 1..300)) {
            let mut map = MetaDataMap::new();
            let first: Vec<u8> = strings.iter().map(|s| map.get_index(s)).collect();
            for (s, t) in strings.iter().zip(first) {
                if t != INLINE_METADATA_TOKEN {
                    prop_assert_eq!(map.get_index(s), t);
                }
            }
            prop_assert!(map.len() <= MAX_INTERNED);
        }
    }
}
