//! Addresses of stored objects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::util::{Error, Result};

/// Size of an object id in bytes (BLAKE3-256).
pub const OBJECT_ID_SIZE: usize = 32;

/// BLAKE3 hash of an object's uncompressed payload.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; OBJECT_ID_SIZE]);

impl ObjectId {
    /// Id of `payload`.
    pub fn for_payload(payload: &[u8]) -> Self {
        Self(*blake3::hash(payload).as_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != OBJECT_ID_SIZE * 2 {
            return Err(Error::invalid(format!(
                "object id {s:?}: expected {} hex characters",
                OBJECT_ID_SIZE * 2
            )));
        }
        let mut out = [0u8; OBJECT_ID_SIZE];
        hex::decode_to_slice(s, &mut out)
            .map_err(|e| Error::invalid(format!("object id {s:?}: {e}")))?;
        Ok(Self(out))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Shard directory: first two hex characters.
    pub fn prefix(&self) -> String {
        hex::encode(&self.0[..1])
    }

    /// File name inside the shard: remaining hex characters.
    pub fn suffix(&self) -> String {
        hex::encode(&self.0[1..])
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sharding() {
        let id = ObjectId::for_payload(b"hello");
        assert_eq!(id.prefix().len(), 2);
        assert_eq!(id.suffix().len(), 62);
        assert_eq!(format!("{}{}", id.prefix(), id.suffix()), id.to_hex());
    }

    #[test]
    fn test_invalid_hex() {
        assert!(ObjectId::from_hex("abc").is_err());
        assert!(ObjectId::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let id = ObjectId::for_payload(b"tree");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    proptest! {
        #[test]
        fn hex_parse_inverts_display(bytes in proptest::array::uniform32(any::<u8>())) {
            let id = ObjectId(bytes);
            prop_assert_eq!(id.to_hex().parse::<ObjectId>().unwrap(), id);
        }
    }
}
