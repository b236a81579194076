//! On-disk object encoding.
//!
//! Every stored object is a 16-byte header followed by the payload:
//!
//! ```text
//! 0x00  4   "ABCG" magic
//! 0x04  1   object format version = 1
//! 0x05  1   kind: 1=blob, 2=tree, 3=commit
//! 0x06  1   compression: 0=none, 1=zlib
//! 0x07  1   reserved (0)
//! 0x08  8   stored payload length (u64 LE)
//! 0x10  ... payload
//! ```
//!
//! The object id is the BLAKE3 hash of the uncompressed payload.

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::ObjectId;
use crate::util::{Error, Result};

pub const MAGIC: &[u8; 4] = b"ABCG";
pub const OBJECT_VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 16;

/// Payloads smaller than this are never compressed.
pub const COMPRESSION_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob = 1,
    Tree = 2,
    Commit = 3,
}

impl ObjectKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Blob),
            2 => Some(Self::Tree),
            3 => Some(Self::Commit),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
        }
    }
}

/// Encode `payload` as a stored object. `level` is a zlib level 0..=9;
/// negative disables compression.
pub fn encode(kind: ObjectKind, payload: &[u8], level: i32) -> Result<Vec<u8>> {
    let compressed = if level >= 0 && payload.len() >= COMPRESSION_THRESHOLD {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9) as u32));
        encoder.write_all(payload)?;
        Some(encoder.finish()?).filter(|c| c.len() < payload.len())
    } else {
        None
    };
    let (flag, body) = match &compressed {
        Some(c) => (1u8, c.as_slice()),
        None => (0u8, payload),
    };

    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[OBJECT_VERSION, kind as u8, flag, 0]);
    let mut len = [0u8; 8];
    LittleEndian::write_u64(&mut len, body.len() as u64);
    out.extend_from_slice(&len);
    out.extend_from_slice(body);
    Ok(out)
}

/// Decode a stored object, checking its kind and that its payload hashes to `id`.
pub fn decode(id: &ObjectId, expected: ObjectKind, bytes: &[u8]) -> Result<Vec<u8>> {
    let corrupt = |reason: String| Error::CorruptObject {
        id: id.to_hex(),
        reason,
    };

    if bytes.len() < HEADER_SIZE || &bytes[0..4] != MAGIC {
        return Err(corrupt("missing object header".into()));
    }
    if bytes[4] != OBJECT_VERSION {
        return Err(corrupt(format!("object version {}", bytes[4])));
    }
    let kind = ObjectKind::from_u8(bytes[5]).ok_or_else(|| corrupt(format!("kind {}", bytes[5])))?;
    if kind != expected {
        return Err(corrupt(format!(
            "expected {}, found {}",
            expected.as_str(),
            kind.as_str()
        )));
    }
    let stored_len = LittleEndian::read_u64(&bytes[8..16]);
    let body = &bytes[HEADER_SIZE..];
    if body.len() as u64 != stored_len {
        return Err(corrupt(format!(
            "payload is {} bytes, header says {stored_len}",
            body.len()
        )));
    }

    let payload = match bytes[6] {
        0 => body.to_vec(),
        1 => {
            let mut out = Vec::new();
            ZlibDecoder::new(body).read_to_end(&mut out)?;
            out
        }
        other => return Err(corrupt(format!("compression {other}"))),
    };

    if ObjectId::for_payload(&payload) != *id {
        return Err(corrupt("payload hash mismatch".into()));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_payload_stays_raw() {
        let payload = b"tiny";
        let stored = encode(ObjectKind::Blob, payload, 6).unwrap();
        assert_eq!(stored[6], 0);
        assert_eq!(stored.len(), HEADER_SIZE + payload.len());
        let id = ObjectId::for_payload(payload);
        assert_eq!(decode(&id, ObjectKind::Blob, &stored).unwrap(), payload);
    }

    #[test]
    fn test_large_payload_compresses() {
        let payload = vec![7u8; 64 * 1024];
        let stored = encode(ObjectKind::Blob, &payload, 6).unwrap();
        assert_eq!(stored[6], 1);
        assert!(stored.len() < payload.len());
        let id = ObjectId::for_payload(&payload);
        assert_eq!(decode(&id, ObjectKind::Blob, &stored).unwrap(), payload);

        let raw = encode(ObjectKind::Blob, &payload, -1).unwrap();
        assert_eq!(raw[6], 0);
    }

    #[test]
    fn test_corruption_detected() {
        let payload = b"scene";
        let id = ObjectId::for_payload(payload);
        let mut stored = encode(ObjectKind::Tree, payload, -1).unwrap();

        assert!(matches!(
            decode(&id, ObjectKind::Blob, &stored),
            Err(Error::CorruptObject { .. })
        ));

        let last = stored.len() - 1;
        stored[last] ^= 0xff;
        assert!(matches!(
            decode(&id, ObjectKind::Tree, &stored),
            Err(Error::CorruptObject { .. })
        ));
        assert!(decode(&id, ObjectKind::Tree, &stored[..8]).is_err());
    }
}
