//! Binary encodings of object headers, property headers and archive tables.
//!
//! All integers are little-endian. Property headers use a packed `u32`
//! info word followed by variable-width fields:
//!
//! | bits  | field                                   |
//! |-------|-----------------------------------------|
//! | 0-1   | kind (0 compound, 1 scalar, 2 array)    |
//! | 2-3   | size hint (field width 1, 2 or 4 bytes) |
//! | 4-7   | POD code                                |
//! | 8     | time sampling index present             |
//! | 9     | explicit first/last changed indices     |
//! | 10    | homogeneous                             |
//! | 11    | constant                                |
//! | 12-19 | extent                                  |
//! | 20-27 | metadata token                          |

use byteorder::{LittleEndian, ReadBytesExt};

use super::format::OBJECT_HASH_SUFFIX_SIZE;
use crate::core::{
    join_path, MetaData, MetaDataMap, ObjectHeader, PropertyHeader, PropertyType, SampleDigest,
    TimeSampling, EMPTY_METADATA_TOKEN, INLINE_METADATA_TOKEN,
};
use crate::util::{Chrono, DataType, Error, PlainOldDataType, Result};

const KIND_MASK: u32 = 0x0003;
const SIZE_HINT_MASK: u32 = 0x000c;
const POD_MASK: u32 = 0x00f0;
const HAS_TIME_SAMPLING: u32 = 0x0100;
const EXPLICIT_CHANGES: u32 = 0x0200;
const HOMOGENEOUS: u32 = 0x0400;
const CONSTANT: u32 = 0x0800;
const EXTENT_MASK: u32 = 0x000f_f000;
const META_TOKEN_MASK: u32 = 0x0ff0_0000;

/// Width class for the variable fields of one property header.
fn size_hint(largest: u32) -> u32 {
    if largest < 256 {
        0
    } else if largest < 65536 {
        1
    } else {
        2
    }
}

fn write_with_hint(buf: &mut Vec<u8>, value: u32, hint: u32) {
    match hint {
        0 => buf.push(value as u8),
        1 => buf.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => buf.extend_from_slice(&value.to_le_bytes()),
    }
}

/// Forward-only cursor that reports truncation against what it decodes.
struct Cursor<'a> {
    buf: &'a [u8],
    what: &'static str,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], what: &'static str) -> Self {
        Self { buf, what }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn truncated(&self) -> Error {
        Error::invalid(format!("{} truncated", self.what))
    }

    fn u8(&mut self) -> Result<u8> {
        self.buf.read_u8().map_err(|_| self.truncated())
    }

    fn u32(&mut self) -> Result<u32> {
        self.buf.read_u32::<LittleEndian>().map_err(|_| self.truncated())
    }

    fn f64(&mut self) -> Result<f64> {
        self.buf.read_f64::<LittleEndian>().map_err(|_| self.truncated())
    }

    fn with_hint(&mut self, hint: u32) -> Result<u32> {
        let value = match hint {
            0 => self.buf.read_u8().map(u32::from),
            1 => self.buf.read_u16::<LittleEndian>().map(u32::from),
            2 => self.buf.read_u32::<LittleEndian>(),
            _ => return Err(Error::invalid(format!("{}: bad size hint {hint}", self.what))),
        };
        value.map_err(|_| self.truncated())
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.buf.len() {
            return Err(self.truncated());
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn string(&mut self, len: usize) -> Result<String> {
        Ok(String::from_utf8(self.bytes(len)?.to_vec())?)
    }
}

/// Metadata for a header token, looking up interned entries in `table`.
fn resolve_meta_data(token: u8, inline: Option<&str>, table: &[String]) -> Result<MetaData> {
    match token {
        EMPTY_METADATA_TOKEN => Ok(MetaData::new()),
        INLINE_METADATA_TOKEN => Ok(inline.map(MetaData::parse).unwrap_or_default()),
        t => table
            .get(t as usize - 1)
            .map(|s| MetaData::parse(s))
            .ok_or_else(|| Error::invalid(format!("metadata token {t} not in table of {}", table.len()))),
    }
}

// ============================================================================
// Property headers
// ============================================================================

/// Encode the headers of one compound's children, interning metadata.
pub(crate) fn write_property_headers(headers: &[PropertyHeader], table: &mut MetaDataMap) -> Vec<u8> {
    let mut buf = Vec::new();
    for header in headers {
        write_property_header(&mut buf, header, table);
    }
    buf
}

fn write_property_header(buf: &mut Vec<u8>, header: &PropertyHeader, table: &mut MetaDataMap) {
    let meta = header.meta_data.serialize();
    let token = table.get_index(&meta);
    let leaf = !header.is_compound();

    let mut largest = (header.name.len() as u32).max(meta.len() as u32);
    if leaf {
        largest = largest
            .max(header.num_samples)
            .max(header.time_sampling_index)
            .max(header.first_changed_index)
            .max(header.last_changed_index);
    }
    let hint = size_hint(largest);

    let mut info = (hint << 2) | ((token as u32) << 20);
    info |= match header.property_type {
        PropertyType::Compound => 0,
        PropertyType::Scalar => 1,
        PropertyType::Array => 2,
    };

    let explicit = leaf
        && !header.is_constant()
        && (header.first_changed_index != 1
            || header.last_changed_index != header.num_samples.saturating_sub(1));
    if leaf {
        info |= ((header.data_type.pod.code() as u32) << 4) & POD_MASK;
        info |= (header.data_type.extent as u32) << 12;
        if header.is_homogeneous {
            info |= HOMOGENEOUS;
        }
        if header.time_sampling_index != 0 {
            info |= HAS_TIME_SAMPLING;
        }
        if header.is_constant() {
            info |= CONSTANT;
        } else if explicit {
            info |= EXPLICIT_CHANGES;
        }
    }
    buf.extend_from_slice(&info.to_le_bytes());

    if leaf {
        write_with_hint(buf, header.num_samples, hint);
        if explicit {
            write_with_hint(buf, header.first_changed_index, hint);
            write_with_hint(buf, header.last_changed_index, hint);
        }
        if header.time_sampling_index != 0 {
            write_with_hint(buf, header.time_sampling_index, hint);
        }
    }

    write_with_hint(buf, header.name.len() as u32, hint);
    buf.extend_from_slice(header.name.as_bytes());

    if token == INLINE_METADATA_TOKEN {
        write_with_hint(buf, meta.len() as u32, hint);
        buf.extend_from_slice(meta.as_bytes());
    }
}

/// Decode a property headers blob.
pub(crate) fn read_property_headers(bytes: &[u8], table: &[String]) -> Result<Vec<PropertyHeader>> {
    let mut cur = Cursor::new(bytes, "property header");
    let mut headers = Vec::new();
    while !cur.is_empty() {
        headers.push(read_property_header(&mut cur, table)?);
    }
    Ok(headers)
}

fn read_property_header(cur: &mut Cursor<'_>, table: &[String]) -> Result<PropertyHeader> {
    let info = cur.u32()?;
    let hint = (info & SIZE_HINT_MASK) >> 2;
    let token = ((info & META_TOKEN_MASK) >> 20) as u8;

    let mut header = match info & KIND_MASK {
        0 => PropertyHeader::compound(String::new()),
        kind => {
            let code = ((info & POD_MASK) >> 4) as u8;
            let pod = PlainOldDataType::try_from_u8(code)
                .ok_or_else(|| Error::invalid(format!("invalid POD code {code}")))?;
            let data_type = DataType::new(pod, ((info & EXTENT_MASK) >> 12) as u8);
            let mut header = if kind == 1 {
                PropertyHeader::scalar(String::new(), data_type)
            } else {
                PropertyHeader::array(String::new(), data_type)
            };
            header.is_homogeneous = info & HOMOGENEOUS != 0;
            header.num_samples = cur.with_hint(hint)?;
            (header.first_changed_index, header.last_changed_index) = if info & EXPLICIT_CHANGES != 0 {
                (cur.with_hint(hint)?, cur.with_hint(hint)?)
            } else if info & CONSTANT != 0 || header.num_samples == 0 {
                (0, 0)
            } else {
                (1, header.num_samples - 1)
            };
            if info & HAS_TIME_SAMPLING != 0 {
                header.time_sampling_index = cur.with_hint(hint)?;
            }
            header
        }
    };

    let name_len = cur.with_hint(hint)? as usize;
    if name_len == 0 {
        return Err(Error::invalid("property header with empty name"));
    }
    header.name = cur.string(name_len)?;

    let inline = if token == INLINE_METADATA_TOKEN {
        let len = cur.with_hint(hint)? as usize;
        Some(cur.string(len)?)
    } else {
        None
    };
    header.meta_data = resolve_meta_data(token, inline.as_deref(), table)?;

    if header.last_changed_index >= header.num_samples.max(1)
        || header.first_changed_index > header.last_changed_index
    {
        return Err(Error::invalid(format!(
            "property {:?}: changed range {}..={} inconsistent with {} samples",
            header.name, header.first_changed_index, header.last_changed_index, header.num_samples
        )));
    }
    Ok(header)
}

// ============================================================================
// Object headers
// ============================================================================

/// Encode child object headers. The caller appends the hash suffix.
pub(crate) fn write_object_headers(headers: &[ObjectHeader], table: &mut MetaDataMap) -> Vec<u8> {
    let mut buf = Vec::new();
    for header in headers {
        buf.extend_from_slice(&(header.name.len() as u32).to_le_bytes());
        buf.extend_from_slice(header.name.as_bytes());

        let meta = header.meta_data.serialize();
        let token = table.get_index(&meta);
        buf.push(token);
        if token == INLINE_METADATA_TOKEN {
            buf.extend_from_slice(&(meta.len() as u32).to_le_bytes());
            buf.extend_from_slice(meta.as_bytes());
        }
    }
    buf
}

/// Hashes recorded after the object headers of format version 2 and later.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct ObjectHashes {
    pub properties: SampleDigest,
    pub children: SampleDigest,
}

impl ObjectHashes {
    pub(crate) fn to_bytes(self) -> [u8; OBJECT_HASH_SUFFIX_SIZE] {
        let mut out = [0u8; OBJECT_HASH_SUFFIX_SIZE];
        out[..SampleDigest::SIZE].copy_from_slice(self.properties.as_bytes());
        out[SampleDigest::SIZE..].copy_from_slice(self.children.as_bytes());
        out
    }
}

/// Split an object headers blob into headers and hash suffix.
pub(crate) fn split_object_hashes(bytes: &[u8], with_suffix: bool) -> Result<(&[u8], Option<ObjectHashes>)> {
    if !with_suffix {
        return Ok((bytes, None));
    }
    if bytes.len() < OBJECT_HASH_SUFFIX_SIZE {
        return Err(Error::invalid(format!(
            "object headers of {} bytes lack the hash suffix",
            bytes.len()
        )));
    }
    let (headers, suffix) = bytes.split_at(bytes.len() - OBJECT_HASH_SUFFIX_SIZE);
    let hashes = ObjectHashes {
        properties: SampleDigest::from_prefix(suffix)?,
        children: SampleDigest::from_prefix(&suffix[SampleDigest::SIZE..])?,
    };
    Ok((headers, Some(hashes)))
}

/// Decode child object headers of the object at `parent_full_name`.
pub(crate) fn read_object_headers(
    bytes: &[u8],
    parent_full_name: &str,
    table: &[String],
) -> Result<Vec<ObjectHeader>> {
    let mut cur = Cursor::new(bytes, "object header");
    let mut headers = Vec::new();
    while !cur.is_empty() {
        let name_len = cur.u32()? as usize;
        if name_len == 0 {
            return Err(Error::invalid("object header with empty name"));
        }
        let name = cur.string(name_len)?;
        let token = cur.u8()?;
        let inline = if token == INLINE_METADATA_TOKEN {
            let len = cur.u32()? as usize;
            Some(cur.string(len)?)
        } else {
            None
        };
        let full_name = join_path(parent_full_name, &name);
        headers.push(
            ObjectHeader::new(name, full_name)
                .with_meta_data(resolve_meta_data(token, inline.as_deref(), table)?),
        );
    }
    Ok(headers)
}

// ============================================================================
// Time sampling table
// ============================================================================

/// Encode registered samplings with their max-sample hints.
pub(crate) fn write_time_samplings(samplings: &[TimeSampling], max_samples: &[u32]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (i, ts) in samplings.iter().enumerate() {
        let times = ts.stored_times();
        buf.extend_from_slice(&max_samples.get(i).copied().unwrap_or(0).to_le_bytes());
        buf.extend_from_slice(&ts.time_per_cycle().to_le_bytes());
        buf.extend_from_slice(&(times.len() as u32).to_le_bytes());
        for t in times {
            buf.extend_from_slice(&t.to_le_bytes());
        }
    }
    buf
}

/// Decode the time sampling table into `(sampling, max samples)` pairs.
pub(crate) fn read_time_samplings(bytes: &[u8]) -> Result<Vec<(TimeSampling, u32)>> {
    let mut cur = Cursor::new(bytes, "time sampling table");
    let mut out = Vec::new();
    while !cur.is_empty() {
        let max_samples = cur.u32()?;
        let time_per_cycle = cur.f64()?;
        let count = cur.u32()? as usize;
        let mut times: Vec<Chrono> = Vec::with_capacity(count.min(bytes.len() / 8));
        for _ in 0..count {
            times.push(cur.f64()?);
        }
        out.push((TimeSampling::from_stored(time_per_cycle, times)?, max_samples));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled(name: &str, n: u32, first: u32, last: u32) -> PropertyHeader {
        let mut h = PropertyHeader::array(name, DataType::VEC3F).with_time_sampling(1);
        h.num_samples = n;
        h.first_changed_index = first;
        h.last_changed_index = last;
        h
    }

    #[test]
    fn test_property_headers_preserve_changed_ranges() {
        let mut table = MetaDataMap::new();
        let headers = vec![
            PropertyHeader::compound(".geom").with_meta_data(MetaData::new().with("schema", "PolyMesh")),
            sampled("P", 10, 1, 9),
            sampled("N", 10, 3, 7),
            sampled("uv", 5, 0, 0),
            PropertyHeader::scalar("visible", DataType::INT32),
        ];
        let bytes = write_property_headers(&headers, &mut table);
        let entries = MetaDataMap::parse(&table.serialize().unwrap()).unwrap();
        let back = read_property_headers(&bytes, &entries).unwrap();
        assert_eq!(back, headers);
        assert!(back[3].is_constant());
        assert_eq!(back[2].num_stored_samples(), 6);
    }

    #[test]
    fn test_wide_fields_switch_size_hint() {
        let mut table = MetaDataMap::new();
        let long_name = "n".repeat(300);
        let headers = vec![sampled(&long_name, 70_000, 2, 69_999)];
        let bytes = write_property_headers(&headers, &mut table);
        let info = u32::from_le_bytes(bytes[..4].try_into().unwrap());
        assert_eq!((info & SIZE_HINT_MASK) >> 2, 2);
        assert_eq!(read_property_headers(&bytes, &[]).unwrap(), headers);
    }

    #[test]
    fn test_long_metadata_is_written_inline() {
        let mut table = MetaDataMap::new();
        let meta = MetaData::new().with("doc", "x".repeat(400));
        let headers = vec![PropertyHeader::scalar("a", DataType::FLOAT64).with_meta_data(meta)];
        let bytes = write_property_headers(&headers, &mut table);
        assert!(table.is_empty());
        assert_eq!(read_property_headers(&bytes, &[]).unwrap(), headers);
    }

    #[test]
    fn test_truncated_header_fails() {
        let mut table = MetaDataMap::new();
        let bytes = write_property_headers(&[sampled("P", 4, 1, 3)], &mut table);
        assert!(read_property_headers(&bytes[..bytes.len() - 1], &[]).is_err());
        assert!(read_property_headers(&bytes[..3], &[]).is_err());
    }

    #[test]
    fn test_unknown_metadata_token_fails() {
        let mut table = MetaDataMap::new();
        let meta = MetaData::new().with("k", "v");
        let bytes =
            write_property_headers(&[PropertyHeader::compound("c").with_meta_data(meta)], &mut table);
        assert!(read_property_headers(&bytes, &[]).is_err());
    }

    #[test]
    fn test_object_headers_with_hash_suffix() {
        let mut table = MetaDataMap::new();
        let parent = ObjectHeader::new("world", "/world");
        let headers = vec![
            ObjectHeader::new("cam", parent.child_path("cam"))
                .with_meta_data(MetaData::new().with("schema", "Camera")),
            ObjectHeader::new("mesh", parent.child_path("mesh")),
        ];
        let hashes = ObjectHashes {
            properties: SampleDigest::of(b"p"),
            children: SampleDigest::of(b"c"),
        };
        let mut bytes = write_object_headers(&headers, &mut table);
        bytes.extend_from_slice(&hashes.to_bytes());

        let entries = MetaDataMap::parse(&table.serialize().unwrap()).unwrap();
        let (body, suffix) = split_object_hashes(&bytes, true).unwrap();
        assert_eq!(suffix, Some(hashes));
        assert_eq!(read_object_headers(body, "/world", &entries).unwrap(), headers);
    }

    #[test]
    fn test_time_sampling_table() {
        let samplings = vec![
            TimeSampling::identity(),
            TimeSampling::uniform(1.0 / 24.0, 1.0),
            TimeSampling::acyclic(vec![0.0, 0.5, 3.0]),
            TimeSampling::cyclic(2.0, vec![0.0, 0.25]),
        ];
        let bytes = write_time_samplings(&samplings, &[1, 48, 3]);
        let back = read_time_samplings(&bytes).unwrap();
        assert_eq!(back.len(), 4);
        assert_eq!(back[1], (samplings[1].clone(), 48));
        assert_eq!(back[2].0, samplings[2]);
        assert_eq!(back[3], (samplings[3].clone(), 0));
        assert!(read_time_samplings(&bytes[..bytes.len() - 4]).is_err());
    }
}
