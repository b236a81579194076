//! Typed sample buffers and their stored payload encoding.
//!
//! A [`SampleBuffer`] holds one sample in native byte order together with
//! its [`DataType`] and [`Dimensions`]. Numeric payloads are stored
//! little-endian; string payloads (both string PODs) are stored as
//! NUL-terminated UTF-8, one terminator per string.

use crate::core::{SampleDigest, WrittenSampleKey};
use crate::util::{
    swap_to_little_endian, AlembicPod, DataType, Dimensions, Error, PlainOldDataType, Result,
};

#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    data_type: DataType,
    dims: Dimensions,
    bytes: Vec<u8>,
}

impl SampleBuffer {
    /// Empty buffer of `data_type`, used as a reusable read destination.
    pub fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            dims: Dimensions::d1(0),
            bytes: Vec::new(),
        }
    }

    /// One-dimensional array of `values.len() / extent` points.
    pub fn from_values<T: AlembicPod>(extent: u8, values: &[T]) -> Result<Self> {
        if extent == 0 || values.len() % extent as usize != 0 {
            return Err(Error::InvalidSample(format!(
                "{} values do not split into points of extent {extent}",
                values.len()
            )));
        }
        Self::with_dimensions(extent, values, Dimensions::d1(values.len() / extent as usize))
    }

    /// Array of explicit shape.
    pub fn with_dimensions<T: AlembicPod>(extent: u8, values: &[T], dims: Dimensions) -> Result<Self> {
        Self::from_raw(
            DataType::new(T::POD_TYPE, extent),
            dims,
            bytemuck::cast_slice(values).to_vec(),
        )
    }

    /// Single point whose extent is the number of values.
    pub fn scalar<T: AlembicPod>(values: &[T]) -> Result<Self> {
        let extent = u8::try_from(values.len())
            .ok()
            .filter(|&e| e > 0)
            .ok_or_else(|| Error::InvalidSample(format!("scalar of {} values", values.len())))?;
        Self::with_dimensions(extent, values, Dimensions::scalar())
    }

    /// One-dimensional string array.
    pub fn from_strings<S: AsRef<str>>(strings: &[S]) -> Result<Self> {
        Self::strings_with_dimensions(PlainOldDataType::String, 1, strings, Dimensions::d1(strings.len()))
    }

    /// Single string.
    pub fn string(value: &str) -> Result<Self> {
        Self::strings_with_dimensions(PlainOldDataType::String, 1, &[value], Dimensions::scalar())
    }

    /// Strings of either string POD, `extent` per point.
    pub fn strings_with_dimensions<S: AsRef<str>>(
        pod: PlainOldDataType,
        extent: u8,
        strings: &[S],
        dims: Dimensions,
    ) -> Result<Self> {
        let mut bytes = Vec::with_capacity(strings.iter().map(|s| s.as_ref().len() + 1).sum());
        for s in strings {
            let s = s.as_ref();
            if s.contains('\0') {
                return Err(Error::InvalidSample(format!("string {s:?} contains NUL")));
            }
            bytes.extend_from_slice(s.as_bytes());
            bytes.push(0);
        }
        Self::from_raw(DataType::new(pod, extent), dims, bytes)
    }

    /// Buffer over native-order bytes, validated against type and shape.
    pub fn from_raw(data_type: DataType, dims: Dimensions, bytes: Vec<u8>) -> Result<Self> {
        let sample = Self {
            data_type,
            dims,
            bytes,
        };
        sample.validate()?;
        Ok(sample)
    }

    fn validate(&self) -> Result<()> {
        if !self.data_type.is_valid() {
            return Err(Error::InvalidSample(format!("invalid data type {}", self.data_type)));
        }
        let points = self
            .dims
            .checked_num_points()
            .ok_or_else(|| Error::invalid(format!("dimensions {} overflow the point count", self.dims)))?;
        let elements = points
            .checked_mul(self.data_type.extent as usize)
            .ok_or_else(|| Error::invalid(format!("{points} points of {} overflow", self.data_type)))?;
        if self.data_type.pod.is_string() {
            let terminators = self.bytes.iter().filter(|&&b| b == 0).count();
            if terminators != elements || self.bytes.last().is_some_and(|&b| b != 0) {
                return Err(Error::InvalidSample(format!(
                    "{terminators} terminated strings for {elements} elements"
                )));
            }
            std::str::from_utf8(&self.bytes)
                .map_err(|e| Error::InvalidSample(format!("string payload is not UTF-8: {e}")))?;
        } else {
            let expected = points
                .checked_mul(self.data_type.num_bytes())
                .ok_or_else(|| Error::invalid(format!("{points} points of {} overflow", self.data_type)))?;
            if self.bytes.len() != expected {
                return Err(Error::InvalidSample(format!(
                    "{} bytes for {points} points of {} (expected {expected})",
                    self.bytes.len(),
                    self.data_type
                )));
            }
        }
        Ok(())
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.dims
    }

    /// Native-order bytes (terminated UTF-8 for strings).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn num_points(&self) -> usize {
        self.dims.num_points()
    }

    /// Number of PODs: points times extent.
    pub fn num_elements(&self) -> usize {
        self.dims.num_points() * self.data_type.extent as usize
    }

    /// Copy the values out as `T`, which must match the stored POD.
    pub fn values<T: AlembicPod>(&self) -> Result<Vec<T>> {
        if T::POD_TYPE != self.data_type.pod {
            return Err(Error::TypeMismatch {
                expected: T::POD_TYPE.to_string(),
                actual: self.data_type.pod.to_string(),
            });
        }
        Ok(bytemuck::pod_collect_to_vec(&self.bytes[..]))
    }

    pub fn strings(&self) -> Result<Vec<String>> {
        if !self.data_type.pod.is_string() {
            return Err(Error::TypeMismatch {
                expected: "string".to_string(),
                actual: self.data_type.pod.to_string(),
            });
        }
        let mut parts: Vec<String> = self
            .bytes
            .split(|&b| b == 0)
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect();
        // `split` yields one trailing empty piece after the final terminator.
        parts.pop();
        Ok(parts)
    }

    /// Stored payload bytes.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = self.bytes.clone();
        if !self.data_type.pod.is_string() {
            swap_to_little_endian(self.data_type.pod, &mut out);
        }
        out
    }

    /// Replace the contents with a stored payload, reusing the allocation.
    /// Without `dims` the shape is inferred as one-dimensional.
    pub(crate) fn decode_into(
        &mut self,
        data_type: DataType,
        dims: Option<Dimensions>,
        payload: &[u8],
    ) -> Result<()> {
        let dims = match dims {
            Some(dims) => dims,
            None => infer_dimensions(data_type, payload)?,
        };
        self.data_type = data_type;
        self.dims = dims;
        self.bytes.clear();
        self.bytes.extend_from_slice(payload);
        if !data_type.pod.is_string() {
            swap_to_little_endian(data_type.pod, &mut self.bytes);
        }
        self.validate()
    }

    pub(crate) fn decode(data_type: DataType, dims: Option<Dimensions>, payload: &[u8]) -> Result<Self> {
        let mut sample = Self::empty(data_type);
        sample.decode_into(data_type, dims, payload)?;
        Ok(sample)
    }

    /// Dedup key of this sample's stored payload when read back as `read_pod`.
    pub(crate) fn content_key(&self, encoded: &[u8], read_pod: PlainOldDataType) -> WrittenSampleKey {
        WrittenSampleKey {
            digest: SampleDigest::of(encoded),
            num_elements: self.num_elements() as u64,
            num_bytes: encoded.len() as u64,
            orig_pod: self.data_type.pod,
            read_pod,
        }
    }
}

/// One-dimensional shape implied by a payload of `data_type`.
pub(crate) fn infer_dimensions(data_type: DataType, payload: &[u8]) -> Result<Dimensions> {
    let extent = data_type.extent.max(1) as usize;
    if data_type.pod.is_string() {
        let strings = payload.iter().filter(|&&b| b == 0).count();
        return Ok(Dimensions::d1(strings / extent));
    }
    let point = data_type.num_bytes();
    if point == 0 || payload.len() % point != 0 {
        return Err(Error::invalid(format!(
            "payload of {} bytes is not a whole number of {data_type} points",
            payload.len()
        )));
    }
    Ok(Dimensions::d1(payload.len() / point))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Bool;
    use half::f16;

    #[test]
    fn test_values_roundtrip_through_payload() {
        let sample = SampleBuffer::from_values(3, &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(sample.data_type(), DataType::VEC3F);
        assert_eq!(sample.num_points(), 2);
        assert_eq!(sample.num_elements(), 6);

        let payload = sample.encode();
        assert_eq!(&payload[..4], &1.0f32.to_le_bytes());
        let back = SampleBuffer::decode(DataType::VEC3F, None, &payload).unwrap();
        assert_eq!(back, sample);
        assert_eq!(back.values::<f32>().unwrap()[5], 6.0);
    }

    #[test]
    fn test_scalar_extent_follows_value_count() {
        let s = SampleBuffer::scalar(&[f16::from_f32(0.5), f16::from_f32(1.5)]).unwrap();
        assert_eq!(s.data_type(), DataType::new(PlainOldDataType::Float16, 2));
        assert_eq!(s.dimensions().rank(), 0);
        assert_eq!(s.num_points(), 1);
        assert!(SampleBuffer::scalar::<f32>(&[]).is_err());

        let b = SampleBuffer::scalar(&[Bool::TRUE]).unwrap();
        assert!(b.values::<Bool>().unwrap()[0].get());
    }

    #[test]
    fn test_strings() {
        let sample = SampleBuffer::from_strings(&["a", "", "héllo"]).unwrap();
        assert_eq!(sample.as_bytes(), b"a\0\0h\xc3\xa9llo\0");
        assert_eq!(sample.strings().unwrap(), vec!["a", "", "héllo"]);

        let back = SampleBuffer::decode(DataType::STRING, None, &sample.encode()).unwrap();
        assert_eq!(back.num_points(), 3);
        assert_eq!(back.strings().unwrap(), sample.strings().unwrap());

        assert!(SampleBuffer::string("nul\0inside").is_err());
        assert!(sample.values::<u8>().is_err());
    }

    #[test]
    fn test_mismatched_shapes_are_rejected() {
        assert!(SampleBuffer::from_values(2, &[1i32, 2, 3]).is_err());
        assert!(SampleBuffer::with_dimensions(1, &[1i32, 2, 3], Dimensions::d2(2, 2)).is_err());
        assert!(SampleBuffer::decode(DataType::INT32, None, &[0u8; 7]).is_err());
        let ints = SampleBuffer::from_values(1, &[7i64]).unwrap();
        assert!(matches!(ints.values::<i32>(), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_overflowing_shapes_are_errors() {
        let huge = Dimensions::from_slice(&[usize::MAX, 4]);
        assert!(matches!(
            SampleBuffer::decode(DataType::UINT8, Some(huge), &[0u8; 6]),
            Err(Error::InvalidStructure(_))
        ));
        let wide = Dimensions::from_slice(&[usize::MAX / 2, 1]);
        assert!(matches!(
            SampleBuffer::decode(DataType::VEC3F, Some(wide), &[0u8; 12]),
            Err(Error::InvalidStructure(_))
        ));
        assert!(matches!(
            SampleBuffer::decode(DataType::STRING, Some(Dimensions::from_slice(&[usize::MAX, 2])), b"a\0"),
            Err(Error::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_decode_into_reuses_destination() {
        let mut dest = SampleBuffer::empty(DataType::INT32);
        let a = SampleBuffer::from_values(1, &[1i32, 2, 3, 4]).unwrap();
        dest.decode_into(DataType::INT32, None, &a.encode()).unwrap();
        assert_eq!(dest, a);
        let b = SampleBuffer::with_dimensions(1, &[9i32, 8], Dimensions::d2(1, 2)).unwrap();
        dest.decode_into(DataType::INT32, Some(Dimensions::d2(1, 2)), &b.encode())
            .unwrap();
        assert_eq!(dest, b);
    }

    #[test]
    fn test_content_key_tracks_pods() {
        let a = SampleBuffer::from_values(1, &[1u32]).unwrap();
        let b = SampleBuffer::from_values(1, &[1i32]).unwrap();
        let ka = a.content_key(&a.encode(), PlainOldDataType::Uint32);
        let kb = b.content_key(&b.encode(), PlainOldDataType::Int32);
        assert_eq!(ka.digest, kb.digest);
        assert_ne!(ka, kb);
    }
}
