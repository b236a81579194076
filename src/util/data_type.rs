//! DataType - a POD kind plus extent.

use super::PlainOldDataType;
use std::fmt;

/// How one element of a sample is stored.
///
/// A Vec3f is `Float32` with extent 3; a string scalar is `String` with
/// extent 1. Every sample of a property shares its `DataType`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataType {
    pub pod: PlainOldDataType,
    /// Number of PODs per element (1..=255)
    pub extent: u8,
}

impl DataType {
    #[inline]
    pub const fn new(pod: PlainOldDataType, extent: u8) -> Self {
        Self { pod, extent }
    }

    #[inline]
    pub const fn scalar(pod: PlainOldDataType) -> Self {
        Self { pod, extent: 1 }
    }

    /// Bytes per element, 0 for string kinds.
    #[inline]
    pub const fn num_bytes(&self) -> usize {
        self.pod.num_bytes() * self.extent as usize
    }

    #[inline]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.pod, PlainOldDataType::Unknown) && self.extent > 0
    }

    pub const UNKNOWN: Self = Self::new(PlainOldDataType::Unknown, 0);

    pub const BOOL: Self = Self::scalar(PlainOldDataType::Boolean);
    pub const UINT8: Self = Self::scalar(PlainOldDataType::Uint8);
    pub const INT32: Self = Self::scalar(PlainOldDataType::Int32);
    pub const UINT32: Self = Self::scalar(PlainOldDataType::Uint32);
    pub const INT64: Self = Self::scalar(PlainOldDataType::Int64);
    pub const FLOAT16: Self = Self::scalar(PlainOldDataType::Float16);
    pub const FLOAT32: Self = Self::scalar(PlainOldDataType::Float32);
    pub const FLOAT64: Self = Self::scalar(PlainOldDataType::Float64);
    pub const STRING: Self = Self::scalar(PlainOldDataType::String);
    pub const WSTRING: Self = Self::scalar(PlainOldDataType::Wstring);

    pub const VEC2F: Self = Self::new(PlainOldDataType::Float32, 2);
    pub const VEC3F: Self = Self::new(PlainOldDataType::Float32, 3);
    pub const VEC3D: Self = Self::new(PlainOldDataType::Float64, 3);
    pub const MAT44D: Self = Self::new(PlainOldDataType::Float64, 16);
    pub const BOX3D: Self = Self::new(PlainOldDataType::Float64, 6);
}

impl Default for DataType {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.extent {
            1 => f.write_str(self.pod.name()),
            n => write!(f, "{}[{}]", self.pod.name(), n),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
