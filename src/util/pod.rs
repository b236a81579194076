//! Plain Old Data kinds stored in property samples.

use bytemuck::{Pod, Zeroable};
use half::f16;
use std::fmt;

/// Plain Old Data type of a sample element.
///
/// The discriminant is the 4-bit code written into property headers, so
/// the ordering is part of the on-disk format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PlainOldDataType {
    Boolean = 0,
    Uint8 = 1,
    Int8 = 2,
    Uint16 = 3,
    Int16 = 4,
    Uint32 = 5,
    Int32 = 6,
    Uint64 = 7,
    Int64 = 8,
    Float16 = 9,
    Float32 = 10,
    Float64 = 11,
    /// NUL-terminated UTF-8
    String = 12,
    /// Wide string, held as UTF-8 in memory and on disk
    Wstring = 13,
    #[default]
    Unknown = 127,
}

impl PlainOldDataType {
    /// Number of POD types (excluding Unknown)
    pub const COUNT: usize = 14;

    /// Size in bytes of one element.
    ///
    /// Strings are variable-size and report 0; callers branch on
    /// [`is_string`](Self::is_string) before sizing buffers.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Boolean | Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 | Self::Float16 => 2,
            Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
            Self::String | Self::Wstring | Self::Unknown => 0,
        }
    }

    /// Returns the name of this type as a string.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "bool_t",
            Self::Uint8 => "uint8_t",
            Self::Int8 => "int8_t",
            Self::Uint16 => "uint16_t",
            Self::Int16 => "int16_t",
            Self::Uint32 => "uint32_t",
            Self::Int32 => "int32_t",
            Self::Uint64 => "uint64_t",
            Self::Int64 => "int64_t",
            Self::Float16 => "float16_t",
            Self::Float32 => "float32_t",
            Self::Float64 => "float64_t",
            Self::String => "string",
            Self::Wstring => "wstring",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse POD type from its name string.
    pub fn from_name(name: &str) -> Self {
        (0..Self::COUNT as u8)
            .filter_map(Self::try_from_u8)
            .find(|pod| pod.name() == name)
            .unwrap_or(Self::Unknown)
    }

    /// Decode a header code, rejecting anything outside the known range.
    pub const fn try_from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Boolean,
            1 => Self::Uint8,
            2 => Self::Int8,
            3 => Self::Uint16,
            4 => Self::Int16,
            5 => Self::Uint32,
            6 => Self::Int32,
            7 => Self::Uint64,
            8 => Self::Int64,
            9 => Self::Float16,
            10 => Self::Float32,
            11 => Self::Float64,
            12 => Self::String,
            13 => Self::Wstring,
            _ => return None,
        })
    }

    /// Header code for this type.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Returns true if this is a floating point type.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Returns true if this is a string type.
    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, Self::String | Self::Wstring)
    }
}

impl fmt::Display for PlainOldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust types that map one-to-one onto a fixed-size [`PlainOldDataType`].
pub trait AlembicPod: Pod + Zeroable + Copy + Default {
    /// The corresponding PlainOldDataType enum value.
    const POD_TYPE: PlainOldDataType;
}

macro_rules! impl_alembic_pod {
    ($($ty:ty => $pod:ident),* $(,)?) => {
        $(impl AlembicPod for $ty {
            const POD_TYPE: PlainOldDataType = PlainOldDataType::$pod;
        })*
    };
}

impl_alembic_pod! {
    u8 => Uint8,
    i8 => Int8,
    u16 => Uint16,
    i16 => Int16,
    u32 => Uint32,
    i32 => Int32,
    u64 => Uint64,
    i64 => Int64,
    f16 => Float16,
    f32 => Float32,
    f64 => Float64,
}

/// Boolean with guaranteed 1-byte storage.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Bool(u8);

impl Bool {
    pub const TRUE: Self = Self(1);
    pub const FALSE: Self = Self(0);

    #[inline]
    pub const fn new(v: bool) -> Self {
        Self(v as u8)
    }

    #[inline]
    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    #[inline]
    fn from(v: bool) -> Self {
        Self::new(v)
    }
}

impl From<Bool> for bool {
    #[inline]
    fn from(v: Bool) -> Self {
        v.get()
    }
}

impl fmt::Debug for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl AlembicPod for Bool {
    const POD_TYPE: PlainOldDataType = PlainOldDataType::Boolean;
}

/// Reorder every element of `bytes` between native and little-endian.
///
/// A no-op on little-endian targets; on big-endian targets each element of
/// `pod` is byte-reversed in place. The operation is its own inverse.
pub fn swap_to_little_endian(pod: PlainOldDataType, bytes: &mut [u8]) {
    let width = pod.num_bytes();
    if cfg!(target_endian = "little") || width <= 1 {
        return;
    }
    for element in bytes.chunks_exact_mut(width) {
        element.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_sizes() {
        assert_eq!(PlainOldDataType::Boolean.num_bytes(), 1);
        assert_eq!(PlainOldDataType::Float16.num_bytes(), 2);
        assert_eq!(PlainOldDataType::Int32.num_bytes(), 4);
        assert_eq!(PlainOldDataType::Float64.num_bytes(), 8);
        assert_eq!(PlainOldDataType::String.num_bytes(), 0);
    }

    #[test]
    fn test_pod_codes() {
        for code in 0..PlainOldDataType::COUNT as u8 {
            let pod = PlainOldDataType::try_from_u8(code).unwrap();
            assert_eq!(pod.code(), code);
            assert_eq!(PlainOldDataType::from_name(pod.name()), pod);
        }
        assert_eq!(PlainOldDataType::try_from_u8(14), None);
        assert_eq!(PlainOldDataType::from_name("quaternion"), PlainOldDataType::Unknown);
    }

    #[test]
    fn test_pod_trait_mapping() {
        assert_eq!(<f32 as AlembicPod>::POD_TYPE, PlainOldDataType::Float32);
        assert_eq!(<f16 as AlembicPod>::POD_TYPE, PlainOldDataType::Float16);
        assert_eq!(<Bool as AlembicPod>::POD_TYPE, PlainOldDataType::Boolean);
        assert_eq!(std::mem::size_of::<Bool>(), 1);
    }

    #[test]
    fn test_swap_is_involution() {
        let mut bytes = 0x0102_0304u32.to_ne_bytes().to_vec();
        swap_to_little_endian(PlainOldDataType::Uint32, &mut bytes);
        assert_eq!(bytes, 0x0102_0304u32.to_le_bytes());
        swap_to_little_endian(PlainOldDataType::Uint32, &mut bytes);
        assert_eq!(bytes, 0x0102_0304u32.to_ne_bytes());
    }
}
