//! Shape of array samples.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use smallvec::SmallVec;
use std::fmt;

use super::{Error, Result};

/// Per-axis sizes of an array sample. Rank 0 is a single element.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    dims: SmallVec<[usize; 4]>,
}

impl Dimensions {
    /// Rank-0 dimensions (one element).
    pub fn scalar() -> Self {
        Self { dims: SmallVec::new() }
    }

    pub fn d1(size: usize) -> Self {
        Self { dims: smallvec::smallvec![size] }
    }

    pub fn d2(width: usize, height: usize) -> Self {
        Self { dims: smallvec::smallvec![width, height] }
    }

    pub fn from_slice(sizes: &[usize]) -> Self {
        Self { dims: SmallVec::from_slice(sizes) }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.dims
    }

    /// Product of all axis sizes; 1 for rank 0. Saturates on overflow.
    pub fn num_points(&self) -> usize {
        self.checked_num_points().unwrap_or(usize::MAX)
    }

    /// Product of all axis sizes, `None` when it overflows `usize`.
    pub fn checked_num_points(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Stored form: one little-endian u64 per axis.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.dims.len() * 8);
        for &d in &self.dims {
            // Vec<u8> writes are infallible
            let _ = out.write_u64::<LittleEndian>(d as u64);
        }
        out
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 8 != 0 {
            return Err(Error::invalid(format!(
                "dimensions blob of {} bytes is not a multiple of 8",
                bytes.len()
            )));
        }
        let mut dims = SmallVec::new();
        while !bytes.is_empty() {
            let d = bytes.read_u64::<LittleEndian>()?;
            let d = usize::try_from(d)
                .map_err(|_| Error::invalid(format!("dimension {d} does not fit in memory")))?;
            dims.push(d);
        }
        let dims = Self { dims };
        if dims.checked_num_points().is_none() {
            return Err(Error::invalid(format!("dimensions {dims} overflow the point count")));
        }
        Ok(dims)
    }
}

impl From<usize> for Dimensions {
    fn from(size: usize) -> Self {
        Self::d1(size)
    }
}

impl From<Vec<usize>> for Dimensions {
    fn from(v: Vec<usize>) -> Self {
        Self { dims: SmallVec::from_vec(v) }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, s) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(" x ")?;
            }
            write!(f, "{s}")?;
        }
        f.write_str("]")
    }
}
