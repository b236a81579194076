//! Sample selection by index or time.

use super::TimeSampling;
use crate::util::Chrono;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleSelector {
    Index(usize),
    /// Latest sample at or before the time.
    TimeFloor(Chrono),
    /// Earliest sample at or after the time.
    TimeCeil(Chrono),
    /// Closest sample, ties resolved to the earlier one.
    TimeNear(Chrono),
}

impl SampleSelector {
    /// Concrete sample index under `ts` for a property with `num_samples`.
    /// Index selectors pass through unchanged so out-of-range indices are
    /// still reported by the reader.
    pub fn resolve(&self, ts: &TimeSampling, num_samples: usize) -> usize {
        match *self {
            Self::Index(i) => i,
            Self::TimeFloor(t) => ts.floor_index(t, num_samples).0,
            Self::TimeCeil(t) => ts.ceil_index(t, num_samples).0,
            Self::TimeNear(t) => ts.near_index(t, num_samples).0,
        }
    }
}

impl Default for SampleSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl From<usize> for SampleSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Chrono> for SampleSelector {
    fn from(time: Chrono) -> Self {
        Self::TimeNear(time)
    }
}
