//! Time sampling: the mapping from sample index to time.
//!
//! Properties reference an archive-registered [`TimeSampling`] by index.
//! The stored form is a time-per-cycle plus the sample times of one cycle:
//!
//! | kind     | time per cycle            | stored times        |
//! |----------|---------------------------|---------------------|
//! | identity | 1.0                       | `[0.0]`             |
//! | uniform  | interval                  | `[start]`           |
//! | cyclic   | cycle length              | times of one cycle  |
//! | acyclic  | [`ACYCLIC_TIME_PER_CYCLE`] | every sample time   |

use crate::util::{Chrono, Error, Result};

/// Sentinel time-per-cycle marking acyclic sampling.
pub const ACYCLIC_TIME_PER_CYCLE: Chrono = f64::MAX / 32.0;

/// Tolerance used when comparing a query time against sample times.
pub const TIME_EPSILON: Chrono = 1e-9;

#[derive(Clone, Debug, PartialEq)]
pub enum TimeSamplingType {
    /// One sample per unit time starting at 0.
    Identity,
    Uniform {
        time_per_cycle: Chrono,
        start_time: Chrono,
    },
    Cyclic {
        time_per_cycle: Chrono,
        times: Vec<Chrono>,
    },
    Acyclic {
        times: Vec<Chrono>,
    },
}

impl Default for TimeSamplingType {
    fn default() -> Self {
        Self::Identity
    }
}

fn stored_times_defect(times: &[Chrono]) -> Option<&'static str> {
    if times.is_empty() {
        Some("has no stored times")
    } else if times.windows(2).any(|w| w[1] < w[0]) {
        Some("stored times are not sorted")
    } else {
        None
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSampling {
    pub sampling_type: TimeSamplingType,
}

impl TimeSampling {
    pub const fn identity() -> Self {
        Self { sampling_type: TimeSamplingType::Identity }
    }

    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            sampling_type: TimeSamplingType::Uniform { time_per_cycle, start_time },
        }
    }

    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Cyclic { time_per_cycle, times },
        }
    }

    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Acyclic { times },
        }
    }

    /// Check that the stored form can be read back.
    pub fn validate(&self) -> Result<()> {
        match stored_times_defect(self.stored_times()) {
            Some(reason) => Err(Error::MalformedTimeSampling(reason.to_string())),
            None => Ok(()),
        }
    }

    /// Rebuild from the stored form.
    pub fn from_stored(time_per_cycle: Chrono, times: Vec<Chrono>) -> Result<Self> {
        if let Some(reason) = stored_times_defect(&times) {
            return Err(Error::invalid(format!("time sampling {reason}")));
        }
        Ok(if time_per_cycle == ACYCLIC_TIME_PER_CYCLE {
            Self::acyclic(times)
        } else if times.len() == 1 {
            if time_per_cycle == 1.0 && times[0] == 0.0 {
                Self::identity()
            } else {
                Self::uniform(time_per_cycle, times[0])
            }
        } else {
            Self::cyclic(time_per_cycle, times)
        })
    }

    pub fn time_per_cycle(&self) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Identity => 1.0,
            TimeSamplingType::Uniform { time_per_cycle, .. }
            | TimeSamplingType::Cyclic { time_per_cycle, .. } => *time_per_cycle,
            TimeSamplingType::Acyclic { .. } => ACYCLIC_TIME_PER_CYCLE,
        }
    }

    pub fn stored_times(&self) -> &[Chrono] {
        const ZERO: [Chrono; 1] = [0.0];
        match &self.sampling_type {
            TimeSamplingType::Identity => &ZERO,
            TimeSamplingType::Uniform { start_time, .. } => std::slice::from_ref(start_time),
            TimeSamplingType::Cyclic { times, .. } | TimeSamplingType::Acyclic { times } => times,
        }
    }

    /// Same stored form; identity and `uniform(1.0, 0.0)` are equivalent.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.time_per_cycle() == other.time_per_cycle()
            && self.stored_times() == other.stored_times()
    }

    /// Time of sample `index`. Acyclic indices past the stored times
    /// clamp to the last stored time.
    pub fn sample_time(&self, index: usize) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Identity => index as Chrono,
            TimeSamplingType::Uniform { time_per_cycle, start_time } => {
                start_time + index as Chrono * time_per_cycle
            }
            TimeSamplingType::Cyclic { time_per_cycle, times } => {
                let cycle = (index / times.len()) as Chrono;
                times[index % times.len()] + cycle * time_per_cycle
            }
            TimeSamplingType::Acyclic { times } => {
                times[index.min(times.len().saturating_sub(1))]
            }
        }
    }

    /// Number of addressable samples given a property's sample count.
    fn addressable(&self, num_samples: usize) -> usize {
        match &self.sampling_type {
            TimeSamplingType::Acyclic { times } => num_samples.min(times.len()),
            _ => num_samples,
        }
    }

    /// Latest sample whose time is `<= time`; index 0 when `time` precedes
    /// every sample.
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        let n = self.addressable(num_samples);
        if n == 0 {
            return (0, 0.0);
        }
        // First index whose time is strictly later than `time`.
        let (mut lo, mut hi) = (0usize, n);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.sample_time(mid) <= time + TIME_EPSILON {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let index = lo.saturating_sub(1);
        (index, self.sample_time(index))
    }

    /// Earliest sample whose time is `>= time`; the last index when `time`
    /// follows every sample.
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        let n = self.addressable(num_samples);
        if n == 0 {
            return (0, 0.0);
        }
        let (floor, floor_time) = self.floor_index(time, num_samples);
        if floor_time >= time - TIME_EPSILON || floor + 1 >= n {
            return (floor, floor_time);
        }
        (floor + 1, self.sample_time(floor + 1))
    }

    /// Closer of floor and ceil; an exact midpoint resolves to floor.
    pub fn near_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        let floor = self.floor_index(time, num_samples);
        let ceil = self.ceil_index(time, num_samples);
        if (time - floor.1).abs() <= (ceil.1 - time).abs() {
            floor
        } else {
            ceil
        }
    }
}
