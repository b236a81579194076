//! Archive-wide tables shared by every reader node.

use std::sync::Arc;

use crate::core::TimeSampling;
use crate::repo::Repository;
use crate::util::{Error, Result};

#[derive(Debug)]
pub(crate) struct ReadContext {
    pub repo: Arc<dyn Repository>,
    pub format_version: i32,
    pub time_samplings: Vec<Arc<TimeSampling>>,
    pub max_samples: Vec<u32>,
    /// Interned metadata strings; token `t` names entry `t - 1`.
    pub indexed_metadata: Vec<String>,
}

impl ReadContext {
    /// Object header blobs carry the hash suffix from version 2 on.
    pub fn has_object_hashes(&self) -> bool {
        self.format_version >= 2
    }

    pub fn time_sampling(&self, index: u32) -> Result<Arc<TimeSampling>> {
        self.time_samplings
            .get(index as usize)
            .cloned()
            .ok_or(Error::InvalidTimeSampling {
                index,
                count: self.time_samplings.len(),
            })
    }
}
