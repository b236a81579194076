//! Scalar and array property readers.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::compound::CompoundPropertyReader;
use super::context::ReadContext;
use crate::core::{PropertyHeader, PropertyType, SampleDigest, SampleSelector, TimeSampling};
use crate::git::format::SAMPLE_KEY_SIZE;
use crate::git::sample_store::infer_dimensions;
use crate::git::SampleBuffer;
use crate::repo::GroupReader;
use crate::util::{AlembicPod, Chrono, Dimensions, Error, Result};

/// Sample access shared by both leaf kinds. The property's own group is
/// loaded on first use.
#[derive(Debug)]
pub(crate) struct SampleSource {
    header: PropertyHeader,
    full_name: String,
    time_sampling: Arc<TimeSampling>,
    parent_group: GroupReader,
    index: usize,
    parent: Weak<CompoundPropertyReader>,
    samples: Mutex<Option<GroupReader>>,
}

impl SampleSource {
    pub(crate) fn new(
        ctx: &ReadContext,
        header: PropertyHeader,
        full_name: String,
        parent_group: GroupReader,
        index: usize,
        parent: Weak<CompoundPropertyReader>,
    ) -> Result<Self> {
        let time_sampling = ctx.time_sampling(header.time_sampling_index)?;
        Ok(Self {
            header,
            full_name,
            time_sampling,
            parent_group,
            index,
            parent,
            samples: Mutex::new(None),
        })
    }

    fn children_per_slot(&self) -> usize {
        if self.header.property_type == PropertyType::Array {
            2
        } else {
            1
        }
    }

    /// Load the sample group. Only the first call touches the repository.
    fn read_from_disk(&self) -> Result<GroupReader> {
        let mut samples = self.samples.lock();
        if let Some(group) = samples.as_ref() {
            return Ok(group.clone());
        }
        let group = self.parent_group.group(self.index)?;
        let expected = self.header.num_stored_samples() as usize * self.children_per_slot();
        if group.num_children() != expected {
            return Err(Error::InvalidStructure(format!(
                "{}: {} children for {} stored samples of {}",
                group.fullname(),
                group.num_children(),
                self.header.num_stored_samples(),
                self.full_name
            )));
        }
        trace!(property = %self.full_name, stored = expected, "loaded samples");
        *samples = Some(group.clone());
        Ok(group)
    }

    fn is_loaded(&self) -> bool {
        self.samples.lock().is_some()
    }

    /// First group child of the slot backing sample `index`.
    fn slot_child(&self, index: usize) -> Result<(GroupReader, usize)> {
        let count = self.header.num_samples as usize;
        if index >= count {
            return Err(Error::SampleOutOfBounds { index, count });
        }
        let group = self.read_from_disk()?;
        let slot = self.header.stored_index(index as u32) as usize;
        Ok((group, slot * self.children_per_slot()))
    }

    /// Stored blob of sample `index`, split into digest and payload.
    fn blob(&self, index: usize) -> Result<(SampleDigest, Vec<u8>)> {
        let (group, child) = self.slot_child(index)?;
        let mut bytes = group.data(child)?;
        if bytes.len() < SAMPLE_KEY_SIZE {
            return Err(Error::InvalidStructure(format!(
                "{}: sample {index} of {} is {} bytes",
                group.fullname(),
                self.full_name,
                bytes.len()
            )));
        }
        let digest = SampleDigest::from_prefix(&bytes)?;
        bytes.drain(..SAMPLE_KEY_SIZE);
        Ok((digest, bytes))
    }

    fn sample_key(&self, index: usize) -> Result<SampleDigest> {
        Ok(self.blob(index)?.0)
    }

    /// Stored shape of array sample `index`; `None` when it is implied.
    fn stored_dimensions(&self, index: usize) -> Result<Option<Dimensions>> {
        let (group, child) = self.slot_child(index)?;
        let bytes = group.data(child + 1)?;
        if bytes.is_empty() {
            Ok(None)
        } else {
            Dimensions::from_bytes(&bytes).map(Some)
        }
    }

    fn resolve(&self, selector: SampleSelector) -> usize {
        selector.resolve(&self.time_sampling, self.header.num_samples as usize)
    }

    fn parent(&self) -> Option<Arc<CompoundPropertyReader>> {
        self.parent.upgrade()
    }
}

macro_rules! leaf_accessors {
    () => {
        pub fn header(&self) -> &PropertyHeader {
            &self.source.header
        }

        pub fn name(&self) -> &str {
            &self.source.header.name
        }

        pub fn full_name(&self) -> &str {
            &self.source.full_name
        }

        pub fn num_samples(&self) -> usize {
            self.source.header.num_samples as usize
        }

        /// No sample differs from the first.
        pub fn is_constant(&self) -> bool {
            self.source.header.is_constant()
        }

        pub fn time_sampling(&self) -> Arc<TimeSampling> {
            Arc::clone(&self.source.time_sampling)
        }

        /// Load the sample group now. Idempotent; sample reads call it.
        pub fn read_from_disk(&self) -> Result<()> {
            self.source.read_from_disk().map(drop)
        }

        pub fn is_loaded(&self) -> bool {
            self.source.is_loaded()
        }

        /// Digest stored with sample `index`.
        pub fn sample_key(&self, index: usize) -> Result<SampleDigest> {
            self.source.sample_key(index)
        }

        pub fn floor_index(&self, time: Chrono) -> (usize, Chrono) {
            self.source.time_sampling.floor_index(time, self.num_samples())
        }

        pub fn ceil_index(&self, time: Chrono) -> (usize, Chrono) {
            self.source.time_sampling.ceil_index(time, self.num_samples())
        }

        pub fn near_index(&self, time: Chrono) -> (usize, Chrono) {
            self.source.time_sampling.near_index(time, self.num_samples())
        }

        pub fn sample_at(&self, selector: impl Into<SampleSelector>) -> Result<SampleBuffer> {
            self.sample(self.source.resolve(selector.into()))
        }

        /// Values of sample `index` as `T`.
        pub fn values<T: AlembicPod>(&self, index: usize) -> Result<Vec<T>> {
            self.sample(index)?.values()
        }

        pub fn strings(&self, index: usize) -> Result<Vec<String>> {
            self.sample(index)?.strings()
        }

        /// Compound holding this property, while it is alive.
        pub fn parent(&self) -> Option<Arc<CompoundPropertyReader>> {
            self.source.parent()
        }
    };
}

/// Reader for a scalar property.
#[derive(Debug)]
pub struct ScalarPropertyReader {
    source: SampleSource,
}

impl ScalarPropertyReader {
    pub(crate) fn new(source: SampleSource) -> Self {
        Self { source }
    }

    leaf_accessors!();

    pub fn sample(&self, index: usize) -> Result<SampleBuffer> {
        let mut out = SampleBuffer::empty(self.source.header.data_type);
        self.sample_into(index, &mut out)?;
        Ok(out)
    }

    /// Decode sample `index` into `dest`.
    pub fn sample_into(&self, index: usize, dest: &mut SampleBuffer) -> Result<()> {
        let (_, payload) = self.source.blob(index)?;
        dest.decode_into(self.source.header.data_type, Some(Dimensions::scalar()), &payload)
    }
}

/// Reader for an array property.
#[derive(Debug)]
pub struct ArrayPropertyReader {
    source: SampleSource,
}

impl ArrayPropertyReader {
    pub(crate) fn new(source: SampleSource) -> Self {
        Self { source }
    }

    leaf_accessors!();

    /// All samples share one element count.
    pub fn is_homogeneous(&self) -> bool {
        self.source.header.is_homogeneous
    }

    pub fn sample(&self, index: usize) -> Result<SampleBuffer> {
        let mut out = SampleBuffer::empty(self.source.header.data_type);
        self.sample_into(index, &mut out)?;
        Ok(out)
    }

    /// Decode sample `index` into `dest`, resizing it as needed.
    pub fn sample_into(&self, index: usize, dest: &mut SampleBuffer) -> Result<()> {
        let dims = self.source.stored_dimensions(index)?;
        let (_, payload) = self.source.blob(index)?;
        dest.decode_into(self.source.header.data_type, dims, &payload)
    }

    /// Shape of sample `index` without building a sample buffer.
    ///
    /// Rank 2 and above comes from the stored dimensions alone. Flat
    /// samples store no dimensions, so their length is read off the
    /// payload blob.
    pub fn sample_dimensions(&self, index: usize) -> Result<Dimensions> {
        match self.source.stored_dimensions(index)? {
            Some(dims) => Ok(dims),
            None => {
                let (_, payload) = self.source.blob(index)?;
                infer_dimensions(self.source.header.data_type, &payload)
            }
        }
    }
}
