//! Scalar and array property writers.
//!
//! Both kinds share [`SampleTrack`], which records samples into the
//! property's group and maintains the compaction range:
//!
//! * sample 0 is always stored;
//! * a sample equal to its predecessor stores nothing;
//! * at the first change `first_changed_index` is set, and every later
//!   change first re-stores the previous value for the unchanged run so
//!   that stored slot `i - first_changed + 1` backs sample `i`.
//!
//! Payloads go through the session's written-sample map, so identical
//! payloads anywhere in the archive share one stored blob.

use std::sync::Arc;

use parking_lot::Mutex;

use super::context::WriteContext;
use super::FinishedProperty;
use crate::core::{
    HashFold, PropertyHeader, PropertyType, SampleDigest, WrittenSampleId, WrittenSampleKey,
};
use crate::git::SampleBuffer;
use crate::repo::{GroupBuilder, TreeEntry};
use crate::util::{AlembicPod, Dimensions, Error, Result};

/// Outcome of one `set_sample` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleWrite {
    /// Full name of the property written.
    pub property: String,
    /// Logical sample index.
    pub index: u32,
    pub receipt: WrittenSampleId,
    /// The payload was already stored and only referenced.
    pub reused: bool,
}

/// Group entries backing one stored slot.
#[derive(Clone, Debug)]
struct StoredSlot {
    data: TreeEntry,
    dims: Option<TreeEntry>,
}

#[derive(Debug)]
struct Previous {
    key: WrittenSampleKey,
    dims: Dimensions,
    slot: StoredSlot,
    receipt: WrittenSampleId,
    digest: SampleDigest,
}

#[derive(Debug)]
pub(crate) struct SampleTrack {
    header: PropertyHeader,
    full_name: String,
    group: Option<GroupBuilder>,
    previous: Option<Previous>,
    digests: Vec<SampleDigest>,
}

impl SampleTrack {
    pub(crate) fn new(header: PropertyHeader, full_name: String, group: GroupBuilder) -> Self {
        Self {
            header,
            full_name,
            group: Some(group),
            previous: None,
            digests: Vec::new(),
        }
    }

    fn is_array(&self) -> bool {
        self.header.property_type == PropertyType::Array
    }

    fn push_slot(group: &mut GroupBuilder, slot: &StoredSlot) {
        group.add_entry(slot.data.clone());
        if let Some(dims) = &slot.dims {
            group.add_entry(dims.clone());
        }
    }

    /// Stored form of an array sample's shape.
    fn dims_entry(&self, ctx: &WriteContext, dims: &Dimensions) -> Result<TreeEntry> {
        if dims.rank() <= 1 && !self.header.data_type.pod.is_string() {
            return Ok(TreeEntry::EmptyData);
        }
        let bytes = dims.to_bytes();
        if bytes.is_empty() {
            return Ok(TreeEntry::EmptyData);
        }
        Ok(TreeEntry::Data {
            id: ctx.repo().put_blob(&bytes)?,
        })
    }

    pub(crate) fn push(&mut self, ctx: &WriteContext, sample: &SampleBuffer) -> Result<SampleWrite> {
        ctx.ensure_open()?;
        if sample.data_type() != self.header.data_type {
            return Err(Error::TypeMismatch {
                expected: self.header.data_type.to_string(),
                actual: sample.data_type().to_string(),
            });
        }
        if self.group.is_none() {
            return Err(Error::Frozen);
        }

        let encoded = sample.encode();
        let key = sample.content_key(&encoded, self.header.data_type.pod);
        let dims = sample.dimensions().clone();
        let index = self.header.num_samples;
        let digest = if self.is_array() {
            HashFold::new("alembic-git array sample")
                .digest(&key.digest)
                .bytes(&dims.to_bytes())
                .finish()
        } else {
            key.digest
        };

        let unchanged = self
            .previous
            .as_ref()
            .filter(|p| p.key == key && p.dims == dims)
            .map(|p| p.receipt.clone());

        let (receipt, reused) = match unchanged {
            Some(receipt) => (receipt, true),
            None => {
                let (receipt, reused) = ctx.store_sample(key, &encoded)?;
                let slot = StoredSlot {
                    data: TreeEntry::Data {
                        id: receipt.location,
                    },
                    dims: if self.is_array() {
                        Some(self.dims_entry(ctx, &dims)?)
                    } else {
                        None
                    },
                };
                self.record_change(index, &dims, &slot)?;
                self.previous = Some(Previous {
                    key,
                    dims,
                    slot,
                    receipt: receipt.clone(),
                    digest,
                });
                (receipt, reused)
            }
        };

        self.header.num_samples += 1;
        self.digests.push(digest);
        Ok(SampleWrite {
            property: self.full_name.clone(),
            index,
            receipt,
            reused,
        })
    }

    /// Store `slot` for a changed sample at `index`, filling the run of
    /// unchanged samples since the last change.
    fn record_change(&mut self, index: u32, dims: &Dimensions, slot: &StoredSlot) -> Result<()> {
        let group = self.group.as_mut().ok_or(Error::Frozen)?;
        if let Some(prev) = &self.previous {
            if self.header.first_changed_index == 0 {
                self.header.first_changed_index = index;
            } else {
                for _ in self.header.last_changed_index + 1..index {
                    Self::push_slot(group, &prev.slot);
                }
            }
            self.header.last_changed_index = index;
            if prev.dims.num_points() != dims.num_points() {
                self.header.is_homogeneous = false;
            }
        }
        Self::push_slot(group, slot);
        Ok(())
    }

    pub(crate) fn push_previous(&mut self, ctx: &WriteContext) -> Result<SampleWrite> {
        ctx.ensure_open()?;
        let prev = self
            .previous
            .as_ref()
            .ok_or_else(|| Error::NoPreviousSample(self.full_name.clone()))?;
        let write = SampleWrite {
            property: self.full_name.clone(),
            index: self.header.num_samples,
            receipt: prev.receipt.clone(),
            reused: true,
        };
        self.digests.push(prev.digest);
        self.header.num_samples += 1;
        Ok(write)
    }

    pub(crate) fn set_time_sampling(&mut self, ctx: &WriteContext, index: u32) -> Result<()> {
        ctx.ensure_open()?;
        ctx.check_time_sampling(index)?;
        if self.header.num_samples > 0 && index != self.header.time_sampling_index {
            return Err(Error::TimeSamplingLocked(self.full_name.clone()));
        }
        self.header.time_sampling_index = index;
        Ok(())
    }

    pub(crate) fn header(&self) -> &PropertyHeader {
        &self.header
    }

    pub(crate) fn full_name(&self) -> &str {
        &self.full_name
    }

    pub(crate) fn finish(&mut self, ctx: &WriteContext) -> Result<FinishedProperty> {
        let group = self.group.take().ok_or(Error::Frozen)?;
        let tree = group.finish()?;
        ctx.record_num_samples(self.header.time_sampling_index, self.header.num_samples);

        let header = &self.header;
        let hash = HashFold::new("alembic-git property")
            .bytes(header.name.as_bytes())
            .bytes(header.meta_data.serialize().as_bytes())
            .u32(header.data_type.pod.code() as u32)
            .u32(header.data_type.extent as u32)
            .u32(header.time_sampling_index)
            .digests(&self.digests)
            .finish();
        Ok(FinishedProperty {
            header: self.header.clone(),
            tree,
            hash,
        })
    }
}

/// Writer for a property holding one fixed-size value per sample.
#[derive(Debug)]
pub struct ScalarPropertyWriter {
    ctx: Arc<WriteContext>,
    track: Mutex<SampleTrack>,
}

impl ScalarPropertyWriter {
    pub(crate) fn new(ctx: Arc<WriteContext>, track: SampleTrack) -> Self {
        Self {
            ctx,
            track: Mutex::new(track),
        }
    }

    /// Snapshot of the header including sample counts so far.
    pub fn header(&self) -> PropertyHeader {
        self.track.lock().header().clone()
    }

    pub fn name(&self) -> String {
        self.track.lock().header().name.clone()
    }

    pub fn full_name(&self) -> String {
        self.track.lock().full_name().to_string()
    }

    pub fn num_samples(&self) -> u32 {
        self.track.lock().header().num_samples
    }

    /// Append a sample; it must be a single point of the property's type.
    pub fn set_sample(&self, sample: &SampleBuffer) -> Result<SampleWrite> {
        if sample.num_points() != 1 {
            return Err(Error::InvalidSample(format!(
                "scalar sample has {} points",
                sample.num_points()
            )));
        }
        self.track.lock().push(&self.ctx, sample)
    }

    /// Append `values` as one point; their count must equal the extent.
    pub fn set_values<T: AlembicPod>(&self, values: &[T]) -> Result<SampleWrite> {
        self.set_sample(&SampleBuffer::scalar(values)?)
    }

    pub fn set_string(&self, value: &str) -> Result<SampleWrite> {
        self.set_sample(&SampleBuffer::string(value)?)
    }

    pub fn set_from_previous_sample(&self) -> Result<SampleWrite> {
        self.track.lock().push_previous(&self.ctx)
    }

    /// Only allowed before the first sample or when `index` is unchanged.
    pub fn set_time_sampling_index(&self, index: u32) -> Result<()> {
        self.track.lock().set_time_sampling(&self.ctx, index)
    }

    pub(crate) fn finish(&self) -> Result<FinishedProperty> {
        self.track.lock().finish(&self.ctx)
    }
}

/// Writer for a property holding a variable-length buffer per sample.
#[derive(Debug)]
pub struct ArrayPropertyWriter {
    ctx: Arc<WriteContext>,
    track: Mutex<SampleTrack>,
}

impl ArrayPropertyWriter {
    pub(crate) fn new(ctx: Arc<WriteContext>, track: SampleTrack) -> Self {
        Self {
            ctx,
            track: Mutex::new(track),
        }
    }

    pub fn header(&self) -> PropertyHeader {
        self.track.lock().header().clone()
    }

    pub fn name(&self) -> String {
        self.track.lock().header().name.clone()
    }

    pub fn full_name(&self) -> String {
        self.track.lock().full_name().to_string()
    }

    pub fn num_samples(&self) -> u32 {
        self.track.lock().header().num_samples
    }

    pub fn set_sample(&self, sample: &SampleBuffer) -> Result<SampleWrite> {
        self.track.lock().push(&self.ctx, sample)
    }

    /// Append a one-dimensional sample using the property's extent.
    pub fn set_values<T: AlembicPod>(&self, values: &[T]) -> Result<SampleWrite> {
        let extent = self.track.lock().header().data_type.extent;
        self.set_sample(&SampleBuffer::from_values(extent, values)?)
    }

    pub fn set_strings<S: AsRef<str>>(&self, values: &[S]) -> Result<SampleWrite> {
        self.set_sample(&SampleBuffer::from_strings(values)?)
    }

    pub fn set_from_previous_sample(&self) -> Result<SampleWrite> {
        self.track.lock().push_previous(&self.ctx)
    }

    pub fn set_time_sampling_index(&self, index: u32) -> Result<()> {
        self.track.lock().set_time_sampling(&self.ctx, index)
    }

    pub(crate) fn finish(&self) -> Result<FinishedProperty> {
        self.track.lock().finish(&self.ctx)
    }
}
