//! Core types shared by the reader and writer trees.
//!
//! - [`TimeSampling`] - sample index to time mapping
//! - [`MetaData`] - key/value metadata
//! - [`ObjectHeader`] / [`PropertyHeader`] - node headers
//! - [`SampleSelector`] - sample selection by index or time
//! - [`MetaDataMap`] - metadata interning table
//! - [`WrittenSampleMap`] - dedup receipts for written payloads
//! - [`SampleDigest`] / [`HashFold`] - content and structural hashing

mod time_sampling;
mod metadata;
mod header;
mod sample;
mod digest;
mod metadata_map;
mod written_sample;

pub use time_sampling::{TimeSampling, TimeSamplingType, ACYCLIC_TIME_PER_CYCLE, TIME_EPSILON};
pub use metadata::MetaData;
pub use header::{validate_name, ObjectHeader, PropertyHeader, PropertyType};
pub(crate) use header::join_path;
pub use sample::SampleSelector;
pub use digest::{HashFold, SampleDigest};
pub use metadata_map::{
    MetaDataMap, EMPTY_METADATA_TOKEN, INLINE_METADATA_TOKEN, MAX_INTERNED, MAX_INTERNED_LEN,
};
pub use written_sample::{WrittenSampleId, WrittenSampleKey, WrittenSampleMap};
