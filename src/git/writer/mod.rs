//! Writer tree: archive, objects and properties.
//!
//! Every writer receives the session [`context::WriteContext`] at
//! construction; nothing is global. Nodes buffer their child list and
//! store their groups bottom-up when the archive closes, each returning
//! its tree id and structural hash to the parent.

mod context;
mod sampled;
mod compound;
mod object;
mod archive;

pub use archive::ArchiveWriter;
pub use compound::{CompoundPropertyWriter, PropertyWriter};
pub use object::ObjectWriter;
pub use sampled::{ArrayPropertyWriter, SampleWrite, ScalarPropertyWriter};

use crate::core::{ObjectHeader, PropertyHeader, SampleDigest};
use crate::repo::ObjectId;

/// A stored property: final header, group tree and structural hash.
#[derive(Debug)]
pub(crate) struct FinishedProperty {
    pub header: PropertyHeader,
    pub tree: ObjectId,
    pub hash: SampleDigest,
}

#[derive(Debug)]
pub(crate) struct FinishedObject {
    pub header: ObjectHeader,
    pub tree: ObjectId,
    pub hash: SampleDigest,
}
