//! # alembic-git
//!
//! Storage engine that keeps an Alembic-style scene graph in a versioned,
//! content-addressed repository instead of a single binary file.
//!
//! An archive is a hierarchy of objects, each owning a tree of compound,
//! scalar and array properties sampled over time. Sample payloads are
//! stored once per distinct content; every close records a commit, so an
//! archive keeps its own modification history.
//!
//! ## Modules
//!
//! - [`util`] - POD kinds, data types, dimensions, errors
//! - [`core`] - metadata, time sampling, headers, digests
//! - [`repo`] - the repository handle and its filesystem implementation
//! - [`git`] - archive readers and writers
//! - [`history`] - modification history as JSON
//!
//! ## Example
//!
//! ```no_run
//! use alembic_git::{ArchiveReader, ArchiveWriter, DataType, MetaData, TimeSampling};
//!
//! let archive = ArchiveWriter::create("anim.abcg")?;
//! let ts = archive.add_time_sampling(TimeSampling::uniform(1.0 / 24.0, 0.0))?;
//! let xform = archive.top().create_child("xform", MetaData::new())?;
//! let tx = xform
//!     .properties()
//!     .create_scalar_property("tx", MetaData::new(), DataType::FLOAT64, ts)?;
//! for frame in 0..48 {
//!     tx.set_values(&[frame as f64 * 0.1])?;
//! }
//! archive.close()?;
//!
//! let archive = ArchiveReader::open("anim.abcg")?;
//! let xform = archive.find_object("/xform")?.expect("written above");
//! let tx = xform.properties()?.scalar_property("tx")?;
//! assert_eq!(tx.num_samples(), 48);
//! # Ok::<(), alembic_git::Error>(())
//! ```

pub mod util;
pub mod core;
pub mod repo;
pub mod git;
pub mod history;

pub use util::{AlembicPod, Chrono, DataType, Dimensions, Error, PlainOldDataType, Result};
pub use core::{
    MetaData, ObjectHeader, PropertyHeader, PropertyType, SampleDigest, SampleSelector,
    TimeSampling, TimeSamplingType,
};
pub use git::{
    ArchiveOptions, ArchiveReader, ArchiveWriter, ArrayPropertyReader, ArrayPropertyWriter,
    CompoundPropertyReader, CompoundPropertyWriter, ObjectReader, ObjectWriter, PropertyReader,
    PropertyWriter, SampleBuffer, SampleWrite, ScalarPropertyReader, ScalarPropertyWriter,
    SlotState,
};
pub use repo::{FsRepository, ObjectId, OpenMode, Repository};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{MetaData, SampleSelector, TimeSampling};
    pub use crate::git::{ArchiveReader, ArchiveWriter, SampleBuffer};
    pub use crate::util::{DataType, Error, PlainOldDataType, Result};
}
