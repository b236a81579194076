//! Reader tree: archive, objects and properties.
//!
//! Nodes are created on first request and held by their parent through
//! weak slots, so a node lives exactly as long as some caller holds it.
//! Re-requesting a dropped node rebuilds it from the repository.

mod context;
mod sampled;
mod compound;
mod object;
mod archive;

pub use archive::ArchiveReader;
pub use compound::{CompoundPropertyReader, PropertyReader};
pub use object::ObjectReader;
pub use sampled::{ArrayPropertyReader, ScalarPropertyReader};
