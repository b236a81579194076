//! Archive engine on top of a versioned repository.
//!
//! An archive is a tree of groups in the [`Repository`](crate::repo::Repository):
//! the root group carries the version words, the root object, archive
//! metadata and the shared tables; every object and property maps to one
//! group below it. Sample payloads are stored as content-addressed blobs,
//! so identical samples share storage across the whole archive.

mod format;
mod encoding;
mod sample_store;
mod slot;
mod options;
mod writer;
mod reader;

pub use format::{
    format_library_version, library_version, CURRENT_FORMAT_VERSION, META_APPLICATION,
    META_DATE_WRITTEN, META_DESCRIPTION, META_LIBRARY_VERSION, MIN_FORMAT_VERSION,
};
pub use options::ArchiveOptions;
pub use reader::{
    ArchiveReader, ArrayPropertyReader, CompoundPropertyReader, ObjectReader, PropertyReader,
    ScalarPropertyReader,
};
pub use sample_store::SampleBuffer;
pub use slot::SlotState;
pub use writer::{
    ArchiveWriter, ArrayPropertyWriter, CompoundPropertyWriter, ObjectWriter, PropertyWriter,
    SampleWrite, ScalarPropertyWriter,
};

/// Full name of property `name` inside the compound `parent`.
///
/// An object's top compound is named `"{object}:"`, so its children read
/// `/obj:P`; deeper levels are slash-joined, as in `/obj:.geom/P`.
pub(crate) fn property_path(parent: &str, name: &str) -> String {
    if parent.ends_with(':') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_path() {
        assert_eq!(property_path("/world/cam:", "P"), "/world/cam:P");
        assert_eq!(property_path("/:", ".geom"), "/:.geom");
        assert_eq!(property_path("/cam:.geom", "P"), "/cam:.geom/P");
    }
}
