//! Archive layout constants.

/// Format version written by this build.
pub const CURRENT_FORMAT_VERSION: i32 = 2;

/// Oldest format version readers accept. Version 1 object header blobs
/// carry no hash suffix.
pub const MIN_FORMAT_VERSION: i32 = 1;

/// Library version recorded in new archives (major * 10000 + minor * 100 + patch).
pub fn library_version() -> i32 {
    let part = |s: &str| s.parse::<i32>().unwrap_or(0);
    part(env!("CARGO_PKG_VERSION_MAJOR")) * 10000
        + part(env!("CARGO_PKG_VERSION_MINOR")) * 100
        + part(env!("CARGO_PKG_VERSION_PATCH"))
}

/// Human-readable library version stored as `_ai_AlembicVersion`.
pub fn format_library_version(version: i32) -> String {
    format!(
        "alembic-git {}.{}.{} (built {})",
        version / 10000,
        (version / 100) % 100,
        version % 100,
        env!("ABC_GIT_BUILD_DATE")
    )
}

// Archive root group children.
pub(crate) const ROOT_FORMAT_VERSION: usize = 0;
pub(crate) const ROOT_LIBRARY_VERSION: usize = 1;
pub(crate) const ROOT_OBJECT: usize = 2;
pub(crate) const ROOT_ARCHIVE_METADATA: usize = 3;
pub(crate) const ROOT_TIME_SAMPLINGS: usize = 4;
pub(crate) const ROOT_INDEXED_METADATA: usize = 5;
pub(crate) const ROOT_NUM_CHILDREN: usize = 6;

/// Object groups keep their properties compound at child 0.
pub(crate) const OBJECT_PROPERTIES: usize = 0;

/// Properties hash + children hash after the object headers.
pub(crate) const OBJECT_HASH_SUFFIX_SIZE: usize = 32;

/// Sample blobs start with the payload digest.
pub(crate) const SAMPLE_KEY_SIZE: usize = 16;

// Archive metadata keys.
pub const META_APPLICATION: &str = "_ai_Application";
pub const META_LIBRARY_VERSION: &str = "_ai_AlembicVersion";
pub const META_DESCRIPTION: &str = "_ai_Description";
pub const META_DATE_WRITTEN: &str = "_ai_DateWritten";
