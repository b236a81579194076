//! Versioned, content-addressed repository backing an archive.
//!
//! The engine only talks to the [`Repository`] trait: it stores blobs and
//! trees by content id, records commits, and reports whether the last
//! writer closed cleanly. [`FsRepository`] is the filesystem
//! implementation; [`GroupBuilder`] and [`GroupReader`] give the
//! index-addressed group view the engine builds archives from.

mod object_id;
mod object;
mod records;
mod fs;
mod group;

use std::fmt;
use std::path::Path;

pub use object_id::{ObjectId, OBJECT_ID_SIZE};
pub use object::{ObjectKind, COMPRESSION_THRESHOLD};
pub use records::{
    decode_json, encode_json, CommitRecord, RepositoryConfig, TreeEntry, TreeRecord,
    REPOSITORY_KIND, REPOSITORY_VERSION,
};
pub use fs::FsRepository;
pub use group::{GroupBuilder, GroupReader};

use crate::util::Result;

/// How a repository is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Creates the repository when missing and marks it unfrozen until
    /// the next commit.
    Write,
}

/// Storage collaborator used by archive readers and writers.
///
/// Implementations serialize structural mutations internally; callers may
/// share one handle across threads.
pub trait Repository: Send + Sync + fmt::Debug {
    fn path(&self) -> &Path;

    fn mode(&self) -> OpenMode;

    /// Layout on disk is intact and of the expected kind.
    fn is_valid(&self) -> bool;

    /// The last writer committed and released the repository.
    fn is_frozen(&self) -> bool;

    fn format_version(&self) -> u32;

    /// Store a payload; storing an existing payload is a no-op.
    fn put_blob(&self, payload: &[u8]) -> Result<ObjectId>;

    fn get_blob(&self, id: &ObjectId) -> Result<Vec<u8>>;

    fn put_tree(&self, tree: &TreeRecord) -> Result<ObjectId>;

    fn get_tree(&self, id: &ObjectId) -> Result<TreeRecord>;

    /// Latest commit, if any.
    fn head(&self) -> Result<Option<ObjectId>>;

    fn read_commit(&self, id: &ObjectId) -> Result<CommitRecord>;

    /// Record `tree` as the new head and freeze the repository.
    fn commit(&self, tree: ObjectId, author: &str, message: &str) -> Result<ObjectId>;

    /// zlib level for objects written from now on; negative disables.
    fn set_compression_level(&self, _level: i32) {}

    /// Root tree of the head commit.
    fn root_tree(&self) -> Result<Option<ObjectId>> {
        match self.head()? {
            Some(commit) => Ok(Some(self.read_commit(&commit)?.tree)),
            None => Ok(None),
        }
    }

    /// Commits reachable from head, newest first.
    fn history(&self) -> Result<Vec<(ObjectId, CommitRecord)>> {
        let mut out = Vec::new();
        let mut next = self.head()?;
        while let Some(id) = next {
            let commit = self.read_commit(&id)?;
            next = commit.parent;
            out.push((id, commit));
        }
        Ok(out)
    }
}
