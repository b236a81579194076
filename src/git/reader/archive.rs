//! Archive reader: open checks and the archive-wide tables.

use std::path::Path;
use std::sync::{Arc, Weak};

use tracing::debug;

use super::context::ReadContext;
use super::object::ObjectReader;
use crate::core::{MetaData, MetaDataMap, ObjectHeader, TimeSampling};
use crate::git::encoding::read_time_samplings;
use crate::git::format::{
    CURRENT_FORMAT_VERSION, META_APPLICATION, MIN_FORMAT_VERSION, ROOT_ARCHIVE_METADATA,
    ROOT_FORMAT_VERSION, ROOT_INDEXED_METADATA, ROOT_LIBRARY_VERSION, ROOT_NUM_CHILDREN,
    ROOT_OBJECT, ROOT_TIME_SAMPLINGS,
};
use crate::git::slot::ChildSlots;
use crate::repo::{FsRepository, GroupReader, ObjectId, OpenMode, Repository};
use crate::util::{Error, Result};

/// Read handle for one archive.
///
/// Opening validates the repository and decodes the archive-wide tables;
/// the object tree below the root is loaded lazily.
///
/// ```no_run
/// use alembic_git::ArchiveReader;
///
/// let archive = ArchiveReader::open("scene.abcg")?;
/// let top = archive.top()?;
/// for i in 0..top.num_children() {
///     println!("{}", top.child(i)?.full_name());
/// }
/// # Ok::<(), alembic_git::Error>(())
/// ```
#[derive(Debug)]
pub struct ArchiveReader {
    ctx: Arc<ReadContext>,
    root: GroupReader,
    commit: ObjectId,
    library_version: i32,
    archive_meta: MetaData,
    top: ChildSlots<Arc<ObjectReader>>,
}

impl ArchiveReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let repo = FsRepository::open(path.as_ref(), OpenMode::Read)?;
        Self::from_repository(Arc::new(repo))
    }

    /// Open the archive stored in `repo`.
    ///
    /// Fails without returning a partial handle when the repository is not
    /// valid, was left open by a writer, or holds an unsupported version.
    pub fn from_repository(repo: Arc<dyn Repository>) -> Result<Self> {
        if !repo.is_valid() {
            return Err(Error::invalid_repository(repo.path(), "not an alembic-git repository"));
        }
        if !repo.is_frozen() {
            return Err(Error::NotFrozen(repo.path().to_path_buf()));
        }
        let commit = repo
            .head()?
            .ok_or_else(|| Error::invalid_repository(repo.path(), "repository has no commits"))?;
        let root = GroupReader::root(Arc::clone(&repo))?;

        let format_version = read_i32(&root, ROOT_FORMAT_VERSION)?;
        if !(MIN_FORMAT_VERSION..=CURRENT_FORMAT_VERSION).contains(&format_version) {
            return Err(Error::UnsupportedVersion {
                found: format_version,
                min: MIN_FORMAT_VERSION,
                max: CURRENT_FORMAT_VERSION,
            });
        }
        if root.num_children() < ROOT_NUM_CHILDREN {
            return Err(Error::InvalidStructure(format!(
                "{}: archive root has {} children, expected {ROOT_NUM_CHILDREN}",
                root.fullname(),
                root.num_children()
            )));
        }
        let library_version = read_i32(&root, ROOT_LIBRARY_VERSION)?;
        let archive_meta = MetaData::parse(&String::from_utf8(root.data(ROOT_ARCHIVE_METADATA)?)?);

        let mut time_samplings = Vec::new();
        let mut max_samples = Vec::new();
        for (ts, max) in read_time_samplings(&root.data(ROOT_TIME_SAMPLINGS)?)? {
            time_samplings.push(Arc::new(ts));
            max_samples.push(max);
        }
        if time_samplings.is_empty() {
            time_samplings.push(Arc::new(TimeSampling::identity()));
            max_samples.push(0);
        }
        let indexed_metadata = MetaDataMap::parse(&root.data(ROOT_INDEXED_METADATA)?)?;

        debug!(
            path = %repo.path().display(),
            %commit,
            format_version,
            time_samplings = time_samplings.len(),
            "opened archive"
        );

        let ctx = Arc::new(ReadContext {
            repo,
            format_version,
            time_samplings,
            max_samples,
            indexed_metadata,
        });
        Ok(Self {
            ctx,
            root,
            commit,
            library_version,
            archive_meta,
            top: ChildSlots::new(1),
        })
    }

    pub fn path(&self) -> &Path {
        self.ctx.repo.path()
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.ctx.repo
    }

    /// Commit the archive was read from.
    pub fn commit_id(&self) -> ObjectId {
        self.commit
    }

    /// The root object, cached while any caller holds it.
    pub fn top(&self) -> Result<Arc<ObjectReader>> {
        self.top.get_or_materialize(0, || {
            ObjectReader::load(
                Arc::clone(&self.ctx),
                ObjectHeader::root(),
                self.root.group(ROOT_OBJECT)?,
                Weak::new(),
            )
        })
    }

    /// Resolve a slash-separated object path such as `/world/cam`.
    /// Returns `None` when any component is missing.
    pub fn find_object(&self, path: &str) -> Result<Option<Arc<ObjectReader>>> {
        let mut current = self.top()?;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            match current.child_by_name(name)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Like [`find_object`](Self::find_object), but a missing path is an error.
    pub fn object(&self, path: &str) -> Result<Arc<ObjectReader>> {
        self.find_object(path)?
            .ok_or_else(|| Error::ObjectNotFound(path.to_string()))
    }

    pub fn archive_meta_data(&self) -> &MetaData {
        &self.archive_meta
    }

    /// Writing application, when recorded.
    pub fn application(&self) -> Option<&str> {
        self.archive_meta.get(META_APPLICATION)
    }

    pub fn format_version(&self) -> i32 {
        self.ctx.format_version
    }

    pub fn library_version(&self) -> i32 {
        self.library_version
    }

    pub fn num_time_samplings(&self) -> usize {
        self.ctx.time_samplings.len()
    }

    pub fn time_sampling(&self, index: u32) -> Result<Arc<TimeSampling>> {
        self.ctx.time_sampling(index)
    }

    /// Largest sample count of any property using sampling `index`.
    pub fn max_num_samples_for_time_sampling(&self, index: u32) -> Option<u32> {
        self.ctx.max_samples.get(index as usize).copied()
    }
}

fn read_i32(root: &GroupReader, index: usize) -> Result<i32> {
    let bytes = root.data(index)?;
    let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
        Error::InvalidStructure(format!(
            "{}: child {index} is {} bytes, expected an i32",
            root.fullname(),
            bytes.len()
        ))
    })?;
    Ok(i32::from_le_bytes(raw))
}
