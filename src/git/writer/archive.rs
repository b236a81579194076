//! Archive writer: session setup and the final commit.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use super::context::WriteContext;
use super::object::ObjectWriter;
use crate::core::{MetaData, ObjectHeader, TimeSampling};
use crate::git::encoding::write_time_samplings;
use crate::git::format::{
    format_library_version, library_version, CURRENT_FORMAT_VERSION, META_APPLICATION,
    META_DATE_WRITTEN, META_DESCRIPTION, META_LIBRARY_VERSION, ROOT_OBJECT,
};
use crate::git::ArchiveOptions;
use crate::repo::{FsRepository, GroupBuilder, ObjectId, OpenMode, Repository};
use crate::util::{Error, Result};

/// Write handle for one archive.
///
/// The root object exists from creation. Closing (explicitly or on drop)
/// stores every pending group and table, then commits, which marks the
/// repository frozen for readers.
///
/// ```no_run
/// use alembic_git::{ArchiveWriter, DataType, MetaData};
///
/// let archive = ArchiveWriter::create("scene.abcg")?;
/// let mesh = archive.top().create_child("mesh", MetaData::new())?;
/// let p = mesh.properties().create_array_property("P", MetaData::new(), DataType::VEC3F, 0)?;
/// p.set_values(&[0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0])?;
/// archive.close()?;
/// # Ok::<(), alembic_git::Error>(())
/// ```
#[derive(Debug)]
pub struct ArchiveWriter {
    ctx: Arc<WriteContext>,
    root_group: Option<GroupBuilder>,
    top: Arc<ObjectWriter>,
    options: ArchiveOptions,
    archive_meta: MetaData,
    commit: Option<ObjectId>,
}

impl ArchiveWriter {
    /// Create (or take over) the repository at `path` with default options.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with_options(path, ArchiveOptions::default())
    }

    pub fn create_with_options(path: impl AsRef<Path>, options: ArchiveOptions) -> Result<Self> {
        let repo = FsRepository::open(path.as_ref(), OpenMode::Write)?;
        Self::from_repository(Arc::new(repo), options)
    }

    /// Start a session on an already opened repository.
    pub fn from_repository(repo: Arc<dyn Repository>, options: ArchiveOptions) -> Result<Self> {
        if repo.mode() != OpenMode::Write {
            return Err(Error::ReadOnly);
        }
        repo.set_compression_level(options.compression_level);

        let mut archive_meta = MetaData::new();
        if let Some(app) = &options.application {
            archive_meta.set(META_APPLICATION, app.as_str());
        }
        if let Some(desc) = &options.description {
            archive_meta.set(META_DESCRIPTION, desc.as_str());
        }

        let ctx = WriteContext::new(Arc::clone(&repo), options.dedup);
        let root_group = GroupBuilder::root(Arc::clone(&repo));
        let top = Arc::new(ObjectWriter::new(
            Arc::clone(&ctx),
            ObjectHeader::root(),
            root_group.child_at(ROOT_OBJECT),
        ));
        debug!(path = %repo.path().display(), "created archive");

        Ok(Self {
            ctx,
            root_group: Some(root_group),
            top,
            options,
            archive_meta,
            commit: None,
        })
    }

    pub fn path(&self) -> &Path {
        self.ctx.repo().path()
    }

    /// The root object.
    pub fn top(&self) -> Arc<ObjectWriter> {
        Arc::clone(&self.top)
    }

    /// Register a time sampling; equivalent samplings share an index.
    ///
    /// Samplings without stored times, or with unsorted times, are
    /// rejected with [`Error::MalformedTimeSampling`].
    pub fn add_time_sampling(&self, ts: TimeSampling) -> Result<u32> {
        self.ctx.add_time_sampling(ts)
    }

    pub fn num_time_samplings(&self) -> usize {
        self.ctx.tables().time_samplings.len()
    }

    pub fn time_sampling(&self, index: u32) -> Option<TimeSampling> {
        self.ctx.tables().time_samplings.get(index as usize).cloned()
    }

    pub fn set_dedup_enabled(&mut self, enabled: bool) {
        self.options.dedup = enabled;
        self.ctx.set_dedup(enabled);
    }

    pub fn is_dedup_enabled(&self) -> bool {
        self.ctx.dedup_enabled()
    }

    /// zlib level for objects written from now on; negative disables.
    pub fn set_compression_hint(&mut self, level: i32) {
        self.options.compression_level = level;
        self.ctx.repo().set_compression_level(level);
    }

    pub fn compression_hint(&self) -> i32 {
        self.options.compression_level
    }

    pub fn set_app_name(&mut self, name: &str) {
        self.archive_meta.set(META_APPLICATION, name);
    }

    pub fn set_user_description(&mut self, description: &str) {
        self.archive_meta.set(META_DESCRIPTION, description);
    }

    pub fn set_date_written(&mut self, date: &str) {
        self.archive_meta.set(META_DATE_WRITTEN, date);
    }

    pub fn archive_meta_data(&self) -> &MetaData {
        &self.archive_meta
    }

    /// Forget all dedup receipts; later identical payloads are stored anew.
    pub fn clear_written_samples(&self) {
        self.ctx.tables().written.clear();
    }

    pub fn num_written_samples(&self) -> usize {
        self.ctx.tables().written.len()
    }

    /// Finish the archive and return the commit id.
    pub fn close(mut self) -> Result<ObjectId> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<ObjectId> {
        if let Some(commit) = self.commit {
            return Ok(commit);
        }
        let mut root = self.root_group.take().ok_or(Error::Frozen)?;
        self.ctx.freeze();

        root.add_data(&CURRENT_FORMAT_VERSION.to_le_bytes())?;
        let library = library_version();
        root.add_data(&library.to_le_bytes())?;
        let top = self.top.finish()?;
        root.add_group(top.tree);

        let mut meta = self.archive_meta.clone();
        if !meta.contains(META_LIBRARY_VERSION) {
            meta.set(META_LIBRARY_VERSION, format_library_version(library));
        }
        if !meta.contains(META_DATE_WRITTEN) {
            meta.set(
                META_DATE_WRITTEN,
                chrono::Utc::now().format("%a %b %e %H:%M:%S %Y").to_string(),
            );
        }
        root.add_data(meta.serialize().as_bytes())?;

        let (samplings, indexed) = {
            let tables = self.ctx.tables();
            (
                write_time_samplings(&tables.time_samplings, &tables.max_samples),
                tables.metadata.serialize(),
            )
        };
        root.add_data(&samplings)?;
        match indexed {
            Some(bytes) => root.add_data(&bytes)?,
            None => root.add_empty_data(),
        };

        let tree = root.finish()?;
        let commit = self
            .ctx
            .repo()
            .commit(tree, &self.options.author, &self.options.commit_message)?;
        self.commit = Some(commit);
        debug!(
            path = %self.path().display(),
            %commit,
            objects_hash = %top.hash,
            "closed archive"
        );
        Ok(commit)
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if self.commit.is_some() || self.root_group.is_none() {
            return;
        }
        // A panicking session leaves the WRITING marker so readers see a crash.
        if std::thread::panicking() {
            warn!(path = %self.path().display(), "archive dropped during panic, not committed");
            return;
        }
        if let Err(e) = self.finalize() {
            warn!(path = %self.path().display(), error = %e, "failed to close archive on drop");
        }
    }
}
