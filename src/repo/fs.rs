//! Filesystem repository.
//!
//! Layout:
//!
//! ```text
//! <root>/config              JSON RepositoryConfig
//! <root>/objects/ab/cdef...  objects sharded by the first id byte
//! <root>/refs/heads/main     hex id of the head commit
//! <root>/WRITING             present while a writer holds the repository
//! ```
//!
//! Objects and refs are written to a temporary file in the destination
//! directory and renamed into place, so readers never observe a partial
//! object. The head ref only moves after every object of the new snapshot
//! is on disk, and `WRITING` is removed after the ref moves.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::object::{self, ObjectKind};
use super::records::{decode_json, encode_json, CommitRecord, RepositoryConfig, TreeRecord};
use super::{ObjectId, OpenMode, Repository, REPOSITORY_KIND, REPOSITORY_VERSION};
use crate::util::{Error, Result};

const CONFIG_FILE: &str = "config";
const OBJECTS_DIR: &str = "objects";
const HEAD_REF: &str = "refs/heads/main";
const WRITE_MARKER: &str = "WRITING";

#[derive(Debug)]
pub struct FsRepository {
    root: PathBuf,
    mode: OpenMode,
    version: u32,
    compression_level: AtomicI32,
    /// Serializes structural mutations.
    write_lock: Mutex<()>,
}

impl FsRepository {
    /// Open the repository at `root`.
    ///
    /// Read mode requires an existing repository of the expected kind.
    /// Write mode creates it when absent and drops the write marker, so the
    /// repository reports unfrozen until [`Repository::commit`] succeeds.
    pub fn open(root: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let version = match mode {
            OpenMode::Read => Self::read_config(&root)?.version,
            OpenMode::Write => Self::init(&root)?,
        };

        let repo = Self {
            root,
            mode,
            version,
            compression_level: AtomicI32::new(-1),
            write_lock: Mutex::new(()),
        };

        if mode == OpenMode::Write {
            let marker = repo.root.join(WRITE_MARKER);
            if marker.exists() {
                warn!(path = %repo.root.display(), "taking over repository left open by an earlier writer");
            }
            fs::write(&marker, format!("pid={}\n", std::process::id()))?;
        }

        debug!(path = %repo.root.display(), ?mode, "opened repository");
        Ok(repo)
    }

    /// Open read-only, returning `None` when `root` is not a repository of
    /// this kind at all.
    pub fn probe(root: impl AsRef<Path>) -> Option<Self> {
        Self::open(root, OpenMode::Read).ok()
    }

    /// Builder form of [`Repository::set_compression_level`].
    pub fn with_compression(self, level: i32) -> Self {
        self.compression_level.store(level, Ordering::Relaxed);
        self
    }

    fn init(root: &Path) -> Result<u32> {
        if root.join(CONFIG_FILE).exists() {
            return Ok(Self::read_config(root)?.version);
        }
        if root.exists() && fs::read_dir(root)?.next().is_some() {
            return Err(Error::invalid_repository(root, "directory exists and is not empty"));
        }
        fs::create_dir_all(root.join(OBJECTS_DIR))?;
        fs::create_dir_all(root.join("refs").join("heads"))?;
        let config = RepositoryConfig::default();
        let mut bytes = encode_json(&config)?;
        bytes.push(b'\n');
        fs::write(root.join(CONFIG_FILE), bytes)?;
        debug!(path = %root.display(), "initialized repository");
        Ok(config.version)
    }

    fn read_config(root: &Path) -> Result<RepositoryConfig> {
        if !root.exists() {
            return Err(Error::RepositoryNotFound(root.to_path_buf()));
        }
        let config_path = root.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Err(Error::invalid_repository(root, "config file not found"));
        }
        let bytes = fs::read(&config_path)?;
        let config: RepositoryConfig = decode_json(&config_path.display().to_string(), &bytes)?;
        if config.kind != REPOSITORY_KIND {
            return Err(Error::invalid_repository(
                root,
                format!("repository kind {:?}, expected {REPOSITORY_KIND:?}", config.kind),
            ));
        }
        if config.version != REPOSITORY_VERSION {
            return Err(Error::UnsupportedVersion {
                found: config.version as i32,
                min: REPOSITORY_VERSION as i32,
                max: REPOSITORY_VERSION as i32,
            });
        }
        if !root.join(OBJECTS_DIR).is_dir() {
            return Err(Error::invalid_repository(root, "objects directory missing"));
        }
        Ok(config)
    }

    /// `objects/{prefix}/{suffix}` for `id`.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join(OBJECTS_DIR).join(id.prefix()).join(id.suffix())
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.mode {
            OpenMode::Write => Ok(()),
            OpenMode::Read => Err(Error::ReadOnly),
        }
    }

    fn put_object(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId> {
        self.ensure_writable()?;
        let id = ObjectId::for_payload(payload);
        let path = self.object_path(&id);
        let _guard = self.write_lock.lock();
        if path.exists() {
            trace!(%id, kind = kind.as_str(), "object already stored");
            return Ok(id);
        }
        let level = self.compression_level.load(Ordering::Relaxed);
        let encoded = object::encode(kind, payload, level)?;
        write_atomic(&path, &encoded)?;
        trace!(%id, kind = kind.as_str(), bytes = payload.len(), "stored object");
        Ok(id)
    }

    fn get_object(&self, kind: ObjectKind, id: &ObjectId) -> Result<Vec<u8>> {
        let path = self.object_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::MissingObject(id.to_hex()));
            }
            Err(e) => return Err(e.into()),
        };
        object::decode(id, kind, &bytes)
    }
}

/// Write `bytes` to `path` through a sibling temporary file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::other(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(dir)?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

impl Repository for FsRepository {
    fn path(&self) -> &Path {
        &self.root
    }

    fn mode(&self) -> OpenMode {
        self.mode
    }

    fn is_valid(&self) -> bool {
        self.root.join(CONFIG_FILE).is_file() && self.root.join(OBJECTS_DIR).is_dir()
    }

    fn is_frozen(&self) -> bool {
        !self.root.join(WRITE_MARKER).exists()
    }

    fn format_version(&self) -> u32 {
        self.version
    }

    fn put_blob(&self, payload: &[u8]) -> Result<ObjectId> {
        self.put_object(ObjectKind::Blob, payload)
    }

    fn get_blob(&self, id: &ObjectId) -> Result<Vec<u8>> {
        self.get_object(ObjectKind::Blob, id)
    }

    fn put_tree(&self, tree: &TreeRecord) -> Result<ObjectId> {
        self.put_object(ObjectKind::Tree, &encode_json(tree)?)
    }

    fn get_tree(&self, id: &ObjectId) -> Result<TreeRecord> {
        let payload = self.get_object(ObjectKind::Tree, id)?;
        decode_json(&self.object_path(id).display().to_string(), &payload)
    }

    fn head(&self) -> Result<Option<ObjectId>> {
        let path = self.root.join(HEAD_REF);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(ObjectId::from_hex(text.trim())?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_commit(&self, id: &ObjectId) -> Result<CommitRecord> {
        let payload = self.get_object(ObjectKind::Commit, id)?;
        decode_json(&self.object_path(id).display().to_string(), &payload)
    }

    fn commit(&self, tree: ObjectId, author: &str, message: &str) -> Result<ObjectId> {
        self.ensure_writable()?;
        let record = CommitRecord {
            tree,
            parent: self.head()?,
            author: author.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };
        let id = self.put_object(ObjectKind::Commit, &encode_json(&record)?)?;

        let _guard = self.write_lock.lock();
        write_atomic(&self.root.join(HEAD_REF), format!("{}\n", id.to_hex()).as_bytes())?;
        match fs::remove_file(self.root.join(WRITE_MARKER)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(commit = %id, tree = %tree, "committed snapshot");
        Ok(id)
    }

    fn set_compression_level(&self, level: i32) {
        self.compression_level.store(level, Ordering::Relaxed);
    }
}
