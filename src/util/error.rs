//! Error types for archive, repository and encoding operations.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type.
///
/// Variants fall into three groups: validation failures raised by the
/// object/property API, I/O and format failures raised while opening or
/// decoding a repository, and parse failures from the document encoder.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation ===
    /// Object or property name is empty or contains a path separator
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// A sibling with this name already exists
    #[error("Duplicate name {name:?} under {parent}")]
    DuplicateName { parent: String, name: String },

    /// Requested kind does not match the stored kind
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Property not found by name
    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    /// Object not found by name or path
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Sample index out of bounds
    #[error("Sample index {index} out of bounds (count: {count})")]
    SampleOutOfBounds { index: usize, count: usize },

    /// Child index out of bounds
    #[error("Child index {index} out of bounds (count: {count})")]
    ChildOutOfBounds { index: usize, count: usize },

    /// Sample buffer does not agree with the declared data type
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    /// `set_from_previous_sample` on a property without samples
    #[error("No previous sample on property {0}")]
    NoPreviousSample(String),

    /// Time sampling changed after the first sample was written
    #[error("Time sampling of property {0} is fixed once samples exist")]
    TimeSamplingLocked(String),

    /// Time sampling index not registered with the archive
    #[error("Time sampling index {index} not registered (count: {count})")]
    InvalidTimeSampling { index: u32, count: usize },

    /// Time sampling whose stored times could not be read back
    #[error("Malformed time sampling: {0}")]
    MalformedTimeSampling(String),

    // === I/O and format ===
    /// Repository path does not exist
    #[error("Repository not found: {0}")]
    RepositoryNotFound(PathBuf),

    /// Path exists but is not a repository of the expected kind
    #[error("Invalid repository at {path}: {reason}")]
    InvalidRepository { path: PathBuf, reason: String },

    /// Repository was left open by a writer
    #[error("Repository at {0} was not cleanly closed")]
    NotFrozen(PathBuf),

    /// Format version outside the supported range
    #[error("Unsupported format version {found} (supported {min}..={max})")]
    UnsupportedVersion { found: i32, min: i32, max: i32 },

    /// Invalid data structure in a decoded group or header
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// Stored object failed its integrity checks
    #[error("Corrupt object {id}: {reason}")]
    CorruptObject { id: String, reason: String },

    /// Referenced object is not present in the store
    #[error("Missing object: {0}")]
    MissingObject(String),

    /// Archive was closed and cannot be modified
    #[error("Archive is frozen and cannot be modified")]
    Frozen,

    /// Repository opened read-only
    #[error("Repository is read-only")]
    ReadOnly,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    // === Parse ===
    /// Structured-text decode failure
    #[error("{pathname}:{line}:{column}: {message}")]
    Parse {
        pathname: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create an invalid repository error.
    pub fn invalid_repository(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidRepository {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a JSON decode failure with the pathname it was read from.
    pub fn parse(pathname: impl Into<String>, err: &serde_json::Error) -> Self {
        Self::Parse {
            pathname: pathname.into(),
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }

    /// True for failures caused by caller input rather than storage.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidName(_)
                | Self::DuplicateName { .. }
                | Self::TypeMismatch { .. }
                | Self::PropertyNotFound(_)
                | Self::ObjectNotFound(_)
                | Self::SampleOutOfBounds { .. }
                | Self::ChildOutOfBounds { .. }
                | Self::InvalidSample(_)
                | Self::NoPreviousSample(_)
                | Self::TimeSamplingLocked(_)
                | Self::InvalidTimeSampling { .. }
                | Self::MalformedTimeSampling(_)
        )
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
