//! Archive writer options.

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Settings for one write session.
///
/// ```
/// use alembic_git::ArchiveOptions;
///
/// let opts = ArchiveOptions::from_json_str(r#"{ "dedup": false, "application": "demo" }"#).unwrap();
/// assert!(!opts.dedup);
/// assert_eq!(opts.compression_level, -1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Reuse payloads already written in this session.
    pub dedup: bool,
    /// zlib level 0..=9 for stored objects; negative disables compression.
    pub compression_level: i32,
    /// Author recorded on the commit.
    pub author: String,
    pub commit_message: String,
    /// Stored as `_ai_Application`.
    pub application: Option<String>,
    /// Stored as `_ai_Description`.
    pub description: Option<String>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            dedup: true,
            compression_level: -1,
            author: "alembic-git".to_string(),
            commit_message: "write archive".to_string(),
            application: None,
            description: None,
        }
    }
}

impl ArchiveOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::parse("<options>", &e))
    }
}
