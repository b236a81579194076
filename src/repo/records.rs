//! Structured records stored as JSON documents: trees, commits, config.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ObjectId;
use crate::util::{Error, Result};

/// Value of `kind` in the repository config.
pub const REPOSITORY_KIND: &str = "alembic-git";

/// Repository layout version understood by this build.
pub const REPOSITORY_VERSION: u32 = 1;

/// One child of a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeEntry {
    /// Blob reference.
    Data { id: ObjectId },
    /// Zero-length data child; never stored as an object.
    EmptyData,
    /// Nested group.
    Group { id: ObjectId },
}

impl TreeEntry {
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data { .. } | Self::EmptyData)
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }
}

/// Ordered children of one group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub entries: Vec<TreeEntry>,
}

/// A snapshot of the archive: its root tree plus history links.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub tree: ObjectId,
    #[serde(default)]
    pub parent: Option<ObjectId>,
    pub author: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Contents of the `config` file at the repository root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub kind: String,
    pub version: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            kind: REPOSITORY_KIND.to_string(),
            version: REPOSITORY_VERSION,
        }
    }
}

/// Parse a JSON document, reporting failures against `pathname`.
pub fn decode_json<T: DeserializeOwned>(pathname: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::parse(pathname, &e))
}

/// Serialize a record to JSON.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::other(format!("JSON encode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_entry_tags() {
        let id = ObjectId::for_payload(b"x");
        let tree = TreeRecord {
            entries: vec![TreeEntry::Data { id }, TreeEntry::EmptyData, TreeEntry::Group { id }],
        };
        let json = String::from_utf8(encode_json(&tree).unwrap()).unwrap();
        assert!(json.contains("\"kind\":\"empty_data\""));
        let back: TreeRecord = decode_json("tree", json.as_bytes()).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_decode_reports_location() {
        let err = decode_json::<TreeRecord>("objects/aa/bb", b"{\n\"entries\": [1,").unwrap_err();
        match err {
            Error::Parse { pathname, line, .. } => {
                assert_eq!(pathname, "objects/aa/bb");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
