//! Modification history as structured text.
//!
//! Every close of an [`ArchiveWriter`](crate::ArchiveWriter) records one
//! commit. These helpers list them, newest first, as a JSON document:
//!
//! ```json
//! {
//!   "path": "scene.abcg",
//!   "kind": "alembic-git",
//!   "frozen": true,
//!   "head": "4f1c...",
//!   "entries": [
//!     { "commit": "4f1c...", "tree": "9a0b...", "parent": null,
//!       "author": "alembic-git", "message": "write archive",
//!       "timestamp": "2024-05-01T10:00:00Z" }
//!   ]
//! }
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::git::ArchiveReader;
use crate::repo::{FsRepository, ObjectId, OpenMode, Repository, REPOSITORY_KIND};
use crate::util::{Error, Result};

/// History of one repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryDocument {
    pub path: String,
    pub kind: String,
    /// The last writer closed cleanly.
    pub frozen: bool,
    pub head: Option<ObjectId>,
    pub entries: Vec<HistoryEntry>,
}

/// One recorded commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub commit: ObjectId,
    pub tree: ObjectId,
    pub parent: Option<ObjectId>,
    pub author: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Collect the history of `repo`.
pub fn history_document(repo: &dyn Repository) -> Result<HistoryDocument> {
    if !repo.is_valid() {
        return Err(Error::invalid_repository(repo.path(), "not an alembic-git repository"));
    }
    let entries = repo
        .history()?
        .into_iter()
        .map(|(commit, record)| HistoryEntry {
            commit,
            tree: record.tree,
            parent: record.parent,
            author: record.author,
            message: record.message,
            timestamp: record.timestamp,
        })
        .collect::<Vec<_>>();
    Ok(HistoryDocument {
        path: repo.path().display().to_string(),
        kind: REPOSITORY_KIND.to_string(),
        frozen: repo.is_frozen(),
        head: entries.first().map(|e| e.commit),
        entries,
    })
}

/// History of an open archive, as pretty-printed JSON.
pub fn archive_history(archive: &ArchiveReader) -> Result<String> {
    to_text(&history_document(archive.repository().as_ref())?)
}

/// History of the repository at `path`, as pretty-printed JSON.
///
/// The archive is not opened, so this also works on repositories a writer
/// left unfrozen. Paths that are not repositories of this kind fail.
pub fn path_history(path: impl AsRef<Path>) -> Result<String> {
    let repo = FsRepository::open(path.as_ref(), OpenMode::Read)?;
    to_text(&history_document(&repo)?)
}

fn to_text(doc: &HistoryDocument) -> Result<String> {
    serde_json::to_string_pretty(doc).map_err(|e| Error::other(format!("JSON encode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArchiveWriter;
    use tempfile::TempDir;

    #[test]
    fn test_history_lists_commits_newest_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scene");
        ArchiveWriter::create(&path).unwrap().close().unwrap();
        let second = ArchiveWriter::create(&path).unwrap().close().unwrap();

        let text = path_history(&path).unwrap();
        let doc: HistoryDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(doc.kind, "alembic-git");
        assert!(doc.frozen);
        assert_eq!(doc.entries.len(), 2);
        assert_eq!(doc.head, Some(second));
        assert_eq!(doc.entries[0].commit, second);
        assert_eq!(doc.entries[0].parent, Some(doc.entries[1].commit));
        assert_eq!(doc.entries[1].parent, None);
    }

    #[test]
    fn test_history_rejects_non_repository() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("plain.abc"), b"Ogawa").unwrap();
        assert!(path_history(dir.path().join("plain.abc")).is_err());
        assert!(matches!(
            path_history(dir.path().join("missing")),
            Err(Error::RepositoryNotFound(_))
        ));
    }
}
