//! Index-addressed group view over repository trees.
//!
//! A group is an ordered list of children, each either a data blob, an
//! empty data marker, or a nested group. Writers append children to a
//! [`GroupBuilder`] and store it with [`GroupBuilder::finish`]; readers
//! load a stored tree into a [`GroupReader`] and fetch children by index.
//!
//! Groups carry a pathname of child indices from the archive root (e.g.
//! `/2/0/1`) used in diagnostics.

use std::sync::Arc;

use super::{ObjectId, Repository, TreeEntry, TreeRecord};
use crate::util::{Error, Result};

fn child_pathname(parent: &str, index: usize) -> String {
    if parent == "/" {
        format!("/{index}")
    } else {
        format!("{parent}/{index}")
    }
}

fn rel_of(abs: &str) -> &str {
    match abs.rfind('/') {
        Some(i) if abs.len() > 1 => &abs[i + 1..],
        _ => abs,
    }
}

/// Write-side group under construction.
#[derive(Debug)]
pub struct GroupBuilder {
    repo: Arc<dyn Repository>,
    abs_pathname: String,
    entries: Vec<TreeEntry>,
}

impl GroupBuilder {
    /// The root group of a new snapshot.
    pub fn root(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            abs_pathname: "/".to_string(),
            entries: Vec::new(),
        }
    }

    /// Builder for the group that will be added at the next child index.
    pub fn child(&self) -> Self {
        self.child_at(self.entries.len())
    }

    /// Builder for the group that will be added at child `index`.
    pub fn child_at(&self, index: usize) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            abs_pathname: child_pathname(&self.abs_pathname, index),
            entries: Vec::new(),
        }
    }

    /// Store `bytes` and append it. Empty input appends an empty marker.
    pub fn add_data(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.is_empty() {
            return Ok(self.add_empty_data());
        }
        let id = self.repo.put_blob(bytes)?;
        Ok(self.add_data_ref(id))
    }

    /// Append a reference to an already stored blob.
    pub fn add_data_ref(&mut self, id: ObjectId) -> usize {
        self.push(TreeEntry::Data { id })
    }

    pub fn add_empty_data(&mut self) -> usize {
        self.push(TreeEntry::EmptyData)
    }

    /// Append a finished child group.
    pub fn add_group(&mut self, id: ObjectId) -> usize {
        self.push(TreeEntry::Group { id })
    }

    /// Append an existing entry verbatim.
    pub fn add_entry(&mut self, entry: TreeEntry) -> usize {
        self.push(entry)
    }

    fn push(&mut self, entry: TreeEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn num_children(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, index: usize) -> Option<&TreeEntry> {
        self.entries.get(index)
    }

    pub fn last_entry(&self) -> Option<&TreeEntry> {
        self.entries.last()
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    /// Store the group and return its tree id.
    pub fn finish(self) -> Result<ObjectId> {
        self.repo.put_tree(&TreeRecord { entries: self.entries })
    }

    pub fn rel_pathname(&self) -> &str {
        rel_of(&self.abs_pathname)
    }

    pub fn abs_pathname(&self) -> &str {
        &self.abs_pathname
    }

    /// Repository path plus group pathname.
    pub fn fullname(&self) -> String {
        format!("{}:{}", self.repo.path().display(), self.abs_pathname)
    }
}

/// Read-side view of a stored group.
#[derive(Clone, Debug)]
pub struct GroupReader {
    repo: Arc<dyn Repository>,
    id: ObjectId,
    abs_pathname: String,
    tree: Arc<TreeRecord>,
}

impl GroupReader {
    /// Root group of the head commit.
    pub fn root(repo: Arc<dyn Repository>) -> Result<Self> {
        let id = repo
            .root_tree()?
            .ok_or_else(|| Error::invalid_repository(repo.path(), "repository has no commits"))?;
        Self::open(repo, id, "/".to_string())
    }

    pub fn open(repo: Arc<dyn Repository>, id: ObjectId, abs_pathname: String) -> Result<Self> {
        let tree = Arc::new(repo.get_tree(&id)?);
        Ok(Self {
            repo,
            id,
            abs_pathname,
            tree,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn num_children(&self) -> usize {
        self.tree.entries.len()
    }

    pub fn entry(&self, index: usize) -> Result<&TreeEntry> {
        self.tree.entries.get(index).ok_or_else(|| {
            Error::invalid(format!(
                "{}: child {index} missing (group has {})",
                self.fullname(),
                self.num_children()
            ))
        })
    }

    pub fn is_data(&self, index: usize) -> bool {
        self.tree.entries.get(index).is_some_and(TreeEntry::is_data)
    }

    pub fn is_group(&self, index: usize) -> bool {
        self.tree.entries.get(index).is_some_and(TreeEntry::is_group)
    }

    /// Blob id of data child `index`; `None` for an empty marker.
    pub fn data_id(&self, index: usize) -> Result<Option<ObjectId>> {
        match self.entry(index)? {
            TreeEntry::Data { id } => Ok(Some(*id)),
            TreeEntry::EmptyData => Ok(None),
            TreeEntry::Group { .. } => Err(Error::invalid(format!(
                "{}: child {index} is a group, expected data",
                self.fullname()
            ))),
        }
    }

    /// Bytes of data child `index`; empty for an empty marker.
    pub fn data(&self, index: usize) -> Result<Vec<u8>> {
        match self.data_id(index)? {
            Some(id) => self.repo.get_blob(&id),
            None => Ok(Vec::new()),
        }
    }

    pub fn group_id(&self, index: usize) -> Result<ObjectId> {
        match self.entry(index)? {
            TreeEntry::Group { id } => Ok(*id),
            _ => Err(Error::invalid(format!(
                "{}: child {index} is data, expected a group",
                self.fullname()
            ))),
        }
    }

    /// Load group child `index`.
    pub fn group(&self, index: usize) -> Result<GroupReader> {
        let id = self.group_id(index)?;
        Self::open(
            Arc::clone(&self.repo),
            id,
            child_pathname(&self.abs_pathname, index),
        )
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn rel_pathname(&self) -> &str {
        rel_of(&self.abs_pathname)
    }

    pub fn abs_pathname(&self) -> &str {
        &self.abs_pathname
    }

    pub fn fullname(&self) -> String {
        format!("{}:{}", self.repo.path().display(), self.abs_pathname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::{FsRepository, OpenMode};
    use tempfile::TempDir;

    #[test]
    fn test_build_and_read_nested_groups() {
        let dir = TempDir::new().unwrap();
        let repo: Arc<dyn Repository> =
            Arc::new(FsRepository::open(dir.path().join("r"), OpenMode::Write).unwrap());

        let mut root = GroupBuilder::root(Arc::clone(&repo));
        root.add_data(b"version").unwrap();
        let mut child = root.child();
        assert_eq!(child.abs_pathname(), "/1");
        child.add_empty_data();
        child.add_data(b"leaf").unwrap();
        let child_id = child.finish().unwrap();
        root.add_group(child_id);
        let root_id = root.finish().unwrap();
        repo.commit(root_id, "t", "m").unwrap();

        let root = GroupReader::root(Arc::clone(&repo)).unwrap();
        assert_eq!(root.num_children(), 2);
        assert!(root.is_data(0));
        assert!(root.is_group(1));
        assert_eq!(root.data(0).unwrap(), b"version");
        assert!(root.group(0).is_err());

        let child = root.group(1).unwrap();
        assert_eq!(child.abs_pathname(), "/1");
        assert_eq!(child.rel_pathname(), "1");
        assert!(child.fullname().ends_with(":/1"));
        assert_eq!(child.data(0).unwrap(), Vec::<u8>::new());
        assert_eq!(child.data(1).unwrap(), b"leaf");
        assert!(child.data(2).is_err());
    }
}
