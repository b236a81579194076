//! Object reader.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::compound::CompoundPropertyReader;
use super::context::ReadContext;
use crate::core::{MetaData, ObjectHeader, PropertyHeader, SampleDigest};
use crate::git::encoding::{read_object_headers, split_object_hashes, ObjectHashes};
use crate::git::format::OBJECT_PROPERTIES;
use crate::git::slot::{ChildSlots, SlotState};
use crate::repo::GroupReader;
use crate::util::{Error, Result};

/// Reader for one object. Child objects and the properties compound are
/// loaded on demand and cached weakly.
#[derive(Debug)]
pub struct ObjectReader {
    ctx: Arc<ReadContext>,
    header: ObjectHeader,
    group: GroupReader,
    parent: Weak<ObjectReader>,
    this: Weak<ObjectReader>,
    child_headers: Vec<ObjectHeader>,
    names: HashMap<String, usize>,
    hashes: Option<ObjectHashes>,
    children: ChildSlots<Arc<ObjectReader>>,
    properties: ChildSlots<Arc<CompoundPropertyReader>>,
}

impl ObjectReader {
    pub(crate) fn load(
        ctx: Arc<ReadContext>,
        header: ObjectHeader,
        group: GroupReader,
        parent: Weak<ObjectReader>,
    ) -> Result<Arc<Self>> {
        let n = group.num_children();
        if n < 2 {
            return Err(Error::InvalidStructure(format!(
                "{}: object {} has {n} children",
                group.fullname(),
                header.full_name
            )));
        }
        let blob = group.data(n - 1)?;
        let (bytes, hashes) = split_object_hashes(&blob, ctx.has_object_hashes())?;
        let child_headers = read_object_headers(bytes, &header.full_name, &ctx.indexed_metadata)?;
        if child_headers.len() != n - 2 {
            return Err(Error::InvalidStructure(format!(
                "{}: {} object headers for {} groups",
                group.fullname(),
                child_headers.len(),
                n - 2
            )));
        }
        let mut names = HashMap::with_capacity(child_headers.len());
        for (i, h) in child_headers.iter().enumerate() {
            if names.insert(h.name.clone(), i).is_some() {
                return Err(Error::InvalidStructure(format!(
                    "{}: duplicate child object {:?}",
                    group.fullname(),
                    h.name
                )));
            }
        }

        let children = ChildSlots::new(child_headers.len());
        Ok(Arc::new_cyclic(|this| Self {
            ctx,
            header,
            group,
            parent,
            this: this.clone(),
            child_headers,
            names,
            hashes,
            children,
            properties: ChildSlots::new(1),
        }))
    }

    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn full_name(&self) -> &str {
        &self.header.full_name
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.header.meta_data
    }

    /// Parent object, while it is alive; `None` for the root.
    pub fn parent(&self) -> Option<Arc<ObjectReader>> {
        self.parent.upgrade()
    }

    pub fn num_children(&self) -> usize {
        self.child_headers.len()
    }

    pub fn child_header(&self, index: usize) -> Result<&ObjectHeader> {
        self.child_headers.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.child_headers.len(),
        })
    }

    pub fn child_headers(&self) -> &[ObjectHeader] {
        &self.child_headers
    }

    /// Child `index`, cached while any caller holds it.
    pub fn child(&self, index: usize) -> Result<Arc<ObjectReader>> {
        let header = self.child_header(index)?.clone();
        self.children.get_or_materialize(index, || {
            ObjectReader::load(
                Arc::clone(&self.ctx),
                header,
                self.group.group(index + 1)?,
                self.this.clone(),
            )
        })
    }

    /// Cache state of child `index`.
    pub fn child_state(&self, index: usize) -> Option<SlotState> {
        self.children.state(index)
    }

    /// Child called `name`, or `None` when there is no such child.
    pub fn child_by_name(&self, name: &str) -> Result<Option<Arc<ObjectReader>>> {
        match self.names.get(name) {
            Some(&index) => self.child(index).map(Some),
            None => Ok(None),
        }
    }

    /// Top compound holding this object's properties.
    pub fn properties(&self) -> Result<Arc<CompoundPropertyReader>> {
        self.properties.get_or_materialize(0, || {
            CompoundPropertyReader::load(
                Arc::clone(&self.ctx),
                PropertyHeader::compound(""),
                format!("{}:", self.header.full_name),
                self.group.group(OBJECT_PROPERTIES)?,
                self.this.clone(),
                Weak::new(),
            )
        })
    }

    /// Structural hash of the properties tree; `None` before format 2.
    pub fn properties_hash(&self) -> Option<SampleDigest> {
        self.hashes.map(|h| h.properties)
    }

    /// Structural hash over the child objects; `None` before format 2.
    pub fn children_hash(&self) -> Option<SampleDigest> {
        self.hashes.map(|h| h.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MetaDataMap;
    use crate::git::encoding::write_object_headers;
    use crate::git::reader::ArchiveReader;
    use crate::repo::{FsRepository, GroupBuilder, ObjectId, OpenMode, Repository};
    use tempfile::TempDir;

    /// Empty format-1 object group with the given child headers.
    fn object_group(parent: &GroupBuilder, children: &[ObjectHeader], kids: Vec<ObjectId>) -> ObjectId {
        let mut object = parent.child();
        let mut props = object.child();
        props.add_empty_data();
        object.add_group(props.finish().unwrap());
        for kid in kids {
            object.add_group(kid);
        }
        let blob = write_object_headers(children, &mut MetaDataMap::new());
        object.add_data(&blob).unwrap();
        object.finish().unwrap()
    }

    #[test]
    fn test_duplicate_child_names_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dup");
        let repo: Arc<dyn Repository> = Arc::new(FsRepository::open(&path, OpenMode::Write).unwrap());
        let mut root = GroupBuilder::root(Arc::clone(&repo));
        root.add_data(&1i32.to_le_bytes()).unwrap();
        root.add_data(&100i32.to_le_bytes()).unwrap();

        let twins = [ObjectHeader::new("a", "/a"), ObjectHeader::new("a", "/a")];
        let kids = (0..2).map(|_| object_group(&root, &[], Vec::new())).collect();
        let top = object_group(&root, &twins, kids);
        root.add_group(top);
        root.add_empty_data();
        root.add_empty_data();
        root.add_empty_data();
        let tree = root.finish().unwrap();
        repo.commit(tree, "test", "duplicate children").unwrap();

        let archive = ArchiveReader::open(&path).unwrap();
        match archive.top() {
            Err(Error::InvalidStructure(msg)) => assert!(msg.contains("duplicate child object")),
            other => panic!("expected InvalidStructure, got {other:?}"),
        }
    }
}
