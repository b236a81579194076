//! Object writer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::compound::CompoundPropertyWriter;
use super::context::WriteContext;
use super::FinishedObject;
use crate::core::{validate_name, HashFold, MetaData, ObjectHeader, PropertyHeader};
use crate::git::encoding::{write_object_headers, ObjectHashes};
use crate::git::format::OBJECT_PROPERTIES;
use crate::repo::GroupBuilder;
use crate::util::{Error, Result};

#[derive(Debug)]
struct ObjectState {
    group: Option<GroupBuilder>,
    children: Vec<Arc<ObjectWriter>>,
    names: HashMap<String, usize>,
}

/// Writer for one object: its properties and its child objects.
#[derive(Debug)]
pub struct ObjectWriter {
    ctx: Arc<WriteContext>,
    header: ObjectHeader,
    properties: Arc<CompoundPropertyWriter>,
    state: Mutex<ObjectState>,
}

impl ObjectWriter {
    pub(crate) fn new(ctx: Arc<WriteContext>, header: ObjectHeader, group: GroupBuilder) -> Self {
        let properties = Arc::new(CompoundPropertyWriter::new(
            Arc::clone(&ctx),
            PropertyHeader::compound(""),
            format!("{}:", header.full_name),
            group.child_at(OBJECT_PROPERTIES),
        ));
        Self {
            ctx,
            header,
            properties,
            state: Mutex::new(ObjectState {
                group: Some(group),
                children: Vec::new(),
                names: HashMap::new(),
            }),
        }
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

    /// Top compound holding this object's properties.
    pub fn properties(&self) -> Arc<CompoundPropertyWriter> {
        Arc::clone(&self.properties)
    }

    pub fn num_children(&self) -> usize {
        self.state.lock().children.len()
    }

    pub fn child(&self, index: usize) -> Option<Arc<ObjectWriter>> {
        self.state.lock().children.get(index).cloned()
    }

    pub fn child_by_name(&self, name: &str) -> Option<Arc<ObjectWriter>> {
        let state = self.state.lock();
        state.names.get(name).map(|&i| Arc::clone(&state.children[i]))
    }

    /// Create a child object. Fails if a sibling already has `name`.
    pub fn create_child(&self, name: &str, meta_data: MetaData) -> Result<Arc<ObjectWriter>> {
        self.ctx.ensure_open()?;
        validate_name(name)?;
        let mut state = self.state.lock();
        if state.names.contains_key(name) {
            return Err(Error::DuplicateName {
                parent: self.header.full_name.clone(),
                name: name.to_string(),
            });
        }
        let index = state.children.len();
        // Child groups follow the properties group.
        let group = state.group.as_ref().ok_or(Error::Frozen)?.child_at(index + 1);
        let header =
            ObjectHeader::new(name, self.header.child_path(name)).with_meta_data(meta_data);
        let child = Arc::new(ObjectWriter::new(Arc::clone(&self.ctx), header, group));
        state.names.insert(name.to_string(), index);
        state.children.push(Arc::clone(&child));
        Ok(child)
    }

    /// Store properties, children and the child header blob; the blob ends
    /// with the properties hash and the folded children hash.
    pub(crate) fn finish(&self) -> Result<FinishedObject> {
        let properties = self.properties.finish()?;

        let mut state = self.state.lock();
        let mut group = state.group.take().ok_or(Error::Frozen)?;
        group.add_group(properties.tree);

        let mut headers = Vec::with_capacity(state.children.len());
        let mut hashes = Vec::with_capacity(state.children.len());
        for child in &state.children {
            let finished = child.finish()?;
            group.add_group(finished.tree);
            headers.push(finished.header);
            hashes.push(finished.hash);
        }
        let children_hash = HashFold::new("alembic-git children").digests(&hashes).finish();

        let mut blob = write_object_headers(&headers, &mut self.ctx.tables().metadata);
        let suffix = ObjectHashes {
            properties: properties.hash,
            children: children_hash,
        };
        blob.extend_from_slice(&suffix.to_bytes());
        group.add_data(&blob)?;
        let tree = group.finish()?;

        let hash = HashFold::new("alembic-git object")
            .bytes(self.header.name.as_bytes())
            .bytes(self.header.meta_data.serialize().as_bytes())
            .digest(&properties.hash)
            .digest(&children_hash)
            .finish();
        Ok(FinishedObject {
            header: self.header.clone(),
            tree,
            hash,
        })
    }
}
