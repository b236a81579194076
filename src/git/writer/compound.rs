//! Compound property writer and the writer-side property sum type.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::WriteContext;
use super::sampled::{ArrayPropertyWriter, SampleTrack, ScalarPropertyWriter};
use super::FinishedProperty;
use crate::core::{validate_name, HashFold, MetaData, PropertyHeader, PropertyType};
use crate::git::encoding::write_property_headers;
use crate::git::property_path;
use crate::repo::GroupBuilder;
use crate::util::{DataType, Error, Result};

/// Any property writer.
#[derive(Clone, Debug)]
pub enum PropertyWriter {
    Scalar(Arc<ScalarPropertyWriter>),
    Array(Arc<ArrayPropertyWriter>),
    Compound(Arc<CompoundPropertyWriter>),
}

impl PropertyWriter {
    pub fn header(&self) -> PropertyHeader {
        match self {
            Self::Scalar(p) => p.header(),
            Self::Array(p) => p.header(),
            Self::Compound(p) => p.header().clone(),
        }
    }

    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Scalar(_) => PropertyType::Scalar,
            Self::Array(_) => PropertyType::Array,
            Self::Compound(_) => PropertyType::Compound,
        }
    }

    pub fn as_scalar(&self) -> Option<&Arc<ScalarPropertyWriter>> {
        match self {
            Self::Scalar(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<ArrayPropertyWriter>> {
        match self {
            Self::Array(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Arc<CompoundPropertyWriter>> {
        match self {
            Self::Compound(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn finish(&self) -> Result<FinishedProperty> {
        match self {
            Self::Scalar(p) => p.finish(),
            Self::Array(p) => p.finish(),
            Self::Compound(p) => p.finish(),
        }
    }
}

#[derive(Debug)]
struct CompoundState {
    group: Option<GroupBuilder>,
    children: Vec<PropertyWriter>,
    names: HashMap<String, usize>,
}

/// Writer for a named, ordered collection of child properties.
#[derive(Debug)]
pub struct CompoundPropertyWriter {
    ctx: Arc<WriteContext>,
    header: PropertyHeader,
    full_name: String,
    state: Mutex<CompoundState>,
}

impl CompoundPropertyWriter {
    pub(crate) fn new(
        ctx: Arc<WriteContext>,
        header: PropertyHeader,
        full_name: String,
        group: GroupBuilder,
    ) -> Self {
        Self {
            ctx,
            header,
            full_name,
            state: Mutex::new(CompoundState {
                group: Some(group),
                children: Vec::new(),
                names: HashMap::new(),
            }),
        }
    }

    pub fn header(&self) -> &PropertyHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn num_properties(&self) -> usize {
        self.state.lock().children.len()
    }

    /// Child `index` in creation order.
    pub fn property(&self, index: usize) -> Option<PropertyWriter> {
        self.state.lock().children.get(index).cloned()
    }

    pub fn property_by_name(&self, name: &str) -> Option<PropertyWriter> {
        let state = self.state.lock();
        state.names.get(name).map(|&i| state.children[i].clone())
    }

    pub fn property_header(&self, index: usize) -> Option<PropertyHeader> {
        self.property(index).map(|p| p.header())
    }

    /// Validate `name` and add the child built by `make` from its group
    /// and full name.
    fn add_child(
        &self,
        name: &str,
        make: impl FnOnce(GroupBuilder, String) -> PropertyWriter,
    ) -> Result<PropertyWriter> {
        self.ctx.ensure_open()?;
        validate_name(name)?;
        let mut state = self.state.lock();
        if state.names.contains_key(name) {
            return Err(Error::DuplicateName {
                parent: self.full_name.clone(),
                name: name.to_string(),
            });
        }
        let index = state.children.len();
        let group = state.group.as_ref().ok_or(Error::Frozen)?.child_at(index);
        let child = make(group, property_path(&self.full_name, name));
        state.names.insert(name.to_string(), index);
        state.children.push(child.clone());
        Ok(child)
    }

    fn check_leaf(&self, data_type: DataType, time_sampling_index: u32) -> Result<()> {
        if !data_type.is_valid() {
            return Err(Error::InvalidSample(format!("invalid data type {data_type}")));
        }
        self.ctx.check_time_sampling(time_sampling_index)
    }

    pub fn create_scalar_property(
        &self,
        name: &str,
        meta_data: MetaData,
        data_type: DataType,
        time_sampling_index: u32,
    ) -> Result<Arc<ScalarPropertyWriter>> {
        self.check_leaf(data_type, time_sampling_index)?;
        let header = PropertyHeader::scalar(name, data_type)
            .with_meta_data(meta_data)
            .with_time_sampling(time_sampling_index);
        let ctx = Arc::clone(&self.ctx);
        let child = self.add_child(name, |group, full_name| {
            PropertyWriter::Scalar(Arc::new(ScalarPropertyWriter::new(
                ctx,
                SampleTrack::new(header, full_name, group),
            )))
        })?;
        child
            .as_scalar()
            .cloned()
            .ok_or_else(|| Error::other("scalar property writer expected"))
    }

    pub fn create_array_property(
        &self,
        name: &str,
        meta_data: MetaData,
        data_type: DataType,
        time_sampling_index: u32,
    ) -> Result<Arc<ArrayPropertyWriter>> {
        self.check_leaf(data_type, time_sampling_index)?;
        let header = PropertyHeader::array(name, data_type)
            .with_meta_data(meta_data)
            .with_time_sampling(time_sampling_index);
        let ctx = Arc::clone(&self.ctx);
        let child = self.add_child(name, |group, full_name| {
            PropertyWriter::Array(Arc::new(ArrayPropertyWriter::new(
                ctx,
                SampleTrack::new(header, full_name, group),
            )))
        })?;
        child
            .as_array()
            .cloned()
            .ok_or_else(|| Error::other("array property writer expected"))
    }

    pub fn create_compound_property(
        &self,
        name: &str,
        meta_data: MetaData,
    ) -> Result<Arc<CompoundPropertyWriter>> {
        let header = PropertyHeader::compound(name).with_meta_data(meta_data);
        let ctx = Arc::clone(&self.ctx);
        let child = self.add_child(name, |group, full_name| {
            PropertyWriter::Compound(Arc::new(CompoundPropertyWriter::new(
                ctx, header, full_name, group,
            )))
        })?;
        child
            .as_compound()
            .cloned()
            .ok_or_else(|| Error::other("compound property writer expected"))
    }

    /// Store children, then the header blob; fold the children's hashes.
    pub(crate) fn finish(&self) -> Result<FinishedProperty> {
        let mut state = self.state.lock();
        let mut group = state.group.take().ok_or(Error::Frozen)?;

        let mut headers = Vec::with_capacity(state.children.len());
        let mut hashes = Vec::with_capacity(state.children.len());
        for child in &state.children {
            let finished = child.finish()?;
            group.add_group(finished.tree);
            headers.push(finished.header);
            hashes.push(finished.hash);
        }

        let blob = write_property_headers(&headers, &mut self.ctx.tables().metadata);
        group.add_data(&blob)?;
        let tree = group.finish()?;

        let hash = HashFold::new("alembic-git compound")
            .bytes(self.header.name.as_bytes())
            .bytes(self.header.meta_data.serialize().as_bytes())
            .digests(&hashes)
            .finish();
        Ok(FinishedProperty {
            header: self.header.clone(),
            tree,
            hash,
        })
    }
}
