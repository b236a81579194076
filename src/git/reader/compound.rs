//! Compound property reader and the reader-side property sum type.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::context::ReadContext;
use super::object::ObjectReader;
use super::sampled::{ArrayPropertyReader, SampleSource, ScalarPropertyReader};
use crate::core::{PropertyHeader, PropertyType};
use crate::git::encoding::read_property_headers;
use crate::git::property_path;
use crate::git::slot::{ChildSlots, Shared, SlotState};
use crate::repo::GroupReader;
use crate::util::{Error, Result};

/// Any property reader.
#[derive(Clone, Debug)]
pub enum PropertyReader {
    Scalar(Arc<ScalarPropertyReader>),
    Array(Arc<ArrayPropertyReader>),
    Compound(Arc<CompoundPropertyReader>),
}

/// Weak counterpart of [`PropertyReader`] held by cache slots.
pub(crate) enum WeakPropertyReader {
    Scalar(Weak<ScalarPropertyReader>),
    Array(Weak<ArrayPropertyReader>),
    Compound(Weak<CompoundPropertyReader>),
}

impl Shared for PropertyReader {
    type Weak = WeakPropertyReader;

    fn downgrade(&self) -> WeakPropertyReader {
        match self {
            Self::Scalar(p) => WeakPropertyReader::Scalar(Arc::downgrade(p)),
            Self::Array(p) => WeakPropertyReader::Array(Arc::downgrade(p)),
            Self::Compound(p) => WeakPropertyReader::Compound(Arc::downgrade(p)),
        }
    }

    fn upgrade(weak: &WeakPropertyReader) -> Option<Self> {
        match weak {
            WeakPropertyReader::Scalar(w) => w.upgrade().map(Self::Scalar),
            WeakPropertyReader::Array(w) => w.upgrade().map(Self::Array),
            WeakPropertyReader::Compound(w) => w.upgrade().map(Self::Compound),
        }
    }
}

impl PropertyReader {
    pub fn header(&self) -> &PropertyHeader {
        match self {
            Self::Scalar(p) => p.header(),
            Self::Array(p) => p.header(),
            Self::Compound(p) => p.header(),
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn property_type(&self) -> PropertyType {
        self.header().property_type
    }

    pub fn as_scalar(&self) -> Option<&Arc<ScalarPropertyReader>> {
        match self {
            Self::Scalar(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<ArrayPropertyReader>> {
        match self {
            Self::Array(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Arc<CompoundPropertyReader>> {
        match self {
            Self::Compound(p) => Some(p),
            _ => None,
        }
    }

    /// Both handles name the same materialized reader.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => Arc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b),
            (Self::Compound(a), Self::Compound(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Reader for a compound property. Children materialize on first request
/// and are cached weakly.
#[derive(Debug)]
pub struct CompoundPropertyReader {
    ctx: Arc<ReadContext>,
    header: PropertyHeader,
    full_name: String,
    group: GroupReader,
    object: Weak<ObjectReader>,
    parent: Weak<CompoundPropertyReader>,
    this: Weak<CompoundPropertyReader>,
    headers: Vec<PropertyHeader>,
    names: HashMap<String, usize>,
    children: ChildSlots<PropertyReader>,
}

impl CompoundPropertyReader {
    /// Decode the child headers of `group`.
    pub(crate) fn load(
        ctx: Arc<ReadContext>,
        header: PropertyHeader,
        full_name: String,
        group: GroupReader,
        object: Weak<ObjectReader>,
        parent: Weak<CompoundPropertyReader>,
    ) -> Result<Arc<Self>> {
        let n = group.num_children();
        if n == 0 {
            return Err(Error::InvalidStructure(format!(
                "{}: compound {full_name:?} has no header blob",
                group.fullname()
            )));
        }
        let headers = read_property_headers(&group.data(n - 1)?, &ctx.indexed_metadata)?;
        if headers.len() != n - 1 {
            return Err(Error::InvalidStructure(format!(
                "{}: {} property headers for {} groups",
                group.fullname(),
                headers.len(),
                n - 1
            )));
        }

        let mut names = HashMap::with_capacity(headers.len());
        for (i, h) in headers.iter().enumerate() {
            if names.insert(h.name.clone(), i).is_some() {
                return Err(Error::InvalidStructure(format!(
                    "{}: duplicate property {:?}",
                    group.fullname(),
                    h.name
                )));
            }
        }

        let children = ChildSlots::new(headers.len());
        Ok(Arc::new_cyclic(|this| Self {
            ctx,
            header,
            full_name,
            group,
            object,
            parent,
            this: this.clone(),
            headers,
            names,
            children,
        }))
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
        self.headers.len()
    }

    pub fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        self.headers.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.headers.len(),
        })
    }

    pub fn property_header_by_name(&self, name: &str) -> Result<&PropertyHeader> {
        Ok(&self.headers[self.index_of(name)?])
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| Error::PropertyNotFound(property_path(&self.full_name, name)))
    }

    /// Child `index`, cached while any caller holds it.
    pub fn property(&self, index: usize) -> Result<PropertyReader> {
        self.property_header(index)?;
        self.children.get_or_materialize(index, || self.materialize(index))
    }

    /// Cache state of child `index`.
    pub fn property_state(&self, index: usize) -> Option<SlotState> {
        self.children.state(index)
    }

    pub fn property_by_name(&self, name: &str) -> Result<PropertyReader> {
        self.property(self.index_of(name)?)
    }

    fn materialize(&self, index: usize) -> Result<PropertyReader> {
        let header = self.headers[index].clone();
        let full_name = property_path(&self.full_name, &header.name);
        Ok(match header.property_type {
            PropertyType::Scalar => PropertyReader::Scalar(Arc::new(ScalarPropertyReader::new(
                SampleSource::new(&self.ctx, header, full_name, self.group.clone(), index, self.this.clone())?,
            ))),
            PropertyType::Array => PropertyReader::Array(Arc::new(ArrayPropertyReader::new(
                SampleSource::new(&self.ctx, header, full_name, self.group.clone(), index, self.this.clone())?,
            ))),
            PropertyType::Compound => PropertyReader::Compound(CompoundPropertyReader::load(
                Arc::clone(&self.ctx),
                header,
                full_name,
                self.group.group(index)?,
                self.object.clone(),
                self.this.clone(),
            )?),
        })
    }

    fn typed(&self, name: &str, kind: PropertyType) -> Result<PropertyReader> {
        let index = self.index_of(name)?;
        self.headers[index].expect_kind(kind)?;
        self.property(index)
    }

    pub fn scalar_property(&self, name: &str) -> Result<Arc<ScalarPropertyReader>> {
        match self.typed(name, PropertyType::Scalar)? {
            PropertyReader::Scalar(p) => Ok(p),
            other => Err(kind_mismatch(PropertyType::Scalar, &other)),
        }
    }

    pub fn array_property(&self, name: &str) -> Result<Arc<ArrayPropertyReader>> {
        match self.typed(name, PropertyType::Array)? {
            PropertyReader::Array(p) => Ok(p),
            other => Err(kind_mismatch(PropertyType::Array, &other)),
        }
    }

    pub fn compound_property(&self, name: &str) -> Result<Arc<CompoundPropertyReader>> {
        match self.typed(name, PropertyType::Compound)? {
            PropertyReader::Compound(p) => Ok(p),
            other => Err(kind_mismatch(PropertyType::Compound, &other)),
        }
    }

    /// Owning object, while it is alive.
    pub fn object(&self) -> Option<Arc<ObjectReader>> {
        self.object.upgrade()
    }

    /// Enclosing compound; `None` for an object's top compound.
    pub fn parent(&self) -> Option<Arc<CompoundPropertyReader>> {
        self.parent.upgrade()
    }
}

fn kind_mismatch(expected: PropertyType, actual: &PropertyReader) -> Error {
    Error::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.property_type().to_string(),
    }
}
