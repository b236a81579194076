//! Headers for objects and properties.

use super::MetaData;
use crate::util::{DataType, Error, Result};

/// Header of one object in the hierarchy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectHeader {
    /// Name among siblings.
    pub name: String,
    /// Slash-joined path from the root, e.g. `/world/cam`. The root is `/`.
    pub full_name: String,
    pub meta_data: MetaData,
}

impl ObjectHeader {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            meta_data: MetaData::new(),
        }
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    /// Header of the archive root object.
    pub fn root() -> Self {
        Self::new("ABC", "/")
    }

    /// Full name of a child called `name` under this object.
    pub fn child_path(&self, name: &str) -> String {
        join_path(&self.full_name, name)
    }
}

/// Kind of property. Closed set: every reader and writer dispatches on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Compound,
    #[default]
    Scalar,
    Array,
}

impl PropertyType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Compound => "compound",
            Self::Scalar => "scalar",
            Self::Array => "array",
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Header of one property.
///
/// The sample fields are filled in when the property is finalized; a
/// freshly created writer reports zero samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyHeader {
    pub name: String,
    pub property_type: PropertyType,
    /// POD kind and extent; [`DataType::UNKNOWN`] for compounds.
    pub data_type: DataType,
    pub time_sampling_index: u32,
    pub meta_data: MetaData,
    pub num_samples: u32,
    /// First sample index that differs from sample 0; 0 when none does.
    pub first_changed_index: u32,
    /// Last sample index that differs from its predecessor; 0 when none does.
    pub last_changed_index: u32,
    /// Array samples all carry the same element count.
    pub is_homogeneous: bool,
}

impl PropertyHeader {
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Scalar,
            data_type,
            is_homogeneous: true,
            ..Self::default()
        }
    }

    pub fn array(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            property_type: PropertyType::Array,
            ..Self::scalar(name, data_type)
        }
    }

    pub fn compound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Compound,
            data_type: DataType::UNKNOWN,
            ..Self::default()
        }
    }

    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn is_scalar(&self) -> bool {
        self.property_type == PropertyType::Scalar
    }

    pub fn is_array(&self) -> bool {
        self.property_type == PropertyType::Array
    }

    pub fn is_compound(&self) -> bool {
        self.property_type == PropertyType::Compound
    }

    /// No sample ever differs from the first one.
    pub fn is_constant(&self) -> bool {
        self.first_changed_index == 0 && self.last_changed_index == 0
    }

    /// Number of samples physically recorded. Samples before the first
    /// change share slot 0, samples after the last change share the final slot.
    pub fn num_stored_samples(&self) -> u32 {
        match self.num_samples {
            0 => 0,
            _ if self.is_constant() => 1,
            _ => self.last_changed_index - self.first_changed_index + 2,
        }
    }

    /// Stored slot backing logical sample `index`.
    pub fn stored_index(&self, index: u32) -> u32 {
        if self.is_constant() || index < self.first_changed_index {
            0
        } else {
            index.min(self.last_changed_index) - self.first_changed_index + 1
        }
    }

    /// Error unless this header describes the `expected` kind.
    pub fn expect_kind(&self, expected: PropertyType) -> Result<()> {
        if self.property_type == expected {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: format!("{expected} property {:?}", self.name),
                actual: self.property_type.to_string(),
            })
        }
    }
}

/// Validate an object or property name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        Err(Error::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

pub(crate) fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_paths() {
        let root = ObjectHeader::root();
        let world = ObjectHeader::new("world", root.child_path("world"));
        assert_eq!(world.full_name, "/world");
        assert_eq!(world.child_path("cam"), "/world/cam");
    }

    #[test]
    fn test_stored_index_mapping() {
        let mut header = PropertyHeader::array("P", DataType::VEC3F);
        header.num_samples = 10;
        assert!(header.is_constant());
        assert_eq!(header.stored_index(7), 0);
        assert_eq!(header.num_stored_samples(), 1);

        header.first_changed_index = 3;
        header.last_changed_index = 5;
        assert_eq!(header.stored_index(2), 0);
        assert_eq!(header.stored_index(3), 1);
        assert_eq!(header.stored_index(4), 2);
        assert_eq!(header.stored_index(9), 3);
        assert_eq!(header.num_stored_samples(), 4);
    }

    #[test]
    fn test_expect_kind() {
        let header = PropertyHeader::compound(".geom");
        assert!(header.expect_kind(PropertyType::Compound).is_ok());
        assert!(matches!(
            header.expect_kind(PropertyType::Scalar),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("pCube1").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
    }
}
