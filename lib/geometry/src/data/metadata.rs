//! `EXT_structural_metadata` property tables.
//!
//! Property types are resolved against the schema when a document is loaded, so each
//! [PropertyTableProperty] knows the binary layout of its columns without consulting the schema.

use std::collections::BTreeMap;

use crate::{BufferError, Document, ModelError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("property table {table} has no property {property:?}")]
    MissingProperty { table: usize, property: String },
    #[error("property {property:?} of table {table} is not a fixed-width integer column")]
    NotAnIntegerColumn { table: usize, property: String },
    #[error("property {property:?} of table {table} holds {actual} bytes; expected {expected}")]
    LengthMismatch {
        table: usize,
        property: String,
        expected: usize,
        actual: usize,
    },
}

/// Component type of a metadata property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataComponent {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// One bit per element
    Boolean,
    /// Variable length; requires string offsets
    String,
}

impl MetadataComponent {
    /// Size in bytes of one value, for byte-aligned fixed-width components.
    pub const fn size(self) -> Option<usize> {
        match self {
            Self::I8 | Self::U8 => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::Boolean | Self::String => None,
        }
    }

    pub const fn is_integer(self) -> bool {
        !matches!(
            self,
            Self::F32 | Self::F64 | Self::Boolean | Self::String
        )
    }

    pub const fn to_gltf(self) -> &'static str {
        match self {
            Self::I8 => "INT8",
            Self::U8 => "UINT8",
            Self::I16 => "INT16",
            Self::U16 => "UINT16",
            Self::I32 => "INT32",
            Self::U32 => "UINT32",
            Self::I64 => "INT64",
            Self::U64 => "UINT64",
            Self::F32 => "FLOAT32",
            Self::F64 => "FLOAT64",
            Self::Boolean => "BOOLEAN",
            Self::String => "STRING",
        }
    }

    pub fn from_gltf(val: &str) -> Result<Self, ModelError> {
        Ok(match val {
            "INT8" => Self::I8,
            "UINT8" => Self::U8,
            "INT16" => Self::I16,
            "UINT16" => Self::U16,
            "INT32" => Self::I32,
            "UINT32" => Self::U32,
            "INT64" => Self::I64,
            "UINT64" => Self::U64,
            "FLOAT32" => Self::F32,
            "FLOAT64" => Self::F64,
            "BOOLEAN" => Self::Boolean,
            "STRING" => Self::String,
            _ => return Err(ModelError::InvalidMetadataComponent(val.to_owned())),
        })
    }

    /// Decode one little-endian integer from the start of `bytes`, widening to `u64`.
    ///
    /// Signed values are reinterpreted; floats, booleans and strings yield `None`.
    pub fn decode_u64(self, bytes: &[u8]) -> Option<u64> {
        let mut raw = [0u8; 8];
        let size = self.size()?;
        raw[..size].copy_from_slice(bytes.get(..size)?);
        Some(match self {
            Self::I8 => raw[0] as i8 as i64 as u64,
            Self::I16 => i16::from_le_bytes([raw[0], raw[1]]) as i64 as u64,
            Self::I32 => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64 as u64,
            Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::I64 => u64::from_le_bytes(raw),
            Self::F32 | Self::F64 | Self::Boolean | Self::String => return None,
        })
    }
}

/// A column of a [PropertyTable].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTableProperty {
    /// Buffer view holding the values.
    pub values: usize,
    pub component: MetadataComponent,
    /// Number of components per value for vector, matrix and fixed-length array types.
    pub components: usize,
    /// Buffer view of array offsets, for variable-length arrays.
    pub array_offsets: Option<usize>,
    /// Buffer view of string offsets, for strings.
    pub string_offsets: Option<usize>,
    /// Component type of the offset views.
    pub offset_component: MetadataComponent,
}

impl PropertyTableProperty {
    /// A fixed-width scalar column.
    pub fn scalar(values: usize, component: MetadataComponent) -> Self {
        Self {
            values,
            component,
            components: 1,
            array_offsets: None,
            string_offsets: None,
            offset_component: MetadataComponent::U32,
        }
    }

    /// Every buffer view referenced by this property.
    pub fn views(&self) -> impl Iterator<Item = usize> {
        [Some(self.values), self.array_offsets, self.string_offsets]
            .into_iter()
            .flatten()
    }

    /// Mutable references to every buffer view index held by this property.
    pub fn views_mut(&mut self) -> impl Iterator<Item = &mut usize> {
        [
            Some(&mut self.values),
            self.array_offsets.as_mut(),
            self.string_offsets.as_mut(),
        ]
        .into_iter()
        .flatten()
    }
}

/// A table of per-feature values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyTable {
    pub name: Option<String>,
    /// Name of the schema class describing the table.
    pub class: String,
    /// Number of rows (features).
    pub count: usize,
    pub properties: BTreeMap<String, PropertyTableProperty>,
}

/// `EXT_structural_metadata` extension data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralMetadata {
    /// The schema object, kept as raw JSON.
    pub schema: Option<String>,
    /// A schema URI, when the schema isn't embedded.
    pub schema_uri: Option<String>,
    pub property_tables: Vec<PropertyTable>,
}

impl StructuralMetadata {
    /// Index of the first table of class `class`.
    pub fn table_of_class(&self, class: &str) -> Option<usize> {
        self.property_tables.iter().position(|t| t.class == class)
    }
}

impl Document {
    /// Decode an integer column of property table `table`, one value per row.
    pub fn read_integer_column(&self, table: usize, property: &str) -> Result<Vec<u64>, MetadataError> {
        let missing = || MetadataError::MissingProperty {
            table,
            property: property.to_owned(),
        };
        let prop = self
            .structural_metadata
            .as_ref()
            .and_then(|m| m.property_tables.get(table))
            .and_then(|t| t.properties.get(property).map(|p| (t.count, p)));
        let (count, prop) = prop.ok_or_else(missing)?;
        let size = match prop.component.size() {
            Some(size)
                if prop.component.is_integer()
                    && prop.components == 1
                    && prop.array_offsets.is_none() =>
            {
                size
            }
            _ => {
                return Err(MetadataError::NotAnIntegerColumn {
                    table,
                    property: property.to_owned(),
                })
            }
        };
        let bytes = self.view_bytes(prop.values)?;
        if bytes.len() != count * size {
            return Err(MetadataError::LengthMismatch {
                table,
                property: property.to_owned(),
                expected: count * size,
                actual: bytes.len(),
            });
        }
        Ok(bytes
            .chunks_exact(size)
            .filter_map(|v| prop.component.decode_u64(v))
            .collect())
    }
}
