//! # See Also
//!
//! * [glTF 2.0 Spec](https://registry.khronos.org/glTF/specs/2.0/glTF-2.0.html)
//! * [EXT_structural_metadata](https://github.com/CesiumGS/glTF/tree/3d-tiles-next/extensions/2.0/Vendor/EXT_structural_metadata)

mod accessor;
mod buffer;
mod builder;
mod mesh;
mod metadata;

use std::collections::BTreeMap;

pub use accessor::*;
pub use buffer::*;
pub use builder::*;
pub use mesh::*;
pub use metadata::*;

/// Errors raised when a document refers to something it does not contain, or uses a value
/// outside of the glTF enumerations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("unsupported primitive mode: {0}")]
    UnsupportedMode(u32),
    #[error("invalid accessor component type: {0}")]
    InvalidComponentType(u32),
    #[error("invalid accessor type: {0:?}")]
    InvalidAttributeType(String),
    #[error("invalid buffer view target: {0}")]
    InvalidTarget(u32),
    #[error("invalid metadata component type: {0:?}")]
    InvalidMetadataComponent(String),
}

/// A glTF tile document.
///
/// Only the parts of glTF relevant to geometry are modelled; everything else (scenes, nodes,
/// textures, animations...) is kept as raw JSON in [Document::opaque] and written back verbatim.
/// Mesh indices are stable, so nodes referring to meshes stay valid as long as meshes are neither
/// added nor removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub buffers: Vec<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub images: Vec<Image>,
    /// `EXT_structural_metadata`, if present.
    pub structural_metadata: Option<StructuralMetadata>,
    /// Top-level glTF properties which aren't modelled, by name, as raw JSON text.
    pub opaque: BTreeMap<String, String>,
}

impl Document {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total number of primitives across all meshes.
    pub fn primitive_count(&self) -> usize {
        self.meshes.iter().map(|m| m.primitives.len()).sum()
    }
}

/// A material, kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    /// The complete material object.
    pub json: Option<String>,
}

/// An image. Only its buffer view reference is interpreted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Image {
    pub name: Option<String>,
    pub buffer_view: Option<usize>,
    pub uri: Option<String>,
    pub mime_type: Option<String>,
}
