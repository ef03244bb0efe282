use std::collections::BTreeMap;

use crate::ModelError;

pub mod attribute;

pub use attribute::*;

/// glTF primitive topology type
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    Points = 0,
    Lines = 1,
    LineLoop = 2,
    LineStrip = 3,
    // Triangles as default: https://registry.khronos.org/glTF/specs/2.0/glTF-2.0.html#schema-reference-mesh-primitive
    #[default]
    Triangles = 4,
    TriangleStrip = 5,
    TriangleFan = 6,
}

impl Mode {
    #[inline]
    pub fn to_gltf(self) -> u32 {
        self as u32
    }

    pub fn from_gltf(val: u32) -> Result<Self, ModelError> {
        match val {
            0 => Ok(Self::Points),
            1 => Ok(Self::Lines),
            2 => Ok(Self::LineLoop),
            3 => Ok(Self::LineStrip),
            4 => Ok(Self::Triangles),
            5 => Ok(Self::TriangleStrip),
            6 => Ok(Self::TriangleFan),
            _ => Err(ModelError::UnsupportedMode(val)),
        }
    }
}

/// One feature ID set of `EXT_mesh_features`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FeatureIdSet {
    /// Number of distinct features in the primitive.
    pub feature_count: u64,
    /// `n` of the `_FEATURE_ID_n` vertex attribute holding the IDs. If `None`, the IDs are
    /// implicit (the vertex index) or texture-based.
    pub attribute: Option<u32>,
    /// Property table indexed by these IDs.
    pub property_table: Option<usize>,
    /// ID meaning "no feature".
    pub null_feature_id: Option<u64>,
    pub label: Option<String>,
    /// Raw JSON of the feature ID texture, for texture-based sets.
    pub texture: Option<String>,
}

/// One drawable part of a [Mesh](crate::Mesh).
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Vertex attribute accessors.
    pub attributes: BTreeMap<AttributeUsage, usize>,
    /// Index accessor. If `None`, equivalent to [0, 1, 2, 3, ...]
    pub indices: Option<usize>,
    /// Raw glTF topology code; see [Mode].
    pub mode: u32,
    /// Material with which this primitive is rendered
    pub material: Option<usize>,
    /// `EXT_mesh_features`
    pub feature_ids: Vec<FeatureIdSet>,
    /// Morph targets, each a set of displacement attribute accessors.
    pub targets: Vec<BTreeMap<AttributeUsage, usize>>,
    /// Extensions other than `EXT_mesh_features`, by name, as raw JSON text.
    ///
    /// These are copied as they are, so they must not refer to accessors or buffer views.
    pub extensions: BTreeMap<String, String>,
    /// Raw JSON text of `extras`.
    pub extras: Option<String>,
}

impl Default for Primitive {
    fn default() -> Self {
        Self {
            attributes: BTreeMap::new(),
            indices: None,
            mode: Mode::default().to_gltf(),
            material: None,
            feature_ids: Vec::new(),
            targets: Vec::new(),
            extensions: BTreeMap::new(),
            extras: None,
        }
    }
}

impl Primitive {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode: mode.to_gltf(),
            ..Default::default()
        }
    }

    /// The topology of this primitive, if it is one glTF defines.
    #[inline]
    pub fn mode(&self) -> Result<Mode, ModelError> {
        Mode::from_gltf(self.mode)
    }

    #[inline]
    pub fn get_attr(&self, attr: &AttributeUsage) -> Option<usize> {
        self.attributes.get(attr).copied()
    }

    #[inline]
    pub fn position(&self) -> Option<usize> {
        self.get_attr(&AttributeUsage::Position)
    }

    pub fn with_attr(mut self, attr: AttributeUsage, accessor: usize) -> Self {
        self.attributes.insert(attr, accessor);
        self
    }

    pub fn with_indices(mut self, accessor: usize) -> Self {
        self.indices = Some(accessor);
        self
    }

    pub fn with_material(mut self, material: usize) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_feature_ids(mut self, set: FeatureIdSet) -> Self {
        self.feature_ids.push(set);
        self
    }

    pub fn with_target(mut self, target: BTreeMap<AttributeUsage, usize>) -> Self {
        self.targets.push(target);
        self
    }
}
