use std::fmt;

use tile_geometry::{AccessorError, AttributeUsage, BufferError, MetadataError};

use crate::topology::FaceListError;

/// Location of a source primitive within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimitiveRef {
    pub mesh: usize,
    pub primitive: usize,
}

impl PrimitiveRef {
    #[inline]
    pub const fn new(mesh: usize, primitive: usize) -> Self {
        Self { mesh, primitive }
    }
}

impl fmt::Display for PrimitiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh {} primitive {}", self.mesh, self.primitive)
    }
}

/// Reasons a document cannot be tuned.
///
/// Every variant is an input contract violation; a failed tune never yields a partial document.
#[derive(Debug, thiserror::Error)]
pub enum TuneError {
    #[error("{at}: unsupported primitive mode {mode}")]
    UnsupportedMode { at: PrimitiveRef, mode: u32 },
    #[error("{at}: no POSITION attribute")]
    MissingPosition { at: PrimitiveRef },
    #[error("{at}: attribute {attribute:?} holds {actual} elements, expected {expected}")]
    AttributeCountMismatch {
        at: PrimitiveRef,
        attribute: AttributeUsage,
        expected: usize,
        actual: usize,
    },
    #[error("{at}: index {index} out of range for {vertices} vertices")]
    IndexOutOfRange {
        at: PrimitiveRef,
        index: u32,
        vertices: usize,
    },
    #[error("{at}: {source}")]
    MalformedFaceList {
        at: PrimitiveRef,
        #[source]
        source: FaceListError,
    },
    #[error("{at}: {vertices} vertices cannot be addressed by 32-bit indices")]
    TooManyVertices { at: PrimitiveRef, vertices: usize },
    #[error("{at}: feature ID set refers to missing attribute _FEATURE_ID_{attribute}")]
    MissingFeatureIds { at: PrimitiveRef, attribute: u32 },
    #[error("{at}: {source}")]
    Accessor {
        at: PrimitiveRef,
        #[source]
        source: AccessorError,
    },
    #[error("property {property:?} of table {table} holds {actual} bytes; expected {expected}")]
    MalformedPropertyTable {
        table: usize,
        property: String,
        expected: usize,
        actual: usize,
    },
    #[error("material group {group} refers to material {material}, but the document has {available}")]
    MaterialOutOfRange {
        group: usize,
        material: usize,
        available: usize,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("image {image} refers to missing buffer view {view}")]
    InvalidReference { image: usize, view: usize },
    #[error("top-level property {property:?} is not valid JSON: {source}")]
    OpaqueJson {
        property: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{property:?} refers to an accessor with {value}")]
    InvalidAccessorReference {
        property: &'static str,
        value: String,
    },
    #[error("{property:?}: {source}")]
    OpaqueAccessor {
        property: &'static str,
        #[source]
        source: AccessorError,
    },
}

impl TuneError {
    pub(crate) fn accessor(at: PrimitiveRef) -> impl FnOnce(AccessorError) -> Self {
        move |source| Self::Accessor { at, source }
    }
}
