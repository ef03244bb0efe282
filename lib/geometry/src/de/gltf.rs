//! Utilities for deserializing glTF data as a [Document].
//!
//! # Notes
//!
//! * Both JSON (`.gltf`) and binary (`.glb`) containers are accepted; GLB framing is handled by
//!   the `gltf` crate, the JSON chunk by `serde`.
//! * External buffers are fetched through a caller-supplied loader, so this module never touches
//!   the filesystem. Embedded `data:` URIs are rejected.
//! * `EXT_mesh_features` and `EXT_structural_metadata` are interpreted; every other top-level
//!   property is kept verbatim in [Document::opaque].
//! * Other primitive extensions and `extras` are kept as raw JSON. Sparse accessors and
//!   `KHR_draco_mesh_compression` refer to buffer data this crate does not track, so they are
//!   rejected.
//!
//! # See Also
//!
//! * [glTF 2.0 Spec](https://registry.khronos.org/glTF/specs/2.0/glTF-2.0.html)
//! * [EXT_mesh_features](https://github.com/CesiumGS/glTF/tree/3d-tiles-next/extensions/2.0/Vendor/EXT_mesh_features)

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    Accessor, AttributeType, AttributeUsage, Buffer, BufferTarget, BufferView, ComponentType,
    Document, FeatureIdSet, Image, Material, Mesh, MetadataComponent, ModelError, Primitive,
    PropertyTable, PropertyTableProperty, StructuralMetadata,
};

pub const EXT_MESH_FEATURES: &str = "EXT_mesh_features";
pub const EXT_STRUCTURAL_METADATA: &str = "EXT_structural_metadata";
pub const KHR_DRACO_MESH_COMPRESSION: &str = "KHR_draco_mesh_compression";

/// Errors raised while reading a glTF asset.
#[derive(Debug, thiserror::Error)]
pub enum DeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Glb(#[from] ::gltf::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("buffer {0} refers to the GLB binary chunk, but there is none")]
    MissingBinaryChunk(usize),
    #[error("buffer {0} uses an embedded data URI, which is unsupported")]
    DataUri(usize),
    #[error("buffer {index} declares {declared} bytes but only {actual} were loaded")]
    BufferLength {
        index: usize,
        declared: usize,
        actual: usize,
    },
    #[error("accessor {0} is sparse, which is unsupported")]
    SparseAccessor(usize),
    #[error("mesh {mesh} primitive {primitive} uses unsupported extension {extension}")]
    UnsupportedExtension {
        mesh: usize,
        primitive: usize,
        extension: &'static str,
    },
    #[error("cannot resolve type of property {property:?} of class {class:?}")]
    UnresolvedProperty { class: String, property: String },
    #[error("failed to load buffer {uri:?}: {source}")]
    Load {
        uri: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Loads the bytes behind an external buffer URI.
pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRoot {
    #[serde(default)]
    buffers: Vec<RawBuffer>,
    #[serde(default)]
    buffer_views: Vec<RawBufferView>,
    #[serde(default)]
    accessors: Vec<RawAccessor>,
    #[serde(default)]
    meshes: Vec<RawMesh>,
    #[serde(default)]
    materials: Vec<Value>,
    #[serde(default)]
    images: Vec<RawImage>,
    #[serde(default)]
    extensions: Option<serde_json::Map<String, Value>>,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuffer {
    uri: Option<String>,
    byte_length: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBufferView {
    buffer: usize,
    #[serde(default)]
    byte_offset: usize,
    byte_length: usize,
    byte_stride: Option<usize>,
    target: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccessor {
    buffer_view: Option<usize>,
    #[serde(default)]
    byte_offset: usize,
    count: usize,
    component_type: u32,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    normalized: bool,
    min: Option<Vec<f64>>,
    max: Option<Vec<f64>>,
    sparse: Option<Value>,
}

#[derive(Deserialize)]
struct RawMesh {
    name: Option<String>,
    primitives: Vec<RawPrimitive>,
    #[serde(default)]
    weights: Vec<f32>,
}

#[derive(Deserialize)]
struct RawPrimitive {
    attributes: BTreeMap<String, usize>,
    indices: Option<usize>,
    mode: Option<u32>,
    material: Option<usize>,
    #[serde(default)]
    targets: Vec<BTreeMap<String, usize>>,
    #[serde(default)]
    extensions: serde_json::Map<String, Value>,
    extras: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeshFeatures {
    #[serde(default)]
    feature_ids: Vec<RawFeatureId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeatureId {
    feature_count: u64,
    attribute: Option<u32>,
    property_table: Option<usize>,
    null_feature_id: Option<u64>,
    label: Option<String>,
    texture: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImage {
    name: Option<String>,
    buffer_view: Option<usize>,
    uri: Option<String>,
    mime_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStructuralMetadata {
    schema: Option<Value>,
    schema_uri: Option<String>,
    #[serde(default)]
    property_tables: Vec<RawPropertyTable>,
}

#[derive(Deserialize)]
struct RawPropertyTable {
    name: Option<String>,
    class: String,
    count: usize,
    #[serde(default)]
    properties: BTreeMap<String, RawTableProperty>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTableProperty {
    values: usize,
    array_offsets: Option<usize>,
    string_offsets: Option<usize>,
    array_offset_type: Option<String>,
    string_offset_type: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawSchema {
    #[serde(default)]
    classes: BTreeMap<String, RawClass>,
    #[serde(default)]
    enums: BTreeMap<String, RawEnum>,
}

#[derive(Deserialize)]
struct RawClass {
    #[serde(default)]
    properties: BTreeMap<String, RawClassProperty>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClassProperty {
    #[serde(rename = "type")]
    ty: String,
    component_type: Option<String>,
    enum_type: Option<String>,
    #[serde(default)]
    array: bool,
    count: Option<usize>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnum {
    value_type: Option<String>,
}

/// Read a glTF (JSON or GLB) asset.
///
/// `load` is called once per external buffer URI.
pub fn from_slice(
    bytes: &[u8],
    mut load: impl FnMut(&str) -> Result<Vec<u8>, LoadError>,
) -> Result<Document, DeError> {
    let (json, mut bin) = if bytes.starts_with(b"glTF") {
        let glb = ::gltf::Glb::from_slice(bytes)?;
        (glb.json.into_owned(), glb.bin.map(|b| b.into_owned()))
    } else {
        (bytes.to_vec(), None)
    };
    let root: RawRoot = serde_json::from_slice(&json)?;
    tracing::debug!(
        buffers = root.buffers.len(),
        meshes = root.meshes.len(),
        accessors = root.accessors.len(),
        "parsed glTF document"
    );

    let mut buffers = Vec::with_capacity(root.buffers.len());
    for (index, raw) in root.buffers.into_iter().enumerate() {
        let mut data = match raw.uri.as_deref() {
            None => bin.take().ok_or(DeError::MissingBinaryChunk(index))?,
            Some(uri) if uri.starts_with("data:") => return Err(DeError::DataUri(index)),
            Some(uri) => load(uri).map_err(|source| DeError::Load {
                uri: uri.to_owned(),
                source,
            })?,
        };
        if data.len() < raw.byte_length {
            return Err(DeError::BufferLength {
                index,
                declared: raw.byte_length,
                actual: data.len(),
            });
        }
        // GLB chunks are padded to 4 bytes
        data.truncate(raw.byte_length);
        buffers.push(Buffer {
            data,
            uri: raw.uri,
        });
    }

    let buffer_views = root
        .buffer_views
        .into_iter()
        .map(|v| {
            Ok(BufferView {
                buffer: v.buffer,
                byte_offset: v.byte_offset,
                byte_length: v.byte_length,
                byte_stride: v.byte_stride,
                target: v.target.map(BufferTarget::from_gltf).transpose()?,
            })
        })
        .collect::<Result<Vec<_>, ModelError>>()?;

    let accessors = root
        .accessors
        .into_iter()
        .enumerate()
        .map(|(index, a)| {
            if a.sparse.is_some() {
                return Err(DeError::SparseAccessor(index));
            }
            Ok(Accessor {
                buffer_view: a.buffer_view,
                byte_offset: a.byte_offset,
                count: a.count,
                component_type: ComponentType::from_gltf(a.component_type)?,
                attribute_type: AttributeType::from_gltf(&a.ty)?,
                normalized: a.normalized,
                min: a.min,
                max: a.max,
            })
        })
        .collect::<Result<Vec<_>, DeError>>()?;

    let meshes = root
        .meshes
        .into_iter()
        .enumerate()
        .map(|(index, raw)| mesh(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let materials = root
        .materials
        .into_iter()
        .map(|m| Material {
            name: m.get("name").and_then(Value::as_str).map(str::to_owned),
            json: Some(m.to_string()),
        })
        .collect();

    let images = root
        .images
        .into_iter()
        .map(|i| Image {
            name: i.name,
            buffer_view: i.buffer_view,
            uri: i.uri,
            mime_type: i.mime_type,
        })
        .collect();

    let mut opaque: BTreeMap<String, String> = root
        .rest
        .into_iter()
        .map(|(k, v)| (k, v.to_string()))
        .collect();

    let mut structural_metadata = None;
    if let Some(mut extensions) = root.extensions {
        if let Some(raw) = extensions.remove(EXT_STRUCTURAL_METADATA) {
            structural_metadata = Some(metadata(serde_json::from_value(raw)?)?);
        }
        if !extensions.is_empty() {
            opaque.insert(
                "extensions".to_owned(),
                Value::Object(extensions).to_string(),
            );
        }
    }

    Ok(Document {
        buffers,
        buffer_views,
        accessors,
        meshes,
        materials,
        images,
        structural_metadata,
        opaque,
    })
}

fn mesh(index: usize, raw: RawMesh) -> Result<Mesh, DeError> {
    let mut primitives = Vec::with_capacity(raw.primitives.len());
    for (primitive, mut p) in raw.primitives.into_iter().enumerate() {
        if p.extensions.contains_key(KHR_DRACO_MESH_COMPRESSION) {
            return Err(DeError::UnsupportedExtension {
                mesh: index,
                primitive,
                extension: KHR_DRACO_MESH_COMPRESSION,
            });
        }
        let features: Option<RawMeshFeatures> = p
            .extensions
            .remove(EXT_MESH_FEATURES)
            .map(serde_json::from_value)
            .transpose()?;
        primitives.push(Primitive {
            attributes: attributes(p.attributes),
            indices: p.indices,
            mode: p.mode.unwrap_or(4),
            material: p.material,
            feature_ids: features
                .map(|f| f.feature_ids)
                .unwrap_or_default()
                .into_iter()
                .map(|f| FeatureIdSet {
                    feature_count: f.feature_count,
                    attribute: f.attribute,
                    property_table: f.property_table,
                    null_feature_id: f.null_feature_id,
                    label: f.label,
                    texture: f.texture.map(|t| t.to_string()),
                })
                .collect(),
            targets: p.targets.into_iter().map(attributes).collect(),
            extensions: p
                .extensions
                .into_iter()
                .map(|(name, v)| (name, v.to_string()))
                .collect(),
            extras: p.extras.map(|e| e.to_string()),
        });
    }
    Ok(Mesh {
        name: raw.name,
        weights: raw.weights,
        primitives,
    })
}

fn attributes(raw: BTreeMap<String, usize>) -> BTreeMap<AttributeUsage, usize> {
    raw.into_iter()
        .map(|(name, acc)| (AttributeUsage::from_gltf(&name), acc))
        .collect()
}

fn metadata(raw: RawStructuralMetadata) -> Result<StructuralMetadata, DeError> {
    let schema: RawSchema = match &raw.schema {
        Some(s) => serde_json::from_value(s.clone())?,
        None => RawSchema::default(),
    };
    let mut property_tables = Vec::with_capacity(raw.property_tables.len());
    for table in raw.property_tables {
        let mut properties = BTreeMap::new();
        for (name, prop) in table.properties {
            let unresolved = || DeError::UnresolvedProperty {
                class: table.class.clone(),
                property: name.clone(),
            };
            let class_prop = schema
                .classes
                .get(&table.class)
                .and_then(|c| c.properties.get(&name))
                .ok_or_else(unresolved)?;
            let (component, width) = property_layout(&schema, class_prop).ok_or_else(unresolved)?;
            let components = match (class_prop.array, class_prop.count) {
                (true, Some(n)) => width * n,
                _ => width,
            };
            let offset_type = prop
                .array_offset_type
                .as_deref()
                .or(prop.string_offset_type.as_deref())
                .unwrap_or("UINT32");
            properties.insert(
                name,
                PropertyTableProperty {
                    values: prop.values,
                    component,
                    components,
                    array_offsets: prop.array_offsets,
                    string_offsets: prop.string_offsets,
                    offset_component: MetadataComponent::from_gltf(offset_type)?,
                },
            );
        }
        property_tables.push(PropertyTable {
            name: table.name,
            class: table.class,
            count: table.count,
            properties,
        });
    }
    Ok(StructuralMetadata {
        schema: raw.schema.map(|s| s.to_string()),
        schema_uri: raw.schema_uri,
        property_tables,
    })
}

/// Component type and per-value component count of a schema property.
fn property_layout(schema: &RawSchema, prop: &RawClassProperty) -> Option<(MetadataComponent, usize)> {
    let width = match prop.ty.as_str() {
        "STRING" => return Some((MetadataComponent::String, 1)),
        "BOOLEAN" => return Some((MetadataComponent::Boolean, 1)),
        "ENUM" => {
            let value_type = schema
                .enums
                .get(prop.enum_type.as_deref()?)?
                .value_type
                .as_deref()
                .unwrap_or("UINT16");
            return MetadataComponent::from_gltf(value_type).ok().map(|c| (c, 1));
        }
        "SCALAR" => 1,
        "VEC2" => 2,
        "VEC3" => 3,
        "VEC4" => 4,
        "MAT2" => 4,
        "MAT3" => 9,
        "MAT4" => 16,
        _ => return None,
    };
    let component = MetadataComponent::from_gltf(prop.component_type.as_deref()?).ok()?;
    Some((component, width))
}
