//! Utilities for serializing [Documents](crate::Document) to [glTF](https://github.com/KhronosGroup/glTF).
//!
//! # Notes
//!
//! ## GLB layout
//!
//! * 12-byte header: magic `glTF`, version `2`, total length
//! * JSON chunk, padded with spaces to a multiple of 4 bytes
//! * BIN chunk, padded with zeroes to a multiple of 4 bytes. Only the *first* buffer of a document
//!   may live in the BIN chunk; every other buffer must carry a `uri`.
//!
//! ## Round trips
//!
//! Properties kept in [Document::opaque](crate::Document::opaque) are written back verbatim, so
//! nodes, scenes, textures and animations survive a read/write cycle as long as the meshes they
//! refer to keep their indices.
//!
//! # See Also
//!
//! * [glTF Specification](https://registry.khronos.org/glTF/specs/2.0/glTF-2.0.html)

use std::{borrow::Cow, collections::BTreeMap};

use serde_json::{json, Map, Value};

use crate::{
    Accessor, AttributeUsage, BufferView, Document, FeatureIdSet, Image, Mesh, Primitive,
    PropertyTable, StructuralMetadata,
};

/// The value of the `generator` field in output glTF assets.
///
/// See also: [glTF Asset Specification](https://registry.khronos.org/glTF/specs/2.0/glTF-2.0.html#asset)
pub const GENERATOR_ID: &str = concat!("tile-geometry@", env!("CARGO_PKG_VERSION"));

/// Minimum glTF version required to load generated assets.
///
/// See also: [glTF Asset Specification](https://registry.khronos.org/glTF/specs/2.0/glTF-2.0.html#asset)
pub const MIN_VERSION: &str = "2.0";

const EXT_MESH_FEATURES: &str = "EXT_mesh_features";
const EXT_STRUCTURAL_METADATA: &str = "EXT_structural_metadata";

#[derive(Debug, thiserror::Error)]
pub enum SerError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Glb(#[from] ::gltf::Error),
    #[error("buffer {0} has no uri and cannot be stored in the GLB binary chunk")]
    UnnamedBuffer(usize),
    #[error("GLB output exceeds 4GiB")]
    TooLarge,
}

/// Write `doc` as a binary glTF asset.
pub fn to_glb(doc: &Document) -> Result<Vec<u8>, SerError> {
    let mut json = serde_json::to_vec(&to_json(doc)?)?;
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let bin = doc.buffers.first().map(|b| {
        let mut data = b.data.clone();
        data.resize(gltf_tuner_common::align_up(data.len(), 4), 0);
        data
    });
    let length = 12 + 8 + json.len() + bin.as_ref().map_or(0, |b| 8 + b.len());
    let glb = ::gltf::Glb {
        header: ::gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: u32::try_from(length).map_err(|_| SerError::TooLarge)?,
        },
        json: Cow::Owned(json),
        bin: bin.map(Cow::Owned),
    };
    Ok(glb.to_vec()?)
}

/// The JSON part of `doc`, assuming its first buffer is stored in a GLB binary chunk.
pub fn to_json(doc: &Document) -> Result<Value, SerError> {
    let mut root = Map::new();
    for (key, raw) in &doc.opaque {
        root.insert(key.clone(), serde_json::from_str(raw)?);
    }

    let asset = root
        .entry("asset")
        .or_insert_with(|| json!({ "version": MIN_VERSION }));
    if let Value::Object(asset) = asset {
        asset.insert("generator".to_owned(), Value::from(GENERATOR_ID));
    }

    let mut buffers = Vec::with_capacity(doc.buffers.len());
    for (i, b) in doc.buffers.iter().enumerate() {
        let mut obj = Map::new();
        obj.insert("byteLength".to_owned(), Value::from(b.data.len()));
        if i > 0 {
            let uri = b.uri.as_ref().ok_or(SerError::UnnamedBuffer(i))?;
            obj.insert("uri".to_owned(), Value::from(uri.as_str()));
        }
        buffers.push(Value::Object(obj));
    }
    insert_array(&mut root, "buffers", buffers);
    insert_array(
        &mut root,
        "bufferViews",
        doc.buffer_views.iter().map(buffer_view).collect(),
    );
    insert_array(
        &mut root,
        "accessors",
        doc.accessors.iter().map(accessor).collect(),
    );
    let meshes = doc.meshes.iter().map(mesh).collect::<Result<Vec<_>, _>>()?;
    insert_array(&mut root, "meshes", meshes);
    let mut materials = Vec::with_capacity(doc.materials.len());
    for m in &doc.materials {
        materials.push(match (&m.json, &m.name) {
            (Some(raw), _) => serde_json::from_str(raw)?,
            (None, Some(name)) => json!({ "name": name }),
            (None, None) => json!({}),
        });
    }
    insert_array(&mut root, "materials", materials);
    insert_array(&mut root, "images", doc.images.iter().map(image).collect());

    let mut used = Vec::new();
    if doc.meshes.iter().any(|m| m.primitives.iter().any(|p| !p.feature_ids.is_empty())) {
        used.push(EXT_MESH_FEATURES);
    }
    if let Some(metadata) = &doc.structural_metadata {
        used.push(EXT_STRUCTURAL_METADATA);
        let extensions = root
            .entry("extensions")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(extensions) = extensions {
            extensions.insert(
                EXT_STRUCTURAL_METADATA.to_owned(),
                structural_metadata(metadata)?,
            );
        }
    }
    if !used.is_empty() {
        let list = root
            .entry("extensionsUsed")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = list {
            for ext in used {
                if !list.iter().any(|v| v.as_str() == Some(ext)) {
                    list.push(Value::from(ext));
                }
            }
        }
    }

    Ok(Value::Object(root))
}

fn insert_array(root: &mut Map<String, Value>, key: &str, values: Vec<Value>) {
    if !values.is_empty() {
        root.insert(key.to_owned(), Value::Array(values));
    }
}

fn buffer_view(v: &BufferView) -> Value {
    let mut obj = Map::new();
    obj.insert("buffer".to_owned(), Value::from(v.buffer));
    obj.insert("byteOffset".to_owned(), Value::from(v.byte_offset));
    obj.insert("byteLength".to_owned(), Value::from(v.byte_length));
    if let Some(stride) = v.byte_stride {
        obj.insert("byteStride".to_owned(), Value::from(stride));
    }
    if let Some(target) = v.target {
        obj.insert("target".to_owned(), Value::from(target.to_gltf()));
    }
    Value::Object(obj)
}

fn accessor(a: &Accessor) -> Value {
    let mut obj = Map::new();
    if let Some(view) = a.buffer_view {
        obj.insert("bufferView".to_owned(), Value::from(view));
        obj.insert("byteOffset".to_owned(), Value::from(a.byte_offset));
    }
    obj.insert("count".to_owned(), Value::from(a.count));
    obj.insert(
        "componentType".to_owned(),
        Value::from(a.component_type.to_gltf()),
    );
    obj.insert("type".to_owned(), Value::from(a.attribute_type.to_gltf()));
    if a.normalized {
        obj.insert("normalized".to_owned(), Value::from(true));
    }
    if let Some(min) = &a.min {
        obj.insert("min".to_owned(), json!(min));
    }
    if let Some(max) = &a.max {
        obj.insert("max".to_owned(), json!(max));
    }
    Value::Object(obj)
}

fn attributes(attributes: &BTreeMap<AttributeUsage, usize>) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(usage, acc)| (usage.to_gltf().into_owned(), Value::from(*acc)))
            .collect(),
    )
}

fn feature_id_set(f: &FeatureIdSet) -> Result<Value, SerError> {
    let mut set = Map::new();
    set.insert("featureCount".to_owned(), Value::from(f.feature_count));
    if let Some(attribute) = f.attribute {
        set.insert("attribute".to_owned(), Value::from(attribute));
    }
    if let Some(texture) = &f.texture {
        set.insert("texture".to_owned(), serde_json::from_str(texture)?);
    }
    if let Some(table) = f.property_table {
        set.insert("propertyTable".to_owned(), Value::from(table));
    }
    if let Some(null) = f.null_feature_id {
        set.insert("nullFeatureId".to_owned(), Value::from(null));
    }
    if let Some(label) = &f.label {
        set.insert("label".to_owned(), Value::from(label.as_str()));
    }
    Ok(Value::Object(set))
}

fn primitive(p: &Primitive) -> Result<Value, SerError> {
    let mut obj = Map::new();
    obj.insert("attributes".to_owned(), attributes(&p.attributes));
    if let Some(indices) = p.indices {
        obj.insert("indices".to_owned(), Value::from(indices));
    }
    obj.insert("mode".to_owned(), Value::from(p.mode));
    if let Some(material) = p.material {
        obj.insert("material".to_owned(), Value::from(material));
    }
    if !p.targets.is_empty() {
        obj.insert(
            "targets".to_owned(),
            p.targets.iter().map(attributes).collect(),
        );
    }

    let mut extensions = Map::new();
    for (name, raw) in &p.extensions {
        extensions.insert(name.clone(), serde_json::from_str(raw)?);
    }
    if !p.feature_ids.is_empty() {
        let ids = p
            .feature_ids
            .iter()
            .map(feature_id_set)
            .collect::<Result<Vec<_>, _>>()?;
        extensions.insert(
            EXT_MESH_FEATURES.to_owned(),
            json!({ "featureIds": ids }),
        );
    }
    if !extensions.is_empty() {
        obj.insert("extensions".to_owned(), Value::Object(extensions));
    }
    if let Some(extras) = &p.extras {
        obj.insert("extras".to_owned(), serde_json::from_str(extras)?);
    }
    Ok(Value::Object(obj))
}

fn mesh(m: &Mesh) -> Result<Value, SerError> {
    let primitives = m
        .primitives
        .iter()
        .map(primitive)
        .collect::<Result<Vec<_>, _>>()?;
    let mut obj = Map::new();
    if let Some(name) = &m.name {
        obj.insert("name".to_owned(), Value::from(name.as_str()));
    }
    obj.insert("primitives".to_owned(), Value::Array(primitives));
    if !m.weights.is_empty() {
        obj.insert("weights".to_owned(), json!(m.weights));
    }
    Ok(Value::Object(obj))
}

fn image(i: &Image) -> Value {
    let mut obj = Map::new();
    if let Some(name) = &i.name {
        obj.insert("name".to_owned(), Value::from(name.as_str()));
    }
    if let Some(view) = i.buffer_view {
        obj.insert("bufferView".to_owned(), Value::from(view));
    }
    if let Some(uri) = &i.uri {
        obj.insert("uri".to_owned(), Value::from(uri.as_str()));
    }
    if let Some(mime) = &i.mime_type {
        obj.insert("mimeType".to_owned(), Value::from(mime.as_str()));
    }
    Value::Object(obj)
}

fn structural_metadata(metadata: &StructuralMetadata) -> Result<Value, SerError> {
    let mut obj = Map::new();
    if let Some(schema) = &metadata.schema {
        obj.insert("schema".to_owned(), serde_json::from_str(schema)?);
    }
    if let Some(uri) = &metadata.schema_uri {
        obj.insert("schemaUri".to_owned(), Value::from(uri.as_str()));
    }
    obj.insert(
        "propertyTables".to_owned(),
        metadata.property_tables.iter().map(property_table).collect(),
    );
    Ok(Value::Object(obj))
}

fn property_table(table: &PropertyTable) -> Value {
    let properties: Map<String, Value> = table
        .properties
        .iter()
        .map(|(name, p)| {
            let mut obj = Map::new();
            obj.insert("values".to_owned(), Value::from(p.values));
            if let Some(offsets) = p.array_offsets {
                obj.insert("arrayOffsets".to_owned(), Value::from(offsets));
                obj.insert(
                    "arrayOffsetType".to_owned(),
                    Value::from(p.offset_component.to_gltf()),
                );
            }
            if let Some(offsets) = p.string_offsets {
                obj.insert("stringOffsets".to_owned(), Value::from(offsets));
                obj.insert(
                    "stringOffsetType".to_owned(),
                    Value::from(p.offset_component.to_gltf()),
                );
            }
            (name.clone(), Value::Object(obj))
        })
        .collect();
    let mut obj = Map::new();
    if let Some(name) = &table.name {
        obj.insert("name".to_owned(), Value::from(name.as_str()));
    }
    obj.insert("class".to_owned(), Value::from(table.class.as_str()));
    obj.insert("count".to_owned(), Value::from(table.count));
    obj.insert("properties".to_owned(), Value::Object(properties));
    Value::Object(obj)
}
