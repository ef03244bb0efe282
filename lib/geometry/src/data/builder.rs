use gltf_tuner_common::IndexWidth;

use crate::{
    component_bounds, Accessor, Attribute, AttributeComponentType, AttributeType, BufferBuilder,
    BufferTarget, Document, Material, Mesh, MetadataComponent, Primitive, PropertyTable,
    PropertyTableProperty, StructuralMetadata,
};

/// Assemble a single-buffer [Document] from typed data.
///
/// Mostly useful to construct fixtures; loaders for real formats live in [crate::de].
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    doc: Document,
    buffer: BufferBuilder,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            doc: Document::empty(),
            buffer: BufferBuilder::new(0),
        }
    }

    /// Add a named material, returning its index.
    pub fn material(&mut self, name: impl Into<String>) -> usize {
        self.doc.materials.push(Material {
            name: Some(name.into()),
            json: None,
        });
        self.doc.materials.len() - 1
    }

    /// Add a vertex attribute accessor, returning its index.
    ///
    /// `min` and `max` are always filled in.
    pub fn attribute<A: Attribute>(&mut self, data: &[A]) -> usize {
        let mut bytes = Vec::with_capacity(data.len() * A::TYPE.size_elements() * 4);
        for a in data {
            a.write_le(&mut bytes);
        }
        let component_type = <A::Component as AttributeComponentType>::COMPONENT;
        let (min, max) = component_bounds(&bytes, component_type, A::TYPE).unzip();
        let view = self
            .buffer
            .push_view(&bytes, None, Some(BufferTarget::Array));
        self.push_accessor(Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            count: data.len(),
            component_type,
            attribute_type: A::TYPE,
            normalized: false,
            min,
            max,
        })
    }

    /// Add an index accessor of the given width, returning its index.
    ///
    /// # Panics
    ///
    /// * if an index does not fit in `width`
    pub fn indices(&mut self, indices: &[u32], width: IndexWidth) -> usize {
        let bytes = width
            .encode(indices)
            .expect("index does not fit in requested width");
        let view = self
            .buffer
            .push_view(&bytes, None, Some(BufferTarget::ElementArray));
        self.push_accessor(Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            count: indices.len(),
            component_type: width.into(),
            attribute_type: AttributeType::Scalar,
            normalized: false,
            min: None,
            max: None,
        })
    }

    pub fn push_accessor(&mut self, accessor: Accessor) -> usize {
        self.doc.accessors.push(accessor);
        self.doc.accessors.len() - 1
    }

    /// Add a mesh, returning its index.
    pub fn mesh(&mut self, primitives: Vec<Primitive>) -> usize {
        self.doc.meshes.push(Mesh {
            name: None,
            primitives,
            weights: Vec::new(),
        });
        self.doc.meshes.len() - 1
    }

    /// Add a property table of class `class` whose columns are all `UINT64`, returning its index.
    ///
    /// # Panics
    ///
    /// * if the columns don't all have the same length
    pub fn property_table(&mut self, class: impl Into<String>, columns: &[(&str, &[u64])]) -> usize {
        let count = columns.first().map_or(0, |(_, c)| c.len());
        let mut properties = std::collections::BTreeMap::new();
        for (name, values) in columns {
            assert_eq!(values.len(), count, "property table columns differ in length");
            let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            let view = self.buffer.push_view(&bytes, None, None);
            properties.insert(
                (*name).to_owned(),
                PropertyTableProperty::scalar(view, MetadataComponent::U64),
            );
        }
        let metadata = self
            .doc
            .structural_metadata
            .get_or_insert_with(StructuralMetadata::default);
        metadata.property_tables.push(PropertyTable {
            name: None,
            class: class.into(),
            count,
            properties,
        });
        metadata.property_tables.len() - 1
    }

    /// Add raw bytes as a buffer view, returning its index.
    pub fn view(&mut self, bytes: &[u8]) -> usize {
        self.buffer.push_view(bytes, None, None)
    }

    pub fn build(mut self) -> Document {
        let (buffer, views) = self.buffer.finish();
        self.doc.buffers = vec![buffer];
        self.doc.buffer_views = views;
        self.doc
    }
}
