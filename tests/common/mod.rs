//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use gltf_tuner::metadata::{ELEMENT_CLASS, ELEMENT_PROPERTY, MATERIAL_PROPERTY};
use gltf_tuner_common::IndexWidth;
use nalgebra::Point3;
use tile_geometry::{
    AttributeUsage, Document, DocumentBuilder, FeatureIdSet, Mode, Position, Primitive,
};

/// A single-mesh tile whose element table maps feature ID `i` to `elements[i]`.
pub struct Tile {
    pub builder: DocumentBuilder,
    pub primitives: Vec<Primitive>,
}

impl Tile {
    pub fn new(elements: &[u64]) -> Self {
        let mut builder = DocumentBuilder::new();
        builder.property_table(ELEMENT_CLASS, &[(ELEMENT_PROPERTY, elements)]);
        Self {
            builder,
            primitives: Vec::new(),
        }
    }

    /// Like [Tile::new], with an iTwin material column.
    pub fn with_materials(elements: &[u64], materials: &[u64]) -> Self {
        let mut builder = DocumentBuilder::new();
        builder.property_table(
            ELEMENT_CLASS,
            &[(ELEMENT_PROPERTY, elements), (MATERIAL_PROPERTY, materials)],
        );
        Self {
            builder,
            primitives: Vec::new(),
        }
    }

    pub fn material(&mut self, name: &str) -> usize {
        self.builder.material(name)
    }

    /// Add a primitive whose vertex `v` has feature ID `feature_ids[v]`.
    pub fn primitive(
        &mut self,
        mode: Mode,
        positions: &[Position],
        feature_ids: &[f32],
        indices: Option<&[u32]>,
        material: Option<usize>,
    ) -> &mut Primitive {
        assert_eq!(positions.len(), feature_ids.len());
        let position = self.builder.attribute(positions);
        let ids = self.builder.attribute(feature_ids);
        let mut primitive = Primitive::new(mode)
            .with_attr(AttributeUsage::Position, position)
            .with_attr(AttributeUsage::FeatureId(0), ids)
            .with_feature_ids(FeatureIdSet {
                feature_count: 1,
                attribute: Some(0),
                property_table: Some(0),
                ..Default::default()
            });
        if let Some(indices) = indices {
            primitive = primitive.with_indices(self.builder.indices(indices, IndexWidth::U32));
        }
        primitive.material = material;
        self.primitives.push(primitive);
        self.primitives.last_mut().unwrap()
    }

    /// Add a primitive without any feature IDs.
    pub fn plain(&mut self, mode: Mode, positions: &[Position], material: Option<usize>) {
        let position = self.builder.attribute(positions);
        let mut primitive = Primitive::new(mode).with_attr(AttributeUsage::Position, position);
        primitive.material = material;
        self.primitives.push(primitive);
    }

    pub fn build(mut self) -> Document {
        self.builder.mesh(self.primitives);
        self.builder.build()
    }
}

/// `n` distinct points, offset by `base`.
pub fn points(n: usize, base: f32) -> Vec<Position> {
    (0..n)
        .map(|i| Point3::new(base + i as f32, (i % 3) as f32, (i / 3) as f32))
        .collect()
}

/// Every output primitive of mesh 0.
pub fn primitives(doc: &Document) -> &[Primitive] {
    &doc.meshes[0].primitives
}

pub fn indices(doc: &Document, primitive: &Primitive) -> Vec<u32> {
    doc.accessor_view(primitive.indices.unwrap())
        .unwrap()
        .read_indices()
        .unwrap()
}

pub fn positions(doc: &Document, primitive: &Primitive) -> Vec<[f64; 3]> {
    let view = doc.accessor_view(primitive.position().unwrap()).unwrap();
    (0..view.len())
        .map(|i| {
            let mut c = view.components(i);
            [c.next().unwrap(), c.next().unwrap(), c.next().unwrap()]
        })
        .collect()
}

/// Elements referenced by the faces of `primitive`.
pub fn elements(doc: &Document, primitive: &Primitive) -> Vec<u64> {
    let table = doc.read_integer_column(0, ELEMENT_PROPERTY).unwrap();
    let ids = doc
        .accessor_view(primitive.get_attr(&AttributeUsage::FeatureId(0)).unwrap())
        .unwrap();
    let mut out: Vec<u64> = (0..ids.len())
        .map(|v| table[ids.scalar(v) as usize])
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}
