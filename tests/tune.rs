//! Ensure tuning partitions faces as the rules say, and keeps what the document looks like.

mod common;

use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use common::*;
use gltf_tuner::{
    Anim4DGroup, Anim4DId, Anim4DRules, GltfTuner, MaterialGroup, MaterialGroupId, MaterialRules,
    PrimitiveOrigin, PrimitiveRef, SplitSet, TimelineIndices, TuneError, TunerConfig, TunerState,
};
use nalgebra::Point3;
use parking_lot::Mutex;
use quickcheck_macros::quickcheck;
use serde_json::Value;
use tile_geometry::{
    AccessorError, AttributeUsage, ComponentType, Document, DocumentBuilder, FeatureIdSet, Mode,
    Position, Primitive,
};

fn eager() -> GltfTuner {
    GltfTuner::new(TunerConfig {
        tune_without_rules: true,
    })
}

fn group(elements: &[u64], material: usize, itwin: Option<u64>) -> MaterialGroup {
    MaterialGroup {
        elements: elements.iter().copied().collect(),
        material,
        itwin_material_id: itwin,
    }
}

fn as_f64(points: &[Position]) -> Vec<[f64; 3]> {
    points
        .iter()
        .map(|p| [p.x as f64, p.y as f64, p.z as f64])
        .collect()
}

#[quickcheck]
fn untouched_without_feature_ids(coords: Vec<(u16, u16, u16)>, mode: u8) -> bool {
    let mode = Mode::from_gltf(u32::from(mode % 7)).unwrap();
    let positions: Vec<Position> = coords
        .iter()
        .map(|&(x, y, z)| Point3::new(x as f32, y as f32, z as f32))
        .collect();
    let elements: &[u64] = &[1, 2, 3];
    let mut b = DocumentBuilder::new();
    b.property_table("element", &[("element", elements)]);
    let position = b.attribute(&positions);
    b.mesh(vec![
        Primitive::new(mode).with_attr(AttributeUsage::Position, position)
    ]);
    let doc = b.build();
    matches!(eager().tune(&doc), Ok(tuned) if tuned.document == doc)
}

#[test]
fn unconfigured_tuner_copies() {
    let mut tile = Tile::new(&[10, 20]);
    let m = tile.material("stone");
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, Some(m));
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[1.0; 3], None, Some(m));
    let doc = tile.build();

    let tuner = GltfTuner::default();
    assert_eq!(tuner.state(), TunerState::Uninitialized);
    let tuned = tuner.tune(&doc).unwrap();
    assert_eq!(tuned.document, doc);
    assert_eq!(tuned.generation, 0);
    assert_eq!(
        tuned.parts[0],
        vec![PrimitiveOrigin::pass_through(0), PrimitiveOrigin::pass_through(1)]
    );

    tuner.set_material_rules(MaterialRules::default());
    assert_eq!(tuner.state(), TunerState::Configured);
    assert_eq!(primitives(&tuner.tune(&doc).unwrap().document).len(), 1);
}

#[test]
fn same_material_merges_in_source_order() {
    let mut tile = Tile::new(&[10, 20]);
    let m = tile.material("stone");
    tile.primitive(Mode::Triangles, &points(6, 0.0), &[0.0; 6], None, Some(m));
    tile.primitive(Mode::Triangles, &points(6, 100.0), &[1.0; 6], None, Some(m));
    let doc = tile.build();

    let tuned = eager().tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].material, Some(m));
    assert_eq!(out[0].mode, Mode::Triangles.to_gltf());
    assert_eq!(indices(&tuned.document, &out[0]), (0..12).collect::<Vec<u32>>());
    let mut expected = as_f64(&points(6, 0.0));
    expected.extend(as_f64(&points(6, 100.0)));
    assert_eq!(positions(&tuned.document, &out[0]), expected);
    assert_eq!(elements(&tuned.document, &out[0]), vec![10, 20]);
    assert_eq!(out[0].feature_ids[0].feature_count, 2);
    assert_eq!(tuned.parts[0][0].sources, vec![0, 1]);
    assert_eq!(
        tuned.document.accessors[out[0].indices.unwrap()].component_type,
        ComponentType::U8
    );
}

#[test]
fn materials_merge_only_within_a_group() {
    let mut tile = Tile::new(&[10, 20]);
    let a = tile.material("a");
    let b = tile.material("b");
    let c = tile.material("c");
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, Some(a));
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[1.0; 3], None, Some(b));
    let doc = tile.build();

    let tuner = eager();
    let tuned = tuner.tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 2);
    assert_eq!((out[0].material, out[1].material), (Some(a), Some(b)));

    tuner.set_material_rules(MaterialRules {
        groups: vec![group(&[10, 20], c, None)],
        split: SplitSet::new(),
    });
    let tuned = tuner.tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].material, Some(c));
    assert_eq!(elements(&tuned.document, &out[0]), vec![10, 20]);
    assert_eq!(tuned.parts[0][0].material_group, Some(MaterialGroupId(0)));
}

#[test]
fn equal_groups_stay_apart() {
    let mut tile = Tile::new(&[10, 20]);
    let m = tile.material("m");
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, Some(m));
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[1.0; 3], None, Some(m));
    let doc = tile.build();

    let tuner = eager();
    tuner.set_material_rules(MaterialRules {
        groups: vec![group(&[10], m, Some(5)), group(&[20], m, Some(5))],
        split: SplitSet::new(),
    });
    let tuned = tuner.tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 2);
    assert_eq!(elements(&tuned.document, &out[0]), vec![10]);
    assert_eq!(elements(&tuned.document, &out[1]), vec![20]);
}

#[test]
fn split_elements_are_isolated() {
    let mut tile = Tile::new(&[10, 20, 30, 40]);
    let m = tile.material("m");
    let ids: Vec<f32> = (0..12).map(|v| (v / 3) as f32).collect();
    tile.primitive(Mode::Triangles, &points(12, 0.0), &ids, None, Some(m));
    let doc = tile.build();

    let tuner = eager();
    let merged = MaterialRules {
        groups: vec![group(&[10, 20, 30], m, Some(7))],
        split: SplitSet::new(),
    };
    tuner.set_material_rules(merged.clone());
    assert_eq!(primitives(&tuner.tune(&doc).unwrap().document).len(), 2);

    tuner.set_material_rules(MaterialRules {
        split: HashSet::from([7]),
        ..merged
    });
    let tuned = tuner.tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 4);
    for (primitive, element) in out.iter().zip([10, 20, 30, 40]) {
        assert_eq!(elements(&tuned.document, primitive), vec![element]);
    }
    let split: Vec<_> = tuned.parts[0].iter().map(|o| o.split_element).collect();
    assert_eq!(split, vec![Some(10), Some(20), Some(30), None]);
}

#[test]
fn animation_groups_stay_apart() {
    let mut tile = Tile::new(&[10, 20]);
    let m = tile.material("m");
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, Some(m));
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[1.0; 3], None, Some(m));
    let doc = tile.build();

    let timelines = Anim4DId::Timelines(TimelineIndices::new(&[1, 2]).unwrap());
    let tuner = eager();
    tuner.set_anim4d_rules(Anim4DRules {
        groups: vec![
            Anim4DGroup {
                elements: HashSet::from([10]),
                id: Anim4DId::Element(10),
            },
            Anim4DGroup {
                elements: HashSet::from([20]),
                id: timelines,
            },
        ],
    });
    let tuned = tuner.tune(&doc).unwrap();
    assert_eq!(primitives(&tuned.document).len(), 2);
    let ids: Vec<_> = tuned.parts[0].iter().map(|o| o.anim4d_id).collect();
    assert_eq!(ids, vec![Some(Anim4DId::Element(10)), Some(timelines)]);
}

#[test]
fn line_loop_becomes_segments() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(Mode::LineLoop, &points(5, 0.0), &[0.0; 5], None, None);
    let doc = tile.build();

    let tuned = eager().tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].mode, Mode::Lines.to_gltf());
    assert_eq!(
        indices(&tuned.document, &out[0]),
        vec![0, 1, 1, 2, 2, 3, 3, 4, 4, 0]
    );
}

#[test]
fn fan_shares_its_anchor() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(
        Mode::TriangleFan,
        &points(6, 0.0),
        &[0.0; 6],
        Some(&[5, 4, 3, 2, 1, 0][..]),
        None,
    );
    let doc = tile.build();

    let tuned = eager().tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out[0].mode, Mode::Triangles.to_gltf());
    let list = indices(&tuned.document, &out[0]);
    assert_eq!(list.len(), 4 * 3);
    assert!(list.chunks(3).all(|t| t[0] == list[0]));
    // output vertex 0 is the fan's anchor, source vertex 5
    assert_eq!(
        positions(&tuned.document, &out[0])[0],
        as_f64(&points(6, 0.0))[5]
    );
}

#[test]
fn topologies_never_mix() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(Mode::Points, &points(3, 0.0), &[0.0; 3], None, None);
    tile.primitive(Mode::LineStrip, &points(3, 9.0), &[0.0; 3], None, None);
    tile.primitive(Mode::Lines, &points(2, 20.0), &[0.0; 2], None, None);
    let doc = tile.build();

    let tuned = eager().tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    let modes: Vec<u32> = out.iter().map(|p| p.mode).collect();
    assert_eq!(modes, vec![0, 1]);
    assert_eq!(indices(&tuned.document, &out[1]), vec![0, 1, 1, 2, 3, 4]);
}

#[test]
fn primitives_without_elements_pass_through() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, None);
    tile.plain(Mode::TriangleStrip, &points(4, 50.0), None);
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[0.0; 3], None, None);
    let doc = tile.build();

    let tuned = eager().tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].mode, Mode::TriangleStrip.to_gltf());
    assert_eq!(
        positions(&tuned.document, &out[1]),
        as_f64(&points(4, 50.0))
    );
    assert_eq!(tuned.parts[0][1], PrimitiveOrigin::pass_through(1));
    assert_eq!(tuned.parts[0][0].sources, vec![0, 2]);
}

#[test]
fn null_feature_ids_are_ungrouped() {
    let mut tile = Tile::new(&[10, 20]);
    let m = tile.material("m");
    tile.primitive(
        Mode::Triangles,
        &points(6, 0.0),
        &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        None,
        Some(m),
    )
    .feature_ids[0]
        .null_feature_id = Some(1);
    let doc = tile.build();

    let tuner = eager();
    tuner.set_material_rules(MaterialRules {
        groups: vec![group(&[10, 20], m, None)],
        split: SplitSet::new(),
    });
    let tuned = tuner.tune(&doc).unwrap();
    let groups: Vec<_> = tuned.parts[0].iter().map(|o| o.material_group).collect();
    assert_eq!(groups, vec![Some(MaterialGroupId(0)), None]);
}

#[test]
fn metadata_values_survive() {
    let mut tile = Tile::with_materials(&[10, 20, 30], &[7, 8, 7]);
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[2.0; 3], None, None);
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[0.0; 3], None, None);
    let doc = tile.build();

    let tuned = eager().tune(&doc).unwrap();
    let out = &tuned.document;
    assert_eq!(out.read_integer_column(0, "element").unwrap(), vec![10, 20, 30]);
    assert_eq!(out.read_integer_column(0, "material").unwrap(), vec![7, 8, 7]);
    // property tables come before any primitive data
    let table = &out.structural_metadata.as_ref().unwrap().property_tables[0];
    let views: Vec<usize> = table.properties.values().map(|p| p.values).collect();
    assert_eq!(views, vec![0, 1]);
    assert!(out.accessors.iter().all(|a| a.buffer_view > Some(1)));
    assert_eq!(elements(out, &primitives(out)[0]), vec![10, 30]);
}

#[test]
fn observer_sees_materials() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut tile = Tile::with_materials(&[10, 20, 30], &[7, 8, 7]);
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, None);
    let doc = tile.build();

    let sink = seen.clone();
    let tuner = GltfTuner::default()
        .with_material_info_observer(move |materials| sink.lock().push(materials.to_vec()));
    tuner.tune(&doc).unwrap();
    tuner.set_material_rules(MaterialRules::default());
    tuner.tune(&doc).unwrap();
    assert_eq!(*seen.lock(), vec![vec![7, 8], vec![7, 8]]);
}

#[test]
fn wide_clusters_get_wide_indices() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(Mode::Points, &points(300, 0.0), &[0.0; 300], None, None);
    let doc = tile.build();

    let tuned = eager().tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    let accessor = &tuned.document.accessors[out[0].indices.unwrap()];
    assert_eq!(accessor.component_type, ComponentType::U16);
    assert_eq!(accessor.count, 300);
}

#[test]
fn unsupported_mode() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, None)
        .mode = 9;
    let doc = tile.build();
    assert!(matches!(
        eager().tune(&doc),
        Err(TuneError::UnsupportedMode {
            at: PrimitiveRef { mesh: 0, primitive: 0 },
            mode: 9
        })
    ));
}

#[test]
fn attribute_count_mismatch() {
    let mut tile = Tile::new(&[10]);
    let normals = tile.builder.attribute(&[[0f32, 0.0, 1.0]; 2]);
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, None)
        .attributes
        .insert(AttributeUsage::Normal, normals);
    let doc = tile.build();
    assert!(matches!(
        eager().tune(&doc),
        Err(TuneError::AttributeCountMismatch {
            attribute: AttributeUsage::Normal,
            expected: 3,
            actual: 2,
            ..
        })
    ));
}

#[test]
fn index_out_of_range() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(
        Mode::Triangles,
        &points(3, 0.0),
        &[0.0; 3],
        Some(&[0, 1, 5][..]),
        None,
    );
    let doc = tile.build();
    assert!(matches!(
        eager().tune(&doc),
        Err(TuneError::IndexOutOfRange {
            index: 5,
            vertices: 3,
            ..
        })
    ));
}

#[test]
fn ragged_triangle_list() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(
        Mode::Triangles,
        &points(3, 0.0),
        &[0.0; 3],
        Some(&[0, 1, 2, 0][..]),
        None,
    );
    let doc = tile.build();
    assert!(matches!(
        eager().tune(&doc),
        Err(TuneError::MalformedFaceList { .. })
    ));
}

#[test]
fn group_material_out_of_range() {
    let mut tile = Tile::new(&[10, 20]);
    let m = tile.material("m");
    let n = tile.material("n");
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, Some(m));
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[1.0; 3], None, Some(n));
    let doc = tile.build();

    let tuner = eager();
    tuner.set_material_rules(MaterialRules {
        groups: vec![group(&[99], 5, None)],
        split: SplitSet::new(),
    });
    // unused groups don't matter
    assert!(tuner.tune(&doc).is_ok());
    // nor does a group whose faces all keep one material
    tuner.set_material_rules(MaterialRules {
        groups: vec![group(&[10], 5, None)],
        split: SplitSet::new(),
    });
    assert!(tuner.tune(&doc).is_ok());
    tuner.set_material_rules(MaterialRules {
        groups: vec![group(&[10, 20], 5, None)],
        split: SplitSet::new(),
    });
    assert!(matches!(
        tuner.tune(&doc),
        Err(TuneError::MaterialOutOfRange {
            group: 0,
            material: 5,
            available: 2
        })
    ));
}

#[test]
fn grouped_faces_keep_a_shared_material() {
    let mut tile = Tile::new(&[10, 20]);
    let a = tile.material("a");
    let b = tile.material("b");
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, Some(a));
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[1.0; 3], None, Some(a));
    let doc = tile.build();

    let tuner = eager();
    tuner.set_material_rules(MaterialRules {
        groups: vec![group(&[10, 20], b, None)],
        split: SplitSet::new(),
    });
    let tuned = tuner.tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].material, Some(a));
    assert_eq!(tuned.parts[0][0].material_group, Some(MaterialGroupId(0)));

    // one grouped primitive on its own keeps its material too
    tuner.set_material_rules(MaterialRules {
        groups: vec![group(&[10], b, None)],
        split: SplitSet::new(),
    });
    let tuned = tuner.tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 2);
    assert_eq!((out[0].material, out[1].material), (Some(a), Some(a)));
    assert_eq!(tuned.parts[0][0].material_group, Some(MaterialGroupId(0)));
    assert_eq!(tuned.parts[0][1].material_group, None);
}

/// Every component of every element of the accessor at `reference`.
fn floats(doc: &Document, reference: &Value) -> Vec<f64> {
    let view = doc
        .accessor_view(reference.as_u64().unwrap() as usize)
        .unwrap();
    (0..view.len()).flat_map(|i| view.components(i)).collect()
}

#[test]
fn animation_and_instancing_accessors_follow() {
    let mut tile = Tile::new(&[10]);
    let times = tile.builder.attribute(&[0.0f32, 1.0]);
    let offsets = tile.builder.attribute(&[[1f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, None);
    let mut doc = tile.build();
    doc.opaque.insert(
        "nodes".to_owned(),
        format!(
            r#"[{{"mesh":0,"extensions":{{"EXT_mesh_gpu_instancing":{{"attributes":{{"TRANSLATION":{offsets}}}}}}}}}]"#
        ),
    );
    doc.opaque.insert(
        "animations".to_owned(),
        format!(r#"[{{"channels":[],"samplers":[{{"input":{times},"output":{offsets}}}]}}]"#),
    );
    doc.opaque.insert(
        "skins".to_owned(),
        format!(r#"[{{"joints":[0],"inverseBindMatrices":{offsets}}}]"#),
    );

    let tuned = eager().tune(&doc).unwrap();
    let out = &tuned.document;
    let json = |property: &str| -> Value { serde_json::from_str(&out.opaque[property]).unwrap() };
    let translations = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

    let nodes = json("nodes");
    let instanced = &nodes[0]["extensions"]["EXT_mesh_gpu_instancing"]["attributes"]["TRANSLATION"];
    assert_eq!(floats(out, instanced), translations);
    assert_eq!(nodes[0]["mesh"], 0);

    let animations = json("animations");
    let sampler = &animations[0]["samplers"][0];
    assert_eq!(floats(out, &sampler["input"]), [0.0, 1.0]);
    assert_eq!(floats(out, &sampler["output"]), translations);
    // shared accessors stay shared
    assert_eq!(sampler["output"], *instanced);

    let skins = json("skins");
    assert_eq!(floats(out, &skins[0]["inverseBindMatrices"]), translations);
}

#[test]
fn broken_accessor_references() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, None);
    let mut doc = tile.build();
    doc.opaque.insert(
        "skins".to_owned(),
        r#"[{"joints":[0],"inverseBindMatrices":99}]"#.to_owned(),
    );
    assert!(matches!(
        eager().tune(&doc),
        Err(TuneError::OpaqueAccessor {
            property: "skins",
            source: AccessorError::Missing(99)
        })
    ));

    doc.opaque.insert(
        "skins".to_owned(),
        r#"[{"joints":[0],"inverseBindMatrices":"first"}]"#.to_owned(),
    );
    assert!(matches!(
        eager().tune(&doc),
        Err(TuneError::InvalidAccessorReference {
            property: "skins",
            ..
        })
    ));
}

#[test]
fn oversized_accessor_count() {
    let mut tile = Tile::new(&[10]);
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, None);
    let mut doc = tile.build();
    let position = doc.meshes[0].primitives[0].position().unwrap();
    doc.accessors[position].count = usize::MAX / 4 + 2;
    assert!(matches!(
        eager().tune(&doc),
        Err(TuneError::Accessor {
            source: AccessorError::OutOfBounds { .. },
            ..
        })
    ));
}

#[test]
fn morph_target_meshes_pass_through() {
    let mut tile = Tile::new(&[10, 20]);
    let m = tile.material("m");
    let displacement = tile.builder.attribute(&[[0f32, 0.0, 1.0]; 3]);
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, Some(m))
        .targets
        .push(BTreeMap::from([(AttributeUsage::Position, displacement)]));
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[1.0; 3], None, Some(m))
        .targets
        .push(BTreeMap::from([(AttributeUsage::Position, displacement)]));
    let mut doc = tile.build();
    doc.meshes[0].weights = vec![0.5];

    let tuned = eager().tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 2);
    assert_eq!(
        tuned.parts[0],
        vec![PrimitiveOrigin::pass_through(0), PrimitiveOrigin::pass_through(1)]
    );
    assert_eq!(tuned.document.meshes[0].weights, vec![0.5]);
    for primitive in out {
        let target = primitive.targets[0][&AttributeUsage::Position];
        let view = tuned.document.accessor_view(target).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view.components(2).collect::<Vec<_>>(), vec![0.0, 0.0, 1.0]);
    }
}

#[test]
fn primitive_extensions_shape_clusters() {
    let mut tile = Tile::new(&[10, 20]);
    let texture = FeatureIdSet {
        feature_count: 8,
        texture: Some(r#"{"channels":[0],"index":0}"#.to_owned()),
        ..Default::default()
    };
    for base in [0.0, 9.0, 18.0] {
        let primitive = tile.primitive(Mode::Triangles, &points(3, base), &[0.0; 3], None, None);
        primitive.feature_ids.push(texture.clone());
        primitive.extras = Some(r#"{"tag":"roof"}"#.to_owned());
    }
    tile.primitives[2].extras = Some(r#"{"tag":"wall"}"#.to_owned());
    tile.primitives[2]
        .extensions
        .insert("KHR_materials_variants".to_owned(), r#"{"mappings":[]}"#.to_owned());
    let doc = tile.build();

    let tuned = eager().tune(&doc).unwrap();
    let out = primitives(&tuned.document);
    assert_eq!(out.len(), 2);
    assert_eq!(tuned.parts[0][0].sources, vec![0, 1]);
    assert_eq!(out[0].extras.as_deref(), Some(r#"{"tag":"roof"}"#));
    assert!(out[0].extensions.is_empty());
    assert_eq!(out[1].extras.as_deref(), Some(r#"{"tag":"wall"}"#));
    assert!(out[1].extensions.contains_key("KHR_materials_variants"));
    for primitive in out {
        assert_eq!(primitive.feature_ids[1], texture);
    }
}
