//! Rule replacement while documents are being tuned.

mod common;

use std::{collections::HashSet, thread};

use common::*;
use gltf_tuner::{
    Anim4DGroup, Anim4DGroupId, Anim4DId, Anim4DRules, GltfTuner, GroupResolver, MaterialGroup,
    MaterialGroupId, MaterialRules, RuleSnapshot, RuleStore, TimelineIndices, TunerConfig,
};
use tile_geometry::{Document, Mode};

fn two_materials() -> (Document, usize) {
    let mut tile = Tile::new(&[10, 20]);
    let a = tile.material("a");
    let b = tile.material("b");
    tile.primitive(Mode::Triangles, &points(3, 0.0), &[0.0; 3], None, Some(a));
    tile.primitive(Mode::Triangles, &points(3, 9.0), &[1.0; 3], None, Some(b));
    (tile.build(), a)
}

fn merging(material: usize) -> MaterialRules {
    MaterialRules {
        groups: vec![MaterialGroup {
            elements: HashSet::from([10, 20]),
            material,
            itwin_material_id: None,
        }],
        ..Default::default()
    }
}

#[test]
fn every_write_bumps_the_generation() {
    let store = RuleStore::new();
    assert_eq!(store.generation(), 0);
    assert!(!store.is_configured());
    assert_eq!(store.set_material_rules(MaterialRules::default()), 1);
    assert_eq!(store.set_anim4d_rules(Anim4DRules::default()), 2);
    assert_eq!(store.set_material_rules(MaterialRules::default()), 3);
    assert_eq!(store.generation(), 3);
    assert!(store.is_configured());
}

#[test]
fn snapshots_ignore_later_writes() {
    let store = RuleStore::new();
    store.set_material_rules(merging(0));
    let before = store.snapshot();
    store.set_material_rules(MaterialRules::default());
    assert_eq!(before.generation(), 1);
    assert_eq!(before.material().groups.len(), 1);
    assert!(store.snapshot().material().groups.is_empty());
    // the other table is shared, not copied
    assert_eq!(before.anim4d(), store.snapshot().anim4d());
}

#[test]
fn old_snapshots_tune_with_old_rules() {
    let (doc, a) = two_materials();
    let tuner = GltfTuner::default();
    tuner.set_material_rules(merging(a));
    let old = tuner.snapshot();
    tuner.set_material_rules(MaterialRules::default());

    let tuned = tuner.tune_with(&doc, &old).unwrap();
    assert_eq!(primitives(&tuned.document).len(), 1);
    assert_eq!(tuned.generation, 1);
    assert!(tuned.is_stale(&tuner));

    let tuned = tuner.tune(&doc).unwrap();
    assert_eq!(primitives(&tuned.document).len(), 2);
    assert!(!tuned.is_stale(&tuner));
}

#[test]
fn standalone_snapshots_are_configured() {
    let (doc, a) = two_materials();
    let tuner = GltfTuner::default();
    let rules = RuleSnapshot::new(merging(a), Anim4DRules::default());
    let tuned = tuner.tune_with(&doc, &rules).unwrap();
    assert_eq!(primitives(&tuned.document).len(), 1);
    assert_eq!(tuned.generation, 0);
}

#[test]
fn tunes_see_whole_rule_sets() {
    let (doc, a) = two_materials();
    let tuner = GltfTuner::new(TunerConfig {
        tune_without_rules: true,
    });

    // odd generations merge both elements, even ones keep them apart
    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..100 {
                tuner.set_material_rules(merging(a));
                tuner.set_material_rules(MaterialRules::default());
            }
        });
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..50 {
                    let tuned = tuner.tune(&doc).unwrap();
                    let expected = if tuned.generation % 2 == 1 { 1 } else { 2 };
                    assert_eq!(primitives(&tuned.document).len(), expected);
                }
            });
        }
    });
    assert_eq!(tuner.generation(), 200);
}

#[test]
fn first_group_wins() {
    let group = |elements: &[u64], material| MaterialGroup {
        elements: elements.iter().copied().collect(),
        material,
        itwin_material_id: Some(1),
    };
    let rules = RuleSnapshot::new(
        MaterialRules {
            groups: vec![group(&[1, 2], 0), group(&[2, 3], 1)],
            split: HashSet::from([1]),
        },
        Anim4DRules {
            groups: vec![Anim4DGroup {
                elements: HashSet::from([3]),
                id: Anim4DId::Element(3),
            }],
        },
    );
    let resolver = GroupResolver::new(&rules);
    assert_eq!(resolver.material_group_of(2), Some(MaterialGroupId(0)));
    assert_eq!(resolver.material_group_of(3), Some(MaterialGroupId(1)));
    assert_eq!(resolver.material_group_of(4), None);
    assert_eq!(resolver.anim4d_group_of(3), Some(Anim4DGroupId(0)));
    assert_eq!(resolver.anim4d_group_of(1), None);
    assert!(resolver.should_always_split(3));
    assert!(!resolver.should_always_split(4));
}

#[cfg(feature = "serde")]
#[test]
fn rules_from_json() {
    let material: MaterialRules = serde_json::from_str(
        r#"{
            "groups": [{ "elements": [1, 2], "material": 3, "itwinMaterialID": 9 }],
            "split": [9]
        }"#,
    )
    .unwrap();
    assert_eq!(material.groups[0].material, 3);
    assert_eq!(material.groups[0].itwin_material_id, Some(9));
    assert!(material.split.contains(&9));

    let anim4d: Anim4DRules = serde_json::from_str(
        r#"{ "groups": [
            { "elements": [1], "id": { "element": 1 } },
            { "elements": [2], "id": { "timelines": [4, 5] } }
        ] }"#,
    )
    .unwrap();
    assert_eq!(anim4d.groups[0].id, Anim4DId::Element(1));
    assert_eq!(
        anim4d.groups[1].id,
        Anim4DId::Timelines(TimelineIndices::new(&[4, 5]).unwrap())
    );

    let bad = serde_json::from_str::<Anim4DRules>(
        r#"{ "groups": [{ "elements": [2], "id": { "timelines": [1, 2, 3] } }] }"#,
    );
    assert!(bad.is_err());
}
