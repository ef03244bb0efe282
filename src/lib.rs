//! Re-partitions the mesh primitives of glTF tiles by material and animation grouping rules,
//! without changing what the tiles look like.
//!
//! Faces are assigned to output primitives by the element they belong to. Elements come from an
//! `EXT_mesh_features` feature ID attribute indexing an `EXT_structural_metadata` property table
//! of class `element`; the rules held by a [GltfTuner] then say which elements may share a
//! primitive ([MaterialRules]), which must always be kept apart ([SplitSet]), and which are
//! animated together ([Anim4DRules]).
//!
//! ```
//! use gltf_tuner::{GltfTuner, MaterialRules, TunerConfig};
//! use tile_geometry::Document;
//!
//! let tuner = GltfTuner::new(TunerConfig::default());
//! let generation = tuner.set_material_rules(MaterialRules::default());
//! let tuned = tuner.tune(&Document::empty()).unwrap();
//! assert_eq!(tuned.generation, generation);
//! assert!(!tuned.is_stale(&tuner));
//! ```
#![cfg_attr(not(debug_assertions), warn(missing_docs))]

pub mod builder;
pub mod cluster;
pub mod error;
pub mod metadata;
mod resolver;
pub mod rules;
pub mod topology;
mod tuner;

pub use cluster::{cluster_mesh, AttributeSignature, ClusterKey, MeshPart, PrimitiveOrigin};
pub use error::*;
pub use resolver::*;
pub use rules::*;
pub use topology::{expand, normalize, Normalized, Topology};
pub use tuner::*;
