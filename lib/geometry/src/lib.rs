//! In-memory model of a glTF tile: buffers, accessors, meshes, and the structural metadata
//! (`EXT_mesh_features` / `EXT_structural_metadata`) attached to them.

#[cfg(feature = "deserialize")]
pub mod de;

#[cfg(feature = "serialize")]
pub mod ser;

mod data;
pub use data::*;
