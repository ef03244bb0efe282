//! Deserialization of tile documents from storage formats.

#[cfg(feature = "de_gltf")]
pub mod gltf;
