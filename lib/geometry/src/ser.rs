//! Serialization of tile documents to storage formats.

#[cfg(feature = "ser_gltf")]
pub mod gltf;
