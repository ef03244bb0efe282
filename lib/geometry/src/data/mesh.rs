pub mod primitive;

pub use primitive::*;

/// A set of primitives rendered together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
    /// Default morph target weights.
    pub weights: Vec<f32>,
}
