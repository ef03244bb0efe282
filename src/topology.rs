//! Expansion of every glTF primitive mode into one of three indexed list forms.

use tile_geometry::{Document, Mode, Primitive};

use crate::{PrimitiveRef, TuneError};

/// Canonical topology class of a normalized primitive.
///
/// Faces of different classes never share an output primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topology {
    Points,
    Lines,
    Triangles,
}

impl Topology {
    /// Number of indices per face.
    #[inline]
    pub const fn face_size(self) -> usize {
        match self {
            Self::Points => 1,
            Self::Lines => 2,
            Self::Triangles => 3,
        }
    }

    /// The list mode of this class.
    #[inline]
    pub const fn mode(self) -> Mode {
        match self {
            Self::Points => Mode::Points,
            Self::Lines => Mode::Lines,
            Self::Triangles => Mode::Triangles,
        }
    }
}

impl From<Mode> for Topology {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Points => Self::Points,
            Mode::Lines | Mode::LineLoop | Mode::LineStrip => Self::Lines,
            Mode::Triangles | Mode::TriangleStrip | Mode::TriangleFan => Self::Triangles,
        }
    }
}

/// An index list of list topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub topology: Topology,
    pub indices: Vec<u32>,
}

impl Normalized {
    pub fn faces(&self) -> std::slice::ChunksExact<'_, u32> {
        self.indices.chunks_exact(self.topology.face_size())
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.indices.len() / self.topology.face_size()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{mode:?} index list of length {len} is not a whole number of faces")]
pub struct FaceListError {
    pub mode: Mode,
    pub len: usize,
}

/// Rewrite `indices`, interpreted in `mode`, as a list.
///
/// * strips and loops shorter than one face yield no faces
/// * triangle `i` of a strip is `(v[i], v[i+1+i%2], v[i+2-i%2])`, which keeps every triangle's
///   winding
/// * every triangle of a fan shares `v[0]`
pub fn expand(mode: Mode, indices: &[u32]) -> Result<Normalized, FaceListError> {
    let topology = Topology::from(mode);
    let n = indices.len();
    let indices = match mode {
        Mode::Points => indices.to_vec(),
        Mode::Lines | Mode::Triangles => {
            if n % topology.face_size() != 0 {
                return Err(FaceListError { mode, len: n });
            }
            indices.to_vec()
        }
        Mode::LineStrip => indices.windows(2).flatten().copied().collect(),
        Mode::LineLoop => match n {
            0 | 1 => Vec::new(),
            _ => {
                let mut out = Vec::with_capacity(n * 2);
                for i in 0..n {
                    out.extend([indices[i], indices[(i + 1) % n]]);
                }
                out
            }
        },
        Mode::TriangleStrip => {
            let mut out = Vec::with_capacity(n.saturating_sub(2) * 3);
            for i in 0..n.saturating_sub(2) {
                let odd = i % 2;
                out.extend([indices[i], indices[i + 1 + odd], indices[i + 2 - odd]]);
            }
            out
        }
        Mode::TriangleFan => {
            let mut out = Vec::with_capacity(n.saturating_sub(2) * 3);
            for i in 1..n.saturating_sub(1) {
                out.extend([indices[0], indices[i], indices[i + 1]]);
            }
            out
        }
    };
    Ok(Normalized { topology, indices })
}

/// Read the index list of `primitive` (or the implicit `0..N` list) and expand it.
///
/// Also checks that every index addresses an existing vertex; the vertex count is that of the
/// POSITION accessor.
pub fn normalize(
    doc: &Document,
    primitive: &Primitive,
    at: PrimitiveRef,
) -> Result<Normalized, TuneError> {
    let mode = primitive.mode().map_err(|_| TuneError::UnsupportedMode {
        at,
        mode: primitive.mode,
    })?;
    let position = primitive
        .position()
        .ok_or(TuneError::MissingPosition { at })?;
    let vertices = doc
        .accessor_view(position)
        .map_err(TuneError::accessor(at))?
        .len();
    let indices = match primitive.indices {
        Some(accessor) => {
            let indices = doc
                .accessor_view(accessor)
                .and_then(|view| view.read_indices())
                .map_err(TuneError::accessor(at))?;
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices) {
                return Err(TuneError::IndexOutOfRange {
                    at,
                    index,
                    vertices,
                });
            }
            indices
        }
        None => (0..vertices).map(|i| i as u32).collect(),
    };
    expand(mode, &indices).map_err(|source| TuneError::MalformedFaceList { at, source })
}
