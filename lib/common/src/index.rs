//! Selection and encoding of glTF vertex index widths.
//!
//! glTF reserves the maximum value of an index component type as the primitive restart value,
//! so an index buffer of type `T` may only reference vertices `0..T::MAX`.

use num_traits::{PrimInt, Unsigned};

/// The unsigned integer widths glTF allows for vertex indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexWidth {
    U8,
    U16,
    U32,
}

impl IndexWidth {
    /// Size of one index, in bytes.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    /// The glTF `componentType` code of this width.
    #[inline]
    pub const fn to_gltf(self) -> u32 {
        match self {
            Self::U8 => 5121,
            Self::U16 => 5123,
            Self::U32 => 5125,
        }
    }

    const fn from_size(size: usize) -> Self {
        match size {
            1 => Self::U8,
            2 => Self::U16,
            4 => Self::U32,
            _ => panic!("unsupported index width"),
        }
    }

    /// The smallest width able to address every index in `0..=max_index`.
    pub fn for_max_index(max_index: u32) -> Self {
        if fits::<u8>(max_index) {
            Self::U8
        } else if fits::<u16>(max_index) {
            Self::U16
        } else {
            Self::U32
        }
    }

    /// Encode `indices` as little-endian values of this width.
    ///
    /// Returns `None` if any index does not fit.
    pub fn encode(self, indices: &[u32]) -> Option<Vec<u8>> {
        match self {
            Self::U8 => encode_indices::<u8>(indices),
            Self::U16 => encode_indices::<u16>(indices),
            Self::U32 => encode_indices::<u32>(indices),
        }
    }
}

/// Unsigned integer types usable as glTF vertex indices.
pub trait IndexComponent: PrimInt + Unsigned + 'static {
    const WIDTH: IndexWidth;
    fn from_index(index: u32) -> Option<Self>;
    fn write_le(self, out: &mut Vec<u8>);
}

crate::item_with! { Idx: u8, u16, u32 =>
    impl IndexComponent for Idx {
        const WIDTH: IndexWidth = IndexWidth::from_size(std::mem::size_of::<Idx>());

        #[inline]
        fn from_index(index: u32) -> Option<Self> {
            Self::try_from(index).ok()
        }

        #[inline]
        fn write_le(self, out: &mut Vec<u8>) {
            out.extend_from_slice(&self.to_le_bytes());
        }
    }
}

/// Whether `max_index` can be stored as an `I` without colliding with the restart value.
#[inline]
pub fn fits<I: IndexComponent>(max_index: u32) -> bool {
    match I::from_index(max_index) {
        Some(v) => v != I::max_value(),
        None => false,
    }
}

/// Encode `indices` as little-endian `I`s, or `None` if one of them does not fit.
pub fn encode_indices<I: IndexComponent>(indices: &[u32]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(indices.len() * I::WIDTH.bytes());
    for &i in indices {
        if !fits::<I>(i) {
            return None;
        }
        I::from_index(i)?.write_le(&mut out);
    }
    Some(out)
}

/// The smallest index width for a list of indices; an empty list gets [IndexWidth::U8].
pub fn smallest_index_width(indices: &[u32]) -> IndexWidth {
    IndexWidth::for_max_index(indices.iter().copied().max().unwrap_or(0))
}

/// Encode `indices` with the smallest width able to hold all of them.
///
/// Returns `None` only if an index equals `u32::MAX`, which no width can store.
pub fn encode_smallest(indices: &[u32]) -> Option<(IndexWidth, Vec<u8>)> {
    let width = smallest_index_width(indices);
    width.encode(indices).map(|bytes| (width, bytes))
}
