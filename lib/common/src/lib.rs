//! Numeric helpers shared by the tuner crates.

pub mod index;
pub mod macros;

pub use index::*;

/// Round `offset` up to the next multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
pub const fn align_up(offset: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (offset + align - 1) & !(align - 1)
}
