use gltf_tuner_common::IndexWidth;

use crate::{BufferError, Document, ModelError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessorError {
    #[error("missing accessor {0}")]
    Missing(usize),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("accessor {accessor} needs {needed} bytes but its buffer view holds {available}")]
    OutOfBounds {
        accessor: usize,
        needed: usize,
        available: usize,
    },
    #[error("accessor {accessor} has stride {stride}, smaller than its element size {element}")]
    Stride {
        accessor: usize,
        stride: usize,
        element: usize,
    },
    #[error("accessor {accessor} cannot hold indices: {ty:?} {component:?}")]
    NotAnIndex {
        accessor: usize,
        ty: AttributeType,
        component: ComponentType,
    },
}

/// The inner components of an [AttributeType]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub const fn alignment(self) -> usize {
        use std::mem::align_of;
        match self {
            Self::I8 => align_of::<i8>(),
            Self::U8 => align_of::<u8>(),
            Self::I16 => align_of::<i16>(),
            Self::U16 => align_of::<u16>(),
            Self::U32 => align_of::<u32>(),
            Self::F32 => align_of::<f32>(),
        }
    }

    pub const fn size(self) -> usize {
        use std::mem::size_of;
        match self {
            Self::I8 => size_of::<i8>(),
            Self::U8 => size_of::<u8>(),
            Self::I16 => size_of::<i16>(),
            Self::U16 => size_of::<u16>(),
            Self::U32 => size_of::<u32>(),
            Self::F32 => size_of::<f32>(),
        }
    }

    pub const fn to_gltf(self) -> u32 {
        match self {
            Self::I8 => 5120,
            Self::U8 => 5121,
            Self::I16 => 5122,
            Self::U16 => 5123,
            Self::U32 => 5125,
            Self::F32 => 5126,
        }
    }

    pub fn from_gltf(val: u32) -> Result<Self, ModelError> {
        match val {
            5120 => Ok(Self::I8),
            5121 => Ok(Self::U8),
            5122 => Ok(Self::I16),
            5123 => Ok(Self::U16),
            5125 => Ok(Self::U32),
            5126 => Ok(Self::F32),
            _ => Err(ModelError::InvalidComponentType(val)),
        }
    }

    /// Decode one little-endian component from the start of `bytes`.
    ///
    /// # Panics
    ///
    /// * `bytes.len() < self.size()`
    pub fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            Self::I8 => bytes[0] as i8 as f64,
            Self::U8 => bytes[0] as f64,
            Self::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Self::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Self::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Self::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        }
    }
}

impl From<IndexWidth> for ComponentType {
    fn from(width: IndexWidth) -> Self {
        match width {
            IndexWidth::U8 => Self::U8,
            IndexWidth::U16 => Self::U16,
            IndexWidth::U32 => Self::U32,
        }
    }
}

/// The shape of an accessor element.
///
/// Values taken from the [glTF specification](https://registry.khronos.org/glTF/specs/2.0/glTF-2.0.html#accessor-data-types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl AttributeType {
    pub const fn size_elements(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 => 4,
            Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }

    pub const fn size_bytes(self, comp: ComponentType) -> usize {
        comp.size() * self.size_elements()
    }

    pub const fn to_gltf(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat2 => "MAT2",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
        }
    }

    pub fn from_gltf(val: &str) -> Result<Self, ModelError> {
        match val {
            "SCALAR" => Ok(Self::Scalar),
            "VEC2" => Ok(Self::Vec2),
            "VEC3" => Ok(Self::Vec3),
            "VEC4" => Ok(Self::Vec4),
            "MAT2" => Ok(Self::Mat2),
            "MAT3" => Ok(Self::Mat3),
            "MAT4" => Ok(Self::Mat4),
            _ => Err(ModelError::InvalidAttributeType(val.to_owned())),
        }
    }
}

/// A typed view into a [BufferView](crate::BufferView).
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    /// If `None`, every element is zero.
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub count: usize,
    pub component_type: ComponentType,
    pub attribute_type: AttributeType,
    pub normalized: bool,
    pub min: Option<Vec<f64>>,
    pub max: Option<Vec<f64>>,
}

impl Accessor {
    /// Size of one element, in bytes.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.attribute_type.size_bytes(self.component_type)
    }
}

const ZEROES: [u8; 64] = [0; 64];

/// A validated, read-only window onto the elements of an [Accessor].
#[derive(Debug, Clone, Copy)]
pub struct AccessorView<'doc> {
    index: usize,
    data: Option<&'doc [u8]>,
    stride: usize,
    element_size: usize,
    count: usize,
    component_type: ComponentType,
    attribute_type: AttributeType,
    normalized: bool,
}

impl<'doc> AccessorView<'doc> {
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    #[inline]
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    #[inline]
    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    #[inline]
    pub fn normalized(&self) -> bool {
        self.normalized
    }

    /// The raw bytes of element `i`.
    ///
    /// # Panics
    ///
    /// * `i >= self.len()`
    #[inline]
    pub fn element(&self, i: usize) -> &'doc [u8] {
        assert!(i < self.count, "accessor element {i} out of range");
        match self.data {
            Some(data) => &data[i * self.stride..i * self.stride + self.element_size],
            None => &ZEROES[..self.element_size],
        }
    }

    /// The first component of element `i`, as a float.
    #[inline]
    pub fn scalar(&self, i: usize) -> f64 {
        self.component_type.decode(self.element(i))
    }

    /// Every component of element `i`, as floats.
    pub fn components(&self, i: usize) -> impl Iterator<Item = f64> + 'doc {
        let comp = self.component_type;
        self.element(i)
            .chunks_exact(comp.size())
            .map(move |c| comp.decode(c))
    }

    /// Read the whole accessor as vertex indices.
    pub fn read_indices(&self) -> Result<Vec<u32>, AccessorError> {
        match (self.attribute_type, self.component_type) {
            (AttributeType::Scalar, ComponentType::U8 | ComponentType::U16 | ComponentType::U32) => {
                Ok((0..self.count).map(|i| self.scalar(i) as u32).collect())
            }
            (ty, component) => Err(AccessorError::NotAnIndex {
                accessor: self.index,
                ty,
                component,
            }),
        }
    }

    /// Copy the elements at `order` into one tightly packed byte vector.
    pub fn gather(&self, order: impl IntoIterator<Item = usize>) -> Vec<u8> {
        let order = order.into_iter();
        let mut out = Vec::with_capacity(order.size_hint().0 * self.element_size);
        for i in order {
            out.extend_from_slice(self.element(i));
        }
        out
    }
}

impl Document {
    /// Get a validated view of accessor `index`.
    pub fn accessor_view(&self, index: usize) -> Result<AccessorView<'_>, AccessorError> {
        let acc = self
            .accessors
            .get(index)
            .ok_or(AccessorError::Missing(index))?;
        let element_size = acc.element_size();
        let Some(view_index) = acc.buffer_view else {
            return Ok(AccessorView {
                index,
                data: None,
                stride: element_size,
                element_size,
                count: acc.count,
                component_type: acc.component_type,
                attribute_type: acc.attribute_type,
                normalized: acc.normalized,
            });
        };
        let bytes = self.view_bytes(view_index)?;
        let stride = self.buffer_views[view_index]
            .byte_stride
            .unwrap_or(element_size);
        if stride < element_size {
            return Err(AccessorError::Stride {
                accessor: index,
                stride,
                element: element_size,
            });
        }
        // overflow means out of bounds
        let needed = match acc.count.checked_sub(1) {
            None => Some(acc.byte_offset),
            Some(last) => last
                .checked_mul(stride)
                .and_then(|n| n.checked_add(element_size))
                .and_then(|n| n.checked_add(acc.byte_offset)),
        }
        .unwrap_or(usize::MAX);
        if needed > bytes.len() {
            return Err(AccessorError::OutOfBounds {
                accessor: index,
                needed,
                available: bytes.len(),
            });
        }
        Ok(AccessorView {
            index,
            data: Some(&bytes[acc.byte_offset..]),
            stride,
            element_size,
            count: acc.count,
            component_type: acc.component_type,
            attribute_type: acc.attribute_type,
            normalized: acc.normalized,
        })
    }
}

/// Per-component minimum and maximum of tightly packed elements.
///
/// Returns `None` for empty data.
pub fn component_bounds(
    bytes: &[u8],
    component_type: ComponentType,
    attribute_type: AttributeType,
) -> Option<(Vec<f64>, Vec<f64>)> {
    let width = attribute_type.size_elements();
    let mut elements = bytes.chunks_exact(attribute_type.size_bytes(component_type));
    let first = elements.next()?;
    let mut min: Vec<f64> = first
        .chunks_exact(component_type.size())
        .map(|c| component_type.decode(c))
        .collect();
    let mut max = min.clone();
    for element in elements {
        for (i, c) in element.chunks_exact(component_type.size()).enumerate() {
            let v = component_type.decode(c);
            min[i] = min[i].min(v);
            max[i] = max[i].max(v);
        }
    }
    debug_assert_eq!(min.len(), width);
    Some((min, max))
}
