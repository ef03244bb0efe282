use std::ops::Range;

use gltf_tuner_common::align_up;

use crate::ModelError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("missing buffer view {0}")]
    MissingView(usize),
    #[error("buffer view {view} refers to missing buffer {buffer}")]
    MissingBuffer { view: usize, buffer: usize },
    #[error("buffer view {view} range {range:?} out of bounds of buffer {buffer} (length {len})")]
    RangeOverflow {
        view: usize,
        buffer: usize,
        range: Range<usize>,
        len: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

impl BufferTarget {
    pub fn to_gltf(self) -> u32 {
        match self {
            Self::Array => 34962,
            Self::ElementArray => 34963,
        }
    }

    pub fn from_gltf(val: u32) -> Result<Self, ModelError> {
        match val {
            34962 => Ok(Self::Array),
            34963 => Ok(Self::ElementArray),
            _ => Err(ModelError::InvalidTarget(val)),
        }
    }
}

/// A data blob which can be sent to the GPU or accessed through [BufferViews](BufferView)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buffer {
    pub data: Vec<u8>,
    /// Where the data was loaded from; `None` for the GLB binary chunk.
    pub uri: Option<String>,
}

impl Buffer {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, uri: None }
    }
}

/// A byte range of a [Buffer]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    /// Distance between the starts of consecutive vertex elements; only meaningful for vertex data.
    pub byte_stride: Option<usize>,
    pub target: Option<BufferTarget>,
}

impl BufferView {
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.byte_offset..self.byte_offset + self.byte_length
    }
}

impl crate::Document {
    /// The bytes covered by buffer view `index`.
    pub fn view_bytes(&self, index: usize) -> Result<&[u8], BufferError> {
        let view = self
            .buffer_views
            .get(index)
            .ok_or(BufferError::MissingView(index))?;
        let buffer = self
            .buffers
            .get(view.buffer)
            .ok_or(BufferError::MissingBuffer {
                view: index,
                buffer: view.buffer,
            })?;
        buffer
            .data
            .get(view.range())
            .ok_or_else(|| BufferError::RangeOverflow {
                view: index,
                buffer: view.buffer,
                range: view.range(),
                len: buffer.len(),
            })
    }
}

/// Packs byte blobs into a single [Buffer], recording one [BufferView] per blob.
///
/// Every view starts on a multiple of [BufferBuilder::ALIGNMENT], which satisfies the alignment
/// requirement of every glTF component type and of metadata offsets.
#[derive(Debug, Default)]
pub struct BufferBuilder {
    buffer: usize,
    data: Vec<u8>,
    views: Vec<BufferView>,
}

impl BufferBuilder {
    pub const ALIGNMENT: usize = 8;

    /// Construct a builder whose views will all refer to buffer `buffer`.
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer,
            data: Vec::new(),
            views: Vec::new(),
        }
    }

    /// Append `bytes` as a new view, returning its index.
    pub fn push_view(
        &mut self,
        bytes: &[u8],
        byte_stride: Option<usize>,
        target: Option<BufferTarget>,
    ) -> usize {
        let byte_offset = align_up(self.data.len(), Self::ALIGNMENT);
        self.data.resize(byte_offset, 0);
        self.data.extend_from_slice(bytes);
        self.views.push(BufferView {
            buffer: self.buffer,
            byte_offset,
            byte_length: bytes.len(),
            byte_stride,
            target,
        });
        self.views.len() - 1
    }

    /// Number of views pushed so far.
    #[inline]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn views(&self) -> &[BufferView] {
        &self.views
    }

    /// Consume the builder, yielding the packed buffer and its views.
    pub fn finish(mut self) -> (Buffer, Vec<BufferView>) {
        let len = align_up(self.data.len(), Self::ALIGNMENT);
        self.data.resize(len, 0);
        (Buffer::from(self.data), self.views)
    }
}
