use std::collections::HashMap;

use gltf_tuner_common::{align_up, encode_smallest};
use tile_geometry::{
    component_bounds, Accessor, AccessorError, AttributeType, Buffer, BufferBuilder, BufferError,
    BufferTarget, BufferView, ComponentType, Document,
};

/// Vertex elements must start on 4-byte boundaries within their view.
const VERTEX_ALIGNMENT: usize = 4;

/// Packs everything a tuned document references into one fresh buffer.
///
/// Data is written in call order. Views copied verbatim from the source document are
/// deduplicated, as are whole-accessor copies.
#[derive(Debug)]
pub struct OutputBuilder<'src> {
    source: &'src Document,
    buffer: BufferBuilder,
    accessors: Vec<Accessor>,
    carried_views: HashMap<usize, usize>,
    carried_accessors: HashMap<usize, usize>,
}

/// The packed output of an [OutputBuilder].
#[derive(Debug)]
pub struct Packed {
    /// `None` if nothing was written.
    pub buffer: Option<Buffer>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
}

/// How [OutputBuilder::push_vertices] should lay out an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub component_type: ComponentType,
    pub attribute_type: AttributeType,
    pub normalized: bool,
    /// Compute `min`/`max`.
    pub bounds: bool,
}

impl<'src> OutputBuilder<'src> {
    pub fn new(source: &'src Document) -> Self {
        Self {
            source,
            buffer: BufferBuilder::new(0),
            accessors: Vec::new(),
            carried_views: HashMap::new(),
            carried_accessors: HashMap::new(),
        }
    }

    #[inline]
    pub fn source(&self) -> &'src Document {
        self.source
    }

    /// Copy source buffer view `view` byte for byte, returning its output index.
    pub fn carry_view(&mut self, view: usize) -> Result<usize, BufferError> {
        if let Some(&out) = self.carried_views.get(&view) {
            return Ok(out);
        }
        let bytes = self.source.view_bytes(view)?;
        let src = &self.source.buffer_views[view];
        let out = self.buffer.push_view(bytes, src.byte_stride, src.target);
        tracing::trace!(view, out, len = bytes.len(), "carried buffer view");
        self.carried_views.insert(view, out);
        Ok(out)
    }

    /// Copy source accessor `accessor` into a tightly packed view, returning its output index.
    ///
    /// Everything but the data location is kept, including `min`/`max`.
    pub fn carry_accessor(
        &mut self,
        accessor: usize,
        target: Option<BufferTarget>,
    ) -> Result<usize, AccessorError> {
        if let Some(&out) = self.carried_accessors.get(&accessor) {
            return Ok(out);
        }
        let view = self.source.accessor_view(accessor)?;
        let src = &self.source.accessors[accessor];
        let copy = match src.buffer_view {
            None => src.clone(),
            Some(_) => {
                let bytes = view.gather(0..view.len());
                let buffer_view = self.push_elements(&bytes, view.element_size(), target);
                Accessor {
                    buffer_view: Some(buffer_view),
                    byte_offset: 0,
                    ..src.clone()
                }
            }
        };
        let out = self.push_accessor(copy);
        tracing::trace!(accessor, out, count = view.len(), "carried accessor");
        self.carried_accessors.insert(accessor, out);
        Ok(out)
    }

    /// Write tightly packed vertex elements as a new accessor, returning its index.
    pub fn push_vertices(&mut self, bytes: &[u8], layout: VertexLayout) -> usize {
        let element_size = layout.attribute_type.size_bytes(layout.component_type);
        let count = bytes.len() / element_size;
        let (min, max) = if layout.bounds {
            component_bounds(bytes, layout.component_type, layout.attribute_type).unzip()
        } else {
            (None, None)
        };
        let buffer_view = self.push_elements(bytes, element_size, Some(BufferTarget::Array));
        self.push_accessor(Accessor {
            buffer_view: Some(buffer_view),
            byte_offset: 0,
            count,
            component_type: layout.component_type,
            attribute_type: layout.attribute_type,
            normalized: layout.normalized,
            min,
            max,
        })
    }

    /// Write `indices` with the narrowest component type able to hold them.
    ///
    /// Returns `None` if an index equals `u32::MAX`.
    pub fn push_indices(&mut self, indices: &[u32]) -> Option<usize> {
        let (width, bytes) = encode_smallest(indices)?;
        let buffer_view = self
            .buffer
            .push_view(&bytes, None, Some(BufferTarget::ElementArray));
        tracing::trace!(count = indices.len(), ?width, "wrote indices");
        Some(self.push_accessor(Accessor {
            buffer_view: Some(buffer_view),
            byte_offset: 0,
            count: indices.len(),
            component_type: width.into(),
            attribute_type: AttributeType::Scalar,
            normalized: false,
            min: None,
            max: None,
        }))
    }

    fn push_accessor(&mut self, accessor: Accessor) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    /// Push packed elements as one view, padding vertex elements to 4-byte strides.
    fn push_elements(
        &mut self,
        bytes: &[u8],
        element_size: usize,
        target: Option<BufferTarget>,
    ) -> usize {
        let stride = align_up(element_size, VERTEX_ALIGNMENT);
        if target != Some(BufferTarget::Array) || stride == element_size || bytes.is_empty() {
            return self.buffer.push_view(bytes, None, target);
        }
        let mut padded = Vec::with_capacity(bytes.len() / element_size * stride);
        for element in bytes.chunks_exact(element_size) {
            padded.extend_from_slice(element);
            padded.resize(padded.len() + stride - element_size, 0);
        }
        self.buffer.push_view(&padded, Some(stride), target)
    }

    pub fn finish(self) -> Packed {
        let empty = self.buffer.byte_len() == 0;
        let (buffer, buffer_views) = self.buffer.finish();
        Packed {
            buffer: (!empty).then_some(buffer),
            buffer_views,
            accessors: self.accessors,
        }
    }
}
