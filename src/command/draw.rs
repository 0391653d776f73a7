//! Draw-time state that has to be deferred: vertex buffer bindings need
//! the stride of the current pipeline, and the index buffer binding needs
//! its element format, so both are flushed lazily right before a draw.

use std::sync::Arc;

use crate::{
    hal::{CommandList, IndexBufferView, VertexBufferView},
    pipeline::RenderPipeline,
    resource::Buffer,
    BufferAddress, IndexFormat, MAX_VERTEX_BUFFERS,
};

/// Tracks the contiguous range of vertex buffer slots that differ from
/// what the native list last saw, and rebinds them in one call.
#[derive(Debug)]
pub(crate) struct VertexBufferTracker {
    views: [VertexBufferView; MAX_VERTEX_BUFFERS],
    dirty_start: usize,
    dirty_end: usize,
}

impl VertexBufferTracker {
    pub fn new() -> Self {
        Self {
            views: Default::default(),
            dirty_start: MAX_VERTEX_BUFFERS,
            dirty_end: 0,
        }
    }

    fn widen(&mut self, slot: usize) {
        self.dirty_start = self.dirty_start.min(slot);
        self.dirty_end = self.dirty_end.max(slot + 1);
    }

    pub fn on_set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: &Arc<Buffer>,
        offset: BufferAddress,
        size: BufferAddress,
    ) {
        let slot = slot as usize;
        let view = &mut self.views[slot];
        view.buffer = buffer.raw();
        view.offset = offset;
        view.size = size;
        self.widen(slot);
    }

    /// Strides live in the pipeline, so a pipeline change refreshes them
    /// and widens the dirty range over every slot the pipeline uses.
    pub fn on_set_pipeline(&mut self, pipeline: &RenderPipeline) {
        for (slot, step) in pipeline.vertex_steps().iter().enumerate() {
            if let Some(step) = step {
                self.views[slot].stride = step.stride;
                self.widen(slot);
            }
        }
    }

    pub fn apply<L: CommandList>(&mut self, list: &mut L) {
        if self.dirty_start >= self.dirty_end {
            return;
        }
        list.set_vertex_buffers(
            self.dirty_start as u32,
            &self.views[self.dirty_start..self.dirty_end],
        );
        self.dirty_start = MAX_VERTEX_BUFFERS;
        self.dirty_end = 0;
    }
}

/// Rebinds the index buffer only when the native view actually changes.
/// The element format comes from the pipeline, so either a SetIndexBuffer
/// or a pipeline change can invalidate the applied view.
#[derive(Debug)]
pub(crate) struct IndexBufferTracker {
    buffer: Option<(crate::hal::RawHandle, BufferAddress, BufferAddress)>,
    format: IndexFormat,
    applied: Option<IndexBufferView>,
}

impl IndexBufferTracker {
    pub fn new() -> Self {
        Self {
            buffer: None,
            format: IndexFormat::Uint32,
            applied: None,
        }
    }

    pub fn on_set_index_buffer(
        &mut self,
        buffer: &Arc<Buffer>,
        offset: BufferAddress,
        size: BufferAddress,
    ) {
        self.buffer = Some((buffer.raw(), offset, size));
    }

    pub fn on_set_pipeline(&mut self, pipeline: &RenderPipeline) {
        self.format = pipeline.index_format();
    }

    pub fn apply<L: CommandList>(&mut self, list: &mut L) {
        let (buffer, offset, size) = self
            .buffer
            .expect("indexed draw without an index buffer");
        let view = IndexBufferView {
            buffer,
            offset,
            size,
            format: self.format,
        };
        if self.applied != Some(view) {
            list.set_index_buffer(view);
            self.applied = Some(view);
        }
    }
}
