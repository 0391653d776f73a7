//! Pipelines arrive fully compiled; the replay only consults the pieces of
//! their descriptors that feed cross-command state: the layout, the vertex
//! buffer strides and the index element format.

use std::sync::Arc;

use arrayvec::ArrayVec;

use crate::{
    binding_model::PipelineLayout, hal::RawHandle, resource::Buffer, IndexFormat,
    MAX_VERTEX_BUFFERS,
};

/// Per-slot vertex fetch layout of a render pipeline. The stride belongs to
/// the pipeline, not to the buffer binding, which is why a pipeline change
/// dirties bound vertex buffers.
#[derive(Clone, Copy, Debug)]
pub struct VertexStep {
    pub stride: u64,
}

#[derive(Debug)]
pub struct RenderPipeline {
    raw: RawHandle,
    layout: Arc<PipelineLayout>,
    vertex_steps: ArrayVec<Option<VertexStep>, MAX_VERTEX_BUFFERS>,
    index_format: IndexFormat,
}

impl RenderPipeline {
    pub fn new(
        raw: RawHandle,
        layout: &Arc<PipelineLayout>,
        vertex_steps: &[Option<VertexStep>],
        index_format: IndexFormat,
    ) -> Self {
        Self {
            raw,
            layout: layout.clone(),
            vertex_steps: vertex_steps.iter().cloned().collect(),
            index_format,
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    pub fn vertex_steps(&self) -> &[Option<VertexStep>] {
        &self.vertex_steps
    }

    pub fn index_format(&self) -> IndexFormat {
        self.index_format
    }
}

#[derive(Debug)]
pub struct ComputePipeline {
    raw: RawHandle,
    layout: Arc<PipelineLayout>,
}

impl ComputePipeline {
    pub fn new(raw: RawHandle, layout: &Arc<PipelineLayout>) -> Self {
        Self {
            raw,
            layout: layout.clone(),
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }
}

#[derive(Debug)]
pub struct RayTracingPipeline {
    raw: RawHandle,
    layout: Arc<PipelineLayout>,
    /// Shader binding table backing buffer, consumed by trace calls.
    shader_binding_table: Arc<Buffer>,
}

impl RayTracingPipeline {
    pub fn new(
        raw: RawHandle,
        layout: &Arc<PipelineLayout>,
        shader_binding_table: &Arc<Buffer>,
    ) -> Self {
        Self {
            raw,
            layout: layout.clone(),
            shader_binding_table: shader_binding_table.clone(),
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    pub fn shader_binding_table(&self) -> &Arc<Buffer> {
        &self.shader_binding_table
    }
}
