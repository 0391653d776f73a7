//! In-memory command list that records every native instruction it is
//! asked to emit. Backs the recorder tests for both binding models.

use crate::{
    resource::ContainerLevel, Color, DynamicOffset, Extent3d, Rect, SubresourceRange, Viewport,
};

use super::{
    BindPoint, BufferBarrier, BufferTextureLayout, ClearValue, CommandList, FencedDeleter,
    IndexBufferView, RawHandle, Realized, ResolvedPass, TextureBarrier, TextureCopyBase,
    Transient, VertexBufferView,
};

/// One recorded native instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    TransitionBuffers(Vec<BufferBarrier>),
    TransitionTextures(Vec<TextureBarrier>),
    MemoryBarrier,
    BindDescriptorHeaps(RawHandle),
    SetBindGroup {
        point: BindPoint,
        index: u32,
        group: Realized,
        dynamic_offsets: Vec<DynamicOffset>,
    },
    SetRenderPipeline(RawHandle),
    SetComputePipeline(RawHandle),
    SetRayTracingPipeline(RawHandle),
    AssembleAttachmentGroup(RawHandle),
    BeginRenderPass {
        desc: ResolvedPass,
        attachments: RawHandle,
    },
    EndRenderPass,
    BindAttachments(RawHandle),
    ClearAttachment {
        view: RawHandle,
        value: ClearValue,
    },
    ResolveTexture {
        src: RawHandle,
        src_range: SubresourceRange,
        dst: RawHandle,
        dst_range: SubresourceRange,
    },
    ClearTexture {
        texture: RawHandle,
        range: SubresourceRange,
    },
    SetIndexBuffer(IndexBufferView),
    SetVertexBuffers {
        start_slot: u32,
        views: Vec<VertexBufferView>,
    },
    SetViewport(Viewport),
    SetScissorRect(Rect<u32>),
    SetBlendConstant(Color),
    SetStencilReference(u32),
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
    DrawIndirect {
        buffer: RawHandle,
        offset: u64,
        indexed: bool,
    },
    Dispatch([u32; 3]),
    DispatchIndirect {
        buffer: RawHandle,
        offset: u64,
    },
    TraceRays {
        shader_binding_table: RawHandle,
        dimensions: [u32; 3],
    },
    CopyBufferToBuffer {
        src: RawHandle,
        src_offset: u64,
        dst: RawHandle,
        dst_offset: u64,
        size: u64,
    },
    CopyBufferToTexture {
        src: RawHandle,
        src_layout: BufferTextureLayout,
        dst: RawHandle,
        dst_base: TextureCopyBase,
        extent: Extent3d,
    },
    CopyTextureToBuffer {
        src: RawHandle,
        src_base: TextureCopyBase,
        dst: RawHandle,
        dst_layout: BufferTextureLayout,
        extent: Extent3d,
    },
    CopyTextureToTexture {
        src: RawHandle,
        src_base: TextureCopyBase,
        dst: RawHandle,
        dst_base: TextureCopyBase,
        extent: Extent3d,
    },
    BuildAccelerationContainer {
        container: RawHandle,
        level: ContainerLevel,
        scratch: RawHandle,
        update: bool,
    },
    CopyAccelerationContainer {
        src: RawHandle,
        dst: RawHandle,
    },
    BeginDebugGroup(String),
    EndDebugGroup,
    InsertDebugMarker(String),
}

#[derive(Debug, Default)]
pub struct CaptureList {
    pub instrs: Vec<Instr>,
    next_transient: u64,
}

impl CaptureList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded instructions matching `filter`.
    pub fn filtered<F: Fn(&Instr) -> bool>(&self, filter: F) -> Vec<&Instr> {
        self.instrs.iter().filter(|i| filter(i)).collect()
    }

    fn fresh_transient(&mut self) -> RawHandle {
        self.next_transient += 1;
        // High bit tags transients so they never collide with resource
        // handles picked by tests.
        RawHandle(self.next_transient | 1 << 63)
    }
}

impl CommandList for CaptureList {
    fn transition_buffers(&mut self, barriers: &[BufferBarrier]) {
        self.instrs.push(Instr::TransitionBuffers(barriers.to_vec()));
    }
    fn transition_textures(&mut self, barriers: &[TextureBarrier]) {
        self.instrs.push(Instr::TransitionTextures(barriers.to_vec()));
    }
    fn memory_barrier(&mut self) {
        self.instrs.push(Instr::MemoryBarrier);
    }

    fn bind_descriptor_heaps(&mut self, heaps: RawHandle) {
        self.instrs.push(Instr::BindDescriptorHeaps(heaps));
    }
    fn set_bind_group(
        &mut self,
        point: BindPoint,
        index: u32,
        group: Realized,
        dynamic_offsets: &[DynamicOffset],
    ) {
        self.instrs.push(Instr::SetBindGroup {
            point,
            index,
            group,
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn set_render_pipeline(&mut self, pipeline: RawHandle) {
        self.instrs.push(Instr::SetRenderPipeline(pipeline));
    }
    fn set_compute_pipeline(&mut self, pipeline: RawHandle) {
        self.instrs.push(Instr::SetComputePipeline(pipeline));
    }
    fn set_ray_tracing_pipeline(&mut self, pipeline: RawHandle) {
        self.instrs.push(Instr::SetRayTracingPipeline(pipeline));
    }

    fn assemble_attachment_group(&mut self, _desc: &ResolvedPass) -> RawHandle {
        let handle = self.fresh_transient();
        self.instrs.push(Instr::AssembleAttachmentGroup(handle));
        handle
    }
    fn begin_render_pass(&mut self, desc: &ResolvedPass, attachments: RawHandle) {
        self.instrs.push(Instr::BeginRenderPass {
            desc: desc.clone(),
            attachments,
        });
    }
    fn end_render_pass(&mut self) {
        self.instrs.push(Instr::EndRenderPass);
    }
    fn bind_attachments(&mut self, attachments: RawHandle) {
        self.instrs.push(Instr::BindAttachments(attachments));
    }
    fn clear_attachment(&mut self, view: RawHandle, value: ClearValue) {
        self.instrs.push(Instr::ClearAttachment { view, value });
    }
    fn resolve_texture(
        &mut self,
        src: RawHandle,
        src_range: SubresourceRange,
        dst: RawHandle,
        dst_range: SubresourceRange,
    ) {
        self.instrs.push(Instr::ResolveTexture {
            src,
            src_range,
            dst,
            dst_range,
        });
    }

    fn clear_texture(&mut self, texture: RawHandle, range: SubresourceRange) {
        self.instrs.push(Instr::ClearTexture { texture, range });
    }

    fn set_index_buffer(&mut self, view: IndexBufferView) {
        self.instrs.push(Instr::SetIndexBuffer(view));
    }
    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) {
        self.instrs.push(Instr::SetVertexBuffers {
            start_slot,
            views: views.to_vec(),
        });
    }
    fn set_viewport(&mut self, viewport: Viewport) {
        self.instrs.push(Instr::SetViewport(viewport));
    }
    fn set_scissor_rect(&mut self, rect: Rect<u32>) {
        self.instrs.push(Instr::SetScissorRect(rect));
    }
    fn set_blend_constant(&mut self, color: Color) {
        self.instrs.push(Instr::SetBlendConstant(color));
    }
    fn set_stencil_reference(&mut self, reference: u32) {
        self.instrs.push(Instr::SetStencilReference(reference));
    }

    fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.instrs.push(Instr::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        self.instrs.push(Instr::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        });
    }
    fn draw_indirect(&mut self, buffer: RawHandle, offset: u64, indexed: bool) {
        self.instrs.push(Instr::DrawIndirect {
            buffer,
            offset,
            indexed,
        });
    }
    fn dispatch(&mut self, count: [u32; 3]) {
        self.instrs.push(Instr::Dispatch(count));
    }
    fn dispatch_indirect(&mut self, buffer: RawHandle, offset: u64) {
        self.instrs.push(Instr::DispatchIndirect { buffer, offset });
    }
    fn trace_rays(&mut self, shader_binding_table: RawHandle, dimensions: [u32; 3]) {
        self.instrs.push(Instr::TraceRays {
            shader_binding_table,
            dimensions,
        });
    }

    fn copy_buffer_to_buffer(
        &mut self,
        src: RawHandle,
        src_offset: u64,
        dst: RawHandle,
        dst_offset: u64,
        size: u64,
    ) {
        self.instrs.push(Instr::CopyBufferToBuffer {
            src,
            src_offset,
            dst,
            dst_offset,
            size,
        });
    }
    fn copy_buffer_to_texture(
        &mut self,
        src: RawHandle,
        src_layout: BufferTextureLayout,
        dst: RawHandle,
        dst_base: TextureCopyBase,
        extent: Extent3d,
    ) {
        self.instrs.push(Instr::CopyBufferToTexture {
            src,
            src_layout,
            dst,
            dst_base,
            extent,
        });
    }
    fn copy_texture_to_buffer(
        &mut self,
        src: RawHandle,
        src_base: TextureCopyBase,
        dst: RawHandle,
        dst_layout: BufferTextureLayout,
        extent: Extent3d,
    ) {
        self.instrs.push(Instr::CopyTextureToBuffer {
            src,
            src_base,
            dst,
            dst_layout,
            extent,
        });
    }
    fn copy_texture_to_texture(
        &mut self,
        src: RawHandle,
        src_base: TextureCopyBase,
        dst: RawHandle,
        dst_base: TextureCopyBase,
        extent: Extent3d,
    ) {
        self.instrs.push(Instr::CopyTextureToTexture {
            src,
            src_base,
            dst,
            dst_base,
            extent,
        });
    }

    fn build_acceleration_container(
        &mut self,
        container: RawHandle,
        level: ContainerLevel,
        scratch: RawHandle,
        update: bool,
    ) {
        self.instrs.push(Instr::BuildAccelerationContainer {
            container,
            level,
            scratch,
            update,
        });
    }
    fn copy_acceleration_container(&mut self, src: RawHandle, dst: RawHandle) {
        self.instrs.push(Instr::CopyAccelerationContainer { src, dst });
    }

    fn begin_debug_group(&mut self, label: &str) {
        self.instrs.push(Instr::BeginDebugGroup(label.to_string()));
    }
    fn end_debug_group(&mut self) {
        self.instrs.push(Instr::EndDebugGroup);
    }
    fn insert_debug_marker(&mut self, label: &str) {
        self.instrs.push(Instr::InsertDebugMarker(label.to_string()));
    }
}

/// Deferred-deletion queue that just remembers what was handed to it.
#[derive(Debug, Default)]
pub struct DeletionQueue {
    pub pending: Vec<Transient>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FencedDeleter for DeletionQueue {
    fn delete_when_unused(&mut self, object: Transient) {
        self.pending.push(object);
    }
}
