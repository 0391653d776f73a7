/*! Backend abstraction.
 *
 *  The recorder talks to a backend through three narrow interfaces:
 *
 *  - [`CommandList`], the native instruction sink. One trait method call is
 *    one native instruction; the recorder decides what to emit and when,
 *    the list only records it.
 *  - [`DescriptorAllocator`], which realizes bind groups into native
 *    descriptor storage. The table model (bounded shader-visible heap) can
 *    report exhaustion; the set model never does.
 *  - [`FencedDeleter`], the external deferred-deletion service for
 *    transient native objects that must outlive the submission.
 *
 *  [`Backend`] ties the three together with the capability flags that
 *  select between the two binding models.
 */

use std::fmt;
use std::ops::Range;

use arrayvec::ArrayVec;

use crate::{
    binding_model::BindGroup,
    resource::{BufferUses, ContainerLevel, FormatAspects, TextureUses},
    Color, DynamicOffset, Extent3d, IndexFormat, LoadOp, Origin3d, Rect, StoreOp,
    SubresourceRange, Viewport, MAX_COLOR_ATTACHMENTS,
};

pub mod capture;
mod set;
mod table;

pub use capture::{CaptureList, DeletionQueue, Instr};
pub use set::{DescriptorPoolAllocator, SetModel};
pub use table::{RingHeapAllocator, TableModel};

/// Opaque handle to a native object (resource, view, pipeline, heap).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RawHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindPoint {
    Graphics,
    Compute,
    RayTracing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BufferBarrier {
    pub buffer: RawHandle,
    pub usage: Range<BufferUses>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextureBarrier {
    pub texture: RawHandle,
    pub range: SubresourceRange,
    pub usage: Range<TextureUses>,
}

/// Location of a realized bind group inside the current descriptor
/// generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Realized {
    pub generation: u32,
    pub base_index: u32,
}

/// Descriptor storage ran out; recoverable by switching generations.
#[derive(Debug)]
pub struct Exhausted;

pub trait DescriptorAllocator {
    /// Realizes `group` into the current generation.
    fn try_realize(&mut self, group: &BindGroup) -> Result<Realized, Exhausted>;

    /// Retires the current generation and starts a fresh, empty one.
    /// All previously returned [`Realized`] locations become stale.
    fn switch_generation(&mut self) -> u32;

    fn generation(&self) -> u32;

    /// Native heap/pool handle a command list must bind to address
    /// realizations of the current generation.
    fn native_heaps(&self) -> RawHandle;
}

/// Transient native objects whose destruction must wait for the GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transient {
    AttachmentGroup(RawHandle),
    Buffer(RawHandle),
    DescriptorGeneration(u32),
}

pub trait FencedDeleter {
    /// Schedules `object` for destruction once the work recorded so far
    /// has completed on the GPU.
    fn delete_when_unused(&mut self, object: Transient);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    Color(Color),
    /// Only the named aspects are cleared; the others keep their content.
    DepthStencil {
        depth: f32,
        stencil: u32,
        aspects: FormatAspects,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexBufferView {
    pub buffer: RawHandle,
    pub offset: u64,
    pub size: u64,
    pub format: IndexFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VertexBufferView {
    pub buffer: RawHandle,
    pub offset: u64,
    pub size: u64,
    pub stride: u64,
}

/// Byte layout of the buffer side of a buffer<->texture copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferTextureLayout {
    pub offset: u64,
    pub bytes_per_row: u32,
    pub rows_per_image: u32,
}

/// Texture side of a copy: one subresource plus an origin within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureCopyBase {
    pub mip_level: u32,
    pub array_layer: u32,
    pub origin: Origin3d,
}

/// Render pass attachments with effective (post-upgrade) load operations,
/// ready for native consumption.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedColorAttachment {
    pub view: RawHandle,
    pub load: LoadOp,
    pub store: StoreOp,
    pub clear_value: Color,
    pub resolve_target: Option<RawHandle>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedDepthStencilAttachment {
    pub view: RawHandle,
    pub depth_load: LoadOp,
    pub depth_store: StoreOp,
    pub clear_depth: f32,
    pub stencil_load: LoadOp,
    pub stencil_store: StoreOp,
    pub clear_stencil: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPass {
    pub colors: ArrayVec<ResolvedColorAttachment, MAX_COLOR_ATTACHMENTS>,
    pub depth_stencil: Option<ResolvedDepthStencilAttachment>,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    /// The pass writes read-write storage bindings; native pass primitives
    /// need to know to keep unordered writes legal.
    pub has_storage_writes: bool,
}

/// The native instruction sink.
///
/// Methods mirror the lowest common denominator of modern explicit
/// graphics command lists. The recorder guarantees every call is legal in
/// context (resources transitioned, pass open where required), so
/// implementations translate one call into one native instruction without
/// further checking.
pub trait CommandList: fmt::Debug {
    fn transition_buffers(&mut self, barriers: &[BufferBarrier]);
    fn transition_textures(&mut self, barriers: &[TextureBarrier]);
    /// Hazard barrier ordering unordered writes with subsequent access.
    fn memory_barrier(&mut self);

    fn bind_descriptor_heaps(&mut self, heaps: RawHandle);
    fn set_bind_group(
        &mut self,
        point: BindPoint,
        index: u32,
        group: Realized,
        dynamic_offsets: &[DynamicOffset],
    );

    fn set_render_pipeline(&mut self, pipeline: RawHandle);
    fn set_compute_pipeline(&mut self, pipeline: RawHandle);
    fn set_ray_tracing_pipeline(&mut self, pipeline: RawHandle);

    /// Creates the transient native attachment group (framebuffer
    /// equivalent) for a pass. The caller owns the handle and schedules it
    /// on the fenced deleter once the pass is recorded.
    fn assemble_attachment_group(&mut self, desc: &ResolvedPass) -> RawHandle;
    fn begin_render_pass(&mut self, desc: &ResolvedPass, attachments: RawHandle);
    fn end_render_pass(&mut self);
    /// Emulated pass path: bind attachments directly, without a native
    /// pass primitive.
    fn bind_attachments(&mut self, attachments: RawHandle);
    fn clear_attachment(&mut self, view: RawHandle, value: ClearValue);
    fn resolve_texture(
        &mut self,
        src: RawHandle,
        src_range: SubresourceRange,
        dst: RawHandle,
        dst_range: SubresourceRange,
    );

    /// Zero-fills a texture subresource range. Requires copy-dst state.
    fn clear_texture(&mut self, texture: RawHandle, range: SubresourceRange);

    fn set_index_buffer(&mut self, view: IndexBufferView);
    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]);
    fn set_viewport(&mut self, viewport: Viewport);
    fn set_scissor_rect(&mut self, rect: Rect<u32>);
    fn set_blend_constant(&mut self, color: Color);
    fn set_stencil_reference(&mut self, reference: u32);

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    );
    fn draw_indirect(&mut self, buffer: RawHandle, offset: u64, indexed: bool);
    fn dispatch(&mut self, count: [u32; 3]);
    fn dispatch_indirect(&mut self, buffer: RawHandle, offset: u64);
    fn trace_rays(&mut self, shader_binding_table: RawHandle, dimensions: [u32; 3]);

    fn copy_buffer_to_buffer(
        &mut self,
        src: RawHandle,
        src_offset: u64,
        dst: RawHandle,
        dst_offset: u64,
        size: u64,
    );
    fn copy_buffer_to_texture(
        &mut self,
        src: RawHandle,
        src_layout: BufferTextureLayout,
        dst: RawHandle,
        dst_base: TextureCopyBase,
        extent: Extent3d,
    );
    fn copy_texture_to_buffer(
        &mut self,
        src: RawHandle,
        src_base: TextureCopyBase,
        dst: RawHandle,
        dst_layout: BufferTextureLayout,
        extent: Extent3d,
    );
    fn copy_texture_to_texture(
        &mut self,
        src: RawHandle,
        src_base: TextureCopyBase,
        dst: RawHandle,
        dst_base: TextureCopyBase,
        extent: Extent3d,
    );

    fn build_acceleration_container(
        &mut self,
        container: RawHandle,
        level: ContainerLevel,
        scratch: RawHandle,
        update: bool,
    );
    fn copy_acceleration_container(&mut self, src: RawHandle, dst: RawHandle);

    fn begin_debug_group(&mut self, label: &str);
    fn end_debug_group(&mut self);
    fn insert_debug_marker(&mut self, label: &str);
}

/// Everything a recording writes into: the native list, the descriptor
/// storage feeding it, and the deleter that outlives it.
pub struct RecordContext<B: Backend, D: FencedDeleter> {
    pub list: B::List,
    pub descriptors: B::Descriptors,
    pub deleter: D,
}

/// Binding-model capability adapter: everything that differs between the
/// two backend families the recorder supports.
pub trait Backend {
    type List: CommandList;
    type Descriptors: DescriptorAllocator;

    const NAME: &'static str;
    /// The backend has a native multi-attachment pass primitive. Without
    /// it the recorder emulates passes with explicit clears and resolves.
    const NATIVE_RENDER_PASS: bool;
    /// Shader-visible descriptor heaps must be bound to the command list
    /// before any group binding, and rebound on generation switches.
    const BOUNDED_DESCRIPTOR_HEAPS: bool;
}
