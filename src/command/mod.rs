/*! The recorded command stream and its replay.
 *
 *  A [`CommandStream`] is a flat list of [`Command`] records plus side
 *  tables for variable-length payloads (dynamic offsets, debug labels,
 *  bundle handles). Commands and payloads are laid down in recording order
 *  and consumed exactly once, in order, by a [`CommandCursor`] during
 *  replay. [`CommandRecorder::record`] drives the replay into a backend
 *  command list.
 */

mod bind;
mod clear;
mod compute;
mod draw;
mod ray;
mod recorder;
mod render;
mod transfer;

pub use recorder::CommandRecorder;

use std::sync::Arc;

use arrayvec::ArrayVec;
use thiserror::Error;

use crate::{
    binding_model::BindGroup,
    pipeline::{ComputePipeline, RayTracingPipeline, RenderPipeline},
    resource::{AccelerationContainer, Buffer, BufferUses, Texture, TextureUses, TextureView},
    BufferAddress, Color, DynamicOffset, Extent3d, Origin3d, Rect, SubresourceRange, Viewport,
    MAX_COLOR_ATTACHMENTS,
};

/// Stateful user errors surfaced at replay time. Everything else about the
/// stream is the producer's responsibility and malformed input panics.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error(transparent)]
    AccelerationContainer(#[from] AccelerationContainerError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AccelerationContainerError {
    #[error("acceleration container is already built")]
    AlreadyBuilt,
    #[error("acceleration container does not allow updates")]
    UpdatesNotAllowed,
    #[error("acceleration container must be built before it can be updated")]
    NotBuilt,
}

/// Resources a pass uses, with the usage each needs, as summarized by the
/// frontend. Consumed before the pass to batch every transition.
#[derive(Debug, Default)]
pub struct PassResourceUsage {
    pub buffers: Vec<(Arc<Buffer>, BufferUses)>,
    pub textures: Vec<(Arc<Texture>, SubresourceRange, TextureUses)>,
}

#[derive(Clone, Debug)]
pub struct ColorAttachment {
    pub view: TextureView,
    pub resolve_target: Option<TextureView>,
    pub load: crate::LoadOp,
    pub store: crate::StoreOp,
    pub clear_value: Color,
}

#[derive(Clone, Debug)]
pub struct DepthStencilAttachment {
    pub view: TextureView,
    pub depth_load: crate::LoadOp,
    pub depth_store: crate::StoreOp,
    pub clear_depth: f32,
    pub stencil_load: crate::LoadOp,
    pub stencil_store: crate::StoreOp,
    pub clear_stencil: u32,
}

#[derive(Debug)]
pub struct RenderPassDescriptor {
    pub colors: ArrayVec<ColorAttachment, MAX_COLOR_ATTACHMENTS>,
    pub depth_stencil: Option<DepthStencilAttachment>,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

/// Buffer side of a buffer<->texture copy.
#[derive(Clone, Debug)]
pub struct BufferCopyView {
    pub buffer: Arc<Buffer>,
    pub offset: BufferAddress,
    pub bytes_per_row: u32,
    pub rows_per_image: u32,
}

/// Texture side of a copy: one subresource plus an origin within it.
#[derive(Clone, Debug)]
pub struct TextureCopyView {
    pub texture: Arc<Texture>,
    pub mip_level: u32,
    pub array_layer: u32,
    pub origin: Origin3d,
}

#[derive(Debug)]
pub enum Command {
    BeginRenderPass {
        desc: RenderPassDescriptor,
        usage: PassResourceUsage,
    },
    EndRenderPass,
    BeginComputePass {
        usage: PassResourceUsage,
    },
    EndComputePass,
    BeginRayTracingPass {
        usage: PassResourceUsage,
    },
    EndRayTracingPass,

    SetRenderPipeline(Arc<RenderPipeline>),
    SetComputePipeline(Arc<ComputePipeline>),
    SetRayTracingPipeline(Arc<RayTracingPipeline>),
    /// `dynamic_offset_count` offsets follow in the side table.
    SetBindGroup {
        index: u32,
        group: Arc<BindGroup>,
        dynamic_offset_count: usize,
    },

    SetIndexBuffer {
        buffer: Arc<Buffer>,
        offset: BufferAddress,
        size: BufferAddress,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: Arc<Buffer>,
        offset: BufferAddress,
        size: BufferAddress,
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
        buffer: Arc<Buffer>,
        offset: BufferAddress,
    },
    DrawIndexedIndirect {
        buffer: Arc<Buffer>,
        offset: BufferAddress,
    },
    /// `bundle_count` bundle handles follow in the side table.
    ExecuteBundles {
        bundle_count: usize,
    },

    Dispatch([u32; 3]),
    DispatchIndirect {
        buffer: Arc<Buffer>,
        offset: BufferAddress,
    },

    TraceRays {
        dimensions: [u32; 3],
    },
    BuildAccelerationContainer {
        container: Arc<AccelerationContainer>,
    },
    UpdateAccelerationContainer {
        container: Arc<AccelerationContainer>,
    },
    CopyAccelerationContainer {
        src: Arc<AccelerationContainer>,
        dst: Arc<AccelerationContainer>,
    },

    CopyBufferToBuffer {
        src: Arc<Buffer>,
        src_offset: BufferAddress,
        dst: Arc<Buffer>,
        dst_offset: BufferAddress,
        size: BufferAddress,
    },
    CopyBufferToTexture {
        src: BufferCopyView,
        dst: TextureCopyView,
        extent: Extent3d,
    },
    CopyTextureToBuffer {
        src: TextureCopyView,
        dst: BufferCopyView,
        extent: Extent3d,
    },
    CopyTextureToTexture {
        src: TextureCopyView,
        dst: TextureCopyView,
        extent: Extent3d,
    },

    /// `label_len` bytes of UTF-8 follow in the side table.
    PushDebugGroup {
        label_len: usize,
    },
    PopDebugGroup,
    InsertDebugMarker {
        label_len: usize,
    },
}

/// Commands executable inside a render pass, pre-recorded for repeated
/// execution. Replayed inline through the surrounding pass state.
#[derive(Debug)]
pub struct RenderBundle {
    pub stream: CommandStream,
}

#[derive(Debug, Default)]
pub struct CommandStream {
    commands: Vec<Command>,
    dynamic_offsets: Vec<DynamicOffset>,
    string_data: Vec<u8>,
    bundles: Vec<Arc<RenderBundle>>,
}

impl CommandStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn set_bind_group(
        &mut self,
        index: u32,
        group: Arc<BindGroup>,
        dynamic_offsets: &[DynamicOffset],
    ) {
        debug_assert_eq!(dynamic_offsets.len(), group.dynamic_offset_count());
        self.dynamic_offsets.extend_from_slice(dynamic_offsets);
        self.commands.push(Command::SetBindGroup {
            index,
            group,
            dynamic_offset_count: dynamic_offsets.len(),
        });
    }

    pub fn execute_bundles(&mut self, bundles: &[Arc<RenderBundle>]) {
        self.bundles.extend(bundles.iter().cloned());
        self.commands.push(Command::ExecuteBundles {
            bundle_count: bundles.len(),
        });
    }

    pub fn push_debug_group(&mut self, label: &str) {
        self.string_data.extend_from_slice(label.as_bytes());
        self.commands.push(Command::PushDebugGroup {
            label_len: label.len(),
        });
    }

    pub fn pop_debug_group(&mut self) {
        self.commands.push(Command::PopDebugGroup);
    }

    pub fn insert_debug_marker(&mut self, label: &str) {
        self.string_data.extend_from_slice(label.as_bytes());
        self.commands.push(Command::InsertDebugMarker {
            label_len: label.len(),
        });
    }

    pub fn cursor(&self) -> CommandCursor<'_> {
        CommandCursor {
            stream: self,
            command: 0,
            offset: 0,
            string: 0,
            bundle: 0,
        }
    }
}

/// In-order, consume-once reader over a stream and its side tables.
///
/// Every `take_*` call must match what the corresponding command recorded;
/// the stream producer and consumer agree on the layout by construction.
#[derive(Clone)]
pub struct CommandCursor<'a> {
    stream: &'a CommandStream,
    command: usize,
    offset: usize,
    string: usize,
    bundle: usize,
}

impl<'a> CommandCursor<'a> {
    pub fn peek(&self) -> Option<&'a Command> {
        self.stream.commands.get(self.command)
    }

    pub fn next(&mut self) -> Option<&'a Command> {
        let command = self.stream.commands.get(self.command)?;
        self.command += 1;
        Some(command)
    }

    pub fn take_dynamic_offsets(&mut self, count: usize) -> &'a [DynamicOffset] {
        let start = self.offset;
        self.offset += count;
        &self.stream.dynamic_offsets[start..self.offset]
    }

    pub fn take_label(&mut self, len: usize) -> &'a str {
        let start = self.string;
        self.string += len;
        std::str::from_utf8(&self.stream.string_data[start..self.string])
            .expect("debug labels are recorded as UTF-8")
    }

    pub fn take_bundles(&mut self, count: usize) -> &'a [Arc<RenderBundle>] {
        let start = self.bundle;
        self.bundle += count;
        &self.stream.bundles[start..self.bundle]
    }
}

/// Filters out redundant state setters the stream producer did not elide.
#[derive(Debug)]
pub(crate) struct StateChange<T: Copy + PartialEq> {
    last: Option<T>,
}

impl<T: Copy + PartialEq> StateChange<T> {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Records `new` and reports whether it matches the previous value.
    pub fn set_and_check_redundant(&mut self, new: T) -> bool {
        let redundant = self.last == Some(new);
        self.last = Some(new);
        redundant
    }
}
