//! Top-level replay loop.
//!
//! One recorder consumes one stream, start to finish, into one context.
//! Pass commands hand off to the per-pass sub-loops; everything between
//! passes (copies, acceleration container work, debug markers) is handled
//! here directly.

use std::marker::PhantomData;

use log::trace;

use crate::{
    hal::{Backend, CommandList, DescriptorAllocator, FencedDeleter, RecordContext},
    track::BarrierTracker,
};

use super::{
    compute::record_compute_pass,
    ray::{record_ray_tracing_pass, ContainerBuildState},
    render::record_render_pass,
    transfer::record_copy,
    Command, CommandStream, RecordError,
};

pub struct CommandRecorder<B: Backend> {
    _backend: PhantomData<B>,
}

impl<B: Backend> CommandRecorder<B> {
    /// Replays `stream` into `ctx`. The stream is consumed in order; the
    /// state every resource is left in carries over to the next recording.
    pub fn record<D: FencedDeleter>(
        stream: &CommandStream,
        ctx: &mut RecordContext<B, D>,
    ) -> Result<(), RecordError> {
        profiling::scope!("CommandRecorder::record");
        trace!("recording command stream for backend {}", B::NAME);

        if B::BOUNDED_DESCRIPTOR_HEAPS {
            ctx.list.bind_descriptor_heaps(ctx.descriptors.native_heaps());
        }

        let mut tracker = BarrierTracker::new();
        let mut containers = ContainerBuildState::default();
        let mut cursor = stream.cursor();
        while let Some(command) = cursor.next() {
            match command {
                Command::BeginRenderPass { desc, usage } => {
                    record_render_pass(desc, usage, &mut cursor, ctx, &mut tracker);
                }
                Command::BeginComputePass { usage } => {
                    record_compute_pass(usage, &mut cursor, ctx, &mut tracker);
                }
                Command::BeginRayTracingPass { usage } => {
                    record_ray_tracing_pass(usage, &mut cursor, ctx, &mut tracker);
                }
                Command::CopyBufferToBuffer { .. }
                | Command::CopyBufferToTexture { .. }
                | Command::CopyTextureToBuffer { .. }
                | Command::CopyTextureToTexture { .. } => {
                    record_copy(command, ctx, &mut tracker);
                }
                Command::BuildAccelerationContainer { container } => {
                    containers.build(container, ctx)?;
                }
                Command::UpdateAccelerationContainer { container } => {
                    containers.update(container, ctx)?;
                }
                Command::CopyAccelerationContainer { src, dst } => {
                    containers.copy(src, dst, ctx)?;
                }
                Command::PushDebugGroup { label_len } => {
                    let label = cursor.take_label(*label_len);
                    ctx.list.begin_debug_group(label);
                }
                Command::PopDebugGroup => ctx.list.end_debug_group(),
                Command::InsertDebugMarker { label_len } => {
                    let label = cursor.take_label(*label_len);
                    ctx.list.insert_debug_marker(label);
                }
                _ => unreachable!("command not valid outside a pass"),
            }
        }
        Ok(())
    }
}
