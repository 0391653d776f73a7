//! Ray tracing replay: the trace pass itself and the acceleration
//! container commands that run outside passes.
//!
//! Container build state is the one piece of lifecycle the frontend does
//! not validate, so building twice, updating a container that was never
//! built, or updating one created without update support are reported as
//! typed errors rather than panics.

use log::trace;

use crate::{
    hal::{Backend, BindPoint, CommandList, FencedDeleter, RecordContext, Transient},
    resource::{AccelerationContainer, ContainerLevel},
    track::BarrierTracker,
};

use super::{
    bind::Binder, render::prepare_pass_resources, AccelerationContainerError, Command,
    CommandCursor, PassResourceUsage, RecordError, StateChange,
};

pub(super) fn record_ray_tracing_pass<B: Backend, D: FencedDeleter>(
    usage: &PassResourceUsage,
    cursor: &mut CommandCursor<'_>,
    ctx: &mut RecordContext<B, D>,
    tracker: &mut BarrierTracker,
) {
    profiling::scope!("record_ray_tracing_pass");
    prepare_pass_resources(usage, ctx, tracker);

    let mut binder = Binder::new();
    let mut pipeline = StateChange::new();
    let mut shader_binding_table = None;
    loop {
        let command = cursor.next().expect("ray tracing pass not terminated");
        match command {
            Command::EndRayTracingPass => break,
            Command::SetRayTracingPipeline(p) => {
                binder.change_layout(p.layout());
                shader_binding_table = Some(p.shader_binding_table().raw());
                if !pipeline.set_and_check_redundant(p.raw()) {
                    ctx.list.set_ray_tracing_pipeline(p.raw());
                }
            }
            Command::SetBindGroup {
                index,
                group,
                dynamic_offset_count,
            } => {
                let offsets = cursor.take_dynamic_offsets(*dynamic_offset_count);
                binder.set_group(*index, group, offsets);
            }
            Command::TraceRays { dimensions } => {
                binder.apply(BindPoint::RayTracing, ctx, Some(tracker));
                tracker.flush(&mut ctx.list);
                let table = shader_binding_table
                    .expect("trace recorded without a ray tracing pipeline");
                ctx.list.trace_rays(table, *dimensions);
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
            _ => unreachable!("command not valid inside a ray tracing pass"),
        }
    }
}

/// Ordering state for container builds within one recording: top-level
/// builds and updates consume bottom-level output, so a barrier separates
/// each from the bottom-level work recorded before it.
#[derive(Debug, Default)]
pub(super) struct ContainerBuildState {
    bottom_level_built: bool,
    bottom_level_updated: bool,
}

impl ContainerBuildState {
    pub fn build<B: Backend, D: FencedDeleter>(
        &mut self,
        container: &AccelerationContainer,
        ctx: &mut RecordContext<B, D>,
    ) -> Result<(), RecordError> {
        if container.is_built() {
            return Err(AccelerationContainerError::AlreadyBuilt.into());
        }
        match container.level() {
            ContainerLevel::Bottom => self.bottom_level_built = true,
            ContainerLevel::Top => {
                if self.bottom_level_built {
                    ctx.list.memory_barrier();
                }
            }
        }
        let scratch = container
            .build_scratch()
            .expect("build scratch alive until the first update");
        ctx.list.build_acceleration_container(
            container.raw(),
            container.level(),
            scratch,
            false,
        );
        container.mark_built();
        Ok(())
    }

    pub fn update<B: Backend, D: FencedDeleter>(
        &mut self,
        container: &AccelerationContainer,
        ctx: &mut RecordContext<B, D>,
    ) -> Result<(), RecordError> {
        if !container.allows_update() {
            return Err(AccelerationContainerError::UpdatesNotAllowed.into());
        }
        if !container.is_built() {
            return Err(AccelerationContainerError::NotBuilt.into());
        }
        match container.level() {
            ContainerLevel::Bottom => self.bottom_level_updated = true,
            ContainerLevel::Top => {
                if self.bottom_level_updated {
                    ctx.list.memory_barrier();
                }
            }
        }
        if let Some(stale) = container.take_build_scratch_on_first_update() {
            trace!("releasing build scratch of {:?}", container.raw());
            ctx.deleter.delete_when_unused(Transient::Buffer(stale));
        }
        let scratch = container
            .update_scratch()
            .expect("updatable containers carry update scratch");
        ctx.list
            .build_acceleration_container(container.raw(), container.level(), scratch, true);
        Ok(())
    }

    pub fn copy<B: Backend, D: FencedDeleter>(
        &mut self,
        src: &AccelerationContainer,
        dst: &AccelerationContainer,
        ctx: &mut RecordContext<B, D>,
    ) -> Result<(), RecordError> {
        if !src.is_built() {
            return Err(AccelerationContainerError::NotBuilt.into());
        }
        ctx.list.copy_acceleration_container(src.raw(), dst.raw());
        dst.mark_built();
        Ok(())
    }
}
