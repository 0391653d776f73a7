//! Compute pass replay. Simpler than render: no attachments and no
//! deferred draw state, but every dispatch re-barriers the read-write
//! storage buffers of the bound groups so unordered writes from the
//! previous dispatch become visible.

use crate::{
    hal::{Backend, BindPoint, CommandList, FencedDeleter, RecordContext},
    track::BarrierTracker,
};

use super::{bind::Binder, render::prepare_pass_resources, Command, CommandCursor, PassResourceUsage, StateChange};

pub(super) fn record_compute_pass<B: Backend, D: FencedDeleter>(
    usage: &PassResourceUsage,
    cursor: &mut CommandCursor<'_>,
    ctx: &mut RecordContext<B, D>,
    tracker: &mut BarrierTracker,
) {
    profiling::scope!("record_compute_pass");
    prepare_pass_resources(usage, ctx, tracker);

    let mut binder = Binder::new();
    let mut pipeline = StateChange::new();
    loop {
        let command = cursor.next().expect("compute pass not terminated");
        match command {
            Command::EndComputePass => break,
            Command::SetComputePipeline(p) => {
                binder.change_layout(p.layout());
                if !pipeline.set_and_check_redundant(p.raw()) {
                    ctx.list.set_compute_pipeline(p.raw());
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
            Command::Dispatch(count) => {
                binder.apply(BindPoint::Compute, ctx, Some(tracker));
                tracker.flush(&mut ctx.list);
                ctx.list.dispatch(*count);
            }
            Command::DispatchIndirect { buffer, offset } => {
                binder.apply(BindPoint::Compute, ctx, Some(tracker));
                tracker.flush(&mut ctx.list);
                ctx.list.dispatch_indirect(buffer.raw(), *offset);
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
            _ => unreachable!("command not valid inside a compute pass"),
        }
    }
}
