//! Render pass replay.
//!
//! A pass starts by settling all resource state in one batch: lazy clears
//! for sampled or storage textures the pass reads, then a single pair of
//! transition batches built from the frontend's usage summary. Attachment
//! load operations are resolved against the initialization tracker at the
//! same time, upgrading `Load` of undefined content to a zero clear.
//!
//! Backends with a native pass primitive get a begin/end pair around the
//! draw loop. The others get the emulated shape: attachments bound
//! directly, clears issued explicitly, and multisample resolves expanded
//! into transition-plus-resolve at the end of the pass.

use log::trace;

use crate::{
    hal::{
        Backend, BindPoint, ClearValue, CommandList, FencedDeleter, RecordContext,
        ResolvedColorAttachment, ResolvedDepthStencilAttachment, ResolvedPass, Transient,
    },
    resource::{FormatAspects, TextureUses, TextureView},
    track::BarrierTracker,
    Color, LoadOp, Rect, StoreOp, Viewport,
};

use super::{
    bind::Binder,
    clear::ensure_texture_initialized,
    draw::{IndexBufferTracker, VertexBufferTracker},
    Command, CommandCursor, PassResourceUsage, RenderPassDescriptor, StateChange,
};

/// Draw state shared by the pass itself and any bundles it executes;
/// bundles replay inline, so their state changes flow through the same
/// trackers as directly recorded commands.
struct RenderState {
    binder: Binder,
    vertex: VertexBufferTracker,
    index: IndexBufferTracker,
    pipeline: StateChange<crate::hal::RawHandle>,
}

impl RenderState {
    fn new() -> Self {
        Self {
            binder: Binder::new(),
            vertex: VertexBufferTracker::new(),
            index: IndexBufferTracker::new(),
            pipeline: StateChange::new(),
        }
    }

    fn flush_draw_state<B: Backend, D: FencedDeleter>(
        &mut self,
        ctx: &mut RecordContext<B, D>,
        indexed: bool,
    ) {
        self.binder.apply(BindPoint::Graphics, ctx, None);
        self.vertex.apply(&mut ctx.list);
        if indexed {
            self.index.apply(&mut ctx.list);
        }
    }

    /// One render command, from the pass stream or a bundle stream.
    fn encode<B: Backend, D: FencedDeleter>(
        &mut self,
        command: &Command,
        cursor: &mut CommandCursor<'_>,
        ctx: &mut RecordContext<B, D>,
    ) {
        match command {
            Command::SetRenderPipeline(pipeline) => {
                self.binder.change_layout(pipeline.layout());
                self.vertex.on_set_pipeline(pipeline);
                self.index.on_set_pipeline(pipeline);
                if !self.pipeline.set_and_check_redundant(pipeline.raw()) {
                    ctx.list.set_render_pipeline(pipeline.raw());
                }
            }
            Command::SetBindGroup {
                index,
                group,
                dynamic_offset_count,
            } => {
                let offsets = cursor.take_dynamic_offsets(*dynamic_offset_count);
                self.binder.set_group(*index, group, offsets);
            }
            Command::SetIndexBuffer {
                buffer,
                offset,
                size,
            } => {
                self.index.on_set_index_buffer(buffer, *offset, *size);
            }
            Command::SetVertexBuffer {
                slot,
                buffer,
                offset,
                size,
            } => {
                self.vertex.on_set_vertex_buffer(*slot, buffer, *offset, *size);
            }
            Command::SetViewport(viewport) => ctx.list.set_viewport(*viewport),
            Command::SetScissorRect(rect) => ctx.list.set_scissor_rect(*rect),
            Command::SetBlendConstant(color) => ctx.list.set_blend_constant(*color),
            Command::SetStencilReference(reference) => {
                ctx.list.set_stencil_reference(*reference)
            }
            Command::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => {
                self.flush_draw_state(ctx, false);
                ctx.list
                    .draw(*vertex_count, *instance_count, *first_vertex, *first_instance);
            }
            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                base_vertex,
                first_instance,
            } => {
                self.flush_draw_state(ctx, true);
                ctx.list.draw_indexed(
                    *index_count,
                    *instance_count,
                    *first_index,
                    *base_vertex,
                    *first_instance,
                );
            }
            Command::DrawIndirect { buffer, offset } => {
                self.flush_draw_state(ctx, false);
                ctx.list.draw_indirect(buffer.raw(), *offset, false);
            }
            Command::DrawIndexedIndirect { buffer, offset } => {
                self.flush_draw_state(ctx, true);
                ctx.list.draw_indirect(buffer.raw(), *offset, true);
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
            _ => unreachable!("command not valid inside a render pass"),
        }
    }
}

fn effective_load(view: &TextureView, load: LoadOp) -> LoadOp {
    if load == LoadOp::Load && !view.texture.init().is_initialized(&view.range) {
        LoadOp::Clear
    } else {
        load
    }
}

fn resolve_attachments(
    desc: &RenderPassDescriptor,
    usage: &PassResourceUsage,
    native_pass: bool,
) -> ResolvedPass {
    let storage_writes = usage
        .buffers
        .iter()
        .any(|(_, uses)| uses.contains(crate::resource::BufferUses::STORAGE_READ_WRITE))
        || usage
            .textures
            .iter()
            .any(|(_, _, uses)| uses.contains(TextureUses::STORAGE_READ_WRITE));
    let mut resolved = ResolvedPass {
        colors: Default::default(),
        depth_stencil: None,
        width: desc.width,
        height: desc.height,
        sample_count: desc.sample_count,
        has_storage_writes: storage_writes,
    };
    for color in &desc.colors {
        let load = effective_load(&color.view, color.load);
        let clear_value = if load != color.load {
            // Upgraded load: the content is undefined, clear it to zero.
            Color::TRANSPARENT
        } else {
            color.clear_value
        };
        resolved.colors.push(ResolvedColorAttachment {
            view: color.view.raw,
            load,
            store: color.store,
            clear_value,
            // Emulated resolves run after the pass instead.
            resolve_target: if native_pass {
                color.resolve_target.as_ref().map(|target| target.raw)
            } else {
                None
            },
        });
    }
    if let Some(ds) = &desc.depth_stencil {
        let load = effective_load(&ds.view, ds.depth_load);
        let stencil_load = effective_load(&ds.view, ds.stencil_load);
        let upgraded = load != ds.depth_load || stencil_load != ds.stencil_load;
        resolved.depth_stencil = Some(ResolvedDepthStencilAttachment {
            view: ds.view.raw,
            depth_load: load,
            depth_store: ds.depth_store,
            clear_depth: if upgraded { 0.0 } else { ds.clear_depth },
            stencil_load,
            stencil_store: ds.stencil_store,
            clear_stencil: if upgraded { 0 } else { ds.clear_stencil },
        });
    }
    resolved
}

/// Settles every resource the pass touches: lazy clears for undefined
/// content the pass will read, then the whole transition batch at once.
pub(super) fn prepare_pass_resources<B: Backend, D: FencedDeleter>(
    usage: &PassResourceUsage,
    ctx: &mut RecordContext<B, D>,
    tracker: &mut BarrierTracker,
) {
    for (texture, range, uses) in &usage.textures {
        // Attachments settle their content through load and store
        // operations instead of an upfront clear.
        if !uses.intersects(TextureUses::ATTACHMENT) {
            ensure_texture_initialized(texture, range, tracker, &mut ctx.list);
        }
    }
    for (buffer, uses) in &usage.buffers {
        tracker.require_buffer(buffer, *uses);
    }
    for (texture, range, uses) in &usage.textures {
        tracker.require_texture(texture, range, *uses);
    }
    tracker.flush(&mut ctx.list);
}

pub(super) fn record_render_pass<B: Backend, D: FencedDeleter>(
    desc: &RenderPassDescriptor,
    usage: &PassResourceUsage,
    cursor: &mut CommandCursor<'_>,
    ctx: &mut RecordContext<B, D>,
    tracker: &mut BarrierTracker,
) {
    profiling::scope!("record_render_pass");
    prepare_pass_resources(usage, ctx, tracker);

    let resolved = resolve_attachments(desc, usage, B::NATIVE_RENDER_PASS);
    let attachments = ctx.list.assemble_attachment_group(&resolved);

    if B::NATIVE_RENDER_PASS {
        ctx.list.begin_render_pass(&resolved, attachments);
    } else {
        ctx.list.bind_attachments(attachments);
        for color in &resolved.colors {
            if color.load == LoadOp::Clear {
                ctx.list
                    .clear_attachment(color.view, ClearValue::Color(color.clear_value));
            }
        }
        if let Some(ds) = &resolved.depth_stencil {
            let mut aspects = FormatAspects::empty();
            if ds.depth_load == LoadOp::Clear {
                aspects |= FormatAspects::DEPTH;
            }
            if ds.stencil_load == LoadOp::Clear {
                aspects |= FormatAspects::STENCIL;
            }
            // Clearing only the named aspects keeps loaded content in the
            // other one intact.
            if !aspects.is_empty() {
                ctx.list.clear_attachment(
                    ds.view,
                    ClearValue::DepthStencil {
                        depth: ds.clear_depth,
                        stencil: ds.clear_stencil,
                        aspects,
                    },
                );
            }
        }
    }

    // Dynamic state the stream is allowed to leave untouched.
    ctx.list.set_viewport(Viewport {
        x: 0.0,
        y: 0.0,
        w: desc.width as f32,
        h: desc.height as f32,
        depth_min: 0.0,
        depth_max: 1.0,
    });
    ctx.list.set_scissor_rect(Rect {
        x: 0,
        y: 0,
        w: desc.width,
        h: desc.height,
    });
    ctx.list.set_blend_constant(Color::TRANSPARENT);
    ctx.list.set_stencil_reference(0);

    let mut state = RenderState::new();
    loop {
        let command = cursor
            .next()
            .expect("render pass not terminated");
        match command {
            Command::EndRenderPass => break,
            Command::ExecuteBundles { bundle_count } => {
                for bundle in cursor.take_bundles(*bundle_count) {
                    trace!("executing render bundle inline");
                    let mut bundle_cursor = bundle.stream.cursor();
                    while let Some(command) = bundle_cursor.next() {
                        state.encode(command, &mut bundle_cursor, ctx);
                    }
                }
            }
            _ => state.encode(command, cursor, ctx),
        }
    }

    if B::NATIVE_RENDER_PASS {
        ctx.list.end_render_pass();
    } else {
        for color in &desc.colors {
            if let Some(target) = &color.resolve_target {
                tracker.require_texture(
                    &color.view.texture,
                    &color.view.range,
                    TextureUses::RESOLVE_SRC,
                );
                tracker.require_texture(&target.texture, &target.range, TextureUses::RESOLVE_DST);
                tracker.flush(&mut ctx.list);
                ctx.list.resolve_texture(
                    color.view.texture.raw(),
                    color.view.range.clone(),
                    target.texture.raw(),
                    target.range.clone(),
                );
            }
        }
    }

    // Store operations decide what holds defined content afterwards.
    for color in &desc.colors {
        color
            .view
            .texture
            .init()
            .set_initialized(&color.view.range, color.store == StoreOp::Store);
        if let Some(target) = &color.resolve_target {
            target.texture.init().set_initialized(&target.range, true);
        }
    }
    if let Some(ds) = &desc.depth_stencil {
        let kept = ds.depth_store == StoreOp::Store && ds.stencil_store == StoreOp::Store;
        ds.view.texture.init().set_initialized(&ds.view.range, kept);
    }

    ctx.deleter
        .delete_when_unused(Transient::AttachmentGroup(attachments));
}
