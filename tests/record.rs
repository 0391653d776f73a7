//! End-to-end replay tests: build a stream, record it against both
//! binding models, and assert on the exact native instruction sequences.

use std::sync::Arc;

use arrayvec::ArrayVec;

use gpu_replay::{
    binding_model::{BindGroup, PipelineLayout},
    command::{
        ColorAttachment, Command, CommandRecorder, CommandStream, DepthStencilAttachment,
        PassResourceUsage, RecordError, RenderPassDescriptor, TextureCopyView,
    },
    hal::{
        CaptureList, ClearValue, DeletionQueue, DescriptorPoolAllocator, Instr, RawHandle,
        RecordContext, RingHeapAllocator, SetModel, TableModel, Transient,
    },
    pipeline::{RayTracingPipeline, RenderPipeline, VertexStep},
    resource::{
        AccelerationContainer, Buffer, BufferUses, ContainerLevel, FormatAspects, Texture,
        TextureDescriptor, TextureUses, TextureView,
    },
    Color, Extent3d, IndexFormat, LoadOp, Origin3d, StoreOp, SubresourceRange,
};

fn table_ctx(heap_capacity: u32) -> RecordContext<TableModel, DeletionQueue> {
    RecordContext {
        list: CaptureList::new(),
        descriptors: RingHeapAllocator::new(heap_capacity),
        deleter: DeletionQueue::new(),
    }
}

fn set_ctx() -> RecordContext<SetModel, DeletionQueue> {
    RecordContext {
        list: CaptureList::new(),
        descriptors: DescriptorPoolAllocator::new(),
        deleter: DeletionQueue::new(),
    }
}

fn texture_2d(raw: u64, width: u32, height: u32) -> Arc<Texture> {
    Arc::new(Texture::new(
        RawHandle(raw),
        TextureDescriptor {
            size: Extent3d {
                width,
                height,
                depth: 1,
            },
            mip_level_count: 1,
            array_layer_count: 1,
            sample_count: 1,
            aspects: FormatAspects::COLOR,
        },
    ))
}

fn color_attachment(texture: &Arc<Texture>, load: LoadOp, store: StoreOp) -> ColorAttachment {
    ColorAttachment {
        view: TextureView::new(texture, texture.raw(), SubresourceRange::single(0, 0)),
        resolve_target: None,
        load,
        store,
        clear_value: Color::TRANSPARENT,
    }
}

fn render_pass(
    texture: &Arc<Texture>,
    load: LoadOp,
    store: StoreOp,
) -> (RenderPassDescriptor, PassResourceUsage) {
    let mut colors = ArrayVec::new();
    colors.push(color_attachment(texture, load, store));
    let desc = RenderPassDescriptor {
        colors,
        depth_stencil: None,
        width: texture.desc().size.width,
        height: texture.desc().size.height,
        sample_count: 1,
    };
    let usage = PassResourceUsage {
        buffers: Vec::new(),
        textures: vec![(
            texture.clone(),
            SubresourceRange::single(0, 0),
            TextureUses::COLOR_TARGET,
        )],
    };
    (desc, usage)
}

fn pass_begins(list: &CaptureList) -> usize {
    list.filtered(|i| {
        matches!(
            i,
            Instr::BeginRenderPass { .. } | Instr::BindAttachments(_)
        )
    })
    .len()
}

#[test]
fn load_of_undefined_content_upgrades_to_clear() {
    let texture = texture_2d(1, 16, 16);
    let mut stream = CommandStream::new();
    let (desc, usage) = render_pass(&texture, LoadOp::Load, StoreOp::Store);
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::EndRenderPass);
    let (desc, usage) = render_pass(&texture, LoadOp::Load, StoreOp::Store);
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::EndRenderPass);

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    let loads: Vec<LoadOp> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::BeginRenderPass { desc, .. } => Some(desc.colors[0].load),
            _ => None,
        })
        .collect();
    // Undefined content forces a clear; stored content loads as recorded.
    assert_eq!(loads, vec![LoadOp::Clear, LoadOp::Load]);
}

#[test]
fn discarded_attachment_is_undefined_again() {
    let texture = texture_2d(1, 16, 16);
    let mut stream = CommandStream::new();
    let (desc, usage) = render_pass(&texture, LoadOp::Clear, StoreOp::Discard);
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::EndRenderPass);
    let (desc, usage) = render_pass(&texture, LoadOp::Load, StoreOp::Store);
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::EndRenderPass);

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    let loads: Vec<LoadOp> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::BeginRenderPass { desc, .. } => Some(desc.colors[0].load),
            _ => None,
        })
        .collect();
    assert_eq!(loads, vec![LoadOp::Clear, LoadOp::Clear]);
}

#[test]
fn emulated_pass_clears_and_resolves_explicitly() {
    let msaa = Arc::new(Texture::new(
        RawHandle(1),
        TextureDescriptor {
            size: Extent3d {
                width: 16,
                height: 16,
                depth: 1,
            },
            mip_level_count: 1,
            array_layer_count: 1,
            sample_count: 4,
            aspects: FormatAspects::COLOR,
        },
    ));
    let single = texture_2d(2, 16, 16);

    let mut colors = ArrayVec::new();
    colors.push(ColorAttachment {
        view: TextureView::new(&msaa, msaa.raw(), SubresourceRange::single(0, 0)),
        resolve_target: Some(TextureView::new(
            &single,
            single.raw(),
            SubresourceRange::single(0, 0),
        )),
        load: LoadOp::Clear,
        store: StoreOp::Discard,
        clear_value: Color::TRANSPARENT,
    });
    let desc = RenderPassDescriptor {
        colors,
        depth_stencil: None,
        width: 16,
        height: 16,
        sample_count: 4,
    };
    let usage = PassResourceUsage {
        buffers: Vec::new(),
        textures: vec![(
            msaa.clone(),
            SubresourceRange::single(0, 0),
            TextureUses::COLOR_TARGET,
        )],
    };

    let mut stream = CommandStream::new();
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::EndRenderPass);

    let mut ctx = table_ctx(64);
    CommandRecorder::<TableModel>::record(&stream, &mut ctx).unwrap();

    assert!(ctx
        .list
        .filtered(|i| matches!(i, Instr::BeginRenderPass { .. }))
        .is_empty());
    assert_eq!(
        ctx.list
            .filtered(|i| matches!(i, Instr::BindAttachments(_)))
            .len(),
        1
    );
    assert_eq!(
        ctx.list
            .filtered(|i| matches!(i, Instr::ClearAttachment { .. }))
            .len(),
        1
    );
    let resolves = ctx
        .list
        .filtered(|i| matches!(i, Instr::ResolveTexture { .. }));
    match resolves[..] {
        [Instr::ResolveTexture { src, dst, .. }] => {
            assert_eq!(*src, RawHandle(1));
            assert_eq!(*dst, RawHandle(2));
        }
        _ => panic!("expected exactly one resolve"),
    }
    // The attachment group is handed to the fenced deleter.
    assert!(ctx
        .deleter
        .pending
        .iter()
        .any(|t| matches!(t, Transient::AttachmentGroup(_))));
}

#[test]
fn pass_transitions_are_batched_and_minimal() {
    let texture = texture_2d(1, 8, 8);
    // Mark the texture initialized so no lazy clear interferes.
    let (desc, usage) = render_pass(&texture, LoadOp::Clear, StoreOp::Store);
    let mut stream = CommandStream::new();
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::EndRenderPass);
    // Two compute passes sampling it; only the first needs a transition.
    for _ in 0..2 {
        stream.push(Command::BeginComputePass {
            usage: PassResourceUsage {
                buffers: Vec::new(),
                textures: vec![(
                    texture.clone(),
                    SubresourceRange::single(0, 0),
                    TextureUses::RESOURCE,
                )],
            },
        });
        stream.push(Command::EndComputePass);
    }

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    let batches: Vec<usize> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::TransitionTextures(barriers) => Some(barriers.len()),
            _ => None,
        })
        .collect();
    // One batch into the attachment state, one into the sampled state,
    // nothing for the second compute pass.
    assert_eq!(batches, vec![1, 1]);
}

#[test]
fn full_subresource_copy_skips_the_zero_fill() {
    let src = texture_2d(1, 8, 8);
    let dst = texture_2d(2, 8, 8);
    let mut stream = CommandStream::new();
    stream.push(Command::CopyTextureToTexture {
        src: TextureCopyView {
            texture: src.clone(),
            mip_level: 0,
            array_layer: 0,
            origin: Origin3d::default(),
        },
        dst: TextureCopyView {
            texture: dst.clone(),
            mip_level: 0,
            array_layer: 0,
            origin: Origin3d::default(),
        },
        extent: Extent3d {
            width: 8,
            height: 8,
            depth: 1,
        },
    });
    // Reading the destination afterwards must not trigger a clear of it.
    stream.push(Command::BeginComputePass {
        usage: PassResourceUsage {
            buffers: Vec::new(),
            textures: vec![(
                dst.clone(),
                SubresourceRange::single(0, 0),
                TextureUses::RESOURCE,
            )],
        },
    });
    stream.push(Command::EndComputePass);

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    let clears: Vec<RawHandle> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::ClearTexture { texture, .. } => Some(*texture),
            _ => None,
        })
        .collect();
    // Only the source is zero-filled before it is read; the covering
    // write defines the destination.
    assert_eq!(clears, vec![RawHandle(1)]);
}

#[test]
fn partial_copy_into_undefined_content_zero_fills_first() {
    let buffer = Arc::new(Buffer::new(RawHandle(1), 1024));
    let dst = texture_2d(2, 8, 8);
    let mut stream = CommandStream::new();
    stream.push(Command::CopyBufferToTexture {
        src: gpu_replay::command::BufferCopyView {
            buffer,
            offset: 0,
            bytes_per_row: 256,
            rows_per_image: 4,
        },
        dst: TextureCopyView {
            texture: dst.clone(),
            mip_level: 0,
            array_layer: 0,
            origin: Origin3d { x: 4, y: 4, z: 0 },
        },
        extent: Extent3d {
            width: 4,
            height: 4,
            depth: 1,
        },
    });

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    let clears = ctx
        .list
        .filtered(|i| matches!(i, Instr::ClearTexture { texture, .. } if *texture == RawHandle(2)));
    assert_eq!(clears.len(), 1);
    // The clear precedes the copy.
    let clear_pos = ctx
        .list
        .instrs
        .iter()
        .position(|i| matches!(i, Instr::ClearTexture { .. }))
        .unwrap();
    let copy_pos = ctx
        .list
        .instrs
        .iter()
        .position(|i| matches!(i, Instr::CopyBufferToTexture { .. }))
        .unwrap();
    assert!(clear_pos < copy_pos);
}

fn draw_pass_stream(
    texture: &Arc<Texture>,
    groups: &[(u32, Arc<BindGroup>)],
    pipeline: &Arc<RenderPipeline>,
) -> CommandStream {
    let mut stream = CommandStream::new();
    let (desc, usage) = render_pass(texture, LoadOp::Clear, StoreOp::Store);
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::SetRenderPipeline(pipeline.clone()));
    for (index, group) in groups {
        stream.set_bind_group(*index, group.clone(), &[]);
    }
    stream.push(Command::Draw {
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
    });
    stream.push(Command::EndRenderPass);
    stream
}

#[test]
fn heap_exhaustion_recovers_with_all_groups_rebound() {
    let texture = texture_2d(1, 4, 4);
    let layout = Arc::new(PipelineLayout::new(&[10, 11]));
    let pipeline = Arc::new(RenderPipeline::new(
        RawHandle(50),
        &layout,
        &[],
        IndexFormat::Uint16,
    ));
    let a = Arc::new(BindGroup::new(10, 4, 0, Vec::new()));
    let b = Arc::new(BindGroup::new(11, 4, 0, Vec::new()));
    let c = Arc::new(BindGroup::new(11, 4, 0, Vec::new()));

    let mut stream = draw_pass_stream(&texture, &[(0, a.clone()), (1, b)], &pipeline);
    // A second pass re-binds both slots; realizing them overflows the
    // 8-slot heap that the first pass filled.
    let (desc, usage) = render_pass(&texture, LoadOp::Load, StoreOp::Store);
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::SetRenderPipeline(pipeline.clone()));
    stream.set_bind_group(0, a, &[]);
    stream.set_bind_group(1, c, &[]);
    stream.push(Command::Draw {
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
    });
    stream.push(Command::EndRenderPass);

    let mut ctx = table_ctx(8);
    CommandRecorder::<TableModel>::record(&stream, &mut ctx).unwrap();

    assert!(ctx
        .deleter
        .pending
        .contains(&Transient::DescriptorGeneration(0)));
    // After the heap switch every bound slot reappears, in the new
    // generation, before the final draw.
    let heap_binds = ctx
        .list
        .filtered(|i| matches!(i, Instr::BindDescriptorHeaps(_)));
    assert_eq!(heap_binds.len(), 2);
    let last_draw = ctx
        .list
        .instrs
        .iter()
        .rposition(|i| matches!(i, Instr::Draw { .. }))
        .unwrap();
    let switch = ctx
        .list
        .instrs
        .iter()
        .rposition(|i| matches!(i, Instr::BindDescriptorHeaps(_)))
        .unwrap();
    let rebound: Vec<(u32, u32)> = ctx.list.instrs[switch..last_draw]
        .iter()
        .filter_map(|i| match i {
            Instr::SetBindGroup { index, group, .. } => Some((*index, group.generation)),
            _ => None,
        })
        .collect();
    assert_eq!(rebound, vec![(0, 1), (1, 1)]);
}

#[test]
fn redundant_bind_group_with_offsets_reapplies_offsets_only() {
    let buffer = Arc::new(Buffer::new(RawHandle(3), 1024));
    let layout = Arc::new(PipelineLayout::new(&[10]));
    let group = Arc::new(BindGroup::new(10, 2, 1, Vec::new()));
    let pipeline = Arc::new(gpu_replay::pipeline::ComputePipeline::new(
        RawHandle(51),
        &layout,
    ));

    let mut stream = CommandStream::new();
    stream.push(Command::BeginComputePass {
        usage: PassResourceUsage {
            buffers: vec![(buffer, BufferUses::UNIFORM)],
            textures: Vec::new(),
        },
    });
    stream.push(Command::SetComputePipeline(pipeline));
    stream.set_bind_group(0, group.clone(), &[0]);
    stream.push(Command::Dispatch([1, 1, 1]));
    stream.set_bind_group(0, group.clone(), &[256]);
    stream.push(Command::Dispatch([1, 1, 1]));
    stream.push(Command::EndComputePass);

    let mut ctx = table_ctx(64);
    CommandRecorder::<TableModel>::record(&stream, &mut ctx).unwrap();

    let binds: Vec<(u32, u32, Vec<u32>)> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::SetBindGroup {
                group,
                dynamic_offsets,
                ..
            } => Some((group.generation, group.base_index, dynamic_offsets.clone())),
            _ => None,
        })
        .collect();
    // Same realization both times; only the offsets change.
    assert_eq!(binds.len(), 2);
    assert_eq!(binds[0].0, binds[1].0);
    assert_eq!(binds[0].1, binds[1].1);
    assert_eq!(binds[0].2, vec![0]);
    assert_eq!(binds[1].2, vec![256]);
}

#[test]
fn storage_writes_get_hazard_barriers_between_dispatches() {
    let storage = Arc::new(Buffer::new(RawHandle(4), 1024));
    let layout = Arc::new(PipelineLayout::new(&[10]));
    let group = Arc::new(BindGroup::new(10, 1, 0, vec![storage.clone()]));
    let pipeline = Arc::new(gpu_replay::pipeline::ComputePipeline::new(
        RawHandle(51),
        &layout,
    ));

    let mut stream = CommandStream::new();
    stream.push(Command::BeginComputePass {
        usage: PassResourceUsage {
            buffers: vec![(storage, BufferUses::STORAGE_READ_WRITE)],
            textures: Vec::new(),
        },
    });
    stream.push(Command::SetComputePipeline(pipeline));
    stream.set_bind_group(0, group, &[]);
    stream.push(Command::Dispatch([1, 1, 1]));
    stream.push(Command::Dispatch([1, 1, 1]));
    stream.push(Command::EndComputePass);

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    let hazards = ctx.list.filtered(|i| {
        matches!(
            i,
            Instr::TransitionBuffers(barriers)
                if barriers.iter().any(|b| b.usage.start == BufferUses::STORAGE_READ_WRITE
                    && b.usage.end == BufferUses::STORAGE_READ_WRITE)
        )
    });
    // One hazard per dispatch: the pass prep already put the buffer in
    // the storage state.
    assert_eq!(hazards.len(), 2);
}

#[test]
fn vertex_rebind_covers_only_the_dirty_range() {
    let texture = texture_2d(1, 4, 4);
    let vertices = Arc::new(Buffer::new(RawHandle(5), 4096));
    let layout = Arc::new(PipelineLayout::new(&[]));
    let steps = [
        Some(VertexStep { stride: 16 }),
        Some(VertexStep { stride: 16 }),
        Some(VertexStep { stride: 16 }),
    ];
    let pipeline = Arc::new(RenderPipeline::new(
        RawHandle(52),
        &layout,
        &steps,
        IndexFormat::Uint16,
    ));

    let mut stream = CommandStream::new();
    let (desc, mut usage) = render_pass(&texture, LoadOp::Clear, StoreOp::Store);
    usage
        .buffers
        .push((vertices.clone(), BufferUses::VERTEX));
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::SetRenderPipeline(pipeline));
    for slot in 0..3 {
        stream.push(Command::SetVertexBuffer {
            slot,
            buffer: vertices.clone(),
            offset: u64::from(slot) * 1024,
            size: 1024,
        });
    }
    stream.push(Command::Draw {
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
    });
    stream.push(Command::SetVertexBuffer {
        slot: 1,
        buffer: vertices.clone(),
        offset: 2048,
        size: 512,
    });
    stream.push(Command::Draw {
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
    });
    stream.push(Command::EndRenderPass);

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    let binds: Vec<(u32, usize)> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::SetVertexBuffers { start_slot, views } => Some((*start_slot, views.len())),
            _ => None,
        })
        .collect();
    assert_eq!(binds, vec![(0, 3), (1, 1)]);
}

#[test]
fn acceleration_container_lifecycle() {
    use gpu_replay::command::AccelerationContainerError;

    let blas = Arc::new(AccelerationContainer::new(
        RawHandle(60),
        ContainerLevel::Bottom,
        false,
        RawHandle(61),
        None,
    ));
    let tlas = Arc::new(AccelerationContainer::new(
        RawHandle(62),
        ContainerLevel::Top,
        true,
        RawHandle(63),
        Some(RawHandle(64)),
    ));

    let mut stream = CommandStream::new();
    stream.push(Command::BuildAccelerationContainer {
        container: blas.clone(),
    });
    stream.push(Command::BuildAccelerationContainer {
        container: tlas.clone(),
    });
    stream.push(Command::UpdateAccelerationContainer {
        container: tlas.clone(),
    });

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    // A barrier separates the bottom-level build from the top-level one
    // that consumes it.
    let positions: Vec<usize> = ctx
        .list
        .instrs
        .iter()
        .enumerate()
        .filter_map(|(pos, i)| match i {
            Instr::BuildAccelerationContainer { .. } | Instr::MemoryBarrier => Some(pos),
            _ => None,
        })
        .collect();
    assert_eq!(positions.len(), 4);
    assert!(matches!(ctx.list.instrs[positions[1]], Instr::MemoryBarrier));
    // The first update releases the build scratch.
    assert!(ctx.deleter.pending.contains(&Transient::Buffer(RawHandle(63))));

    // Rebuilding a built container is a user error.
    let mut stream = CommandStream::new();
    stream.push(Command::BuildAccelerationContainer { container: blas.clone() });
    let err = CommandRecorder::<SetModel>::record(&stream, &mut set_ctx()).unwrap_err();
    assert_eq!(
        err,
        RecordError::AccelerationContainer(AccelerationContainerError::AlreadyBuilt)
    );

    // Updating a container built without update support is too.
    let mut stream = CommandStream::new();
    stream.push(Command::UpdateAccelerationContainer { container: blas });
    let err = CommandRecorder::<SetModel>::record(&stream, &mut set_ctx()).unwrap_err();
    assert_eq!(
        err,
        RecordError::AccelerationContainer(AccelerationContainerError::UpdatesNotAllowed)
    );

    // Updating one that was never built is too.
    let fresh = Arc::new(AccelerationContainer::new(
        RawHandle(70),
        ContainerLevel::Top,
        true,
        RawHandle(71),
        Some(RawHandle(72)),
    ));
    let mut stream = CommandStream::new();
    stream.push(Command::UpdateAccelerationContainer { container: fresh });
    let err = CommandRecorder::<SetModel>::record(&stream, &mut set_ctx()).unwrap_err();
    assert_eq!(
        err,
        RecordError::AccelerationContainer(AccelerationContainerError::NotBuilt)
    );
}

#[test]
fn both_models_replay_the_same_stream() {
    let texture = texture_2d(1, 4, 4);
    let layout = Arc::new(PipelineLayout::new(&[10]));
    let pipeline = Arc::new(RenderPipeline::new(
        RawHandle(50),
        &layout,
        &[],
        IndexFormat::Uint16,
    ));
    let group = Arc::new(BindGroup::new(10, 2, 0, Vec::new()));

    let stream = draw_pass_stream(&texture, &[(0, group)], &pipeline);

    let mut table = table_ctx(64);
    CommandRecorder::<TableModel>::record(&stream, &mut table).unwrap();
    let mut set = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut set).unwrap();

    assert_eq!(pass_begins(&table.list), 1);
    assert_eq!(pass_begins(&set.list), 1);
    assert_eq!(
        set.list.filtered(|i| matches!(i, Instr::EndRenderPass)).len(),
        1
    );
    // Both models draw exactly once with the group bound.
    for list in [&table.list, &set.list] {
        assert_eq!(list.filtered(|i| matches!(i, Instr::Draw { .. })).len(), 1);
        assert_eq!(
            list.filtered(|i| matches!(i, Instr::SetBindGroup { .. })).len(),
            1
        );
    }
}

#[test]
fn bundles_replay_inline_through_pass_state() {
    use gpu_replay::command::RenderBundle;

    let texture = texture_2d(1, 4, 4);
    let layout = Arc::new(PipelineLayout::new(&[10]));
    let pipeline = Arc::new(RenderPipeline::new(
        RawHandle(50),
        &layout,
        &[],
        IndexFormat::Uint16,
    ));
    let group = Arc::new(BindGroup::new(10, 2, 0, Vec::new()));

    let mut bundle_stream = CommandStream::new();
    bundle_stream.push(Command::SetRenderPipeline(pipeline.clone()));
    bundle_stream.set_bind_group(0, group.clone(), &[]);
    bundle_stream.push(Command::Draw {
        vertex_count: 3,
        instance_count: 1,
        first_vertex: 0,
        first_instance: 0,
    });
    let bundle = Arc::new(RenderBundle {
        stream: bundle_stream,
    });

    let mut stream = CommandStream::new();
    let (desc, usage) = render_pass(&texture, LoadOp::Clear, StoreOp::Store);
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.execute_bundles(&[bundle.clone(), bundle]);
    stream.push(Command::EndRenderPass);

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    // Two draws, but shared state: the second bundle's pipeline and group
    // are redundant and not re-emitted.
    assert_eq!(
        ctx.list.filtered(|i| matches!(i, Instr::Draw { .. })).len(),
        2
    );
    assert_eq!(
        ctx.list
            .filtered(|i| matches!(i, Instr::SetRenderPipeline(_)))
            .len(),
        1
    );
    assert_eq!(
        ctx.list
            .filtered(|i| matches!(i, Instr::SetBindGroup { .. }))
            .len(),
        1
    );
}

#[test]
fn emulated_depth_clear_preserves_loaded_stencil() {
    let ds = Arc::new(Texture::new(
        RawHandle(1),
        TextureDescriptor {
            size: Extent3d {
                width: 16,
                height: 16,
                depth: 1,
            },
            mip_level_count: 1,
            array_layer_count: 1,
            sample_count: 1,
            aspects: FormatAspects::DEPTH | FormatAspects::STENCIL,
        },
    ));
    let attachment = |depth_load, stencil_load| DepthStencilAttachment {
        view: TextureView::new(&ds, ds.raw(), SubresourceRange::single(0, 0)),
        depth_load,
        depth_store: StoreOp::Store,
        clear_depth: 1.0,
        stencil_load,
        stencil_store: StoreOp::Store,
        clear_stencil: 7,
    };
    let pass = |depth_load, stencil_load| {
        (
            RenderPassDescriptor {
                colors: ArrayVec::new(),
                depth_stencil: Some(attachment(depth_load, stencil_load)),
                width: 16,
                height: 16,
                sample_count: 1,
            },
            PassResourceUsage {
                buffers: Vec::new(),
                textures: vec![(
                    ds.clone(),
                    SubresourceRange::single(0, 0),
                    TextureUses::DEPTH_STENCIL_WRITE,
                )],
            },
        )
    };

    let mut stream = CommandStream::new();
    let (desc, usage) = pass(LoadOp::Clear, LoadOp::Clear);
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::EndRenderPass);
    // Second pass clears depth but asks to keep the stored stencil.
    let (desc, usage) = pass(LoadOp::Clear, LoadOp::Load);
    stream.push(Command::BeginRenderPass { desc, usage });
    stream.push(Command::EndRenderPass);

    let mut ctx = table_ctx(64);
    CommandRecorder::<TableModel>::record(&stream, &mut ctx).unwrap();

    let aspects: Vec<FormatAspects> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::ClearAttachment {
                value: ClearValue::DepthStencil { aspects, .. },
                ..
            } => Some(*aspects),
            _ => None,
        })
        .collect();
    assert_eq!(
        aspects,
        vec![
            FormatAspects::DEPTH | FormatAspects::STENCIL,
            FormatAspects::DEPTH,
        ]
    );
}

#[test]
fn buffer_copy_transitions_both_sides() {
    let src = Arc::new(Buffer::new(RawHandle(1), 256));
    let dst = Arc::new(Buffer::new(RawHandle(2), 256));
    let mut stream = CommandStream::new();
    stream.push(Command::CopyBufferToBuffer {
        src,
        src_offset: 0,
        dst,
        dst_offset: 64,
        size: 128,
    });

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    let states: Vec<BufferUses> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::TransitionBuffers(barriers) => Some(barriers[0].usage.end),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![BufferUses::COPY_SRC, BufferUses::COPY_DST]);
    assert!(matches!(
        ctx.list.instrs.last(),
        Some(Instr::CopyBufferToBuffer {
            src_offset: 0,
            dst_offset: 64,
            size: 128,
            ..
        })
    ));
}

#[test]
fn ray_pass_traces_with_sbt_and_hazards() {
    let sbt = Arc::new(Buffer::new(RawHandle(80), 4096));
    let storage = Arc::new(Buffer::new(RawHandle(81), 1024));
    let layout = Arc::new(PipelineLayout::new(&[10]));
    let group = Arc::new(BindGroup::new(10, 1, 0, vec![storage.clone()]));
    let pipeline = Arc::new(RayTracingPipeline::new(RawHandle(82), &layout, &sbt));

    let mut stream = CommandStream::new();
    stream.push(Command::BeginRayTracingPass {
        usage: PassResourceUsage {
            buffers: vec![(storage, BufferUses::STORAGE_READ_WRITE)],
            textures: Vec::new(),
        },
    });
    stream.push(Command::SetRayTracingPipeline(pipeline.clone()));
    stream.set_bind_group(0, group, &[]);
    stream.push(Command::TraceRays {
        dimensions: [640, 480, 1],
    });
    stream.push(Command::SetRayTracingPipeline(pipeline));
    stream.push(Command::TraceRays {
        dimensions: [640, 480, 1],
    });
    stream.push(Command::EndRayTracingPass);

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    // The redundant pipeline set is filtered out.
    assert_eq!(
        ctx.list
            .filtered(|i| matches!(i, Instr::SetRayTracingPipeline(_)))
            .len(),
        1
    );
    let traces: Vec<(RawHandle, [u32; 3])> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::TraceRays {
                shader_binding_table,
                dimensions,
            } => Some((*shader_binding_table, *dimensions)),
            _ => None,
        })
        .collect();
    assert_eq!(
        traces,
        vec![(RawHandle(80), [640, 480, 1]), (RawHandle(80), [640, 480, 1])]
    );
    // One storage hazard per trace.
    let hazards = ctx.list.filtered(|i| {
        matches!(
            i,
            Instr::TransitionBuffers(barriers)
                if barriers.iter().any(|b| b.usage.start == BufferUses::STORAGE_READ_WRITE
                    && b.usage.end == BufferUses::STORAGE_READ_WRITE)
        )
    });
    assert_eq!(hazards.len(), 2);
}

#[test]
fn bottom_level_updates_barrier_top_level_updates() {
    let blas = Arc::new(AccelerationContainer::new(
        RawHandle(60),
        ContainerLevel::Bottom,
        true,
        RawHandle(61),
        Some(RawHandle(62)),
    ));
    let tlas = Arc::new(AccelerationContainer::new(
        RawHandle(63),
        ContainerLevel::Top,
        true,
        RawHandle(64),
        Some(RawHandle(65)),
    ));

    let mut stream = CommandStream::new();
    stream.push(Command::BuildAccelerationContainer {
        container: blas.clone(),
    });
    stream.push(Command::BuildAccelerationContainer {
        container: tlas.clone(),
    });
    stream.push(Command::UpdateAccelerationContainer { container: blas });
    stream.push(Command::UpdateAccelerationContainer { container: tlas });

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    let sequence: Vec<bool> = ctx
        .list
        .instrs
        .iter()
        .filter_map(|i| match i {
            Instr::BuildAccelerationContainer { .. } => Some(false),
            Instr::MemoryBarrier => Some(true),
            _ => None,
        })
        .collect();
    // A barrier between the builds and another between the updates.
    assert_eq!(sequence, vec![false, true, false, false, true, false]);
}

#[test]
fn debug_markers_pass_through_everywhere() {
    let mut stream = CommandStream::new();
    stream.push_debug_group("frame");
    stream.push(Command::BeginComputePass {
        usage: PassResourceUsage::default(),
    });
    stream.insert_debug_marker("inside");
    stream.push(Command::EndComputePass);
    stream.pop_debug_group();

    let mut ctx = set_ctx();
    CommandRecorder::<SetModel>::record(&stream, &mut ctx).unwrap();

    assert_eq!(
        ctx.list.instrs,
        vec![
            Instr::BeginDebugGroup("frame".to_string()),
            Instr::InsertDebugMarker("inside".to_string()),
            Instr::EndDebugGroup,
        ]
    );
}
