//! Copy commands. Each copy transitions both sides immediately (copies
//! happen outside passes, so there is no batch to join) and keeps the
//! texture initialization bookkeeping honest: reads force initialization,
//! and a write that covers a whole subresource skips the zero-fill and
//! just marks it valid.

use crate::{
    hal::{
        Backend, BufferTextureLayout, CommandList, FencedDeleter, RecordContext, TextureCopyBase,
    },
    resource::{BufferUses, TextureUses},
    track::BarrierTracker,
    Extent3d, Origin3d, SubresourceRange,
};

use super::{BufferCopyView, Command, TextureCopyView};

fn buffer_layout(view: &BufferCopyView) -> BufferTextureLayout {
    BufferTextureLayout {
        offset: view.offset,
        bytes_per_row: view.bytes_per_row,
        rows_per_image: view.rows_per_image,
    }
}

fn texture_base(view: &TextureCopyView) -> TextureCopyBase {
    TextureCopyBase {
        mip_level: view.mip_level,
        array_layer: view.array_layer,
        origin: view.origin,
    }
}

fn is_full_subresource_write(view: &TextureCopyView, extent: &Extent3d) -> bool {
    view.origin == Origin3d::default() && view.texture.is_full_copy_dst(view.mip_level, extent)
}

/// Initialization handling for the destination subresource of a copy:
/// a covering write marks it valid without clearing, a partial write into
/// undefined content zero-fills first so the untouched parts are defined.
fn prepare_copy_dst<L: CommandList>(
    view: &TextureCopyView,
    extent: &Extent3d,
    tracker: &mut BarrierTracker,
    list: &mut L,
) {
    let range = SubresourceRange::single(view.mip_level, view.array_layer);
    if is_full_subresource_write(view, extent) {
        view.texture.init().set_initialized(&range, true);
    } else {
        super::clear::ensure_texture_initialized(&view.texture, &range, tracker, list);
    }
}

pub(crate) fn record_copy<B: Backend, D: FencedDeleter>(
    command: &Command,
    ctx: &mut RecordContext<B, D>,
    tracker: &mut BarrierTracker,
) {
    match command {
        Command::CopyBufferToBuffer {
            src,
            src_offset,
            dst,
            dst_offset,
            size,
        } => {
            debug_assert!(src_offset + size <= src.size());
            debug_assert!(dst_offset + size <= dst.size());
            tracker.require_buffer_now(&mut ctx.list, src, BufferUses::COPY_SRC);
            tracker.require_buffer_now(&mut ctx.list, dst, BufferUses::COPY_DST);
            ctx.list
                .copy_buffer_to_buffer(src.raw(), *src_offset, dst.raw(), *dst_offset, *size);
        }
        Command::CopyBufferToTexture { src, dst, extent } => {
            prepare_copy_dst(dst, extent, tracker, &mut ctx.list);
            let range = SubresourceRange::single(dst.mip_level, dst.array_layer);
            tracker.require_buffer_now(&mut ctx.list, &src.buffer, BufferUses::COPY_SRC);
            tracker.require_texture_now(&mut ctx.list, &dst.texture, &range, TextureUses::COPY_DST);
            ctx.list.copy_buffer_to_texture(
                src.buffer.raw(),
                buffer_layout(src),
                dst.texture.raw(),
                texture_base(dst),
                *extent,
            );
        }
        Command::CopyTextureToBuffer { src, dst, extent } => {
            let range = SubresourceRange::single(src.mip_level, src.array_layer);
            super::clear::ensure_texture_initialized(&src.texture, &range, tracker, &mut ctx.list);
            tracker.require_texture_now(&mut ctx.list, &src.texture, &range, TextureUses::COPY_SRC);
            tracker.require_buffer_now(&mut ctx.list, &dst.buffer, BufferUses::COPY_DST);
            ctx.list.copy_texture_to_buffer(
                src.texture.raw(),
                texture_base(src),
                dst.buffer.raw(),
                buffer_layout(dst),
                *extent,
            );
        }
        Command::CopyTextureToTexture { src, dst, extent } => {
            let src_range = SubresourceRange::single(src.mip_level, src.array_layer);
            super::clear::ensure_texture_initialized(
                &src.texture,
                &src_range,
                tracker,
                &mut ctx.list,
            );
            prepare_copy_dst(dst, extent, tracker, &mut ctx.list);
            let dst_range = SubresourceRange::single(dst.mip_level, dst.array_layer);
            tracker.require_texture_now(&mut ctx.list, &src.texture, &src_range, TextureUses::COPY_SRC);
            tracker.require_texture_now(&mut ctx.list, &dst.texture, &dst_range, TextureUses::COPY_DST);
            ctx.list.copy_texture_to_texture(
                src.texture.raw(),
                texture_base(src),
                dst.texture.raw(),
                texture_base(dst),
                *extent,
            );
        }
        _ => unreachable!("not a copy command"),
    }
}
