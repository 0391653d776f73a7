//! Lazy texture initialization.
//!
//! Textures start with undefined content. The first time a command would
//! read a subresource, or write only part of one, the recorder zero-fills
//! it first so no stale memory ever leaks through. The check is coarse: if
//! any part of the range is untouched, the whole range gets one clear.

use log::trace;

use crate::{
    hal::CommandList,
    resource::{Texture, TextureUses},
    track::BarrierTracker,
    SubresourceRange,
};

/// Zero-fills `range` unless it is already fully initialized. Emits at
/// most one clear, preceded by its own transition to the copy-dst state.
pub(crate) fn ensure_texture_initialized<L: CommandList>(
    texture: &Texture,
    range: &SubresourceRange,
    tracker: &mut BarrierTracker,
    list: &mut L,
) {
    if texture.init().is_initialized(range) {
        return;
    }
    trace!(
        "zero-initializing texture {:?} mips {:?} layers {:?}",
        texture.raw(),
        range.mips,
        range.layers
    );
    tracker.require_texture(texture, range, TextureUses::COPY_DST);
    tracker.flush(list);
    list.clear_texture(texture.raw(), range.clone());
    texture.init().set_initialized(range, true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hal::{CaptureList, Instr, RawHandle},
        resource::{FormatAspects, TextureDescriptor},
        Extent3d,
    };

    fn texture() -> Texture {
        Texture::new(
            RawHandle(5),
            TextureDescriptor {
                size: Extent3d {
                    width: 16,
                    height: 16,
                    depth: 1,
                },
                mip_level_count: 2,
                array_layer_count: 1,
                sample_count: 1,
                aspects: FormatAspects::COLOR,
            },
        )
    }

    #[test]
    fn clears_once_then_never_again() {
        let texture = texture();
        let mut tracker = BarrierTracker::new();
        let mut list = CaptureList::new();
        let range = SubresourceRange::single(0, 0);

        ensure_texture_initialized(&texture, &range, &mut tracker, &mut list);
        ensure_texture_initialized(&texture, &range, &mut tracker, &mut list);

        let clears = list.filtered(|i| matches!(i, Instr::ClearTexture { .. }));
        assert_eq!(clears.len(), 1);
        // The other mip is still uninitialized.
        assert!(!texture.init().is_initialized(&SubresourceRange::single(1, 0)));
    }
}
