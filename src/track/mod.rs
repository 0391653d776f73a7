/*! Resource state transitions.
 *
 *  Passes declare everything they use up front, so transitions are batched:
 *  `require_*` calls accumulate barriers against the authoritative state
 *  each resource carries, and one `flush` hands them to the command list as
 *  a single buffer batch and a single texture batch. Copy commands use the
 *  same tracker, one flush per copy.
 */

mod texture;

pub(crate) use texture::TextureStateSet;

use crate::{
    hal::{BufferBarrier, CommandList, TextureBarrier},
    resource::{Buffer, BufferUses, Texture, TextureUses},
    SubresourceRange,
};

#[derive(Debug, Default)]
pub struct BarrierTracker {
    buffers: Vec<BufferBarrier>,
    textures: Vec<TextureBarrier>,
}

impl BarrierTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `buffer` to be usable as `new` from here on. No barrier is
    /// recorded when the buffer is already in that state.
    pub fn require_buffer(&mut self, buffer: &Buffer, new: BufferUses) {
        let old = buffer.swap_state(new);
        if old != new {
            self.buffers.push(BufferBarrier {
                buffer: buffer.raw(),
                usage: old..new,
            });
        }
    }

    /// Like [`require_buffer`](Self::require_buffer) for read-write storage
    /// use, but also orders back-to-back unordered writes: a buffer already
    /// in the storage state still gets a hazard barrier.
    pub fn require_storage_buffer(&mut self, buffer: &Buffer) {
        let old = buffer.swap_state(BufferUses::STORAGE_READ_WRITE);
        self.buffers.push(BufferBarrier {
            buffer: buffer.raw(),
            usage: old..BufferUses::STORAGE_READ_WRITE,
        });
    }

    pub fn require_texture(&mut self, texture: &Texture, range: &SubresourceRange, new: TextureUses) {
        texture
            .state()
            .transition(texture.raw(), range, new, &mut self.textures);
    }

    /// Immediate transition for commands outside passes, where there is
    /// no batch to join.
    pub fn require_buffer_now<L: CommandList>(
        &mut self,
        list: &mut L,
        buffer: &Buffer,
        new: BufferUses,
    ) {
        self.require_buffer(buffer, new);
        self.flush(list);
    }

    pub fn require_texture_now<L: CommandList>(
        &mut self,
        list: &mut L,
        texture: &Texture,
        range: &SubresourceRange,
        new: TextureUses,
    ) {
        self.require_texture(texture, range, new);
        self.flush(list);
    }

    /// Emits everything accumulated since the last flush, one batch per
    /// resource kind.
    pub fn flush<L: CommandList>(&mut self, list: &mut L) {
        if !self.buffers.is_empty() {
            list.transition_buffers(&self.buffers);
            self.buffers.clear();
        }
        if !self.textures.is_empty() {
            list.transition_textures(&self.textures);
            self.textures.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{CaptureList, Instr, RawHandle};

    #[test]
    fn redundant_buffer_state_is_elided() {
        let buffer = Buffer::new(RawHandle(1), 256);
        let mut tracker = BarrierTracker::new();
        let mut list = CaptureList::new();

        tracker.require_buffer(&buffer, BufferUses::COPY_SRC);
        tracker.require_buffer(&buffer, BufferUses::COPY_SRC);
        tracker.flush(&mut list);

        assert_eq!(
            list.instrs,
            vec![Instr::TransitionBuffers(vec![BufferBarrier {
                buffer: RawHandle(1),
                usage: BufferUses::empty()..BufferUses::COPY_SRC,
            }])]
        );
    }

    #[test]
    fn storage_hazard_always_emits() {
        let buffer = Buffer::new(RawHandle(2), 256);
        let mut tracker = BarrierTracker::new();
        let mut list = CaptureList::new();

        tracker.require_storage_buffer(&buffer);
        tracker.require_storage_buffer(&buffer);
        tracker.flush(&mut list);

        match &list.instrs[0] {
            Instr::TransitionBuffers(barriers) => {
                assert_eq!(barriers.len(), 2);
                assert_eq!(
                    barriers[1].usage,
                    BufferUses::STORAGE_READ_WRITE..BufferUses::STORAGE_READ_WRITE
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn flush_batches_once() {
        let a = Buffer::new(RawHandle(3), 16);
        let b = Buffer::new(RawHandle(4), 16);
        let mut tracker = BarrierTracker::new();
        let mut list = CaptureList::new();

        tracker.require_buffer(&a, BufferUses::VERTEX);
        tracker.require_buffer(&b, BufferUses::INDEX);
        tracker.flush(&mut list);
        tracker.flush(&mut list);

        assert_eq!(list.instrs.len(), 1);
    }
}
