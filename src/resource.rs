//! Buffers, textures and the state they own across recordings.
//!
//! The current usage state of a resource is authoritative across command
//! buffers: it is mutated only by the transition manager while a recording
//! holds the resource, and whatever state a recording leaves behind is the
//! state the next recording starts from.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::{
    hal::RawHandle, init_tracker::TextureInitTracker, track::TextureStateSet, BufferAddress,
    Extent3d, SubresourceRange,
};

bitflags! {
    /// Native usage states a buffer can be transitioned into.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BufferUses: u16 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const INDEX = 1 << 2;
        const VERTEX = 1 << 3;
        const UNIFORM = 1 << 4;
        const STORAGE_READ = 1 << 5;
        const STORAGE_READ_WRITE = 1 << 6;
        const INDIRECT = 1 << 7;
        /// States that modify buffer contents.
        const WRITE = Self::COPY_DST.bits() | Self::STORAGE_READ_WRITE.bits();
    }
}

bitflags! {
    /// Native usage states a texture subresource can be transitioned into.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TextureUses: u16 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const RESOURCE = 1 << 2;
        const COLOR_TARGET = 1 << 3;
        const DEPTH_STENCIL_READ = 1 << 4;
        const DEPTH_STENCIL_WRITE = 1 << 5;
        const STORAGE_READ = 1 << 6;
        const STORAGE_READ_WRITE = 1 << 7;
        const RESOLVE_SRC = 1 << 8;
        const RESOLVE_DST = 1 << 9;
        const WRITE = Self::COPY_DST.bits()
            | Self::COLOR_TARGET.bits()
            | Self::DEPTH_STENCIL_WRITE.bits()
            | Self::STORAGE_READ_WRITE.bits()
            | Self::RESOLVE_DST.bits();
        /// States used when a texture is attached to a render pass.
        const ATTACHMENT = Self::COLOR_TARGET.bits()
            | Self::DEPTH_STENCIL_READ.bits()
            | Self::DEPTH_STENCIL_WRITE.bits();
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FormatAspects: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

#[derive(Debug)]
pub struct Buffer {
    raw: RawHandle,
    size: BufferAddress,
    state: Mutex<BufferUses>,
}

impl Buffer {
    pub fn new(raw: RawHandle, size: BufferAddress) -> Self {
        Self {
            raw,
            size,
            state: Mutex::new(BufferUses::empty()),
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn size(&self) -> BufferAddress {
        self.size
    }

    /// Replaces the tracked state, returning the previous one.
    ///
    /// Only the transition manager calls this.
    pub(crate) fn swap_state(&self, new: BufferUses) -> BufferUses {
        std::mem::replace(&mut *self.state.lock(), new)
    }
}

#[derive(Clone, Debug)]
pub struct TextureDescriptor {
    pub size: Extent3d,
    pub mip_level_count: u32,
    pub array_layer_count: u32,
    pub sample_count: u32,
    pub aspects: FormatAspects,
}

#[derive(Debug)]
pub struct Texture {
    raw: RawHandle,
    desc: TextureDescriptor,
    state: Mutex<TextureStateSet>,
    init: Mutex<TextureInitTracker>,
}

impl Texture {
    pub fn new(raw: RawHandle, desc: TextureDescriptor) -> Self {
        let state = TextureStateSet::new(desc.mip_level_count, desc.array_layer_count);
        let init = TextureInitTracker::new(desc.mip_level_count, desc.array_layer_count);
        Self {
            raw,
            desc,
            state: Mutex::new(state),
            init: Mutex::new(init),
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn desc(&self) -> &TextureDescriptor {
        &self.desc
    }

    /// Extent of the given mip level.
    pub fn mip_extent(&self, mip: u32) -> Extent3d {
        Extent3d {
            width: (self.desc.size.width >> mip).max(1),
            height: (self.desc.size.height >> mip).max(1),
            depth: self.desc.size.depth,
        }
    }

    /// Whether a copy of `extent` into `mip` overwrites the whole
    /// subresource, making a preparatory clear unnecessary.
    pub fn is_full_copy_dst(&self, mip: u32, extent: &Extent3d) -> bool {
        *extent == self.mip_extent(mip)
    }

    pub(crate) fn state(&self) -> parking_lot::MutexGuard<'_, TextureStateSet> {
        self.state.lock()
    }

    pub(crate) fn init(&self) -> parking_lot::MutexGuard<'_, TextureInitTracker> {
        self.init.lock()
    }
}

/// A single-mip (color) or mip-range (depth) view over a texture, used as a
/// render pass attachment or resolve target.
#[derive(Clone, Debug)]
pub struct TextureView {
    pub texture: Arc<Texture>,
    pub raw: RawHandle,
    pub range: SubresourceRange,
}

impl TextureView {
    pub fn new(texture: &Arc<Texture>, raw: RawHandle, range: SubresourceRange) -> Self {
        Self {
            texture: texture.clone(),
            raw,
            range,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerLevel {
    Bottom,
    Top,
}

#[derive(Debug, Default)]
struct ContainerState {
    built: bool,
    updated: bool,
}

/// Ray tracing acceleration container. The build state is the one piece of
/// resource state the upstream validator does not check, so build and
/// update commands validate it here.
#[derive(Debug)]
pub struct AccelerationContainer {
    raw: RawHandle,
    level: ContainerLevel,
    allow_update: bool,
    build_scratch: Mutex<Option<RawHandle>>,
    update_scratch: Option<RawHandle>,
    state: Mutex<ContainerState>,
}

impl AccelerationContainer {
    pub fn new(
        raw: RawHandle,
        level: ContainerLevel,
        allow_update: bool,
        build_scratch: RawHandle,
        update_scratch: Option<RawHandle>,
    ) -> Self {
        Self {
            raw,
            level,
            allow_update,
            build_scratch: Mutex::new(Some(build_scratch)),
            update_scratch,
            state: Mutex::new(ContainerState::default()),
        }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn level(&self) -> ContainerLevel {
        self.level
    }

    pub fn allows_update(&self) -> bool {
        self.allow_update
    }

    pub fn is_built(&self) -> bool {
        self.state.lock().built
    }

    pub(crate) fn mark_built(&self) {
        self.state.lock().built = true;
    }

    pub(crate) fn build_scratch(&self) -> Option<RawHandle> {
        *self.build_scratch.lock()
    }

    pub(crate) fn update_scratch(&self) -> Option<RawHandle> {
        self.update_scratch
    }

    /// Releases the build scratch buffer on the first update. Updates run
    /// off their own scratch, so after one update the build scratch can
    /// only go unused.
    pub(crate) fn take_build_scratch_on_first_update(&self) -> Option<RawHandle> {
        let mut state = self.state.lock();
        if state.built && !state.updated {
            state.updated = true;
            self.build_scratch.lock().take()
        } else {
            None
        }
    }
}
