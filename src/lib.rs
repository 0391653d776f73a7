/*! Replay of recorded GPU command streams into native command lists.
 *
 *  This library consumes a pre-validated command stream together with the
 *  per-pass resource usage summary computed by the frontend, and re-records
 *  it into a backend-native command list. Along the way it takes care of
 *  everything the backend does not do by itself:
 *
 *  - resource state transitions, batched per pass;
 *  - translation of bind groups into the backend's binding model
 *    (descriptor tables in a bounded shader-visible heap, or descriptor
 *    sets from an unbounded pool);
 *  - lazy zero-initialization of texture subresources;
 *  - render pass emulation (explicit clears and resolves) on backends
 *    without a native multi-attachment pass primitive.
 *
 *  The stream is replayed strictly in order, single-threaded, with no
 *  validation of its own: malformed input is a defect in the producer and
 *  panics, while the few stateful user errors (acceleration container
 *  lifecycle) surface as typed results.
 */

pub mod binding_model;
pub mod command;
pub mod hal;
mod init_tracker;
pub mod pipeline;
pub mod resource;
pub mod track;

use std::ops::Range;

/// Bind group slots addressable by a pipeline layout.
pub const MAX_BIND_GROUPS: usize = 8;
/// Vertex buffer slots addressable by a render pipeline.
pub const MAX_VERTEX_BUFFERS: usize = 16;
/// Color attachments of a render pass.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

pub type DynamicOffset = u32;
pub type BufferAddress = u64;

/// Double precision color, used for clear values and blend constants.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
}

/// Operation to perform on an attachment at the start of a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOp {
    /// Preserve existing content. Upgraded to `Clear` by the recorder when
    /// the attachment subresource holds no defined content yet.
    Load,
    Clear,
}

/// Operation to perform on an attachment at the end of a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    Discard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub depth_min: f32,
    pub depth_max: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect<T> {
    pub x: T,
    pub y: T,
    pub w: T,
    pub h: T,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Origin3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// A contiguous (mip levels x array layers) slice of a texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubresourceRange {
    pub mips: Range<u32>,
    pub layers: Range<u32>,
}

impl SubresourceRange {
    pub fn single(mip: u32, layer: u32) -> Self {
        Self {
            mips: mip..mip + 1,
            layers: layer..layer + 1,
        }
    }
}
