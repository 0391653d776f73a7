//! Bind groups and pipeline layouts as the replay sees them: opaque,
//! pre-validated bundles of bindings plus the little metadata the binding
//! state tracker needs to realize and barrier them.

use std::sync::Arc;

use arrayvec::ArrayVec;

use crate::{resource::Buffer, MAX_BIND_GROUPS};

/// Identity of a bind group layout; compatible groups share it.
pub type BindGroupLayoutId = u64;

#[derive(Debug)]
pub struct BindGroup {
    layout_id: BindGroupLayoutId,
    /// Shader-visible descriptors this group occupies when realized.
    descriptor_count: u32,
    /// Number of dynamic offsets a `SetBindGroup` of this group carries.
    dynamic_offset_count: usize,
    /// Buffers bound for read-write storage access. Compute and ray
    /// tracing passes emit hazard barriers for these on every apply.
    storage_buffers: Vec<Arc<Buffer>>,
}

impl BindGroup {
    pub fn new(
        layout_id: BindGroupLayoutId,
        descriptor_count: u32,
        dynamic_offset_count: usize,
        storage_buffers: Vec<Arc<Buffer>>,
    ) -> Self {
        Self {
            layout_id,
            descriptor_count,
            dynamic_offset_count,
            storage_buffers,
        }
    }

    pub fn layout_id(&self) -> BindGroupLayoutId {
        self.layout_id
    }

    pub fn descriptor_count(&self) -> u32 {
        self.descriptor_count
    }

    pub fn dynamic_offset_count(&self) -> usize {
        self.dynamic_offset_count
    }

    pub fn storage_buffers(&self) -> &[Arc<Buffer>] {
        &self.storage_buffers
    }
}

#[derive(Debug)]
pub struct PipelineLayout {
    bind_group_layout_ids: ArrayVec<BindGroupLayoutId, MAX_BIND_GROUPS>,
}

impl PipelineLayout {
    pub fn new(bind_group_layout_ids: &[BindGroupLayoutId]) -> Self {
        Self {
            bind_group_layout_ids: bind_group_layout_ids.iter().cloned().collect(),
        }
    }

    pub fn group_count(&self) -> usize {
        self.bind_group_layout_ids.len()
    }

    pub fn layout_ids(&self) -> &[BindGroupLayoutId] {
        &self.bind_group_layout_ids
    }
}
