//! Bind group state tracking.
//!
//! The binder remembers which group sits in each slot, which slots need
//! native work at the next draw or dispatch, and the realized descriptor
//! location of every bound group. Two dirty bits per slot keep the work
//! minimal: `content` means the group itself changed and must be realized
//! and rebound, `offsets` means only its dynamic offsets did and the
//! existing realization can be rebound as-is.
//!
//! On bounded-heap backends realization can exhaust the shader-visible
//! heap mid pass. The binder then switches to a fresh heap generation,
//! re-dirties every bound slot (all their realizations just went stale),
//! rebinds the heaps, and realizes again. A second failure means a single
//! pipeline layout's worth of groups exceeds heap capacity, which the
//! frontend's limits rule out.

use std::sync::Arc;

use log::trace;
use smallvec::SmallVec;

use crate::{
    binding_model::{BindGroup, PipelineLayout},
    hal::{
        Backend, BindPoint, CommandList, DescriptorAllocator, FencedDeleter, Realized,
        RecordContext, Transient,
    },
    track::BarrierTracker,
    DynamicOffset, MAX_BIND_GROUPS,
};

#[derive(Debug, Default)]
struct Slot {
    group: Option<Arc<BindGroup>>,
    offsets: SmallVec<[DynamicOffset; 4]>,
    realized: Option<Realized>,
    dirty_content: bool,
    dirty_offsets: bool,
}

#[derive(Debug)]
pub(crate) struct Binder {
    slots: [Slot; MAX_BIND_GROUPS],
    layout: Option<Arc<PipelineLayout>>,
}

impl Binder {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            layout: None,
        }
    }

    /// Tracks a `SetBindGroup`. Rebinding the same group is a no-op unless
    /// it carries dynamic offsets, in which case only the offsets are
    /// reapplied.
    pub fn set_group(&mut self, index: u32, group: &Arc<BindGroup>, offsets: &[DynamicOffset]) {
        let slot = &mut self.slots[index as usize];
        let same_group = slot
            .group
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(bound, group));
        if same_group {
            if !offsets.is_empty() {
                slot.offsets.clear();
                slot.offsets.extend_from_slice(offsets);
                slot.dirty_offsets = true;
            }
            return;
        }
        slot.group = Some(group.clone());
        slot.offsets.clear();
        slot.offsets.extend_from_slice(offsets);
        slot.realized = None;
        slot.dirty_content = true;
        slot.dirty_offsets = false;
    }

    /// Tracks a pipeline change. Slots whose expected group layout differs
    /// between the old and new pipeline layout must be rebound.
    pub fn change_layout(&mut self, new: &Arc<PipelineLayout>) {
        if let Some(old) = &self.layout {
            if Arc::ptr_eq(old, new) {
                return;
            }
            let old_ids = old.layout_ids();
            for (index, id) in new.layout_ids().iter().enumerate() {
                if old_ids.get(index) != Some(id) {
                    self.slots[index].dirty_content = true;
                }
            }
        } else {
            for index in 0..new.group_count() {
                self.slots[index].dirty_content = true;
            }
        }
        self.layout = Some(new.clone());
    }

    fn dirty_all_bound(&mut self) {
        for slot in &mut self.slots {
            if slot.group.is_some() {
                slot.realized = None;
                slot.dirty_content = true;
            }
        }
    }

    /// Realizes every dirty slot in the current layout. Returns false on
    /// descriptor exhaustion, leaving already-realized slots valid.
    fn try_realize_dirty<A: DescriptorAllocator>(&mut self, descriptors: &mut A) -> bool {
        let count = match &self.layout {
            Some(layout) => layout.group_count(),
            None => return true,
        };
        for slot in &mut self.slots[..count] {
            if !slot.dirty_content {
                continue;
            }
            let group = match &slot.group {
                Some(group) => group,
                None => continue,
            };
            match descriptors.try_realize(group) {
                Ok(realized) => slot.realized = Some(realized),
                Err(_) => return false,
            }
        }
        true
    }

    /// Realizes and binds everything a draw or dispatch needs.
    ///
    /// When `hazards` is given, every bound group's read-write storage
    /// buffers get a hazard barrier so unordered writes from the previous
    /// dispatch are visible; the caller flushes the tracker.
    pub fn apply<B: Backend, D: FencedDeleter>(
        &mut self,
        point: BindPoint,
        ctx: &mut RecordContext<B, D>,
        mut hazards: Option<&mut BarrierTracker>,
    ) {
        if !self.try_realize_dirty(&mut ctx.descriptors) {
            debug_assert!(B::BOUNDED_DESCRIPTOR_HEAPS);
            let stale = ctx.descriptors.generation();
            ctx.descriptors.switch_generation();
            ctx.deleter
                .delete_when_unused(Transient::DescriptorGeneration(stale));
            ctx.list.bind_descriptor_heaps(ctx.descriptors.native_heaps());
            // Every realization referenced the retired generation.
            self.dirty_all_bound();
            let ok = self.try_realize_dirty(&mut ctx.descriptors);
            assert!(
                ok,
                "bind groups of one pipeline layout exceed descriptor heap capacity"
            );
            trace!("re-realized all bound groups after heap switch");
        }

        let count = match &self.layout {
            Some(layout) => layout.group_count(),
            None => return,
        };
        for (index, slot) in self.slots[..count].iter_mut().enumerate() {
            let group = match &slot.group {
                Some(group) => group,
                None => continue,
            };
            if let Some(tracker) = hazards.as_deref_mut() {
                for buffer in group.storage_buffers() {
                    tracker.require_storage_buffer(buffer);
                }
            }
            if slot.dirty_content || slot.dirty_offsets {
                let realized = slot
                    .realized
                    .expect("bound group realized before binding");
                ctx.list
                    .set_bind_group(point, index as u32, realized, &slot.offsets);
                slot.dirty_content = false;
                slot.dirty_offsets = false;
            }
        }
    }
}
