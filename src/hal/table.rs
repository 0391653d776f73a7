//! Table binding model: bind groups are realized as contiguous descriptor
//! tables inside a bounded shader-visible heap. The heap can fill up mid
//! stream; the allocator then switches to a fresh generation and the
//! recorder re-realizes everything that was bound.

use log::trace;

use crate::binding_model::BindGroup;

use super::{Backend, CaptureList, DescriptorAllocator, Exhausted, RawHandle, Realized};

/// Bump allocator over a fixed-capacity shader-visible heap.
///
/// A generation is one heap's worth of descriptors. Switching generations
/// abandons the current heap (the caller schedules it for fenced deletion)
/// and starts over at offset zero in a new one.
#[derive(Debug)]
pub struct RingHeapAllocator {
    capacity: u32,
    offset: u32,
    generation: u32,
    heap: RawHandle,
}

impl RingHeapAllocator {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            offset: 0,
            generation: 0,
            heap: RawHandle(0x4EA0_0000),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.capacity - self.offset
    }
}

impl DescriptorAllocator for RingHeapAllocator {
    fn try_realize(&mut self, group: &BindGroup) -> Result<Realized, Exhausted> {
        let count = group.descriptor_count();
        if count > self.remaining() {
            trace!(
                "descriptor heap exhausted: need {}, {} left of {}",
                count,
                self.remaining(),
                self.capacity
            );
            return Err(Exhausted);
        }
        let base_index = self.offset;
        self.offset += count;
        Ok(Realized {
            generation: self.generation,
            base_index,
        })
    }

    fn switch_generation(&mut self) -> u32 {
        self.generation += 1;
        self.offset = 0;
        self.heap = RawHandle(0x4EA0_0000 + u64::from(self.generation));
        trace!("switched to descriptor heap generation {}", self.generation);
        self.generation
    }

    fn generation(&self) -> u32 {
        self.generation
    }

    fn native_heaps(&self) -> RawHandle {
        self.heap
    }
}

/// Backend family with descriptor tables in bounded shader-visible heaps
/// and no native render pass primitive.
#[derive(Debug)]
pub enum TableModel {}

impl Backend for TableModel {
    type List = CaptureList;
    type Descriptors = RingHeapAllocator;

    const NAME: &'static str = "table";
    const NATIVE_RENDER_PASS: bool = false;
    const BOUNDED_DESCRIPTOR_HEAPS: bool = true;
}
