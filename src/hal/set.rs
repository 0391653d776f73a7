//! Set binding model: bind groups are realized as descriptor sets from a
//! pool that grows on demand. Realization cannot run out of space, so the
//! recorder never needs the generation-switch recovery path here.

use crate::binding_model::BindGroup;

use super::{Backend, CaptureList, DescriptorAllocator, Exhausted, RawHandle, Realized};

/// Descriptor pool that hands out one set per realization and grows
/// whenever the current pool block is full.
#[derive(Debug)]
pub struct DescriptorPoolAllocator {
    allocated: u32,
}

impl DescriptorPoolAllocator {
    pub fn new() -> Self {
        Self { allocated: 0 }
    }
}

impl Default for DescriptorPoolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorAllocator for DescriptorPoolAllocator {
    fn try_realize(&mut self, _group: &BindGroup) -> Result<Realized, Exhausted> {
        let base_index = self.allocated;
        self.allocated += 1;
        Ok(Realized {
            generation: 0,
            base_index,
        })
    }

    fn switch_generation(&mut self) -> u32 {
        // Pools grow instead of running out; nothing ever asks for this.
        unreachable!("descriptor pools do not exhaust")
    }

    fn generation(&self) -> u32 {
        0
    }

    fn native_heaps(&self) -> RawHandle {
        RawHandle(0)
    }
}

/// Backend family with growing descriptor pools and a native render pass
/// primitive.
#[derive(Debug)]
pub enum SetModel {}

impl Backend for SetModel {
    type List = CaptureList;
    type Descriptors = DescriptorPoolAllocator;

    const NAME: &'static str = "set";
    const NATIVE_RENDER_PASS: bool = true;
    const BOUNDED_DESCRIPTOR_HEAPS: bool = false;
}
