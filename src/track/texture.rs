//! Per-subresource texture state.
//!
//! A texture owns one [`TextureStateSet`] holding the current native usage
//! state of every (mip, layer) subresource. Transitions walk the requested
//! range, coalesce neighbouring subresources that share a state, and push
//! one barrier per coalesced run that actually changes state.

use crate::{
    hal::{RawHandle, TextureBarrier},
    resource::TextureUses,
    SubresourceRange,
};

#[derive(Debug)]
pub(crate) struct TextureStateSet {
    mip_count: u32,
    layer_count: u32,
    /// State per subresource, `mip * layer_count + layer`.
    states: Vec<TextureUses>,
}

impl TextureStateSet {
    pub fn new(mip_count: u32, layer_count: u32) -> Self {
        Self {
            mip_count,
            layer_count,
            states: vec![TextureUses::empty(); (mip_count * layer_count) as usize],
        }
    }

    fn index(&self, mip: u32, layer: u32) -> usize {
        debug_assert!(mip < self.mip_count && layer < self.layer_count);
        (mip * self.layer_count + layer) as usize
    }

    #[cfg(test)]
    pub fn get(&self, mip: u32, layer: u32) -> TextureUses {
        self.states[self.index(mip, layer)]
    }

    /// Moves `range` into `new`, appending the minimal set of barriers.
    ///
    /// Subresources already in `new` produce no barrier. Runs of layers
    /// sharing a previous state collapse into one barrier, and so do
    /// adjacent mips whose barriers come out identical.
    pub fn transition(
        &mut self,
        raw: RawHandle,
        range: &SubresourceRange,
        new: TextureUses,
        out: &mut Vec<TextureBarrier>,
    ) {
        let first = out.len();
        for mip in range.mips.clone() {
            let mut run_start = range.layers.start;
            while run_start < range.layers.end {
                let old = self.states[self.index(mip, run_start)];
                let mut run_end = run_start + 1;
                while run_end < range.layers.end && self.states[self.index(mip, run_end)] == old {
                    run_end += 1;
                }
                for layer in run_start..run_end {
                    let idx = self.index(mip, layer);
                    self.states[idx] = new;
                }
                if old != new {
                    let barrier = TextureBarrier {
                        texture: raw,
                        range: SubresourceRange {
                            mips: mip..mip + 1,
                            layers: run_start..run_end,
                        },
                        usage: old..new,
                    };
                    // Merge with a barrier for the previous mip when the
                    // layer run and state change line up.
                    let mut merged = false;
                    if out.len() > first {
                        if let Some(prev) = out.last_mut() {
                            if prev.usage == barrier.usage
                                && prev.range.layers == barrier.range.layers
                                && prev.range.mips.end == mip
                            {
                                prev.range.mips.end = mip + 1;
                                merged = true;
                            }
                        }
                    }
                    if !merged {
                        out.push(barrier);
                    }
                }
                run_start = run_end;
            }
        }
    }
}
