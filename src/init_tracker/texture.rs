use crate::SubresourceRange;

use super::InitTracker;

/// Initialization state of every (mip, layer) subresource of one texture,
/// flattened as `mip * layer_count + layer` over a linear tracker.
#[derive(Debug)]
pub(crate) struct TextureInitTracker {
    inner: InitTracker,
    layer_count: u32,
}

impl TextureInitTracker {
    pub(crate) fn new(mip_level_count: u32, layer_count: u32) -> Self {
        Self {
            inner: InitTracker::new(mip_level_count * layer_count),
            layer_count,
        }
    }

    fn flat(&self, mip: u32, layer: u32) -> u32 {
        mip * self.layer_count + layer
    }

    /// Whether every subresource in `range` holds defined content.
    pub(crate) fn is_initialized(&self, range: &SubresourceRange) -> bool {
        range.mips.clone().all(|mip| {
            self.inner.is_initialized(
                self.flat(mip, range.layers.start)..self.flat(mip, range.layers.end),
            )
        })
    }

    pub(crate) fn set_initialized(&mut self, range: &SubresourceRange, valid: bool) {
        for mip in range.mips.clone() {
            let span = self.flat(mip, range.layers.start)..self.flat(mip, range.layers.end);
            if valid {
                self.inner.mark_initialized(span);
            } else {
                self.inner.mark_uninitialized(span);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TextureInitTracker;
    use crate::SubresourceRange;

    #[test]
    fn per_subresource_granularity() {
        let mut tracker = TextureInitTracker::new(3, 4);
        assert!(!tracker.is_initialized(&SubresourceRange::single(0, 0)));

        tracker.set_initialized(&SubresourceRange::single(1, 2), true);
        assert!(tracker.is_initialized(&SubresourceRange::single(1, 2)));
        assert!(!tracker.is_initialized(&SubresourceRange::single(1, 1)));
        assert!(!tracker.is_initialized(&SubresourceRange::single(0, 2)));

        tracker.set_initialized(
            &SubresourceRange {
                mips: 0..3,
                layers: 0..4,
            },
            true,
        );
        assert!(tracker.is_initialized(&SubresourceRange {
            mips: 0..3,
            layers: 0..4,
        }));

        tracker.set_initialized(&SubresourceRange::single(2, 3), false);
        assert!(!tracker.is_initialized(&SubresourceRange {
            mips: 2..3,
            layers: 0..4,
        }));
        assert!(tracker.is_initialized(&SubresourceRange {
            mips: 0..2,
            layers: 0..4,
        }));
    }
}
