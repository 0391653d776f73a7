/*! Lazy initialization tracking.
 *
 *  A texture subresource is valid to read only once something has written
 *  or cleared it. Rather than clearing every texture at creation, the
 *  recorder tracks which subresources hold defined content and zero-fills
 *  lazily right before the first read of undefined content.
 *
 *  The underlying structure is a sorted list of uninitialized index ranges
 *  over a linear index space; textures flatten (mip, layer) into it. Most
 *  resources are either fully uninitialized (one range) or fully
 *  initialized (no ranges), so the list is a `SmallVec` of one.
 */

use std::ops::Range;

use smallvec::SmallVec;

mod texture;

pub(crate) use texture::TextureInitTracker;

/// Tracks initialization of a linear `0..size` index space.
#[derive(Clone, Debug)]
pub(crate) struct InitTracker {
    /// Non-overlapping, ascending, non-adjacent uninitialized ranges.
    uninitialized: SmallVec<[Range<u32>; 1]>,
}

impl InitTracker {
    pub(crate) fn new(size: u32) -> Self {
        let mut uninitialized = SmallVec::new();
        if size > 0 {
            uninitialized.push(0..size);
        }
        Self { uninitialized }
    }

    /// Returns the uninitialized subranges overlapping `query`.
    pub(crate) fn check(&self, query: Range<u32>) -> impl Iterator<Item = Range<u32>> + '_ {
        let first = self.uninitialized.partition_point(|r| r.end <= query.start);
        self.uninitialized[first..]
            .iter()
            .take_while(move |r| r.start < query.end)
            .map(move |r| r.start.max(query.start)..r.end.min(query.end))
    }

    pub(crate) fn is_initialized(&self, query: Range<u32>) -> bool {
        self.check(query).next().is_none()
    }

    /// Marks `range` as holding defined content.
    pub(crate) fn mark_initialized(&mut self, range: Range<u32>) {
        if range.start >= range.end {
            return;
        }
        let first = self.uninitialized.partition_point(|r| r.end <= range.start);
        let mut insert = SmallVec::<[Range<u32>; 2]>::new();
        let mut last = first;
        while let Some(r) = self.uninitialized.get(last) {
            if r.start >= range.end {
                break;
            }
            if r.start < range.start {
                insert.push(r.start..range.start);
            }
            if r.end > range.end {
                insert.push(range.end..r.end);
            }
            last += 1;
        }
        self.uninitialized.drain(first..last);
        self.uninitialized.insert_many(first, insert);
    }

    /// Marks `range` as undefined again (content was discarded).
    pub(crate) fn mark_uninitialized(&mut self, range: Range<u32>) {
        if range.start >= range.end {
            return;
        }
        // Collect neighbors that touch or overlap the new range and merge.
        let first = self.uninitialized.partition_point(|r| r.end < range.start);
        let mut merged = range.clone();
        let mut last = first;
        while let Some(r) = self.uninitialized.get(last) {
            if r.start > range.end {
                break;
            }
            merged.start = merged.start.min(r.start);
            merged.end = merged.end.max(r.end);
            last += 1;
        }
        self.uninitialized.drain(first..last);
        self.uninitialized.insert(first, merged);
    }
}

#[cfg(test)]
mod tests {
    use super::InitTracker;

    #[test]
    fn new_tracker_is_fully_uninitialized() {
        let tracker = InitTracker::new(10);
        assert_eq!(tracker.check(0..10).collect::<Vec<_>>(), vec![0..10]);
        assert_eq!(tracker.check(3..4).collect::<Vec<_>>(), vec![3..4]);
    }

    #[test]
    fn mark_initialized_is_monotonic() {
        let mut tracker = InitTracker::new(10);
        tracker.mark_initialized(2..5);
        assert!(tracker.is_initialized(2..5));
        assert_eq!(tracker.check(0..10).collect::<Vec<_>>(), vec![0..2, 5..10]);

        // Re-marking the same range changes nothing.
        tracker.mark_initialized(2..5);
        assert_eq!(tracker.check(0..10).collect::<Vec<_>>(), vec![0..2, 5..10]);

        tracker.mark_initialized(0..10);
        assert!(tracker.is_initialized(0..10));
    }

    #[test]
    fn mark_initialized_splits_ranges() {
        let mut tracker = InitTracker::new(100);
        tracker.mark_initialized(40..60);
        tracker.mark_initialized(10..20);
        assert_eq!(
            tracker.check(0..100).collect::<Vec<_>>(),
            vec![0..10, 20..40, 60..100]
        );
    }

    #[test]
    fn mark_uninitialized_merges_neighbors() {
        let mut tracker = InitTracker::new(10);
        tracker.mark_initialized(0..10);
        tracker.mark_uninitialized(2..4);
        tracker.mark_uninitialized(4..6);
        assert_eq!(tracker.check(0..10).collect::<Vec<_>>(), vec![2..6]);

        tracker.mark_uninitialized(0..2);
        assert_eq!(tracker.check(0..10).collect::<Vec<_>>(), vec![0..6]);
    }

    #[test]
    fn discard_then_reinitialize() {
        let mut tracker = InitTracker::new(8);
        tracker.mark_initialized(0..8);
        tracker.mark_uninitialized(3..5);
        assert!(!tracker.is_initialized(0..8));
        tracker.mark_initialized(3..5);
        assert!(tracker.is_initialized(0..8));
    }
}
