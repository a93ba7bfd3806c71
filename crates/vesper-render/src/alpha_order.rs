//! Submission-order bookkeeping for alpha-blended geometry.
//!
//! Opaque geometry needs no ordering (depth testing resolves it), but alpha
//! geometry must replay in submission order. Each alpha draw records which
//! bucket and item index it landed in, plus its depth; at flush time,
//! maximal contiguous runs collapse into single GPU draw calls.
//!
//! Merging is legal exactly when bucket and depth are identical and the
//! item indices are contiguous: that is the condition under which GPU draw
//! order inside one call cannot change the blended result.

use crate::types::BucketId;

/// One alpha-blended primitive, in submission order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaEntry {
    pub bucket: BucketId,
    /// Item index within the bucket (pre-flush-layout).
    pub index: u32,
    pub depth: f32,
}

/// A maximal mergeable run of alpha entries: one GPU draw call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaRun {
    pub bucket: BucketId,
    /// First item index within the bucket.
    pub start: u32,
    pub count: u32,
}

/// Records alpha placements between two flushes.
#[derive(Debug, Default)]
pub struct AlphaOrderList {
    entries: Vec<AlphaEntry>,
}

impl AlphaOrderList {
    pub fn new() -> Self {
        AlphaOrderList { entries: Vec::new() }
    }

    pub fn record(&mut self, bucket: BucketId, index: u32, depth: f32) {
        self.entries.push(AlphaEntry { bucket, index, depth });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge entries into draw-call runs, preserving submission order.
    ///
    /// Depth comparison is bitwise: two draws merge only if they were
    /// handed the very same depth value by the cursor.
    pub fn runs(&self) -> impl Iterator<Item = AlphaRun> + '_ {
        RunIter {
            entries: &self.entries,
            pos: 0,
        }
    }

    /// Entries never survive a flush; the indices they hold would dangle.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn reset(&mut self) {
        self.entries = Vec::new();
    }
}

struct RunIter<'a> {
    entries: &'a [AlphaEntry],
    pos: usize,
}

impl Iterator for RunIter<'_> {
    type Item = AlphaRun;

    fn next(&mut self) -> Option<AlphaRun> {
        let first = *self.entries.get(self.pos)?;
        let mut count = 1u32;
        while let Some(entry) = self.entries.get(self.pos + count as usize) {
            let mergeable = entry.bucket == first.bucket
                && entry.depth.to_bits() == first.depth.to_bits()
                && entry.index == first.index + count;
            if !mergeable {
                break;
            }
            count += 1;
        }
        self.pos += count as usize;
        Some(AlphaRun {
            bucket: first.bucket,
            start: first.index,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlendCategory, PrimitiveKind};

    fn bucket(kind: PrimitiveKind) -> BucketId {
        BucketId::new(kind, BlendCategory::Alpha)
    }

    #[test]
    fn contiguous_same_depth_entries_form_one_run() {
        let mut list = AlphaOrderList::new();
        let b = bucket(PrimitiveKind::Sprite);
        for i in 0..5 {
            list.record(b, i, 0.25);
        }
        let runs: Vec<_> = list.runs().collect();
        assert_eq!(runs, vec![AlphaRun { bucket: b, start: 0, count: 5 }]);
    }

    #[test]
    fn depth_change_splits_a_run() {
        let mut list = AlphaOrderList::new();
        let b = bucket(PrimitiveKind::Sprite);
        list.record(b, 0, 0.25);
        list.record(b, 1, 0.25);
        list.record(b, 2, 0.5);
        let runs: Vec<_> = list.runs().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].count, 2);
        assert_eq!(runs[1].start, 2);
    }

    #[test]
    fn bucket_change_splits_a_run() {
        let mut list = AlphaOrderList::new();
        let sprites = bucket(PrimitiveKind::Sprite);
        let lines = bucket(PrimitiveKind::Line);
        list.record(sprites, 0, 0.25);
        list.record(lines, 0, 0.25);
        list.record(sprites, 1, 0.25);
        let runs: Vec<_> = list.runs().collect();
        assert_eq!(runs.len(), 3);
    }

    #[test]
    fn non_contiguous_indices_split_a_run() {
        // Interleaving with another bucket leaves a hole in this bucket's
        // index sequence from the list's point of view.
        let mut list = AlphaOrderList::new();
        let b = bucket(PrimitiveKind::Circle);
        list.record(b, 0, 0.25);
        list.record(b, 2, 0.25);
        let runs: Vec<_> = list.runs().collect();
        assert_eq!(runs.len(), 2);
    }

    #[test]
    fn runs_preserve_submission_order() {
        let mut list = AlphaOrderList::new();
        let sprites = bucket(PrimitiveKind::Sprite);
        let circles = bucket(PrimitiveKind::Circle);
        list.record(circles, 0, 0.1);
        list.record(sprites, 0, 0.2);
        let runs: Vec<_> = list.runs().collect();
        assert_eq!(runs[0].bucket, circles);
        assert_eq!(runs[1].bucket, sprites);
    }
}
