//! Append-only geometry buckets.
//!
//! One bucket exists per (primitive kind, blend category). A bucket is an
//! untyped arena with a compile-time-known item stride; callers append
//! `Pod` instance structs and the flush controller copies the raw bytes into
//! the shared GPU buffer. Contents are only valid between two flushes.

use bytemuck::Pod;

use crate::types::{BucketId, PrimitiveKind};

/// A typed, append-only arena holding one primitive kind for one blend
/// category.
///
/// Storage is word-backed so items (whose alignment is 4) can be handed out
/// by reference for in-place fill. Capacity grows only by doubling and is
/// retained across logical clears, so steady-state frames allocate nothing.
#[derive(Debug)]
pub struct GeometryBucket {
    id: BucketId,
    stride: usize,
    words: Vec<u32>,
    count: u32,
    /// First item index of this bucket inside the shared GPU buffer,
    /// computed by the flush controller.
    render_start: u32,
}

impl GeometryBucket {
    pub fn new(id: BucketId) -> Self {
        let stride = id.kind.stride();
        debug_assert_eq!(stride % 4, 0);
        GeometryBucket {
            id,
            stride,
            words: Vec::new(),
            count: 0,
            render_start: 0,
        }
    }

    pub fn id(&self) -> BucketId {
        self.id
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.id.kind
    }

    /// Byte size of one item.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of items appended since the last flush.
    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn byte_len(&self) -> usize {
        self.words.len() * 4
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// Append one item by copy.
    pub fn push<T: Pod>(&mut self, item: T) {
        *self.alloc::<T>() = item;
    }

    /// Append a zeroed item and return it for in-place fill.
    pub fn alloc<T: Pod>(&mut self) -> &mut T {
        debug_assert_eq!(size_of::<T>(), self.stride, "item type does not match bucket kind");
        debug_assert!(align_of::<T>() <= 4);
        let item_words = self.stride / 4;
        let offset = self.words.len();
        self.grow_for(item_words);
        self.words.resize(offset + item_words, 0);
        self.count += 1;
        bytemuck::from_bytes_mut(bytemuck::cast_slice_mut(
            &mut self.words[offset..offset + item_words],
        ))
    }

    /// Grow capacity by doubling until `extra` more words fit.
    fn grow_for(&mut self, extra: usize) {
        let needed = self.words.len() + extra;
        if needed <= self.words.capacity() {
            return;
        }
        let mut new_cap = self.words.capacity().max((self.stride / 4) * 16);
        while new_cap < needed {
            new_cap *= 2;
        }
        self.words.reserve_exact(new_cap - self.words.len());
    }

    /// Set by the flush controller once byte layout is known.
    pub fn set_render_start(&mut self, start: u32) {
        self.render_start = start;
    }

    pub fn render_start(&self) -> u32 {
        self.render_start
    }

    /// Logical clear: forget contents, keep the allocation.
    pub fn clear_items(&mut self) {
        self.words.clear();
        self.count = 0;
        self.render_start = 0;
    }

    /// Full teardown, used on device loss.
    pub fn reset(&mut self) {
        self.words = Vec::new();
        self.count = 0;
        self.render_start = 0;
    }
}

/// The fixed set of twelve buckets, indexable by [`BucketId`].
#[derive(Debug)]
pub struct BucketSet {
    buckets: Vec<GeometryBucket>,
}

impl BucketSet {
    pub fn new() -> Self {
        BucketSet {
            buckets: BucketId::all().map(GeometryBucket::new).collect(),
        }
    }

    pub fn get(&self, id: BucketId) -> &GeometryBucket {
        &self.buckets[id.index()]
    }

    pub fn get_mut(&mut self, id: BucketId) -> &mut GeometryBucket {
        &mut self.buckets[id.index()]
    }

    /// Buckets in the fixed layout/draw order (opaque first, kind order).
    pub fn iter(&self) -> impl Iterator<Item = &GeometryBucket> {
        self.buckets.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GeometryBucket> {
        self.buckets.iter_mut()
    }

    pub fn clear_items(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear_items();
        }
    }

    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.reset();
        }
    }
}

impl Default for BucketSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlendCategory, LineInstance, SpriteInstance};

    fn line_bucket() -> GeometryBucket {
        GeometryBucket::new(BucketId::new(PrimitiveKind::Line, BlendCategory::Opaque))
    }

    #[test]
    fn push_and_count() {
        let mut bucket = line_bucket();
        assert!(bucket.is_empty());

        bucket.push(LineInstance {
            start: [0.0, 0.0],
            end: [1.0, 1.0],
            color: [1.0; 4],
            depth: 0.5,
            transform_slot: 0,
        });
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket.byte_len(), PrimitiveKind::Line.stride());
    }

    #[test]
    fn alloc_returns_zeroed_item() {
        let mut bucket = GeometryBucket::new(BucketId::new(
            PrimitiveKind::Sprite,
            BlendCategory::Alpha,
        ));
        let item = bucket.alloc::<SpriteInstance>();
        assert_eq!(item.texture_slot, 0);
        item.texture_slot = 5;
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn clear_keeps_allocation_reset_drops_it() {
        let mut bucket = line_bucket();
        for _ in 0..100 {
            bucket.alloc::<LineInstance>();
        }
        let cap = bucket.words.capacity();
        assert!(cap * 4 >= 100 * bucket.stride());

        bucket.clear_items();
        assert!(bucket.is_empty());
        assert_eq!(bucket.words.capacity(), cap);

        bucket.reset();
        assert_eq!(bucket.words.capacity(), 0);
    }

    #[test]
    fn capacity_doubles() {
        let mut bucket = line_bucket();
        let mut caps = Vec::new();
        for _ in 0..200 {
            bucket.alloc::<LineInstance>();
            if caps.last() != Some(&bucket.words.capacity()) {
                caps.push(bucket.words.capacity());
            }
        }
        for pair in caps.windows(2) {
            assert_eq!(pair[1] % pair[0], 0, "growth must double: {caps:?}");
        }
    }
}
