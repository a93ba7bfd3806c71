//! Bounded, deduplicating resource slot tables.
//!
//! GPU-visible slot arrays (world transforms, textures, palettes, palette
//! remaps) are small; a table maps a resource identity to the next free
//! slot and reports exhaustion instead of growing. Exhaustion is not an
//! error: the flush controller empties every table, after which the same
//! lookup always succeeds. A single draw call never straddles a flush, so
//! slot resolution for one draw is all-or-nothing (see
//! [`crate::pass::ActiveRenderPass`]).

use std::hash::Hash;

use ahash::HashMap;

/// Maximum number of distinct world transforms per flush.
pub const MAX_TRANSFORM_SLOTS: u32 = 1024;
/// Maximum number of distinct textures per flush.
pub const MAX_TEXTURE_SLOTS: u32 = 32;
/// Maximum number of distinct palette rows per flush.
pub const MAX_PALETTE_SLOTS: u32 = 128;
/// Maximum number of distinct remap tables per flush.
pub const MAX_REMAP_SLOTS: u32 = 128;

/// A bounded cache mapping a resource identity to a small slot index.
///
/// `K` is the deduplication key (content hash, bit pattern, resource id);
/// `V` is what the GPU stage consumes for that slot. Slots are assigned
/// densely from 0 in first-seen order; `values()` yields the payloads in
/// slot order for binding at flush time.
#[derive(Debug)]
pub struct SlotTable<K, V = K> {
    indices: HashMap<K, u32>,
    values: Vec<V>,
    capacity: u32,
}

impl<K: Copy + Eq + Hash, V: Copy> SlotTable<K, V> {
    pub fn new(capacity: u32) -> Self {
        SlotTable {
            indices: HashMap::default(),
            values: Vec::with_capacity(capacity as usize),
            capacity,
        }
    }

    /// Return the slot for `key`, assigning the next free one if the key is
    /// new. `None` means the table is full: flush, then retry.
    pub fn get_or_assign(&mut self, key: K, value: V) -> Option<u32> {
        if let Some(&slot) = self.indices.get(&key) {
            return Some(slot);
        }
        let slot = self.values.len() as u32;
        if slot >= self.capacity {
            return None;
        }
        self.indices.insert(key, slot);
        self.values.push(value);
        Some(slot)
    }

    pub fn len(&self) -> u32 {
        self.values.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Slot payloads in slot order.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// Empty the table; the next assignment takes slot 0.
    pub fn clear(&mut self) {
        self.indices.clear();
        self.values.clear();
    }
}

/// Bitwise identity key for a composed 2D affine transform.
///
/// Transforms from different stack depths that compose to the same value
/// collapse to one slot, so the key is the exact bit pattern of the six
/// affine floats (`-0.0` and `0.0` are distinct, which only costs one
/// redundant slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformKey([u32; 6]);

impl TransformKey {
    pub fn from_affine(affine: &glam::Affine2) -> Self {
        let cols = affine.to_cols_array();
        TransformKey([
            cols[0].to_bits(),
            cols[1].to_bits(),
            cols[2].to_bits(),
            cols[3].to_bits(),
            cols[4].to_bits(),
            cols[5].to_bits(),
        ])
    }
}
