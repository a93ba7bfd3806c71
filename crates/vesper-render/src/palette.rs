//! Palette and remap data for indexed-color sprites.
//!
//! A palette is one texture row of up to 256 colors; a remap table is a
//! 256-entry index-to-index substitution applied before the palette lookup,
//! allowing indexed sprites to be recolored without touching the palette.
//! Both carry a content hash so slot-table deduplication is cheaper than
//! pixel comparison.

/// Stable identity of a palette row resource.
pub type PaletteId = u64;
/// Stable identity of a remap table resource.
pub type RemapId = u64;

/// Colors per palette row (and entries per remap table).
pub const PALETTE_WIDTH: usize = 256;

/// The default remap: every index maps to itself. Pure constant data, not
/// renderer state.
pub const IDENTITY_REMAP_TABLE: [u8; PALETTE_WIDTH] = {
    let mut table = [0u8; PALETTE_WIDTH];
    let mut i = 0;
    while i < PALETTE_WIDTH {
        table[i] = i as u8;
        i += 1;
    }
    table
};

/// One palette row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub id: PaletteId,
    /// Hash of the row's pixel content, used as the slot-table key.
    pub content_hash: u64,
}

impl Palette {
    /// Reserved default palette row (engine-provided grayscale ramp);
    /// active before any `push_palette`.
    pub const DEFAULT: Palette = Palette {
        id: 0,
        content_hash: 0,
    };

    pub fn new(id: PaletteId, content_hash: u64) -> Self {
        Palette { id, content_hash }
    }
}

/// One remap table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteRemap {
    pub id: RemapId,
    pub content_hash: u64,
}

impl PaletteRemap {
    /// Reserved identity remap; always available without a push.
    pub const IDENTITY: PaletteRemap = PaletteRemap {
        id: 0,
        content_hash: 0,
    };

    pub fn new(id: RemapId, content_hash: u64) -> Self {
        PaletteRemap { id, content_hash }
    }

    pub fn is_identity(&self) -> bool {
        self.id == PaletteRemap::IDENTITY.id
    }
}
