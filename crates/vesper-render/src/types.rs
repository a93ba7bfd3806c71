//! Core types shared by the batching renderer.
//!
//! Every primitive kind has a fixed-size `#[repr(C)]` instance struct that
//! is byte-copied into its geometry bucket and later into the shared GPU
//! buffer, so all of them are [`Pod`].

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// The six primitive kinds the renderer batches.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Line = 0,
    Circle = 1,
    Triangle = 2,
    Sprite = 3,
    MultiSprite = 4,
    PaletteSprite = 5,
}

impl PrimitiveKind {
    /// All kinds in the fixed draw/layout order used by the flush
    /// controller.
    pub const ALL: [PrimitiveKind; 6] = [
        PrimitiveKind::Line,
        PrimitiveKind::Circle,
        PrimitiveKind::Triangle,
        PrimitiveKind::Sprite,
        PrimitiveKind::MultiSprite,
        PrimitiveKind::PaletteSprite,
    ];

    /// Byte size of one instance of this kind.
    pub const fn stride(self) -> usize {
        match self {
            PrimitiveKind::Line => size_of::<LineInstance>(),
            PrimitiveKind::Circle => size_of::<CircleInstance>(),
            PrimitiveKind::Triangle => size_of::<TriangleInstance>(),
            PrimitiveKind::Sprite => size_of::<SpriteInstance>(),
            PrimitiveKind::MultiSprite => size_of::<MultiSpriteInstance>(),
            PrimitiveKind::PaletteSprite => size_of::<PaletteSpriteInstance>(),
        }
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PrimitiveKind::Line => "line",
            PrimitiveKind::Circle => "circle",
            PrimitiveKind::Triangle => "triangle",
            PrimitiveKind::Sprite => "sprite",
            PrimitiveKind::MultiSprite => "multi_sprite",
            PrimitiveKind::PaletteSprite => "palette_sprite",
        };
        f.write_str(name)
    }
}

/// Blend category a primitive was classified into at submission time.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendCategory {
    /// Depth-tested, order-independent.
    Opaque = 0,
    /// Blended, replayed in submission order.
    Alpha = 1,
}

/// Identifies one of the twelve geometry buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketId {
    pub kind: PrimitiveKind,
    pub blend: BlendCategory,
}

impl BucketId {
    pub const COUNT: usize = PrimitiveKind::ALL.len() * 2;

    pub const fn new(kind: PrimitiveKind, blend: BlendCategory) -> Self {
        BucketId { kind, blend }
    }

    /// Dense index into per-bucket arrays. Opaque buckets come first, in
    /// kind order, then the alpha buckets; this is also the fixed layout
    /// and opaque draw order at flush time.
    pub const fn index(self) -> usize {
        self.blend as usize * PrimitiveKind::ALL.len() + self.kind as usize
    }

    pub fn all() -> impl Iterator<Item = BucketId> {
        [BlendCategory::Opaque, BlendCategory::Alpha]
            .into_iter()
            .flat_map(|blend| PrimitiveKind::ALL.into_iter().map(move |kind| BucketId { kind, blend }))
    }
}

/// RGBA color, straight (non-premultiplied) alpha.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Color { r, g, b, a }
    }

    pub const fn with_alpha(mut self, a: f32) -> Self {
        self.a = a;
        self
    }

    /// Fully opaque colors can skip blending entirely.
    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

/// Instance data for a line segment.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LineInstance {
    pub start: [f32; 2],
    pub end: [f32; 2],
    pub color: [f32; 4],
    pub depth: f32,
    pub transform_slot: u32,
}

/// Instance data for a circle. `thickness == 0` draws a filled disc.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CircleInstance {
    pub center: [f32; 2],
    pub radius: f32,
    pub thickness: f32,
    pub color: [f32; 4],
    pub depth: f32,
    pub transform_slot: u32,
}

/// Instance data for a solid triangle.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TriangleInstance {
    pub p0: [f32; 2],
    pub p1: [f32; 2],
    pub p2: [f32; 2],
    pub color: [f32; 4],
    pub depth: f32,
    pub transform_slot: u32,
}

/// Instance data for a textured sprite quad.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SpriteInstance {
    /// World-space rect, top-left corner.
    pub rect_min: [f32; 2],
    /// World-space rect, bottom-right corner.
    pub rect_max: [f32; 2],
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
    pub color: [f32; 4],
    pub depth: f32,
    pub texture_slot: u32,
    pub transform_slot: u32,
    pub _pad: u32,
}

/// Instance data for a sprite sampling two textures (e.g. base + detail).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MultiSpriteInstance {
    pub rect_min: [f32; 2],
    pub rect_max: [f32; 2],
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
    pub uv2_min: [f32; 2],
    pub uv2_max: [f32; 2],
    pub color: [f32; 4],
    pub depth: f32,
    pub texture_slot: u32,
    pub texture2_slot: u32,
    pub transform_slot: u32,
}

/// Instance data for an indexed-color sprite resolved through a palette
/// row and a remap table.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PaletteSpriteInstance {
    pub rect_min: [f32; 2],
    pub rect_max: [f32; 2],
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
    pub color: [f32; 4],
    pub depth: f32,
    pub texture_slot: u32,
    pub palette_slot: u32,
    pub remap_slot: u32,
    pub transform_slot: u32,
    pub _pad: [u32; 3],
}

// Instance structs are copied into byte arenas; layouts must stay exact.
const_assert_eq!(size_of::<LineInstance>(), 40);
const_assert_eq!(size_of::<CircleInstance>(), 40);
const_assert_eq!(size_of::<TriangleInstance>(), 48);
const_assert_eq!(size_of::<SpriteInstance>(), 64);
const_assert_eq!(size_of::<MultiSpriteInstance>(), 80);
const_assert_eq!(size_of::<PaletteSpriteInstance>(), 80);

/// Per-pass rendering statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderStats {
    /// Primitives accepted into buckets.
    pub instances: u32,
    /// Primitives classified opaque.
    pub opaque_instances: u32,
    /// Primitives classified alpha.
    pub alpha_instances: u32,
    /// GPU draw calls issued so far this pass.
    pub draw_calls: u32,
    /// Flushes performed so far this pass (including the final one).
    pub flushes: u32,
    /// Draws silently dropped (unresolved texture, empty rect).
    pub dropped: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_index_is_dense_and_ordered() {
        let indices: Vec<usize> = BucketId::all().map(|b| b.index()).collect();
        assert_eq!(indices, (0..BucketId::COUNT).collect::<Vec<_>>());
        // Opaque buckets occupy the first half.
        assert!(BucketId::new(PrimitiveKind::PaletteSprite, BlendCategory::Opaque).index() < 6);
        assert!(BucketId::new(PrimitiveKind::Line, BlendCategory::Alpha).index() >= 6);
    }

    #[test]
    fn strides_match_instance_sizes() {
        assert_eq!(PrimitiveKind::Line.stride(), 40);
        assert_eq!(PrimitiveKind::Sprite.stride(), 64);
        assert_eq!(PrimitiveKind::MultiSprite.stride(), 80);
    }

    #[test]
    fn color_opacity() {
        assert!(Color::WHITE.is_opaque());
        assert!(Color::BLACK.is_opaque());
        assert!(!Color::TRANSPARENT.is_opaque());
        assert!(!Color::WHITE.with_alpha(0.5).is_opaque());
    }
}
