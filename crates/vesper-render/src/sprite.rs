//! Sprite source data, consumed as an opaque external interface.
//!
//! A sprite is texture identity plus a UV rectangle and type flags. The
//! renderer never touches pixel data; texture identity is reference
//! identity of the underlying resource, represented by a stable id.

use bitflags::bitflags;
use vesper_core::geometry::Rect;

/// Stable identity of a GPU texture resource.
pub type TextureId = u64;

bitflags! {
    /// Sprite type flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpriteFlags: u32 {
        /// Every texel is fully opaque; the sprite may skip blending.
        const OPAQUE = 1 << 0;
        /// Contains translucent texels; must be alpha-blended.
        const TRANSPARENT = 1 << 1;
        /// Texels are palette indices, resolved through a palette row and
        /// a remap table.
        const PALETTE_INDEXED = 1 << 2;
    }
}

/// A drawable sprite.
///
/// `texture` is `None` while the backing resource is still loading; such
/// sprites draw as silent no-ops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub texture: Option<TextureId>,
    pub uv: Rect<f32>,
    pub flags: SpriteFlags,
}

impl Sprite {
    pub fn opaque(texture: TextureId, uv: Rect<f32>) -> Self {
        Sprite {
            texture: Some(texture),
            uv,
            flags: SpriteFlags::OPAQUE,
        }
    }

    pub fn transparent(texture: TextureId, uv: Rect<f32>) -> Self {
        Sprite {
            texture: Some(texture),
            uv,
            flags: SpriteFlags::TRANSPARENT,
        }
    }

    pub fn palette_indexed(texture: TextureId, uv: Rect<f32>) -> Self {
        Sprite {
            texture: Some(texture),
            uv,
            flags: SpriteFlags::PALETTE_INDEXED,
        }
    }

    /// A sprite whose texture has not resolved yet.
    pub fn pending(uv: Rect<f32>) -> Self {
        Sprite {
            texture: None,
            uv,
            flags: SpriteFlags::TRANSPARENT,
        }
    }

    pub fn is_palette_indexed(&self) -> bool {
        self.flags.contains(SpriteFlags::PALETTE_INDEXED)
    }

    pub fn is_transparent(&self) -> bool {
        self.flags.contains(SpriteFlags::TRANSPARENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_flags() {
        let s = Sprite::opaque(1, Rect::UNIT);
        assert!(!s.is_transparent());
        assert!(Sprite::transparent(1, Rect::UNIT).is_transparent());
        assert!(Sprite::palette_indexed(1, Rect::UNIT).is_palette_indexed());
        assert!(Sprite::pending(Rect::UNIT).texture.is_none());
    }
}
