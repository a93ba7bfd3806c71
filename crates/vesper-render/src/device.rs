//! The graphics device, consumed as an opaque capability.
//!
//! The renderer never creates shaders or pipeline objects; it asks the
//! device to size one contiguous geometry buffer, copy bucket bytes into
//! it, bind pass-fixed state and the slot arrays, and issue draws. A real
//! implementation maps these onto its graphics API; tests substitute a
//! recording mock.
//!
//! Buffer updates follow a write-discard/streaming contract: after
//! `ensure_geometry_capacity`, writes only ever append into regions laid
//! out by the flush controller, never partially overwrite earlier ones.

use glam::Mat4;
use vesper_core::geometry::Rect;

use crate::palette::{PaletteId, RemapId};
use crate::sprite::TextureId;
use crate::stacks::SamplerFilter;
use crate::types::BucketId;

/// Pass-fixed GPU state, bound once per flush.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassState {
    pub sampler: SamplerFilter,
    /// Selects the premultiplied-alpha blend configuration for alpha
    /// geometry.
    pub premultiplied_alpha: bool,
    pub projection: Mat4,
    /// Viewport in physical target pixels.
    pub viewport: Rect<f32>,
}

/// One GPU draw submission: `count` instances of the bucket's kind,
/// starting at item `start` inside the shared geometry buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub bucket: BucketId,
    pub start: u32,
    pub count: u32,
}

/// Capabilities the flush controller needs from the GPU.
///
/// All methods are synchronous and called from the render-owning thread
/// only; any GPU-side waiting is the implementation's concern.
pub trait GraphicsDevice {
    /// Make the shared geometry buffer at least `bytes` long. Existing
    /// contents may be discarded.
    fn ensure_geometry_capacity(&mut self, bytes: u64);

    /// Copy `data` into the geometry buffer at `offset`.
    fn write_geometry(&mut self, offset: u64, data: &[u8]);

    /// Bind blend/sampler/projection state for the draws that follow.
    fn bind_pass_state(&mut self, state: &PassState);

    /// Upload the world-transform slot array (column-major 2D affines).
    fn bind_transforms(&mut self, transforms: &[[f32; 6]]);

    /// Bind the texture slot array.
    fn bind_textures(&mut self, textures: &[TextureId]);

    /// Bind the palette-row slot array.
    fn bind_palettes(&mut self, palettes: &[PaletteId]);

    /// Bind the remap-table slot array.
    fn bind_remaps(&mut self, remaps: &[RemapId]);

    /// Issue one draw.
    fn draw(&mut self, call: DrawCall);
}
