//! Render pass lifecycle and the immediate-mode draw API.
//!
//! [`Renderer::begin_render`] brackets a pass and hands back an
//! [`ActiveRenderPass`] that exclusively borrows both the renderer and the
//! graphics device; draw calls outside a pass and double `end()` are
//! unrepresentable. All methods are single-threaded and synchronous.
//!
//! Error posture (nothing here returns `Result`):
//! - capacity exhaustion is recovered internally by flush-and-retry;
//! - invalid input (unresolved texture, empty rect) silently drops the
//!   individual draw;
//! - protocol violations (unmatched pops) are debug assertions and
//!   release no-ops.

use glam::{Affine2, Mat4, Vec2};
use std::sync::Arc;
use vesper_core::geometry::{Rect, Size};

use crate::alpha_order::AlphaOrderList;
use crate::bucket::BucketSet;
use crate::depth::DepthCursor;
use crate::device::GraphicsDevice;
use crate::palette::{Palette, PaletteId, PaletteRemap, RemapId};
use crate::slots::{
    MAX_PALETTE_SLOTS, MAX_REMAP_SLOTS, MAX_TEXTURE_SLOTS, MAX_TRANSFORM_SLOTS, SlotTable,
    TransformKey,
};
use crate::sprite::{Sprite, TextureId};
use crate::stacks::{ContextStacks, DrawHook, SamplerFilter};
use crate::transform::{TargetRotation, TransformStack, pass_projection};
use crate::types::{
    BlendCategory, BucketId, CircleInstance, Color, LineInstance, MultiSpriteInstance,
    PaletteSpriteInstance, PrimitiveKind, RenderStats, SpriteInstance, TriangleInstance,
};

/// What the renderer needs to know about the surface it draws into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    /// Backbuffer size in physical pixels.
    pub size: Size<u32>,
    pub dpi_scale: f32,
    pub rotation: TargetRotation,
}

impl RenderTarget {
    pub fn new(size: Size<u32>) -> Self {
        RenderTarget {
            size,
            dpi_scale: 1.0,
            rotation: TargetRotation::None,
        }
    }

    pub fn with_dpi_scale(mut self, dpi_scale: f32) -> Self {
        self.dpi_scale = dpi_scale;
        self
    }

    pub fn with_rotation(mut self, rotation: TargetRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Target size in logical (DPI-independent) units.
    fn logical_size(&self) -> Size<f32> {
        Size::new(
            self.size.width as f32 / self.dpi_scale,
            self.size.height as f32 / self.dpi_scale,
        )
    }
}

/// Optional overrides for `begin_render`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Viewport in physical pixels; defaults to the full target.
    pub view_rect: Option<Rect<f32>>,
    /// World-space rect mapped onto the viewport; defaults to the target's
    /// logical size at origin.
    pub world_rect: Option<Rect<f32>>,
}

/// The geometry batching renderer.
///
/// Owns the per-pass caches (buckets, slot tables, alpha order list, depth
/// cursor, context stacks). Created once; on device loss the owner calls
/// [`Renderer::reset`] before the next pass.
pub struct Renderer {
    pub(crate) buckets: BucketSet,
    pub(crate) alpha: AlphaOrderList,
    pub(crate) depth: DepthCursor,
    pub(crate) stacks: ContextStacks,
    pub(crate) transform_stack: TransformStack,
    pub(crate) transform_slots: SlotTable<TransformKey, [f32; 6]>,
    pub(crate) texture_slots: SlotTable<TextureId>,
    pub(crate) palette_slots: SlotTable<u64, PaletteId>,
    pub(crate) remap_slots: SlotTable<u64, RemapId>,
    /// Fast path for consecutive draws under one world transform; dropped
    /// at flush.
    pub(crate) cached_transform: Option<(TransformKey, u32)>,
    pub(crate) geometry_capacity: u64,
    pub(crate) projection: Mat4,
    pub(crate) viewport: Rect<f32>,
    pub(crate) stats: RenderStats,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            buckets: BucketSet::new(),
            alpha: AlphaOrderList::new(),
            depth: DepthCursor::new(),
            stacks: ContextStacks::new(),
            transform_stack: TransformStack::new(),
            transform_slots: SlotTable::new(MAX_TRANSFORM_SLOTS),
            texture_slots: SlotTable::new(MAX_TEXTURE_SLOTS),
            palette_slots: SlotTable::new(MAX_PALETTE_SLOTS),
            remap_slots: SlotTable::new(MAX_REMAP_SLOTS),
            cached_transform: None,
            geometry_capacity: 0,
            projection: Mat4::IDENTITY,
            viewport: Rect::new(0.0, 0.0, 0.0, 0.0),
            stats: RenderStats::default(),
        }
    }

    /// Begin a render pass over the whole target.
    ///
    /// Returns `None` for a zero-area target.
    pub fn begin_render<'a>(
        &'a mut self,
        device: &'a mut dyn GraphicsDevice,
        target: &RenderTarget,
    ) -> Option<ActiveRenderPass<'a>> {
        self.begin_render_with(device, target, &RenderOptions::default())
    }

    /// Begin a render pass with explicit view/world rects.
    ///
    /// Returns `None` for a zero-area target or zero-area rect override.
    pub fn begin_render_with<'a>(
        &'a mut self,
        device: &'a mut dyn GraphicsDevice,
        target: &RenderTarget,
        options: &RenderOptions,
    ) -> Option<ActiveRenderPass<'a>> {
        if target.size.is_empty() || target.dpi_scale <= 0.0 {
            tracing::warn!(size = ?target.size, "begin_render on empty target refused");
            return None;
        }
        let viewport = options.view_rect.unwrap_or(Rect::new(
            0.0,
            0.0,
            target.size.width as f32,
            target.size.height as f32,
        ));
        let logical = target.logical_size();
        let world = options
            .world_rect
            .unwrap_or(Rect::new(0.0, 0.0, logical.width, logical.height));
        if viewport.is_empty() || world.is_empty() {
            tracing::warn!(?viewport, ?world, "begin_render with empty rect refused");
            return None;
        }

        self.projection = pass_projection(world, target.rotation);
        self.viewport = viewport;
        self.depth.begin();
        self.stats = RenderStats::default();

        Some(ActiveRenderPass {
            renderer: self,
            device,
        })
    }

    /// Statistics from the most recent pass (or the pass in progress).
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Full state-clearing re-initialization after device loss. The owner
    /// must call this before the next `begin_render`.
    pub fn reset(&mut self) {
        self.buckets.reset();
        self.alpha.reset();
        self.depth.begin();
        self.stacks.reset();
        self.transform_stack.reset();
        self.transform_slots.clear();
        self.texture_slots.clear();
        self.palette_slots.clear();
        self.remap_slots.clear();
        self.cached_transform = None;
        self.geometry_capacity = 0;
        self.stats = RenderStats::default();
    }

    /// Transform slot for the current composed world transform, through
    /// the one-entry cache. `None` means the table is full.
    pub(crate) fn transform_slot(&mut self) -> Option<u32> {
        let affine = self.transform_stack.current();
        let key = TransformKey::from_affine(&affine);
        if let Some((cached_key, slot)) = self.cached_transform {
            if cached_key == key {
                return Some(slot);
            }
        }
        let slot = self
            .transform_slots
            .get_or_assign(key, affine.to_cols_array())?;
        self.cached_transform = Some((key, slot));
        Some(slot)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-progress render pass: the draw API.
///
/// Dropping the pass without `end()` abandons queued geometry; `end()`
/// flushes it and verifies stack balance.
pub struct ActiveRenderPass<'a> {
    renderer: &'a mut Renderer,
    device: &'a mut dyn GraphicsDevice,
}

impl ActiveRenderPass<'_> {
    // --- lifecycle ------------------------------------------------------

    /// Upload and draw everything queued so far, then reset the per-pass
    /// caches. Called automatically on slot exhaustion and GPU-visible
    /// state changes; callers rarely need it directly.
    pub fn flush(&mut self) {
        self.renderer.flush_internal(self.device);
    }

    /// Finish the pass: final flush, then verify every context stack was
    /// popped back to its default.
    pub fn end(self) {
        let renderer = self.renderer;
        renderer.flush_internal(self.device);
        let balanced = renderer.stacks.balanced() && renderer.transform_stack.depth() == 1;
        debug_assert!(balanced, "context stacks not balanced at end of pass");
        if !balanced {
            tracing::warn!("context stacks not balanced at end of pass; resetting");
            renderer.stacks.reset();
            renderer.transform_stack.reset();
        }
    }

    pub fn stats(&self) -> RenderStats {
        self.renderer.stats
    }

    // --- draw methods ---------------------------------------------------

    pub fn draw_line(&mut self, start: Vec2, end: Vec2, color: Color) {
        let blend = self.classify(color.is_opaque());
        let transform_slot = self.resolve(|r| r.transform_slot());
        let depth = self.next_depth(PrimitiveKind::Line);
        self.submit(
            BucketId::new(PrimitiveKind::Line, blend),
            depth,
            LineInstance {
                start: start.to_array(),
                end: end.to_array(),
                color: color.to_array(),
                depth,
                transform_slot,
            },
        );
    }

    /// `thickness == 0.0` draws a filled disc.
    pub fn draw_circle(&mut self, center: Vec2, radius: f32, thickness: f32, color: Color) {
        if radius <= 0.0 {
            self.drop_draw("non-positive circle radius");
            return;
        }
        let blend = self.classify(color.is_opaque());
        let transform_slot = self.resolve(|r| r.transform_slot());
        let depth = self.next_depth(PrimitiveKind::Circle);
        self.submit(
            BucketId::new(PrimitiveKind::Circle, blend),
            depth,
            CircleInstance {
                center: center.to_array(),
                radius,
                thickness,
                color: color.to_array(),
                depth,
                transform_slot,
            },
        );
    }

    pub fn draw_triangle(&mut self, p0: Vec2, p1: Vec2, p2: Vec2, color: Color) {
        let blend = self.classify(color.is_opaque());
        let transform_slot = self.resolve(|r| r.transform_slot());
        let depth = self.next_depth(PrimitiveKind::Triangle);
        self.submit(
            BucketId::new(PrimitiveKind::Triangle, blend),
            depth,
            TriangleInstance {
                p0: p0.to_array(),
                p1: p1.to_array(),
                p2: p2.to_array(),
                color: color.to_array(),
                depth,
                transform_slot,
            },
        );
    }

    /// Draw a sprite into the world-space rect `dest`.
    ///
    /// Palette-indexed sprites are routed through the palette path using
    /// the current palette and remap stacks. Sprites whose texture has not
    /// resolved yet, and zero-area rects, are silent no-ops.
    pub fn draw_sprite(&mut self, sprite: &Sprite, dest: Rect<f32>, color: Color) {
        if sprite.is_palette_indexed() {
            self.draw_palette_sprite(sprite, dest, color);
            return;
        }
        let Some(texture) = sprite.texture else {
            self.drop_draw("sprite texture not resolved");
            return;
        };
        if dest.is_empty() {
            self.drop_draw("empty sprite dest rect");
            return;
        }
        let blend = self.classify(color.is_opaque() && !sprite.is_transparent());
        let (transform_slot, texture_slot) = self.resolve(|r| {
            let transform = r.transform_slot()?;
            let texture = r.texture_slots.get_or_assign(texture, texture)?;
            Some((transform, texture))
        });
        let depth = self.next_depth(PrimitiveKind::Sprite);
        let uv = sprite.uv;
        self.submit(
            BucketId::new(PrimitiveKind::Sprite, blend),
            depth,
            SpriteInstance {
                rect_min: [dest.x, dest.y],
                rect_max: [dest.x + dest.width, dest.y + dest.height],
                uv_min: [uv.x, uv.y],
                uv_max: [uv.x + uv.width, uv.y + uv.height],
                color: color.to_array(),
                depth,
                texture_slot,
                transform_slot,
                _pad: 0,
            },
        );
    }

    /// Draw a sprite sampling two textures (base modulated by detail).
    /// Both textures must have resolved.
    pub fn draw_multi_sprite(
        &mut self,
        base: &Sprite,
        detail: &Sprite,
        dest: Rect<f32>,
        color: Color,
    ) {
        let (Some(base_texture), Some(detail_texture)) = (base.texture, detail.texture) else {
            self.drop_draw("multi-sprite texture not resolved");
            return;
        };
        if dest.is_empty() {
            self.drop_draw("empty multi-sprite dest rect");
            return;
        }
        let intrinsically_opaque =
            color.is_opaque() && !base.is_transparent() && !detail.is_transparent();
        let blend = self.classify(intrinsically_opaque);
        let (transform_slot, texture_slot, texture2_slot) = self.resolve(|r| {
            let transform = r.transform_slot()?;
            let first = r.texture_slots.get_or_assign(base_texture, base_texture)?;
            let second = r
                .texture_slots
                .get_or_assign(detail_texture, detail_texture)?;
            Some((transform, first, second))
        });
        let depth = self.next_depth(PrimitiveKind::MultiSprite);
        self.submit(
            BucketId::new(PrimitiveKind::MultiSprite, blend),
            depth,
            MultiSpriteInstance {
                rect_min: [dest.x, dest.y],
                rect_max: [dest.x + dest.width, dest.y + dest.height],
                uv_min: [base.uv.x, base.uv.y],
                uv_max: [base.uv.x + base.uv.width, base.uv.y + base.uv.height],
                uv2_min: [detail.uv.x, detail.uv.y],
                uv2_max: [
                    detail.uv.x + detail.uv.width,
                    detail.uv.y + detail.uv.height,
                ],
                color: color.to_array(),
                depth,
                texture_slot,
                texture2_slot,
                transform_slot,
            },
        );
    }

    /// Draw an indexed-color sprite through the current palette and remap.
    ///
    /// Texture, palette and remap slots resolve together: if any of the
    /// three tables is full, one flush empties them all and the retry
    /// assigns all three, so a draw never straddles a flush.
    pub fn draw_palette_sprite(&mut self, sprite: &Sprite, dest: Rect<f32>, color: Color) {
        let Some(texture) = sprite.texture else {
            self.drop_draw("palette sprite texture not resolved");
            return;
        };
        if dest.is_empty() {
            self.drop_draw("empty palette sprite dest rect");
            return;
        }
        let palette = *self.renderer.stacks.palette.current();
        let remap = *self.renderer.stacks.remap.current();
        let blend = self.classify(color.is_opaque() && !sprite.is_transparent());
        let (transform_slot, texture_slot, palette_slot, remap_slot) = self.resolve(|r| {
            let transform = r.transform_slot()?;
            let texture = r.texture_slots.get_or_assign(texture, texture)?;
            let palette = r
                .palette_slots
                .get_or_assign(palette.content_hash, palette.id)?;
            let remap = r.remap_slots.get_or_assign(remap.content_hash, remap.id)?;
            Some((transform, texture, palette, remap))
        });
        let depth = self.next_depth(PrimitiveKind::PaletteSprite);
        let uv = sprite.uv;
        self.submit(
            BucketId::new(PrimitiveKind::PaletteSprite, blend),
            depth,
            PaletteSpriteInstance {
                rect_min: [dest.x, dest.y],
                rect_max: [dest.x + dest.width, dest.y + dest.height],
                uv_min: [uv.x, uv.y],
                uv_max: [uv.x + uv.width, uv.y + uv.height],
                color: color.to_array(),
                depth,
                texture_slot,
                palette_slot,
                remap_slot,
                transform_slot,
                _pad: [0; 3],
            },
        );
    }

    // --- depth ----------------------------------------------------------

    /// Force the next draw onto a fresh depth, e.g. a fill that must sit
    /// strictly in front of an outline just queued.
    pub fn nudge_depth(&mut self) {
        self.renderer.depth.nudge();
    }

    // --- context stacks -------------------------------------------------

    /// Changes GPU-visible sampler state: forces a flush.
    pub fn push_sampler(&mut self, filter: SamplerFilter) {
        self.flush();
        self.renderer.stacks.sampler.push(filter);
    }

    pub fn pop_sampler(&mut self) {
        self.flush();
        self.renderer.stacks.sampler.pop();
    }

    /// Reclassifies subsequent draws only; no flush.
    pub fn push_opaque(&mut self, force_opaque: bool) {
        self.renderer.stacks.opaque.push(force_opaque);
    }

    pub fn pop_opaque(&mut self) {
        self.renderer.stacks.opaque.pop();
    }

    /// Enter/leave no-overlap depth sharing; no flush. The mode transition
    /// itself forces the next draw onto a fresh depth.
    pub fn push_no_overlap(&mut self, no_overlap: bool) {
        let before = *self.renderer.stacks.no_overlap.current();
        self.renderer.stacks.no_overlap.push(no_overlap);
        if before != no_overlap {
            self.renderer.depth.nudge();
        }
    }

    pub fn pop_no_overlap(&mut self) {
        let before = *self.renderer.stacks.no_overlap.current();
        if self.renderer.stacks.no_overlap.pop() {
            if *self.renderer.stacks.no_overlap.current() != before {
                self.renderer.depth.nudge();
            }
        }
    }

    /// Changes the alpha blend configuration: forces a flush.
    pub fn push_premultiplied_alpha(&mut self, premultiplied: bool) {
        self.flush();
        self.renderer.stacks.premultiplied.push(premultiplied);
    }

    pub fn pop_premultiplied_alpha(&mut self) {
        self.flush();
        self.renderer.stacks.premultiplied.pop();
    }

    pub fn push_palette(&mut self, palette: Palette) {
        self.renderer.stacks.palette.push(palette);
    }

    pub fn pop_palette(&mut self) {
        self.renderer.stacks.palette.pop();
    }

    pub fn push_palette_remap(&mut self, remap: PaletteRemap) {
        self.renderer.stacks.remap.push(remap);
    }

    pub fn pop_palette_remap(&mut self) {
        self.renderer.stacks.remap.pop();
    }

    /// Installs a hook observing every draw issued at flush time: forces a
    /// flush so it does not observe draws queued before the push.
    pub fn push_draw_hook(&mut self, hook: Arc<dyn DrawHook>) {
        self.flush();
        self.renderer.stacks.draw_hook.push(Some(hook));
    }

    pub fn pop_draw_hook(&mut self) {
        self.flush();
        self.renderer.stacks.draw_hook.pop();
    }

    // --- world transforms -----------------------------------------------

    /// Compose `local` onto the current world transform.
    pub fn push_transform(&mut self, local: Affine2) {
        self.renderer.transform_stack.push(local);
    }

    pub fn pop_transform(&mut self) {
        self.renderer.transform_stack.pop();
    }

    // --- internals ------------------------------------------------------

    /// The flush-and-retry discipline for slot resolution. `attempt` must
    /// perform every lookup a draw needs; if any table is full it returns
    /// `None`, one flush empties all tables, and the retry cannot fail.
    fn resolve<T>(&mut self, mut attempt: impl FnMut(&mut Renderer) -> Option<T>) -> T {
        if let Some(resolved) = attempt(self.renderer) {
            return resolved;
        }
        self.flush();
        attempt(self.renderer).expect("slot resolution must succeed after a flush")
    }

    fn classify(&self, intrinsically_opaque: bool) -> BlendCategory {
        if *self.renderer.stacks.opaque.current() || intrinsically_opaque {
            BlendCategory::Opaque
        } else {
            BlendCategory::Alpha
        }
    }

    fn next_depth(&mut self, kind: PrimitiveKind) -> f32 {
        let no_overlap = *self.renderer.stacks.no_overlap.current();
        self.renderer.depth.next(kind, no_overlap)
    }

    fn submit<T: bytemuck::Pod>(&mut self, bucket_id: BucketId, depth: f32, instance: T) {
        let bucket = self.renderer.buckets.get_mut(bucket_id);
        let index = bucket.len();
        bucket.push(instance);

        self.renderer.stats.instances += 1;
        match bucket_id.blend {
            BlendCategory::Opaque => self.renderer.stats.opaque_instances += 1,
            BlendCategory::Alpha => {
                self.renderer.stats.alpha_instances += 1;
                self.renderer.alpha.record(bucket_id, index, depth);
            }
        }
    }

    fn drop_draw(&mut self, reason: &'static str) {
        self.renderer.stats.dropped += 1;
        tracing::trace!(reason, "draw dropped");
    }
}
