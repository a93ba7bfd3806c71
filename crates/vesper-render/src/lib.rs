//! Immediate-mode 2D geometry batching renderer.
//!
//! A stream of draw calls (sprites, lines, circles, triangles and
//! palette-indexed variants) is appended into per-kind [geometry
//! buckets](bucket::GeometryBucket) and turned into a minimal set of GPU
//! draw submissions at flush time. Opaque geometry is drawn unordered in a
//! fixed bucket order (depth testing resolves correctness); alpha-blended
//! geometry replays strictly in submission order, with contiguous runs that
//! share a bucket and depth merged into single draw calls.
//!
//! The GPU itself is consumed as an opaque capability through the
//! [`GraphicsDevice`] trait; the renderer never creates pipelines or
//! shaders.
//!
//! # Example
//!
//! ```
//! use vesper_render::{Renderer, RenderTarget, Sprite, Color};
//! use vesper_core::geometry::{Rect, Size};
//! # use vesper_test_utils::MockDevice;
//!
//! let mut renderer = Renderer::new();
//! let mut device = MockDevice::new();
//! let target = RenderTarget::new(Size::new(640, 480));
//!
//! let mut pass = renderer.begin_render(&mut device, &target).unwrap();
//! let sprite = Sprite::opaque(7, Rect::UNIT);
//! pass.draw_sprite(&sprite, Rect::new(0.0, 0.0, 32.0, 32.0), Color::WHITE);
//! pass.end();
//! ```

pub mod alpha_order;
pub mod bucket;
pub mod depth;
pub mod device;
pub mod flush;
pub mod palette;
pub mod pass;
pub mod slots;
pub mod sprite;
pub mod stacks;
pub mod transform;
pub mod types;

pub use device::{DrawCall, GraphicsDevice, PassState};
pub use palette::{Palette, PaletteId, PaletteRemap, RemapId};
pub use pass::{ActiveRenderPass, RenderOptions, RenderTarget, Renderer};
pub use sprite::{Sprite, SpriteFlags, TextureId};
pub use stacks::{DrawHook, SamplerFilter};
pub use transform::TargetRotation;
pub use types::{BlendCategory, BucketId, Color, PrimitiveKind, RenderStats};
