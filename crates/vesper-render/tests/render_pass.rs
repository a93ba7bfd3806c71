//! End-to-end render pass tests against a recording mock device.

use std::sync::{Arc, Mutex};

use glam::{Affine2, Vec2};
use vesper_core::geometry::{Rect, Size};
use vesper_render::types::SpriteInstance;
use vesper_render::{
    BlendCategory, Color, DrawCall, DrawHook, Palette, PaletteRemap, PrimitiveKind, RenderOptions,
    RenderTarget, Renderer, SamplerFilter, Sprite,
};
use vesper_test_utils::{DeviceCall, MockDevice};

fn target() -> RenderTarget {
    RenderTarget::new(Size::new(640, 480))
}

fn dest(x: f32, y: f32) -> Rect<f32> {
    Rect::new(x, y, 32.0, 32.0)
}

#[test]
fn identical_opaque_sprites_batch_into_one_draw() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::opaque(7, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.draw_sprite(&sprite, dest(40.0, 0.0), Color::WHITE);
    pass.draw_sprite(&sprite, dest(80.0, 0.0), Color::WHITE);
    pass.end();

    let draws = device.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].bucket.kind, PrimitiveKind::Sprite);
    assert_eq!(draws[0].bucket.blend, BlendCategory::Opaque);
    assert_eq!(draws[0].start, 0);
    assert_eq!(draws[0].count, 3);

    // One shared texture and one shared (identity) transform.
    assert_eq!(device.last_bound_textures(), Some(vec![7]));
    assert_eq!(device.last_bound_transform_count(), Some(1));

    let stats = renderer.stats();
    assert_eq!(stats.instances, 3);
    assert_eq!(stats.opaque_instances, 3);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.flushes, 1);
}

#[test]
fn opaque_draws_are_issued_before_alpha() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::opaque(1, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    // Submit the translucent one first; the opaque one must still be
    // drawn first so depth testing can reject covered alpha pixels.
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE.with_alpha(0.5));
    pass.draw_sprite(&sprite, dest(8.0, 8.0), Color::WHITE);
    pass.end();

    let draws = device.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].bucket.blend, BlendCategory::Opaque);
    assert_eq!(draws[1].bucket.blend, BlendCategory::Alpha);
}

#[test]
fn later_alpha_draw_sits_in_front_of_earlier_opaque() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::opaque(1, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.draw_sprite(&sprite, dest(8.0, 8.0), Color::WHITE.with_alpha(0.5));
    pass.end();

    // Bucket layout order puts the opaque sprite write before the alpha
    // one; read the depth each instance was stamped with back out.
    let writes = device.writes();
    assert_eq!(writes.len(), 2);
    let opaque: SpriteInstance = bytemuck::pod_read_unaligned(&writes[0].1);
    let alpha: SpriteInstance = bytemuck::pod_read_unaligned(&writes[1].1);
    assert!(alpha.depth > opaque.depth);
}

#[test]
fn alpha_draws_replay_in_submission_order() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::opaque(1, Rect::UNIT);
    let half = Color::WHITE.with_alpha(0.5);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.draw_circle(Vec2::new(10.0, 10.0), 5.0, 0.0, half);
    pass.draw_sprite(&sprite, dest(0.0, 0.0), half);
    pass.draw_circle(Vec2::new(20.0, 20.0), 5.0, 0.0, half);
    pass.end();

    // Distinct depths forbid merging, so each primitive is its own call,
    // interleaved exactly as submitted.
    let kinds: Vec<PrimitiveKind> = device.alpha_draws().iter().map(|d| d.bucket.kind).collect();
    assert_eq!(
        kinds,
        vec![
            PrimitiveKind::Circle,
            PrimitiveKind::Sprite,
            PrimitiveKind::Circle
        ]
    );
}

#[test]
fn no_overlap_mode_merges_alpha_sprites_into_one_run() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::opaque(1, Rect::UNIT);
    let half = Color::WHITE.with_alpha(0.5);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.push_no_overlap(true);
    for i in 0..5 {
        pass.draw_sprite(&sprite, dest(i as f32 * 40.0, 0.0), half);
    }
    pass.pop_no_overlap();
    pass.end();

    // Same kind under no-overlap shares one depth, so the five sprites
    // collapse into a single alpha draw.
    let alpha = device.alpha_draws();
    assert_eq!(alpha.len(), 1);
    assert_eq!(alpha[0].count, 5);
}

#[test]
fn transform_table_overflow_flushes_and_restarts_at_slot_zero() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    for i in 0..1025 {
        pass.push_transform(Affine2::from_translation(Vec2::new(i as f32, 0.0)));
        pass.draw_line(Vec2::ZERO, Vec2::ONE, Color::WHITE);
        pass.pop_transform();
    }
    pass.end();

    let stats = renderer.stats();
    assert_eq!(stats.flushes, 2);
    assert_eq!(stats.instances, 1025);

    // First flush carries the 1024 draws that filled the table, the
    // second just the one that overflowed it, bound at slot 0.
    let draws = device.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].count, 1024);
    assert_eq!(draws[1].count, 1);
    assert_eq!(device.last_bound_transform_count(), Some(1));
}

#[test]
fn texture_table_overflow_flushes_and_restarts_at_slot_zero() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    for id in 0..33u64 {
        let sprite = Sprite::opaque(id, Rect::UNIT);
        pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    }
    pass.end();

    assert_eq!(renderer.stats().flushes, 2);
    let draws = device.draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].count, 32);
    assert_eq!(draws[1].count, 1);
    assert_eq!(device.last_bound_textures(), Some(vec![32]));
}

#[test]
fn sampler_changes_flush_geometry_under_the_old_filter() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::opaque(1, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.push_sampler(SamplerFilter::Nearest);
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.push_sampler(SamplerFilter::LinearRepeat);
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.pop_sampler();
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.pop_sampler();
    pass.end();

    // Each flush binds the filter the geometry was queued under, not the
    // one being switched to.
    let samplers: Vec<SamplerFilter> = device
        .calls()
        .iter()
        .filter_map(|c| match c {
            DeviceCall::BindPassState { state } => Some(state.sampler),
            _ => None,
        })
        .collect();
    assert_eq!(
        samplers,
        vec![
            SamplerFilter::Nearest,
            SamplerFilter::LinearRepeat,
            SamplerFilter::Nearest
        ]
    );
    assert_eq!(device.draw_count(), 3);
    assert_eq!(renderer.stats().flushes, 3);
}

#[test]
fn premultiplied_changes_flush_geometry_under_the_old_blend() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::opaque(1, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.push_premultiplied_alpha(true);
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.pop_premultiplied_alpha();
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.end();

    // Each flush binds the blend configuration the geometry was queued
    // under, not the one being switched to.
    let premultiplied: Vec<bool> = device
        .calls()
        .iter()
        .filter_map(|c| match c {
            DeviceCall::BindPassState { state } => Some(state.premultiplied_alpha),
            _ => None,
        })
        .collect();
    assert_eq!(premultiplied, vec![false, true, false]);
    assert_eq!(device.draw_count(), 3);
    assert_eq!(renderer.stats().flushes, 3);
}

#[test]
fn empty_flushes_touch_nothing_and_are_not_counted() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.flush();
    pass.push_sampler(SamplerFilter::Nearest);
    pass.pop_sampler();
    pass.end();

    assert!(device.calls().is_empty());
    assert_eq!(renderer.stats().flushes, 0);
}

#[test]
fn invalid_draws_are_dropped_silently() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.draw_sprite(&Sprite::pending(Rect::UNIT), dest(0.0, 0.0), Color::WHITE);
    pass.draw_sprite(
        &Sprite::opaque(1, Rect::UNIT),
        Rect::new(0.0, 0.0, 0.0, 0.0),
        Color::WHITE,
    );
    pass.draw_circle(Vec2::ZERO, 0.0, 0.0, Color::WHITE);
    pass.end();

    assert!(device.calls().is_empty());
    let stats = renderer.stats();
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.instances, 0);
}

#[test]
fn opaque_override_reclassifies_translucent_draws() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::transparent(1, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.push_opaque(true);
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE.with_alpha(0.5));
    pass.pop_opaque();
    pass.end();

    assert_eq!(device.opaque_draws().len(), 1);
    assert!(device.alpha_draws().is_empty());
    assert_eq!(renderer.stats().opaque_instances, 1);
}

#[test]
fn draw_hook_observes_every_issued_draw() {
    struct Recorder(Mutex<Vec<DrawCall>>);
    impl DrawHook for Recorder {
        fn on_draw(&self, call: &DrawCall) {
            self.0.lock().unwrap().push(*call);
        }
    }

    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::opaque(1, Rect::UNIT);
    let hook = Arc::new(Recorder(Mutex::new(Vec::new())));

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    // Queued before the push; the hook must not observe it.
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.push_draw_hook(hook.clone());
    pass.draw_sprite(&sprite, dest(8.0, 0.0), Color::WHITE);
    pass.draw_line(Vec2::ZERO, Vec2::ONE, Color::WHITE.with_alpha(0.5));
    pass.pop_draw_hook();
    pass.draw_sprite(&sprite, dest(16.0, 0.0), Color::WHITE);
    pass.end();

    let seen = hook.0.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].bucket.kind, PrimitiveKind::Sprite);
    assert_eq!(seen[1].bucket.kind, PrimitiveKind::Line);
    assert_eq!(device.draw_count(), 4);
}

#[test]
fn palette_sprites_bind_current_palette_and_remap() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::palette_indexed(3, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.push_palette(Palette::new(5, 0xAA));
    pass.push_palette_remap(PaletteRemap::new(9, 0xBB));
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.pop_palette_remap();
    pass.pop_palette();
    pass.end();

    let draws = device.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].bucket.kind, PrimitiveKind::PaletteSprite);

    let palettes = device.calls().iter().find_map(|c| match c {
        DeviceCall::BindPalettes { palettes } => Some(palettes.clone()),
        _ => None,
    });
    let remaps = device.calls().iter().find_map(|c| match c {
        DeviceCall::BindRemaps { remaps } => Some(remaps.clone()),
        _ => None,
    });
    assert_eq!(palettes, Some(vec![5]));
    assert_eq!(remaps, Some(vec![9]));
}

#[test]
fn palette_sprite_without_pushes_uses_default_palette_and_identity_remap() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::palette_indexed(3, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.end();

    let palettes = device.calls().iter().find_map(|c| match c {
        DeviceCall::BindPalettes { palettes } => Some(palettes.clone()),
        _ => None,
    });
    assert_eq!(palettes, Some(vec![Palette::DEFAULT.id]));
}

#[test]
fn multi_sprite_resolves_both_textures() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let base = Sprite::opaque(1, Rect::UNIT);
    let detail = Sprite::opaque(2, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.draw_multi_sprite(&base, &detail, dest(0.0, 0.0), Color::WHITE);
    pass.end();

    let draws = device.draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].bucket.kind, PrimitiveKind::MultiSprite);
    assert_eq!(device.last_bound_textures(), Some(vec![1, 2]));
}

#[test]
fn geometry_buffer_grows_once_then_is_reused() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();
    let sprite = Sprite::opaque(1, Rect::UNIT);

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.end();
    assert!(device.capacity().is_power_of_two());

    // A second pass of the same size fits in the existing buffer.
    device.clear_calls();
    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.draw_sprite(&sprite, dest(0.0, 0.0), Color::WHITE);
    pass.end();

    assert!(
        !device
            .calls()
            .iter()
            .any(|c| matches!(c, DeviceCall::EnsureCapacity { .. }))
    );
    assert_eq!(device.write_count(), 1);
}

#[test]
fn begin_render_refuses_empty_targets_and_rects() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();

    assert!(
        renderer
            .begin_render(&mut device, &RenderTarget::new(Size::new(0, 480)))
            .is_none()
    );

    let options = RenderOptions {
        world_rect: Some(Rect::new(0.0, 0.0, 0.0, 0.0)),
        ..Default::default()
    };
    assert!(
        renderer
            .begin_render_with(&mut device, &target(), &options)
            .is_none()
    );
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "context stacks not balanced")]
fn unbalanced_stacks_at_end_assert_in_debug() {
    let mut renderer = Renderer::new();
    let mut device = MockDevice::new();

    let mut pass = renderer.begin_render(&mut device, &target()).unwrap();
    pass.push_opaque(true);
    pass.end();
}
