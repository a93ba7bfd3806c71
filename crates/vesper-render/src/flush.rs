//! The flush controller.
//!
//! A flush builds one contiguous GPU buffer from all buckets, issues the
//! opaque draws in fixed bucket order, replays alpha geometry in submission
//! order with mergeable runs collapsed, then resets every per-pass cache.
//! It runs when a slot table fills up, when GPU-visible fixed state is
//! about to change (sampler, premultiplied-alpha, draw hook), and at
//! `end()`.
//!
//! The reset protocol (step 5) is load-bearing: buckets, the alpha order
//! list and all slot tables are cleared together, so slot indices restart
//! at 0 and no draw call can reference geometry from before the flush. The
//! depth cursor's last-kind marker is cleared but its value keeps
//! increasing, so post-flush draws land in front of what was just
//! submitted.

use crate::device::{DrawCall, GraphicsDevice, PassState};
use crate::pass::Renderer;
use crate::types::{BlendCategory, BucketId, PrimitiveKind};

impl Renderer {
    pub(crate) fn flush_internal(&mut self, device: &mut dyn GraphicsDevice) {
        let has_geometry = self.buckets.iter().any(|b| !b.is_empty());
        if !has_geometry {
            // Nothing queued; nothing to upload, draw, or clear besides the
            // depth marker.
            self.depth.on_flush();
            self.cached_transform = None;
            return;
        }

        // 1. Lay out every bucket in the shared buffer, aligned to its
        // item stride so render starts are whole item indices.
        let mut offset: u64 = 0;
        for bucket in self.buckets.iter_mut() {
            let stride = bucket.stride() as u64;
            offset = offset.next_multiple_of(stride);
            bucket.set_render_start((offset / stride) as u32);
            offset += bucket.byte_len() as u64;
        }
        let total = offset;

        // 2. Size the buffer (power-of-two growth) and copy bucket bytes.
        if total > self.geometry_capacity {
            self.geometry_capacity = total.next_power_of_two();
            device.ensure_geometry_capacity(self.geometry_capacity);
        }
        for bucket in self.buckets.iter() {
            if bucket.is_empty() {
                continue;
            }
            let byte_offset = bucket.render_start() as u64 * bucket.stride() as u64;
            device.write_geometry(byte_offset, bucket.bytes());
        }

        // 3. Pass-fixed state, slot arrays, then opaque draws in fixed
        // kind order. Opaque geometry has no ordering requirement; depth
        // testing resolves it.
        device.bind_pass_state(&PassState {
            sampler: *self.stacks.sampler.current(),
            premultiplied_alpha: *self.stacks.premultiplied.current(),
            projection: self.projection,
            viewport: self.viewport,
        });
        device.bind_transforms(self.transform_slots.values());
        device.bind_textures(self.texture_slots.values());
        device.bind_palettes(self.palette_slots.values());
        device.bind_remaps(self.remap_slots.values());

        let hook = self.stacks.draw_hook.current().clone();
        let mut issued: u32 = 0;

        for kind in PrimitiveKind::ALL {
            let bucket = self.buckets.get(BucketId::new(kind, BlendCategory::Opaque));
            if bucket.is_empty() {
                continue;
            }
            let call = DrawCall {
                bucket: bucket.id(),
                start: bucket.render_start(),
                count: bucket.len(),
            };
            if let Some(hook) = &hook {
                hook.on_draw(&call);
            }
            device.draw(call);
            issued += 1;
        }

        // 4. Alpha draws, strictly in submission order, merged runs.
        for run in self.alpha.runs() {
            let bucket = self.buckets.get(run.bucket);
            let call = DrawCall {
                bucket: run.bucket,
                start: bucket.render_start() + run.start,
                count: run.count,
            };
            if let Some(hook) = &hook {
                hook.on_draw(&call);
            }
            device.draw(call);
            issued += 1;
        }

        // 5. Reset every per-pass cache together.
        self.buckets.clear_items();
        self.alpha.clear();
        self.transform_slots.clear();
        self.texture_slots.clear();
        self.palette_slots.clear();
        self.remap_slots.clear();
        self.cached_transform = None;
        self.depth.on_flush();

        self.stats.flushes += 1;
        self.stats.draw_calls += issued;

        tracing::debug!(
            bytes = total,
            draw_calls = issued,
            "flushed geometry buckets"
        );
    }
}
