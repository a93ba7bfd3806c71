//! Hierarchical 2D world-transform stack.
//!
//! Pushing composes the new local transform onto the current one, so
//! `current()` is always the fully composed world transform. The renderer
//! recomputes the transform slot key from `current()` eagerly on every
//! draw; there is no observer coupling between this stack and the slot
//! table, and semantically equal transforms reached through different push
//! sequences still collapse to one slot.

use glam::{Affine2, Mat4};
use vesper_core::geometry::Rect;

/// Render-target rotation, for rotated displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetRotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl TargetRotation {
    fn radians(self) -> f32 {
        match self {
            TargetRotation::None => 0.0,
            TargetRotation::Cw90 => std::f32::consts::FRAC_PI_2,
            TargetRotation::Cw180 => std::f32::consts::PI,
            TargetRotation::Cw270 => 3.0 * std::f32::consts::FRAC_PI_2,
        }
    }
}

/// Build the pass projection: world rect to clip space, y-down, with the
/// target rotation applied last. Depth range is [0, 1] to match the depth
/// cursor.
pub fn pass_projection(world: Rect<f32>, rotation: TargetRotation) -> Mat4 {
    let ortho = Mat4::orthographic_rh(
        world.x,
        world.x + world.width,
        world.y + world.height,
        world.y,
        1.0,
        0.0,
    );
    match rotation {
        TargetRotation::None => ortho,
        rot => Mat4::from_rotation_z(rot.radians()) * ortho,
    }
}

/// Scoped stack of composed 2D affine transforms, identity at depth 1.
#[derive(Debug)]
pub struct TransformStack {
    composed: Vec<Affine2>,
}

impl TransformStack {
    pub fn new() -> Self {
        TransformStack {
            composed: vec![Affine2::IDENTITY],
        }
    }

    /// The fully composed current world transform.
    pub fn current(&self) -> Affine2 {
        *self.composed.last().expect("stack always holds identity")
    }

    /// Compose `local` onto the current transform and make it current.
    pub fn push(&mut self, local: Affine2) {
        self.composed.push(self.current() * local);
    }

    /// Returns `false` (and leaves the stack untouched) on an unmatched pop.
    pub fn pop(&mut self) -> bool {
        if self.composed.len() <= 1 {
            debug_assert!(false, "unmatched pop on transform stack");
            tracing::warn!("unmatched transform pop ignored");
            return false;
        }
        self.composed.pop();
        true
    }

    pub fn depth(&self) -> usize {
        self.composed.len()
    }

    pub fn reset(&mut self) {
        self.composed.clear();
        self.composed.push(Affine2::IDENTITY);
    }
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn push_composes_with_parent() {
        let mut stack = TransformStack::new();
        stack.push(Affine2::from_translation(Vec2::new(10.0, 0.0)));
        stack.push(Affine2::from_translation(Vec2::new(0.0, 5.0)));
        let p = stack.current().transform_point2(Vec2::ZERO);
        assert_eq!(p, Vec2::new(10.0, 5.0));
        stack.pop();
        let p = stack.current().transform_point2(Vec2::ZERO);
        assert_eq!(p, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn different_paths_same_value_compose_equal() {
        let mut a = TransformStack::new();
        a.push(Affine2::from_translation(Vec2::new(3.0, 0.0)));
        a.push(Affine2::from_translation(Vec2::new(4.0, 0.0)));

        let mut b = TransformStack::new();
        b.push(Affine2::from_translation(Vec2::new(7.0, 0.0)));

        assert_eq!(a.current(), b.current());
    }

    #[test]
    fn projection_maps_world_rect_corners() {
        let proj = pass_projection(Rect::new(0.0, 0.0, 100.0, 50.0), TargetRotation::None);
        let top_left = proj.project_point3(glam::Vec3::new(0.0, 0.0, 0.0));
        let bottom_right = proj.project_point3(glam::Vec3::new(100.0, 50.0, 0.0));
        assert!((top_left.x - -1.0).abs() < 1e-6);
        assert!((top_left.y - 1.0).abs() < 1e-6);
        assert!((bottom_right.x - 1.0).abs() < 1e-6);
        assert!((bottom_right.y - -1.0).abs() < 1e-6);
    }
}
