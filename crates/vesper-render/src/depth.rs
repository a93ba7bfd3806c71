//! Depth/occlusion policy ("nudging").
//!
//! Every primitive receives a monotonic depth value whose only purpose is
//! to keep unrelated-but-overlapping draws from tying at the same depth in
//! the non-alpha pass. In no-overlap mode, consecutive draws of the same
//! kind are caller-guaranteed not to overlap visually, so they share one
//! depth and batch into one draw call.

use crate::types::PrimitiveKind;

/// Upper bound on nudges per render pass.
///
/// The quantum is `2^-20`, so every one of the first `2^20` steps is
/// exactly representable in f32 and the cursor stays below 1.0 (the far
/// plane of the pass projection).
pub const MAX_RENDER_COUNT: u32 = 1 << 20;

/// Depth distance between two consecutive nudged draws.
pub const DEPTH_QUANTUM: f32 = 1.0 / MAX_RENDER_COUNT as f32;

/// Monotonic depth cursor.
#[derive(Debug)]
pub struct DepthCursor {
    value: f32,
    /// Kind of the previous draw; `None` forces the next draw onto a fresh
    /// depth regardless of mode.
    last_kind: Option<PrimitiveKind>,
    saturated: bool,
}

impl DepthCursor {
    pub fn new() -> Self {
        DepthCursor {
            value: 0.0,
            last_kind: None,
            saturated: false,
        }
    }

    /// Current depth value (the one most recently handed out).
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Depth for the next draw of `kind`.
    ///
    /// Normal mode always steps forward. In no-overlap mode a draw of the
    /// same kind as its predecessor reuses the predecessor's depth; any
    /// kind change still steps.
    pub fn next(&mut self, kind: PrimitiveKind, no_overlap: bool) -> f32 {
        let reuse = no_overlap && self.last_kind == Some(kind);
        if !reuse {
            self.advance();
        }
        self.last_kind = Some(kind);
        self.value
    }

    /// Force the next draw onto a fresh depth, regardless of mode.
    pub fn nudge(&mut self) {
        self.last_kind = None;
    }

    fn advance(&mut self) {
        let next = self.value + DEPTH_QUANTUM;
        if next >= 1.0 {
            if !self.saturated {
                tracing::warn!(
                    max = MAX_RENDER_COUNT,
                    "depth cursor saturated; draws in this pass may tie in depth"
                );
                self.saturated = true;
            }
            return;
        }
        self.value = next;
    }

    /// Called by the flush controller: slot indices restart at 0 but depth
    /// keeps increasing, so post-flush draws still land in front.
    pub fn on_flush(&mut self) {
        self.last_kind = None;
    }

    /// Called at `begin_render`.
    pub fn begin(&mut self) {
        self.value = 0.0;
        self.last_kind = None;
        self.saturated = false;
    }
}

impl Default for DepthCursor {
    fn default() -> Self {
        Self::new()
    }
}
