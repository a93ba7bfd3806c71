//! Scoped context stacks.
//!
//! Each stack starts at depth 1 with a default entry; push appends, pop
//! requires depth > 1. Popping below depth 1 is a caller protocol
//! violation: debug assertion in debug builds, logged no-op in release.
//!
//! Which stacks force a flush is decided by the pass layer: sampler,
//! premultiplied-alpha and draw-hook changes invalidate GPU-visible fixed
//! state that queued geometry was built against; opaque and no-overlap only
//! reclassify subsequent draws.

use std::sync::Arc;

use crate::device::DrawCall;
use crate::palette::{Palette, PaletteRemap};

/// Texture sampling filter selected for the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerFilter {
    /// Smooth bilinear filtering (default).
    #[default]
    Linear,
    /// Pixel-perfect nearest-neighbor filtering.
    Nearest,
    /// Linear filtering with UV wrapping.
    LinearRepeat,
    /// Nearest filtering with UV wrapping.
    NearestRepeat,
}

/// Observes every draw call issued at flush time; pushed by callers that
/// need to inject custom fixed state around specific draws.
pub trait DrawHook {
    fn on_draw(&self, call: &DrawCall);
}

/// A scoped push/pop stack with a permanent default entry at depth 1.
#[derive(Debug)]
pub struct ContextStack<T> {
    items: Vec<T>,
    name: &'static str,
}

impl<T: Clone> ContextStack<T> {
    pub fn new(name: &'static str, default: T) -> Self {
        ContextStack {
            items: vec![default],
            name,
        }
    }

    pub fn push(&mut self, value: T) {
        self.items.push(value);
    }

    /// Returns `false` (and leaves the stack untouched) on an unmatched pop.
    pub fn pop(&mut self) -> bool {
        if self.items.len() <= 1 {
            debug_assert!(false, "unmatched pop on {} stack", self.name);
            tracing::warn!(stack = self.name, "unmatched pop ignored");
            return false;
        }
        self.items.pop();
        true
    }

    pub fn current(&self) -> &T {
        self.items.last().expect("stack always holds its default")
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }

    /// Drop everything above the default entry.
    pub fn reset_to(&mut self, default: T) {
        self.items.clear();
        self.items.push(default);
    }
}

/// The full set of context stacks owned by the renderer.
pub struct ContextStacks {
    pub sampler: ContextStack<SamplerFilter>,
    pub opaque: ContextStack<bool>,
    pub no_overlap: ContextStack<bool>,
    pub premultiplied: ContextStack<bool>,
    pub palette: ContextStack<Palette>,
    pub remap: ContextStack<PaletteRemap>,
    pub draw_hook: ContextStack<Option<Arc<dyn DrawHook>>>,
}

impl ContextStacks {
    pub fn new() -> Self {
        ContextStacks {
            sampler: ContextStack::new("sampler", SamplerFilter::default()),
            opaque: ContextStack::new("opaque", false),
            no_overlap: ContextStack::new("no_overlap", false),
            premultiplied: ContextStack::new("premultiplied", false),
            palette: ContextStack::new("palette", Palette::DEFAULT),
            remap: ContextStack::new("palette_remap", PaletteRemap::IDENTITY),
            draw_hook: ContextStack::new("draw_hook", None),
        }
    }

    /// True when every stack is back at its default depth; checked at
    /// `end()`.
    pub fn balanced(&self) -> bool {
        self.sampler.depth() == 1
            && self.opaque.depth() == 1
            && self.no_overlap.depth() == 1
            && self.premultiplied.depth() == 1
            && self.palette.depth() == 1
            && self.remap.depth() == 1
            && self.draw_hook.depth() == 1
    }

    /// Full teardown, used on device loss.
    pub fn reset(&mut self) {
        self.sampler.reset_to(SamplerFilter::default());
        self.opaque.reset_to(false);
        self.no_overlap.reset_to(false);
        self.premultiplied.reset_to(false);
        self.palette.reset_to(Palette::DEFAULT);
        self.remap.reset_to(PaletteRemap::IDENTITY);
        self.draw_hook.reset_to(None);
    }
}

impl Default for ContextStacks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_round_trip() {
        let mut stack = ContextStack::new("test", SamplerFilter::Linear);
        stack.push(SamplerFilter::Nearest);
        assert_eq!(*stack.current(), SamplerFilter::Nearest);
        assert!(stack.pop());
        assert_eq!(*stack.current(), SamplerFilter::Linear);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn unmatched_pop_is_a_no_op_in_release() {
        let mut stack = ContextStack::new("test", false);
        assert!(!stack.pop());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    #[should_panic(expected = "unmatched pop")]
    #[cfg(debug_assertions)]
    fn unmatched_pop_asserts_in_debug() {
        let mut stack = ContextStack::new("test", false);
        stack.pop();
    }

    #[test]
    fn balanced_detects_leftover_pushes() {
        let mut stacks = ContextStacks::new();
        assert!(stacks.balanced());
        stacks.no_overlap.push(true);
        assert!(!stacks.balanced());
        stacks.no_overlap.pop();
        assert!(stacks.balanced());
    }
}
