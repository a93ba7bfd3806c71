//! Vesper Core
//!
//! Shared utilities for the Vesper renderer: geometry value types and
//! logging initialization.

pub mod geometry;
pub mod logging;
