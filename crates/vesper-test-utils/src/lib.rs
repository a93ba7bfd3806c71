//! Test utilities for the Vesper renderer.
//!
//! Provides [`MockDevice`], a [`GraphicsDevice`](vesper_render::GraphicsDevice)
//! implementation that records operations instead of touching a GPU.

mod mock_device;

pub use mock_device::{DeviceCall, MockDevice};
