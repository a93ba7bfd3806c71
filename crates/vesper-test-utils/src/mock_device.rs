//! Mock implementation of `GraphicsDevice` for testing.
//!
//! Records every operation the flush controller performs so tests can
//! assert on draw-call counts, merge behavior, bound slot arrays and
//! buffer growth without a GPU.

use vesper_render::{
    BlendCategory, DrawCall, GraphicsDevice, PaletteId, PassState, RemapId, TextureId,
};

/// One recorded GPU operation.
#[derive(Debug, Clone)]
pub enum DeviceCall {
    EnsureCapacity {
        bytes: u64,
    },
    WriteGeometry {
        offset: u64,
        data: Vec<u8>,
    },
    BindPassState {
        state: PassState,
    },
    BindTransforms {
        count: usize,
    },
    BindTextures {
        textures: Vec<TextureId>,
    },
    BindPalettes {
        palettes: Vec<PaletteId>,
    },
    BindRemaps {
        remaps: Vec<RemapId>,
    },
    Draw(DrawCall),
}

/// Records operations without interacting with any GPU.
#[derive(Debug, Default)]
pub struct MockDevice {
    calls: Vec<DeviceCall>,
    capacity: u64,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// All draws issued so far, in submission order.
    pub fn draws(&self) -> Vec<DrawCall> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    pub fn draw_count(&self) -> usize {
        self.draws().len()
    }

    pub fn opaque_draws(&self) -> Vec<DrawCall> {
        self.draws()
            .into_iter()
            .filter(|d| d.bucket.blend == BlendCategory::Opaque)
            .collect()
    }

    pub fn alpha_draws(&self) -> Vec<DrawCall> {
        self.draws()
            .into_iter()
            .filter(|d| d.bucket.blend == BlendCategory::Alpha)
            .collect()
    }

    /// Current geometry buffer capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn write_count(&self) -> usize {
        self.writes().len()
    }

    /// Geometry writes so far, as (offset, bytes) pairs in issue order.
    /// Tests can parse instance structs back out of the bytes.
    pub fn writes(&self) -> Vec<(u64, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::WriteGeometry { offset, data } => Some((*offset, data.clone())),
                _ => None,
            })
            .collect()
    }

    /// The most recently bound pass state, if any flush happened.
    pub fn last_pass_state(&self) -> Option<PassState> {
        self.calls.iter().rev().find_map(|call| match call {
            DeviceCall::BindPassState { state } => Some(*state),
            _ => None,
        })
    }

    /// Texture slot array from the most recent flush.
    pub fn last_bound_textures(&self) -> Option<Vec<TextureId>> {
        self.calls.iter().rev().find_map(|call| match call {
            DeviceCall::BindTextures { textures } => Some(textures.clone()),
            _ => None,
        })
    }

    /// Transform slot count from the most recent flush.
    pub fn last_bound_transform_count(&self) -> Option<usize> {
        self.calls.iter().rev().find_map(|call| match call {
            DeviceCall::BindTransforms { count } => Some(*count),
            _ => None,
        })
    }

    /// Clear recorded calls (useful between test steps). Keeps the
    /// simulated buffer capacity.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl GraphicsDevice for MockDevice {
    fn ensure_geometry_capacity(&mut self, bytes: u64) {
        self.capacity = bytes;
        self.calls.push(DeviceCall::EnsureCapacity { bytes });
    }

    fn write_geometry(&mut self, offset: u64, data: &[u8]) {
        assert!(
            offset + data.len() as u64 <= self.capacity,
            "write past geometry buffer capacity ({} + {} > {})",
            offset,
            data.len(),
            self.capacity
        );
        self.calls.push(DeviceCall::WriteGeometry {
            offset,
            data: data.to_vec(),
        });
    }

    fn bind_pass_state(&mut self, state: &PassState) {
        self.calls.push(DeviceCall::BindPassState { state: *state });
    }

    fn bind_transforms(&mut self, transforms: &[[f32; 6]]) {
        self.calls.push(DeviceCall::BindTransforms {
            count: transforms.len(),
        });
    }

    fn bind_textures(&mut self, textures: &[TextureId]) {
        self.calls.push(DeviceCall::BindTextures {
            textures: textures.to_vec(),
        });
    }

    fn bind_palettes(&mut self, palettes: &[PaletteId]) {
        self.calls.push(DeviceCall::BindPalettes {
            palettes: palettes.to_vec(),
        });
    }

    fn bind_remaps(&mut self, remaps: &[RemapId]) {
        self.calls.push(DeviceCall::BindRemaps {
            remaps: remaps.to_vec(),
        });
    }

    fn draw(&mut self, call: DrawCall) {
        self.calls.push(DeviceCall::Draw(call));
    }
}
