// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::engine::Capabilities;

/// Limits and feature flags of a [`super::SoftEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct SoftConfig {
    /// Largest `columns * rows` a single frame may have.
    pub max_pixels: u64,
    /// Most frames a decoded or derived list may have.
    pub max_frames: usize,
    /// Depth given to frames that do not specify one.
    pub default_depth: u32,
    /// Capabilities the engine reports.
    pub capabilities: Capabilities,
}

impl Default for SoftConfig {
    fn default() -> Self {
        SoftConfig {
            max_pixels: 1 << 26,
            max_frames: 4096,
            default_depth: 8,
            capabilities: Capabilities::all(),
        }
    }
}

impl SoftConfig {
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }
}
