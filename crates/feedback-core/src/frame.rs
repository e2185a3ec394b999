use serde::{Deserialize, Serialize};

/// Number of f32 channels per pixel (RGBA).
pub const CHANNELS: usize = 4;

/// A high-dynamic-range RGBA frame with f32 channels.
///
/// This is the host-side image representation: the source frames fed into the
/// effect and the delay buffer read back for inspection both use it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Row-major RGBA pixel data, `width * height * 4` values.
    pub data: Vec<f32>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer filled with zeros (transparent black).
    pub fn new(width: u32, height: u32) -> Self {
        let size = (width as usize) * (height as usize) * CHANNELS;
        Self {
            data: vec![0.0; size],
            width,
            height,
        }
    }

    /// Create a frame buffer where every pixel has the given RGBA value.
    pub fn solid(width: u32, height: u32, rgba: [f32; 4]) -> Self {
        let pixel_count = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixel_count * CHANNELS);
        for _ in 0..pixel_count {
            data.extend_from_slice(&rgba);
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Wrap existing RGBA data. Returns None when the length does not match.
    pub fn from_raw(width: u32, height: u32, data: Vec<f32>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * CHANNELS {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [f32; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = ((y as usize) * (self.width as usize) + (x as usize)) * CHANNELS;
        self.data[offset..offset + CHANNELS].copy_from_slice(&rgba);
    }

    /// Largest absolute per-channel difference to `other`.
    /// Returns None when dimensions differ.
    pub fn max_abs_diff(&self, other: &FrameBuffer) -> Option<f32> {
        if self.dimensions() != other.dimensions() {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f32::max),
        )
    }

    /// True when every channel of every pixel is zero.
    pub fn is_cleared(&self) -> bool {
        self.data.iter().all(|v| *v == 0.0)
    }

    /// Clamp to [0, 1] and quantize to 8-bit RGBA for display or PNG export.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }
}

/// Pixel dimensions of the camera viewport for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized or collapsed viewport has nothing to render into.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
