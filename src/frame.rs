//! Input frames
//!
//! The opaque binary payload a caller submits for recognition: a raw
//! RGBA pixel buffer plus its dimensions. Frames are owned by the
//! request that carries them.

use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::Path;

/// An RGBA image buffer submitted for recognition.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw RGBA pixel data, row-major from the top-left corner
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Create a frame from raw parts.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Create a frame from a decoded RGBA image.
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
        }
    }

    /// Decode an image file into a frame.
    pub fn load(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to decode image {:?}", path))?;
        Ok(Self::from_rgba_image(image.to_rgba8()))
    }

    /// Frame dimensions as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when there is nothing to recognize: no pixel data or a
    /// zero-sized image.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }
}
