//! Per-Scene output surfaces
//!
//! The shared GPU context renders into one large surface; after each pass the
//! Scene's region is copied into its own [`OutputSurface`], which the host
//! composites into the page.

use bytemuck::{Pod, Zeroable};

/// One RGBA8 pixel
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct Rgba8 {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha
    pub a: u8,
}

impl Rgba8 {
    /// Fully transparent black
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Create a pixel
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Number of pixels in a `width × height` buffer, computed without `u32` overflow
pub(crate) fn pixel_count(width: u32, height: u32) -> usize {
    (width as usize).saturating_mul(height as usize)
}

/// A Scene's own pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSurface {
    width: u32,
    height: u32,
    pixels: Vec<Rgba8>,
}

impl OutputSurface {
    /// Create a transparent surface (zero dimensions are raised to 1)
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![Rgba8::TRANSPARENT; pixel_count(width, height)],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Change dimensions, clearing the contents
    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    /// Pixels in row-major order
    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }

    /// Mutable pixels in row-major order
    pub fn pixels_mut(&mut self) -> &mut [Rgba8] {
        &mut self.pixels
    }

    /// Raw RGBA bytes, e.g. for upload to a compositor
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Copy the top-left `width × height` region of a larger row-major buffer
    ///
    /// Rows beyond the source are left untouched.
    pub fn copy_region_from(&mut self, source: &[Rgba8], source_width: u32) {
        let columns = self.width.min(source_width) as usize;
        let source_width = source_width as usize;
        let width = self.width as usize;
        for (row, destination) in self.pixels.chunks_exact_mut(width).enumerate() {
            let start = row * source_width;
            let Some(source_row) = source.get(start..start + columns) else {
                break;
            };
            destination[..columns].copy_from_slice(source_row);
        }
    }
}
