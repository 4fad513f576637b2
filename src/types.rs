// Core buffers shared by the engine and the window shell.

use crate::error::{Error, Result};
use image::RgbaImage;

/// Pack one RGB triplet as 0x00RRGGBB (the layout minifb expects).
#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,      // how wide the frame is on screen (pixels)
    pub height: usize,     // how tall the frame is on screen (pixels)
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    /// Overwrite the whole frame with an RGBA raster of the same size.
    /// Alpha is dropped; the window has no notion of transparency.
    pub fn copy_from_rgba(&mut self, img: &RgbaImage) -> Result<()> {
        let got = (img.width() as usize, img.height() as usize);
        if got != (self.width, self.height) {
            return Err(Error::size_mismatch("frame copy", (self.width, self.height), got));
        }
        for (dst, px) in self.pixels.iter_mut().zip(img.pixels()) {
            *dst = pack_rgb(px[0], px[1], px[2]);
        }
        Ok(())
    }
}

/// Per-pixel scalar in [0,1]. 1 = confidently part of the protected subject.
/// Produced by the mask pipeline; consumed by the brush and the overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,  // length = width * height, row-major
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, values: vec![0.0; width * height] }
    }

    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != width * height {
            return Err(Error::size_mismatch("mask values", (width, height), (values.len(), 1)));
        }
        Ok(Self { width, height, values })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    /// Smallest and largest value; `None` for an empty mask.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut it = self.values.iter().copied();
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// Half-open pixel rectangle `[x0,x1) × [y0,y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Rect {
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    pub fn area(&self) -> usize {
        if self.is_empty() { 0 } else { (self.x1 - self.x0) * (self.y1 - self.y0) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_rgb_layout() {
        assert_eq!(pack_rgb(0x12, 0x34, 0x56), 0x0012_3456);
    }

    #[test]
    fn frame_copy_drops_alpha() {
        let img = RgbaImage::from_pixel(2, 1, image::Rgba([10, 20, 30, 7]));
        let mut fb = FrameBuffer::new(2, 1);
        fb.copy_from_rgba(&img).unwrap();
        assert_eq!(fb.pixels, vec![pack_rgb(10, 20, 30); 2]);
    }

    #[test]
    fn frame_copy_rejects_other_size() {
        let img = RgbaImage::new(3, 3);
        let mut fb = FrameBuffer::new(2, 2);
        assert!(matches!(fb.copy_from_rgba(&img), Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn mask_min_max() {
        let m = Mask::from_values(2, 2, vec![0.3, -1.0, 4.0, 0.0]).unwrap();
        assert_eq!(m.min_max(), Some((-1.0, 4.0)));
        assert!(Mask::from_values(2, 2, vec![0.0; 3]).is_err());
    }

    #[test]
    fn rect_area() {
        assert_eq!(Rect { x0: 1, y0: 2, x1: 4, y1: 3 }.area(), 3);
        assert!(Rect { x0: 4, y0: 0, x1: 4, y1: 9 }.is_empty());
    }
}
