// Derived preview rasters. Nothing here mutates the field or the buffers;
// every view is recomputed from current state when asked for.

use crate::field::{DisplacementField, Offset};
use crate::gamma::GammaLut;
use crate::types::{FrameBuffer, Mask, pack_rgb};
use image::{Rgba, RgbaImage};

/// Offset length that saturates the heatmap (6.375 · 40 = 255).
pub const HEAT_GAIN: f32 = 40.0;
/// Overlay opacity of the mask (100 / 255).
pub const MASK_OVERLAY_ALPHA: f32 = 100.0 / 255.0;
const DIVIDER: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    /// The live composite.
    Edit,
    /// Source on the left of the divider, composite on the right.
    BeforeAfter,
    /// Offset magnitude as a red/green heatmap.
    Displacement,
}

impl ViewMode {
    pub fn next(self) -> Self {
        match self {
            ViewMode::Edit => ViewMode::BeforeAfter,
            ViewMode::BeforeAfter => ViewMode::Displacement,
            ViewMode::Displacement => ViewMode::Edit,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Edit => "EDIT",
            ViewMode::BeforeAfter => "BEFORE/AFTER",
            ViewMode::Displacement => "HEAT",
        }
    }
}

/// Heat colour for one offset: red grows with magnitude, green is its complement.
#[inline]
pub fn heat_color(o: Offset) -> Rgba<u8> {
    let red = (o.magnitude() * HEAT_GAIN).min(255.0) as u8;
    Rgba([red, 255 - red, 50, 255])
}

pub fn heatmap(field: &DisplacementField) -> RgbaImage {
    let (w, h) = field.dimensions();
    RgbaImage::from_fn(w as u32, h as u32, |x, y| heat_color(field.get(x as usize, y as usize)))
}

/// Panel split: columns left of `divider_x` come from `before`, the rest from
/// `after`, with a one-pixel divider line at `divider_x`.
pub fn split_view(before: &RgbaImage, after: &RgbaImage, divider_x: u32) -> RgbaImage {
    RgbaImage::from_fn(after.width(), after.height(), |x, y| {
        if x == divider_x {
            DIVIDER
        } else if x < divider_x && x < before.width() && y < before.height() {
            *before.get_pixel(x, y)
        } else {
            *after.get_pixel(x, y)
        }
    })
}

/// Blend the mask over the frame as (0, 255·m, 255 - 255·m) at fixed opacity.
/// The mix happens in linear light through `lut`, not as a plain sRGB lerp,
/// so the tint reads brighter over dark pixels than a canvas overlay would.
/// Frame and mask must share a size; otherwise the frame is left alone.
pub fn overlay_mask(fb: &mut FrameBuffer, mask: &Mask, lut: &GammaLut) {
    if mask.width != fb.width || mask.height != fb.height {
        return;
    }
    let a = MASK_OVERLAY_ALPHA;
    for (px, m) in fb.pixels.iter_mut().zip(&mask.values) {
        let val = (m.clamp(0.0, 1.0) * 255.0).floor() as u8;
        let r = ((*px >> 16) & 0xFF) as u8;
        let g = ((*px >> 8) & 0xFF) as u8;
        let b = (*px & 0xFF) as u8;
        *px = pack_rgb(lut.mix(r, 0, a), lut.mix(g, val, a), lut.mix(b, 255 - val, a));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heat_saturates_exactly_at_6_375() {
        let c = heat_color(Offset { dx: 6.375, dy: 0.0 });
        assert_eq!(c, Rgba([255, 0, 50, 255]));
        let c = heat_color(Offset { dx: 30.0, dy: -40.0 });
        assert_eq!(c.0[0], 255);
        assert_eq!(c.0[1], 0);
    }

    #[test]
    fn heat_green_complements_red() {
        for m in [0.0f32, 0.5, 1.0, 3.3, 6.0] {
            let c = heat_color(Offset { dx: 0.0, dy: m });
            assert_eq!(c.0[0] as u16 + c.0[1] as u16, 255);
            assert_eq!(c.0[2], 50);
            assert_eq!(c.0[3], 255);
        }
        assert_eq!(heat_color(Offset::ZERO), Rgba([0, 255, 50, 255]));
    }

    #[test]
    fn heatmap_reads_field_without_changing_it() {
        let mut field = DisplacementField::new(3, 2);
        field.add(1, 1, 3.0, 4.0);
        let before = field.clone();
        let map = heatmap(&field);
        assert_eq!(map.dimensions(), (3, 2));
        assert_eq!(*map.get_pixel(1, 1), Rgba([200, 55, 50, 255]));
        assert_eq!(*map.get_pixel(0, 0), Rgba([0, 255, 50, 255]));
        assert_eq!(field.offsets(), before.offsets());
    }

    #[test]
    fn split_picks_sides() {
        let before = RgbaImage::from_pixel(5, 2, Rgba([1, 1, 1, 255]));
        let after = RgbaImage::from_pixel(5, 2, Rgba([9, 9, 9, 255]));
        let split = split_view(&before, &after, 2);
        assert_eq!(*split.get_pixel(1, 0), Rgba([1, 1, 1, 255]));
        assert_eq!(*split.get_pixel(2, 1), DIVIDER);
        assert_eq!(*split.get_pixel(4, 1), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn mask_overlay_tints_toward_green_where_confident() {
        let lut = GammaLut::new();
        let mut fb = FrameBuffer::new(2, 1);
        fb.pixels.fill(pack_rgb(128, 128, 128));
        let mask = Mask::from_values(2, 1, vec![1.0, 0.0]).unwrap();
        overlay_mask(&mut fb, &mask, &lut);
        let g0 = (fb.pixels[0] >> 8) & 0xFF;
        let b0 = fb.pixels[0] & 0xFF;
        let g1 = (fb.pixels[1] >> 8) & 0xFF;
        let b1 = fb.pixels[1] & 0xFF;
        assert!(g0 > b0);
        assert!(b1 > g1);
    }

    #[test]
    fn mask_overlay_mixes_in_linear_light() {
        let lut = GammaLut::new();
        let mut fb = FrameBuffer::new(1, 1);
        let mask = Mask::from_values(1, 1, vec![1.0]).unwrap();
        overlay_mask(&mut fb, &mask, &lut);
        let g = ((fb.pixels[0] >> 8) & 0xFF) as u8;
        assert_eq!(g, lut.mix(0, 255, MASK_OVERLAY_ALPHA));
        // a plain sRGB lerp would give 100
        assert!(g > 100);
        assert_eq!(fb.pixels[0] >> 16 & 0xFF, 0);
        assert_eq!(fb.pixels[0] & 0xFF, 0);
    }

    #[test]
    fn view_modes_cycle() {
        let mut m = ViewMode::Edit;
        for _ in 0..3 {
            m = m.next();
        }
        assert_eq!(m, ViewMode::Edit);
    }
}
