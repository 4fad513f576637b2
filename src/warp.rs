// Warp compositor: rebuilds the output raster from source + displacement.
// Inverse mapping: output(x,y) = source(x - dx, y - dy), nearest neighbour.
// Each output pixel reads only its own field cell, so recomputing just the
// rectangle a stamp touched gives exactly the same frame as a full pass.

use crate::error::{Error, Result};
use crate::field::DisplacementField;
use crate::types::Rect;
use image::{Rgba, RgbaImage};

/// What to do when x - dx / y - dy lands outside the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SamplingPolicy {
    /// Clamp into the image, then floor. Edge pixels stretch.
    Clamp,
    /// Round half up; if outside, keep the unwarped pixel at (x,y).
    FallbackToOriginal,
}

impl SamplingPolicy {
    pub fn toggled(self) -> Self {
        match self {
            SamplingPolicy::Clamp => SamplingPolicy::FallbackToOriginal,
            SamplingPolicy::FallbackToOriginal => SamplingPolicy::Clamp,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SamplingPolicy::Clamp => "CLAMP",
            SamplingPolicy::FallbackToOriginal => "FALLBACK",
        }
    }
}

/// How much of the frame to rebuild after a stamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Recompute {
    /// Every pixel, every stamp.
    FullFrame,
    /// Only the cells the stamp wrote.
    DirtyRect,
}

/// Source pixel (column, row) that feeds output pixel (x,y).
#[inline]
pub fn sample_coord(
    policy: SamplingPolicy,
    x: usize,
    y: usize,
    dx: f32,
    dy: f32,
    w: usize,
    h: usize,
) -> (usize, usize) {
    let sx = x as f32 - dx;
    let sy = y as f32 - dy;
    match policy {
        SamplingPolicy::Clamp => {
            let cx = sx.clamp(0.0, (w - 1) as f32).floor() as usize;
            let cy = sy.clamp(0.0, (h - 1) as f32).floor() as usize;
            (cx, cy)
        }
        SamplingPolicy::FallbackToOriginal => {
            // half up, so -0.5 lands on column 0
            let rx = (sx + 0.5).floor();
            let ry = (sy + 0.5).floor();
            if rx >= 0.0 && ry >= 0.0 && rx < w as f32 && ry < h as f32 {
                (rx as usize, ry as usize)
            } else {
                (x, y)
            }
        }
    }
}

fn check_sizes(source: &RgbaImage, field: &DisplacementField, out: &RgbaImage) -> Result<()> {
    let src = (source.width() as usize, source.height() as usize);
    if field.dimensions() != src {
        return Err(Error::size_mismatch("composite: field", src, field.dimensions()));
    }
    let dst = (out.width() as usize, out.height() as usize);
    if dst != src {
        return Err(Error::size_mismatch("composite: output", src, dst));
    }
    Ok(())
}

/// Rebuild every pixel of `out`.
pub fn composite_into(
    source: &RgbaImage,
    field: &DisplacementField,
    policy: SamplingPolicy,
    out: &mut RgbaImage,
) -> Result<()> {
    let (w, h) = field.dimensions();
    composite_region(source, field, policy, out, Rect { x0: 0, y0: 0, x1: w, y1: h })
}

/// Rebuild only the pixels inside `rect` (clipped to the image).
pub fn composite_region(
    source: &RgbaImage,
    field: &DisplacementField,
    policy: SamplingPolicy,
    out: &mut RgbaImage,
    rect: Rect,
) -> Result<()> {
    check_sizes(source, field, out)?;
    let (w, h) = field.dimensions();
    let (x1, y1) = (rect.x1.min(w), rect.y1.min(h));

    for y in rect.y0..y1 {
        for x in rect.x0..x1 {
            let o = field.get(x, y);
            let (sx, sy) = sample_coord(policy, x, y, o.dx, o.dy, w, h);
            let p = source.get_pixel(sx as u32, sy as u32);
            // output is always opaque, whatever the source alpha
            out.put_pixel(x as u32, y as u32, Rgba([p[0], p[1], p[2], 255]));
        }
    }
    Ok(())
}

/// Allocate and fill a fresh output raster.
pub fn composite(
    source: &RgbaImage,
    field: &DisplacementField,
    policy: SamplingPolicy,
) -> Result<RgbaImage> {
    let mut out = RgbaImage::new(source.width(), source.height());
    composite_into(source, field, policy, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every pixel a different colour so sampling mistakes show up.
    fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([(x * 10) as u8, (y * 10) as u8, 7, 128]))
    }

    fn opaque(p: &Rgba<u8>) -> Rgba<u8> {
        Rgba([p[0], p[1], p[2], 255])
    }

    #[test]
    fn identity_field_reproduces_source_opaque() {
        let src = gradient(6, 5);
        let field = DisplacementField::new(6, 5);
        for policy in [SamplingPolicy::Clamp, SamplingPolicy::FallbackToOriginal] {
            let out = composite(&src, &field, policy).unwrap();
            for (x, y, p) in out.enumerate_pixels() {
                assert_eq!(*p, opaque(src.get_pixel(x, y)));
            }
        }
    }

    #[test]
    fn clamp_floors_and_clamps() {
        assert_eq!(sample_coord(SamplingPolicy::Clamp, 2, 2, -0.9, 0.0, 4, 4), (2, 2));
        assert_eq!(sample_coord(SamplingPolicy::Clamp, 2, 2, 0.5, 1.2, 4, 4), (1, 0));
        assert_eq!(sample_coord(SamplingPolicy::Clamp, 0, 3, 5.0, -9.0, 4, 4), (0, 3));
    }

    #[test]
    fn fallback_rounds_and_keeps_original_when_outside() {
        let p = SamplingPolicy::FallbackToOriginal;
        assert_eq!(sample_coord(p, 2, 2, -0.9, 0.0, 4, 4), (3, 2));
        assert_eq!(sample_coord(p, 2, 2, 0.4, 0.6, 4, 4), (2, 1));
        assert_eq!(sample_coord(p, 1, 1, 3.0, 0.0, 4, 4), (1, 1));
        assert_eq!(sample_coord(p, 3, 3, 0.0, -0.6, 4, 4), (3, 3));
        // exact halves round up, including at the left and top edges
        assert_eq!(sample_coord(p, 1, 0, 1.5, 0.0, 4, 4), (0, 0));
        assert_eq!(sample_coord(p, 0, 1, 0.0, 1.5, 4, 4), (0, 0));
        assert_eq!(sample_coord(p, 2, 2, -0.5, 0.0, 4, 4), (3, 2));
        assert_eq!(sample_coord(p, 3, 0, -0.5, 0.0, 4, 4), (3, 0));
    }

    #[test]
    fn shifted_field_samples_neighbour() {
        let src = gradient(5, 5);
        let mut field = DisplacementField::new(5, 5);
        field.add(2, 2, 1.0, 0.0);
        let out = composite(&src, &field, SamplingPolicy::Clamp).unwrap();
        assert_eq!(*out.get_pixel(2, 2), opaque(src.get_pixel(1, 2)));
        assert_eq!(*out.get_pixel(3, 2), opaque(src.get_pixel(3, 2)));
    }

    #[test]
    fn policies_differ_at_the_border() {
        let src = gradient(4, 4);
        let mut field = DisplacementField::new(4, 4);
        field.add(3, 1, -2.0, 0.0); // asks for column 5
        let clamp = composite(&src, &field, SamplingPolicy::Clamp).unwrap();
        let fallback = composite(&src, &field, SamplingPolicy::FallbackToOriginal).unwrap();
        assert_eq!(*clamp.get_pixel(3, 1), opaque(src.get_pixel(3, 1)));
        field.reset();
        field.add(1, 1, -5.0, 0.0); // column 6: clamp stretches the edge
        let clamp = composite(&src, &field, SamplingPolicy::Clamp).unwrap();
        let fallback2 = composite(&src, &field, SamplingPolicy::FallbackToOriginal).unwrap();
        assert_eq!(*clamp.get_pixel(1, 1), opaque(src.get_pixel(3, 1)));
        assert_eq!(*fallback2.get_pixel(1, 1), opaque(src.get_pixel(1, 1)));
        assert_eq!(*fallback.get_pixel(3, 1), opaque(src.get_pixel(3, 1)));
    }

    #[test]
    fn region_matches_full_frame() {
        let src = gradient(12, 9);
        let mut field = DisplacementField::new(12, 9);
        for y in 3..6 {
            for x in 4..8 {
                field.add(x, y, (x as f32) * 0.3 - 1.0, 0.7);
            }
        }
        let full = composite(&src, &field, SamplingPolicy::FallbackToOriginal).unwrap();

        let mut partial = composite(&src, &DisplacementField::new(12, 9), SamplingPolicy::FallbackToOriginal).unwrap();
        composite_region(
            &src,
            &field,
            SamplingPolicy::FallbackToOriginal,
            &mut partial,
            Rect { x0: 4, y0: 3, x1: 8, y1: 6 },
        )
        .unwrap();
        assert_eq!(full, partial);
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let src = gradient(4, 4);
        let field = DisplacementField::new(3, 4);
        assert!(matches!(
            composite(&src, &field, SamplingPolicy::Clamp),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
