//! Mask pipeline: segmentation scores → smoothed [0,1] mask at image size.
//!
//! Steps, in order:
//!
//! 1. downscale the image to the model input and normalise it per channel
//!    (`(v/255 - mean) / std`, channel-planar),
//! 2. run the inference backend,
//! 3. min-max normalise the raw scores to [0,1],
//! 4. bilinear resize to the working image size,
//! 5. separable gaussian blur with edge clamping.
//!
//! When no model is ready the pipeline does not run at all and the caller
//! keeps working without a mask.

use crate::error::{Error, Result};
use crate::inference::SegmentationProvider;
use crate::types::Mask;
use image::{RgbaImage, imageops::FilterType};
use log::debug;

/// Per-channel mean of the normalisation (RGB).
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel standard deviation of the normalisation (RGB).
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// Default blur radius applied after resizing.
pub const DEFAULT_BLUR_RADIUS: usize = 2;

/// Convert an RGBA raster to a planar `[R..., G..., B...]` float tensor.
pub fn to_tensor(img: &RgbaImage) -> Vec<f32> {
    let plane = (img.width() * img.height()) as usize;
    let mut tensor = vec![0.0f32; 3 * plane];
    for (i, px) in img.pixels().enumerate() {
        for c in 0..3 {
            let v = px[c] as f32 / 255.0;
            tensor[c * plane + i] = (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    tensor
}

/// Squash the image to the model input size and normalise it.
pub fn prepare_input(img: &RgbaImage, input_size: (usize, usize)) -> Vec<f32> {
    let (w, h) = (input_size.0 as u32, input_size.1 as u32);
    if img.dimensions() == (w, h) {
        return to_tensor(img);
    }
    let small = image::imageops::resize(img, w, h, FilterType::Triangle);
    to_tensor(&small)
}

/// Rescale to [0,1] using the observed min/max. A flat grid divides by 1.
pub fn normalize_min_max(scores: &[f32]) -> Vec<f32> {
    let (lo, hi) = scores
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;
    let range = if range > 0.0 { range } else { 1.0 };
    scores.iter().map(|&v| (v - lo) / range).collect()
}

/// Bilinear resize. Destination (x,y) maps to source (x·sw/dw, y·sh/dh);
/// points that land exactly on a source sample reproduce it unchanged.
pub fn resize_bilinear(mask: &Mask, dst_w: usize, dst_h: usize) -> Mask {
    let (sw, sh) = (mask.width, mask.height);
    if sw == 0 || sh == 0 {
        return Mask::new(dst_w, dst_h);
    }
    let x_ratio = sw as f32 / dst_w as f32;
    let y_ratio = sh as f32 / dst_h as f32;

    let mut out = Vec::with_capacity(dst_w * dst_h);
    for y in 0..dst_h {
        let src_y = y as f32 * y_ratio;
        let y1 = (src_y.floor() as usize).min(sh - 1);
        let y2 = (y1 + 1).min(sh - 1);
        let fy = src_y - y1 as f32;

        for x in 0..dst_w {
            let src_x = x as f32 * x_ratio;
            let x1 = (src_x.floor() as usize).min(sw - 1);
            let x2 = (x1 + 1).min(sw - 1);
            let fx = src_x - x1 as f32;

            let v00 = mask.get(x1, y1);
            let v10 = mask.get(x2, y1);
            let v01 = mask.get(x1, y2);
            let v11 = mask.get(x2, y2);

            out.push(
                v00 * (1.0 - fx) * (1.0 - fy)
                    + v10 * fx * (1.0 - fy)
                    + v01 * (1.0 - fx) * fy
                    + v11 * fx * fy,
            );
        }
    }
    Mask { width: dst_w, height: dst_h, values: out }
}

/// 1-D gaussian of `2·radius + 1` taps, weights exp(-i²/(2r²)), summing to 1.
pub fn gaussian_kernel_1d(radius: usize) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }
    let r = radius as i32;
    let denom = 2.0 * (radius * radius) as f32;
    let mut kernel: Vec<f32> = (-r..=r).map(|i| (-((i * i) as f32) / denom).exp()).collect();

    // normalize the kernel
    let norm = kernel.iter().sum::<f32>();
    kernel.iter_mut().for_each(|k| *k /= norm);
    kernel
}

/// Separable gaussian blur: horizontal pass into scratch, then vertical.
/// Samples past the border reuse the edge value.
pub fn gaussian_blur(mask: &Mask, radius: usize) -> Mask {
    let (w, h) = (mask.width, mask.height);
    if radius == 0 || w == 0 || h == 0 {
        return mask.clone();
    }
    let kernel = gaussian_kernel_1d(radius);
    let r = radius as isize;

    /* ---- Pass 1: horizontal (mask -> tmp) ---- */
    let mut tmp = vec![0.0f32; w * h];
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            let mut s = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let nx = (x as isize + k as isize - r).clamp(0, w as isize - 1) as usize;
                s += mask.values[row + nx] * weight;
            }
            tmp[row + x] = s;
        }
    }

    /* ---- Pass 2: vertical (tmp -> out) ---- */
    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut s = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let ny = (y as isize + k as isize - r).clamp(0, h as isize - 1) as usize;
                s += tmp[ny * w + x] * weight;
            }
            out[y * w + x] = s;
        }
    }

    Mask { width: w, height: h, values: out }
}

/// Post-processing after inference: normalise, resize, blur.
pub fn scores_to_mask(
    scores: &[f32],
    score_size: (usize, usize),
    target: (usize, usize),
    blur_radius: usize,
) -> Result<Mask> {
    let (sw, sh) = score_size;
    if scores.len() != sw * sh {
        return Err(Error::Inference(format!(
            "model returned {} scores, expected {}x{}",
            scores.len(),
            sw,
            sh
        )));
    }
    let normalized = Mask::from_values(sw, sh, normalize_min_max(scores))?;
    let resized = resize_bilinear(&normalized, target.0, target.1);
    Ok(gaussian_blur(&resized, blur_radius))
}

/// The full pipeline bound to one blur setting.
#[derive(Clone, Copy, Debug)]
pub struct MaskPipeline {
    pub blur_radius: usize,
}

impl Default for MaskPipeline {
    fn default() -> Self {
        Self { blur_radius: DEFAULT_BLUR_RADIUS }
    }
}

impl MaskPipeline {
    pub fn new(blur_radius: usize) -> Self {
        Self { blur_radius }
    }

    /// Produce a mask aligned to `img`. Fails when the provider is not
    /// ready or the backend errors; callers fall back to "no mask".
    pub fn run(&self, provider: &SegmentationProvider, img: &RgbaImage) -> Result<Mask> {
        let input_size = provider.input_size()?;
        let tensor = prepare_input(img, input_size);
        let scores = provider.infer(&tensor)?;
        debug!(
            "mask pipeline: {} scores at {}x{} -> {}x{}",
            scores.len(),
            input_size.0,
            input_size.1,
            img.width(),
            img.height()
        );
        scores_to_mask(
            &scores,
            input_size,
            (img.width() as usize, img.height() as usize),
            self.blur_radius,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use image::Rgba;

    #[test]
    fn tensor_is_planar_and_normalised() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 255, 51, 0]) }
        });
        let t = to_tensor(&img);
        assert_eq!(t.len(), 6);
        assert_relative_eq!(t[0], (1.0 - 0.485) / 0.229);
        assert_relative_eq!(t[1], (0.0 - 0.485) / 0.229);
        assert_relative_eq!(t[3], (1.0 - 0.456) / 0.224);
        assert_relative_eq!(t[5], (0.2 - 0.406) / 0.225, epsilon = 1e-5);
    }

    #[test]
    fn prepare_input_matches_model_size() {
        let img = RgbaImage::from_pixel(40, 30, Rgba([128, 128, 128, 255]));
        assert_eq!(prepare_input(&img, (8, 8)).len(), 3 * 64);
    }

    #[test]
    fn min_max_spans_unit_interval() {
        let out = normalize_min_max(&[-3.0, 1.0, 5.0, 2.0]);
        let lo = out.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = out.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert_abs_diff_eq!(lo, 0.0);
        assert_abs_diff_eq!(hi, 1.0);
        assert_relative_eq!(out[1], 0.5);
    }

    #[test]
    fn flat_scores_do_not_divide_by_zero() {
        let out = normalize_min_max(&[0.7; 9]);
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn resize_keeps_aligned_samples() {
        let src = Mask::from_values(2, 2, vec![0.1, 0.4, 0.8, 0.3]).unwrap();
        let big = resize_bilinear(&src, 4, 4);
        // even destination points sit exactly on source samples
        assert_eq!(big.get(0, 0), 0.1);
        assert_eq!(big.get(2, 0), 0.4);
        assert_eq!(big.get(0, 2), 0.8);
        assert_eq!(big.get(2, 2), 0.3);
        // odd points blend halfway
        assert_relative_eq!(big.get(1, 0), 0.25);
        // past the last sample the edge repeats
        assert_relative_eq!(big.get(3, 0), 0.4);
    }

    #[test]
    fn resize_same_size_is_identity() {
        let src = Mask::from_values(3, 2, vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]).unwrap();
        assert_eq!(resize_bilinear(&src, 3, 2), src);
    }

    #[test]
    fn kernel_sums_to_one() {
        for k in 0..12 {
            let kernel = gaussian_kernel_1d(k);
            assert_eq!(kernel.len(), 2 * k + 1);
            assert_relative_eq!(kernel.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        }
        let kernel = gaussian_kernel_1d(2);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
        assert_relative_eq!(kernel[0], kernel[4]);
    }

    #[test]
    fn blur_keeps_constant_masks_and_spreads_spikes() {
        let flat = Mask::from_values(5, 4, vec![0.6; 20]).unwrap();
        for v in gaussian_blur(&flat, 2).values {
            assert_relative_eq!(v, 0.6, epsilon = 1e-5);
        }

        let mut spike = Mask::new(7, 7);
        spike.values[3 * 7 + 3] = 1.0;
        let blurred = gaussian_blur(&spike, 1);
        assert!(blurred.get(3, 3) < 1.0);
        assert!(blurred.get(2, 3) > 0.0);
        assert_eq!(blurred.get(0, 0), 0.0);
        assert_relative_eq!(blurred.values.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn scores_to_mask_validates_length() {
        assert!(matches!(
            scores_to_mask(&[0.0; 5], (2, 2), (4, 4), 1),
            Err(Error::Inference(_))
        ));
        let m = scores_to_mask(&[0.0, 1.0, 2.0, 3.0], (2, 2), (6, 3), 1).unwrap();
        assert_eq!((m.width, m.height), (6, 3));
        assert!(m.values.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
