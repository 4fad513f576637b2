// Image file plumbing: decode into RGBA8, cap the working size, encode PNG.

use crate::error::{Error, Result};
use image::{ImageFormat, RgbaImage, imageops::FilterType};
use log::info;
use std::path::Path;

/// Longest edge the editor works at by default.
pub const DEFAULT_MAX_EDGE: u32 = 600;

/// Decode any format the `image` crate understands into RGBA8.
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.display().to_string(),
        source,
    })?;
    let rgba = img.to_rgba8();
    info!("loaded {} ({}x{})", path.display(), rgba.width(), rgba.height());
    Ok(rgba)
}

/// Size after shrinking so neither edge exceeds `max_edge`. Never upscales.
pub fn fitted_size(w: u32, h: u32, max_edge: u32) -> (u32, u32) {
    if w <= max_edge && h <= max_edge {
        return (w, h);
    }
    // integer floor(short · max / long) avoids 599.999 style rounding
    let scale = |short: u32, long: u32| ((short as u64 * max_edge as u64) / long as u64).max(1) as u32;
    if w >= h { (max_edge, scale(h, w)) } else { (scale(w, h), max_edge) }
}

/// Downscale `img` when its longer edge is over `max_edge`.
pub fn fit_to_max_edge(img: RgbaImage, max_edge: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let (fw, fh) = fitted_size(w, h, max_edge);
    if (fw, fh) == (w, h) {
        return img;
    }
    info!("downscaling {w}x{h} -> {fw}x{fh}");
    image::imageops::resize(&img, fw, fh, FilterType::Triangle)
}

/// Encode `img` as PNG at `path`.
pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|source| Error::ImageSave { path: path.display().to_string(), source })?;
    info!("saved {}", path.display());
    Ok(())
}
