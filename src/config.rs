// Command-line configuration. Everything is validated or clamped here so the
// engine can assume radius > 0 and strength ≥ 0.

use crate::brush::{BrushSettings, Falloff, MaskWeighting, Tool};
use crate::engine::EngineSettings;
use crate::inference::SegmentationProvider;
use crate::io::DEFAULT_MAX_EDGE;
use crate::mask::DEFAULT_BLUR_RADIUS;
use crate::warp::{Recompute, SamplingPolicy};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Starting point for the brush before individual flags are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Exponential falloff, push only, clamp sampling.
    Classic,
    /// Exponential falloff with edge protection and relief shading.
    Natural,
    /// Raised-cosine falloff, mask-weighted, fallback sampling.
    Tools,
}

#[derive(Parser, Debug)]
#[command(name = "liquify", version, about = "Push, pinch and bloat an image with a live brush")]
pub struct Cli {
    /// Image to edit (PNG, JPEG, ...)
    pub image: PathBuf,

    /// Where S writes the edited image
    #[arg(short, long, default_value = "edit.png")]
    pub output: PathBuf,

    #[arg(long, value_enum, default_value_t = Preset::Classic)]
    pub preset: Preset,

    /// Brush radius in pixels, clamped to [10, 150]
    #[arg(short, long)]
    pub radius: Option<f32>,

    /// Brush strength, clamped to [0.1, 1.0]
    #[arg(short, long)]
    pub strength: Option<f32>,

    #[arg(long, value_enum)]
    pub tool: Option<Tool>,

    #[arg(long, value_enum)]
    pub falloff: Option<Falloff>,

    #[arg(long, value_enum)]
    pub sampling: Option<SamplingPolicy>,

    #[arg(long, value_enum, default_value_t = Recompute::FullFrame)]
    pub recompute: Recompute,

    #[arg(long)]
    pub edge_protection: Option<bool>,

    #[arg(long)]
    pub shading: Option<bool>,

    /// Scale strokes by (1 - mask) once a mask exists
    #[arg(long)]
    pub mask_weighting: Option<bool>,

    /// Gaussian radius used to smooth the mask
    #[arg(long, default_value_t = DEFAULT_BLUR_RADIUS)]
    pub blur_radius: usize,

    /// Longest edge the image is scaled down to on load
    #[arg(long, default_value_t = DEFAULT_MAX_EDGE)]
    pub max_edge: u32,

    /// Edit at full resolution, ignoring --max-edge
    #[arg(long)]
    pub full_size: bool,

    /// Grayscale image holding precomputed segmentation scores
    #[arg(long, conflicts_with = "model")]
    pub score_map: Option<PathBuf>,

    /// ONNX segmentation model (needs the `onnx` feature)
    #[arg(long)]
    pub model: Option<PathBuf>,
}

impl Cli {
    pub fn brush_settings(&self) -> BrushSettings {
        let mut b = match self.preset {
            Preset::Classic => BrushSettings::default(),
            Preset::Natural => BrushSettings::natural(),
            Preset::Tools => BrushSettings::tools(),
        };
        if let Some(r) = self.radius {
            b.radius = r;
        }
        if let Some(s) = self.strength {
            b.strength = s;
        }
        if let Some(t) = self.tool {
            b.tool = t;
        }
        if let Some(f) = self.falloff {
            b.falloff = f;
        }
        if let Some(on) = self.edge_protection {
            b.edge_protection = on;
        }
        if let Some(on) = self.shading {
            b.shading = on;
        }
        if let Some(on) = self.mask_weighting {
            b.mask_weighting = if on { MaskWeighting::Attenuate } else { MaskWeighting::Off };
        }
        b.clamped()
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let default_sampling = match self.preset {
            Preset::Tools => SamplingPolicy::FallbackToOriginal,
            _ => SamplingPolicy::Clamp,
        };
        EngineSettings {
            brush: self.brush_settings(),
            sampling: self.sampling.unwrap_or(default_sampling),
            recompute: self.recompute,
            max_edge: if self.full_size { None } else { Some(self.max_edge.max(1)) },
        }
    }

    /// The inference provider the flags ask for; `none` when no model was given.
    pub fn provider(&self) -> SegmentationProvider {
        if let Some(path) = &self.score_map {
            return SegmentationProvider::score_map(path.clone());
        }
        match &self.model {
            Some(path) => model_provider(path.clone()),
            None => SegmentationProvider::none(),
        }
    }
}

#[cfg(feature = "onnx")]
fn model_provider(path: PathBuf) -> SegmentationProvider {
    SegmentationProvider::onnx(path)
}

#[cfg(not(feature = "onnx"))]
fn model_provider(path: PathBuf) -> SegmentationProvider {
    log::warn!("{} ignored: built without the `onnx` feature", path.display());
    SegmentationProvider::none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ModelState;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["liquify", "photo.png"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults_match_classic_brush() {
        let cli = parse(&[]);
        let s = cli.engine_settings();
        assert_eq!(s.brush, BrushSettings::default());
        assert_eq!(s.sampling, SamplingPolicy::Clamp);
        assert_eq!(s.recompute, Recompute::FullFrame);
        assert_eq!(s.max_edge, Some(DEFAULT_MAX_EDGE));
        assert_eq!(cli.output, PathBuf::from("edit.png"));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let b = parse(&["--radius", "500", "--strength", "0"]).brush_settings();
        assert_eq!(b.radius, 150.0);
        assert_eq!(b.strength, 0.1);
    }

    #[test]
    fn presets_and_overrides() {
        let cli = parse(&["--preset", "tools", "--tool", "bloat", "--mask-weighting", "false"]);
        let s = cli.engine_settings();
        assert_eq!(s.brush.falloff, Falloff::RaisedCosine);
        assert_eq!(s.brush.tool, Tool::Bloat);
        assert_eq!(s.brush.mask_weighting, MaskWeighting::Off);
        assert_eq!(s.sampling, SamplingPolicy::FallbackToOriginal);

        let cli = parse(&["--preset", "natural", "--sampling", "fallback-to-original", "--full-size"]);
        let s = cli.engine_settings();
        assert!(s.brush.edge_protection && s.brush.shading);
        assert_eq!(s.sampling, SamplingPolicy::FallbackToOriginal);
        assert_eq!(s.max_edge, None);
    }

    #[test]
    fn no_model_means_unloaded_provider() {
        let p = parse(&[]).provider();
        assert_eq!(p.state(), ModelState::Unloaded);
    }

    #[test]
    fn unknown_tool_is_rejected() {
        assert!(Cli::try_parse_from(["liquify", "a.png", "--tool", "twirl"]).is_err());
    }
}
