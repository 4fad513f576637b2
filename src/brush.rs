// Brush stamp: turns one stroke sample into displacement inside a circle.
// Only cells strictly inside the brush radius change; everything else keeps
// its offset, so untouched pixels keep rendering the source unchanged.

use crate::field::DisplacementField;
use crate::types::{Mask, Rect};

/// Allowed brush radius in pixels (what the config surface clamps to).
pub const RADIUS_RANGE: (f32, f32) = (10.0, 150.0);
/// Allowed brush strength.
pub const STRENGTH_RANGE: (f32, f32) = (0.1, 1.0);

/// strength × 3 × 0.3: the push gain of the plain exponential brush.
pub const DEFAULT_PUSH_SCALE: f32 = 0.9;
/// Gain of pinch/bloat relative to the distance from the center.
pub const PINCH_SCALE: f32 = 0.1;
/// Edge protection reaches zero at this multiple of the radius.
const EDGE_PROTECT_SPAN: f32 = 1.15;
/// Relief term gain: radial × 0.25 × 0.015.
const SHADING_GAIN: f32 = 0.25 * 0.015;

/// Radial weight: 1 at the center, ~0 at the rim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Falloff {
    /// exp(-d²/r²)
    Exponential,
    /// cos(d/r · π/2)²
    RaisedCosine,
}

impl Falloff {
    #[inline]
    pub fn weight(self, dist: f32, radius: f32) -> f32 {
        match self {
            Falloff::Exponential => (-(dist * dist) / (radius * radius)).exp(),
            Falloff::RaisedCosine => {
                let c = (dist / radius * std::f32::consts::FRAC_PI_2).cos();
                c * c
            }
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Falloff::Exponential => Falloff::RaisedCosine,
            Falloff::RaisedCosine => Falloff::Exponential,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Falloff::Exponential => "EXP",
            Falloff::RaisedCosine => "COS",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Tool {
    /// Drag the surface along with the pointer motion.
    Push,
    /// Pull nearby source pixels toward the center.
    Pinch,
    /// Push pixels away from the center.
    Bloat,
}

impl Tool {
    pub fn label(self) -> &'static str {
        match self {
            Tool::Push => "PUSH",
            Tool::Pinch => "PINCH",
            Tool::Bloat => "BLOAT",
        }
    }
}

/// How a protection mask scales the stamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskWeighting {
    /// Mask is display-only; every cell gets full weight.
    Off,
    /// Scale by (1 - mask) so confident regions barely move.
    Attenuate,
}

impl MaskWeighting {
    /// Weight for one cell. A missing mask always means weight 1.
    #[inline]
    pub fn weight(self, mask: Option<&Mask>, x: usize, y: usize) -> f32 {
        match (self, mask) {
            (MaskWeighting::Attenuate, Some(m)) => 1.0 - m.get(x, y).clamp(0.0, 1.0),
            _ => 1.0,
        }
    }
}

/// Everything that shapes a stamp apart from where it lands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushSettings {
    pub radius: f32,
    pub strength: f32,
    pub tool: Tool,
    pub falloff: Falloff,
    /// Extra fade toward the rim so the brush circle never shows.
    pub edge_protection: bool,
    /// Small outward relief added to push strokes.
    pub shading: bool,
    pub mask_weighting: MaskWeighting,
    pub push_scale: f32,
    pub pinch_scale: f32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 25.0,
            strength: 0.4,
            tool: Tool::Push,
            falloff: Falloff::Exponential,
            edge_protection: false,
            shading: false,
            mask_weighting: MaskWeighting::Off,
            push_scale: DEFAULT_PUSH_SCALE,
            pinch_scale: PINCH_SCALE,
        }
    }
}

impl BrushSettings {
    /// Exponential falloff with edge protection and relief shading.
    pub fn natural() -> Self {
        Self {
            edge_protection: true,
            shading: true,
            push_scale: 2.2 * 0.25,
            ..Self::default()
        }
    }

    /// Raised-cosine falloff with the protection mask hooked in.
    pub fn tools() -> Self {
        Self {
            radius: 30.0,
            strength: 0.5,
            falloff: Falloff::RaisedCosine,
            mask_weighting: MaskWeighting::Attenuate,
            push_scale: 1.0,
            ..Self::default()
        }
    }

    /// Pull radius and strength into their allowed ranges.
    pub fn clamped(mut self) -> Self {
        self.radius = clamp_or(self.radius, RADIUS_RANGE);
        self.strength = clamp_or(self.strength, STRENGTH_RANGE);
        self
    }
}

// NaN falls back to the lower bound.
fn clamp_or(v: f32, (lo, hi): (f32, f32)) -> f32 {
    if v.is_nan() { lo } else { v.clamp(lo, hi) }
}

/// One pointer sample: where the brush is and how far it moved since the last one.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stroke {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
}

/// Bounding box of the brush circle clipped to `[0,w) × [0,h)`.
pub fn brush_bounds(cx: f32, cy: f32, radius: f32, w: usize, h: usize) -> Option<Rect> {
    if !(radius > 0.0) || !cx.is_finite() || !cy.is_finite() {
        return None;
    }
    let lo = |c: f32| (c - radius).floor().max(0.0) as usize;
    let hi = |c: f32, limit: usize| ((c + radius).floor() + 1.0).clamp(0.0, limit as f32) as usize;
    let rect = Rect { x0: lo(cx), y0: lo(cy), x1: hi(cx, w), y1: hi(cy, h) };
    if rect.is_empty() { None } else { Some(rect) }
}

/// Add one stroke sample into the field.
///
/// Returns the rectangle of cells that were written, or `None` when the
/// brush lies entirely outside the image. A mask whose size differs from
/// the field is ignored.
pub fn stamp(
    field: &mut DisplacementField,
    stroke: &Stroke,
    settings: &BrushSettings,
    mask: Option<&Mask>,
) -> Option<Rect> {
    let (w, h) = field.dimensions();
    let r = settings.radius;
    let bounds = brush_bounds(stroke.x, stroke.y, r, w, h)?;
    let mask = mask.filter(|m| m.width == w && m.height == h);

    let push_gain = settings.strength * settings.push_scale;
    let pinch_gain = settings.strength * settings.pinch_scale;

    let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0, 0);
    for y in bounds.y0..bounds.y1 {
        for x in bounds.x0..bounds.x1 {
            let rx = x as f32 - stroke.x;
            let ry = y as f32 - stroke.y;
            let dist = (rx * rx + ry * ry).sqrt();
            if dist >= r { continue; }            // outside the circle

            let fall = settings.falloff.weight(dist, r);

            let (mut fx, mut fy) = match settings.tool {
                Tool::Push => (-stroke.dx * fall * push_gain, -stroke.dy * fall * push_gain),
                Tool::Pinch => (-rx * fall * pinch_gain, -ry * fall * pinch_gain),
                Tool::Bloat => (rx * fall * pinch_gain, ry * fall * pinch_gain),
            };

            if settings.shading && settings.tool == Tool::Push {
                let relief = (1.0 - dist / r) * SHADING_GAIN;
                fx += rx * relief;
                fy += ry * relief;
            }

            let mut scale = settings.mask_weighting.weight(mask, x, y);
            if settings.edge_protection {
                scale *= 1.0 - (dist / (r * EDGE_PROTECT_SPAN)).min(1.0);
            }

            field.add(x, y, fx * scale, fy * scale);

            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x + 1);
            y1 = y1.max(y + 1);
        }
    }

    let touched = Rect { x0, y0, x1, y1 };
    if touched.is_empty() { None } else { Some(touched) }
}
