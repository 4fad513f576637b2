//! The editing session: source raster, output raster, displacement field and
//! optional mask, driven by pointer events.
//!
//! Each pointer move is handled to completion (stamp, then recomposite)
//! before the next one is looked at. Without a loaded image every operation
//! is a no-op.

use crate::brush::{self, BrushSettings, Stroke};
use crate::error::Result;
use crate::field::DisplacementField;
use crate::io::{self, DEFAULT_MAX_EDGE};
use crate::types::{Mask, Rect};
use crate::view::{self, ViewMode};
use crate::warp::{self, Recompute, SamplingPolicy};
use crate::worker::MaskJob;
use image::RgbaImage;
use log::{debug, info, warn};
use std::borrow::Cow;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineSettings {
    pub brush: BrushSettings,
    pub sampling: SamplingPolicy,
    pub recompute: Recompute,
    /// Longer image edge is scaled down to this on load; `None` keeps full size.
    pub max_edge: Option<u32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            brush: BrushSettings::default(),
            sampling: SamplingPolicy::Clamp,
            recompute: Recompute::FullFrame,
            max_edge: Some(DEFAULT_MAX_EDGE),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragState {
    Idle,
    /// Last pointer sample, used for the motion delta of the next stamp.
    Dragging { x: f32, y: f32 },
}

struct Session {
    source: RgbaImage,
    output: RgbaImage,
    field: DisplacementField,
    mask: Option<Mask>,
}

pub struct LiquifyEngine {
    settings: EngineSettings,
    session: Option<Session>,
    drag: DragState,
    generation: u64,
    show_original: bool,
    view: ViewMode,
    mask_visible: bool,
}

impl Default for LiquifyEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl LiquifyEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings: EngineSettings { brush: settings.brush.clamped(), ..settings },
            session: None,
            drag: DragState::Idle,
            generation: 0,
            show_original: false,
            view: ViewMode::Edit,
            mask_visible: false,
        }
    }

    /* ---------------------------- image lifecycle ---------------------------- */

    /// Start a new session on `img`. The field is reallocated at the (possibly
    /// downscaled) image size and any previous mask is dropped.
    pub fn load(&mut self, img: RgbaImage) {
        let source = match self.settings.max_edge {
            Some(cap) => io::fit_to_max_edge(img, cap),
            None => img,
        };
        let (w, h) = (source.width() as usize, source.height() as usize);
        if w == 0 || h == 0 {
            warn!("ignoring empty image");
            return;
        }
        let field = DisplacementField::new(w, h);
        let mut output = RgbaImage::new(w as u32, h as u32);
        // sizes match by construction
        if let Err(e) = warp::composite_into(&source, &field, self.settings.sampling, &mut output) {
            warn!("initial composite failed: {e}");
            return;
        }
        self.session = Some(Session { source, output, field, mask: None });
        self.generation += 1;
        self.drag = DragState::Idle;
        info!("editing {w}x{h} image (generation {})", self.generation);
    }

    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        let img = io::load_image(path)?;
        self.load(img);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Bumped on every load; mask results from older generations are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.session.as_ref().map(|s| s.field.dimensions())
    }

    pub fn source(&self) -> Option<&RgbaImage> {
        self.session.as_ref().map(|s| &s.source)
    }

    /// The true composite, whatever the view mode.
    pub fn output(&self) -> Option<&RgbaImage> {
        self.session.as_ref().map(|s| &s.output)
    }

    pub fn field(&self) -> Option<&DisplacementField> {
        self.session.as_ref().map(|s| &s.field)
    }

    /* -------------------------------- settings ------------------------------- */

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Replace every setting at once. `max_edge` applies from the next load.
    pub fn set_settings(&mut self, settings: EngineSettings) {
        self.set_brush(settings.brush);
        self.settings.recompute = settings.recompute;
        self.settings.max_edge = settings.max_edge;
        self.set_sampling(settings.sampling);
    }

    pub fn set_brush(&mut self, brush: BrushSettings) {
        self.settings.brush = brush.clamped();
    }

    /// Switching policy changes every pixel's lookup, so the whole frame is rebuilt.
    pub fn set_sampling(&mut self, policy: SamplingPolicy) {
        if self.settings.sampling == policy {
            return;
        }
        self.settings.sampling = policy;
        self.recomposite(None);
    }

    pub fn set_recompute(&mut self, recompute: Recompute) {
        self.settings.recompute = recompute;
    }

    /* ----------------------------- pointer events ---------------------------- */

    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        if self.session.is_none() {
            return;
        }
        self.drag = DragState::Dragging { x, y };
    }

    /// Stamp with the motion since the previous sample and refresh the output.
    /// Returns the cells that changed, or `None` when idle, off-image, or the
    /// pointer has not moved since the last sample.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Option<Rect> {
        let DragState::Dragging { x: lx, y: ly } = self.drag else {
            return None;
        };
        if (x, y) == (lx, ly) {
            return None;
        }
        self.drag = DragState::Dragging { x, y };
        let stroke = Stroke { x, y, dx: x - lx, dy: y - ly };
        self.apply_stroke(&stroke)
    }

    pub fn pointer_up(&mut self) {
        self.drag = DragState::Idle;
    }

    pub fn pointer_leave(&mut self) {
        self.drag = DragState::Idle;
    }

    /// One stamp plus the matching recomposite.
    pub fn apply_stroke(&mut self, stroke: &Stroke) -> Option<Rect> {
        let brush = self.settings.brush;
        let session = self.session.as_mut()?;
        let touched = brush::stamp(&mut session.field, stroke, &brush, session.mask.as_ref())?;
        let region = match self.settings.recompute {
            Recompute::FullFrame => None,
            Recompute::DirtyRect => Some(touched),
        };
        self.recomposite(region);
        Some(touched)
    }

    /// Zero the field and show the source again.
    pub fn reset(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.field.reset();
        self.drag = DragState::Idle;
        self.recomposite(None);
        info!("displacement reset");
    }

    fn recomposite(&mut self, region: Option<Rect>) {
        let policy = self.settings.sampling;
        let Some(s) = self.session.as_mut() else {
            return;
        };
        let res = match region {
            Some(rect) => warp::composite_region(&s.source, &s.field, policy, &mut s.output, rect),
            None => warp::composite_into(&s.source, &s.field, policy, &mut s.output),
        };
        if let Err(e) = res {
            warn!("composite failed: {e}");
        }
    }

    /* ---------------------------------- mask --------------------------------- */

    pub fn mask(&self) -> Option<&Mask> {
        self.session.as_ref().and_then(|s| s.mask.as_ref())
    }

    /// Install a mask. Returns false (and keeps the old one) if the size is wrong.
    pub fn set_mask(&mut self, mask: Mask) -> bool {
        let Some(s) = self.session.as_mut() else {
            return false;
        };
        if (mask.width, mask.height) != s.field.dimensions() {
            warn!(
                "mask {}x{} does not match image {}x{}",
                mask.width,
                mask.height,
                s.field.width(),
                s.field.height()
            );
            return false;
        }
        s.mask = Some(mask);
        true
    }

    pub fn clear_mask(&mut self) {
        if let Some(s) = self.session.as_mut() {
            s.mask = None;
        }
    }

    /// Take a finished background job. Failures keep editing going without a
    /// mask; results computed for an earlier image are dropped.
    pub fn accept_mask_job(&mut self, job: MaskJob) -> bool {
        if job.generation != self.generation {
            debug!("dropping mask for stale generation {}", job.generation);
            return false;
        }
        match job.result {
            Ok(mask) => {
                let ok = self.set_mask(mask);
                if ok {
                    info!("mask ready");
                }
                ok
            }
            Err(e) => {
                warn!("mask generation failed: {e}");
                false
            }
        }
    }

    /* --------------------------------- display -------------------------------- */

    pub fn show_original(&self) -> bool {
        self.show_original
    }

    pub fn set_show_original(&mut self, on: bool) {
        self.show_original = on;
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view = mode;
    }

    pub fn mask_visible(&self) -> bool {
        self.mask_visible
    }

    pub fn set_mask_visible(&mut self, on: bool) {
        self.mask_visible = on;
    }

    /// What the main canvas shows: the source while "show original" is on,
    /// otherwise the composite.
    pub fn displayed(&self) -> Option<&RgbaImage> {
        let s = self.session.as_ref()?;
        Some(if self.show_original { &s.source } else { &s.output })
    }

    /// Raster for the magnifier in the current view mode. `divider_x` places
    /// the before/after split.
    pub fn view_raster(&self, divider_x: u32) -> Option<Cow<'_, RgbaImage>> {
        let s = self.session.as_ref()?;
        Some(match self.view {
            ViewMode::Edit => Cow::Borrowed(&s.output),
            ViewMode::BeforeAfter => Cow::Owned(view::split_view(&s.source, &s.output, divider_x)),
            ViewMode::Displacement => Cow::Owned(view::heatmap(&s.field)),
        })
    }

    /// Write the composite as PNG. Returns false when there is nothing loaded.
    pub fn save_png(&self, path: &Path) -> Result<bool> {
        match self.output() {
            Some(out) => io::save_png(out, path).map(|_| true),
            None => Ok(false),
        }
    }
}
