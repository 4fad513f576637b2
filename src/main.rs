// What you SEE:
// • The loaded picture, fitted so its longer edge is at most 600 px.
// • Hold Left Mouse and drag: the brush pushes, pinches or bloats the image.
// • A magnifier in the corner shows the area under the cursor.
// • HUD line at the top: tool, falloff, sampling, view, radius, strength, model.
// Keys: 1/2/3 tool, F falloff, P sampling, E edge protection, W mask weighting,
//       G generate mask, V show mask, Tab view, O original, R reset, S save,
//       [ ] radius, - = strength, Esc quit.

use clap::Parser;
use liquify::config::Cli;
use liquify::draw::{
    Drawer, draw_circle, draw_crosshair, draw_magnifier, draw_text_5x7, magnifier_origin,
};
use liquify::gamma::GammaLut;
use liquify::view::overlay_mask;
use liquify::{
    Error, FrameBuffer, LiquifyEngine, MaskPipeline, MaskWeighting, MaskWorker, Tool,
};
use log::{debug, info, warn};
use minifb::Key;
use std::borrow::Cow;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const BRUSH_COLOR: u32 = 0x00_FF_CC_33;
const HUD_COLOR: u32 = 0x00_FF_FF_FF;
const RADIUS_STEP: f32 = 5.0;
const STRENGTH_STEP: f32 = 0.1;

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    /* --- Engine + image ---
       Visual: nothing yet; the picture is decoded and fitted. */
    let mut engine = LiquifyEngine::new(cli.engine_settings());
    engine.load_path(&cli.image)?;
    let Some((w, h)) = engine.dimensions() else {
        warn!("{} has no pixels", cli.image.display());
        return Ok(());
    };

    /* --- Segmentation model, loaded off the UI thread ---
       Visual: HUD shows LOADING, then READY (or FAILED). */
    let provider = Arc::new(cli.provider());
    {
        let provider = Arc::clone(&provider);
        thread::spawn(move || {
            provider.load();
        });
    }
    let mut worker = MaskWorker::new(Arc::clone(&provider), MaskPipeline::new(cli.blur_radius));

    let mut drawer = Drawer::new("Liquify", w, h)?;
    let mut screen = FrameBuffer::new(w, h);
    let lut = GammaLut::new();

    let mut was_down = false;
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut hud_fps_text = String::from("FPS 0.0");

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        let now = Instant::now();

        /* 1) Keys */
        let mut brush = engine.settings().brush;
        for (key, tool) in [(Key::Key1, Tool::Push), (Key::Key2, Tool::Pinch), (Key::Key3, Tool::Bloat)] {
            if drawer.pressed_once(key) {
                brush.tool = tool;
            }
        }
        if drawer.pressed_once(Key::F) {
            brush.falloff = brush.falloff.toggled();
        }
        if drawer.pressed_once(Key::E) {
            brush.edge_protection = !brush.edge_protection;
        }
        if drawer.pressed_once(Key::W) {
            brush.mask_weighting = match brush.mask_weighting {
                MaskWeighting::Off => MaskWeighting::Attenuate,
                MaskWeighting::Attenuate => MaskWeighting::Off,
            };
        }
        if drawer.pressed_once(Key::LeftBracket) {
            brush.radius -= RADIUS_STEP;
        }
        if drawer.pressed_once(Key::RightBracket) {
            brush.radius += RADIUS_STEP;
        }
        if drawer.pressed_once(Key::Minus) {
            brush.strength -= STRENGTH_STEP;
        }
        if drawer.pressed_once(Key::Equal) {
            brush.strength += STRENGTH_STEP;
        }
        if brush != engine.settings().brush {
            engine.set_brush(brush);
        }

        if drawer.pressed_once(Key::P) {
            let policy = engine.settings().sampling.toggled();
            engine.set_sampling(policy);
            info!("sampling: {}", policy.label());
        }
        if drawer.pressed_once(Key::Tab) {
            engine.set_view_mode(engine.view_mode().next());
        }
        if drawer.pressed_once(Key::O) {
            engine.set_show_original(!engine.show_original());
        }
        if drawer.pressed_once(Key::V) {
            engine.set_mask_visible(!engine.mask_visible());
        }
        if drawer.pressed_once(Key::R) {
            engine.reset();
        }
        if drawer.pressed_once(Key::S) {
            if let Err(e) = engine.save_png(&cli.output) {
                warn!("{e}");
            }
        }
        if drawer.pressed_once(Key::G) {
            if let Some(out) = engine.output() {
                match worker.request(out.clone(), engine.generation()) {
                    Ok(()) => info!("generating mask with {}", provider.name()),
                    Err(e) => warn!("{e}"),
                }
            }
        }

        /* 2) Pointer → brush. Leaving the window ends the drag. */
        let mouse = drawer.mouse_pos();
        let down = drawer.left_mouse_down();
        match mouse {
            Some((mx, my)) => {
                if down && !was_down {
                    engine.pointer_down(mx, my);
                } else if down {
                    engine.pointer_move(mx, my);
                } else if was_down {
                    engine.pointer_up();
                }
            }
            None => engine.pointer_leave(),
        }
        was_down = down && mouse.is_some();

        /* 3) Background mask, if one finished this frame */
        if let Some(job) = worker.poll() {
            engine.accept_mask_job(job);
        }

        /* 4) Base image for this frame
           Visual: composite, source, before/after split, or heatmap. */
        let divider = mouse.map(|(mx, _)| mx as u32).unwrap_or(w as u32 / 2);
        let base = if engine.show_original() {
            engine.source().map(Cow::Borrowed)
        } else {
            engine.view_raster(divider)
        };
        if let Some(base) = &base {
            screen.copy_from_rgba(base)?;
        }
        if engine.mask_visible() {
            if let Some(mask) = engine.mask() {
                overlay_mask(&mut screen, mask, &lut);
            }
        }

        /* 5) Brush outline, crosshair, magnifier */
        if let Some((mx, my)) = mouse {
            let r = engine.settings().brush.radius.round() as i32;
            draw_circle(&mut screen, mx as i32, my as i32, r, BRUSH_COLOR);
            draw_crosshair(&mut screen, mx as i32, my as i32, 6, BRUSH_COLOR);
            if let Some(base) = &base {
                let (ox, oy) = magnifier_origin(w, mx, my);
                draw_magnifier(&mut screen, base, mx, my, ox, oy);
            }
        }

        /* 6) HUD */
        let s = engine.settings();
        let mask_tag = if engine.mask().is_some() { " MASK" } else { "" };
        let line1 = format!(
            "{} {} {} | {}{}",
            s.brush.tool.label(),
            s.brush.falloff.label(),
            s.sampling.label(),
            if engine.show_original() { "ORIGINAL" } else { engine.view_mode().label() },
            if s.brush.edge_protection { " EDGE" } else { "" },
        );
        let line2 = format!(
            "R {:.0} S {:.1} | {}{}{} | {}",
            s.brush.radius,
            s.brush.strength,
            provider.state().label(),
            mask_tag,
            if worker.is_busy() { " ..." } else { "" },
            hud_fps_text,
        );
        draw_text_5x7(&mut screen, 8, 8, &line1, HUD_COLOR);
        draw_text_5x7(&mut screen, 8, 18, &line2, HUD_COLOR);

        /* 7) Present */
        drawer.present(&screen)?;

        /* 8) FPS, once per second */
        frames_this_second += 1;
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            let fps = frames_this_second as f32 / secs;
            debug!("FPS: {fps:.1}");
            hud_fps_text = format!("FPS {fps:.1}");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    Ok(())
}
