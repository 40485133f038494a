//! Frame compositor.
//!
//! One call paints one complete frame: swap decision, flash-sequence
//! advance, base draw, overlay with reveal cutouts, the glitch-pattern
//! layer, a whole-frame chromatic-shift and scanline pass, then the
//! glowing transient artifacts. Side effects are confined
//! to the surface and the session; all randomness flows through the
//! injected [`RandomSource`].

use anyhow::{Context, Result};
use tiny_skia::{BlendMode, Color, Paint, Pixmap, PixmapPaint, Rect, Transform};

use crate::effects::{self, PixelBufferError};
use crate::images::{ImageSet, SourceImage};
use crate::palette;
use crate::params::{CutoutTier, EffectParams};
use crate::rng::RandomSource;
use crate::sequence;
use crate::session::{PlaybackSession, TransientArtifact};

/// How long the chromatic echo lingers after a sequence transition.
const ECHO_WINDOW_MS: f64 = 50.0;
/// Per-block probability of a thin vertical color streak.
const STREAK_PROBABILITY: f64 = 0.3;
/// Size bound for the holes punched through the whole glitch layer.
const GLITCH_HOLE_FRACTION: f64 = 0.25;
/// Vertical offset of the blue/orange glow passes around an artifact.
const GLOW_OFFSET: f32 = 3.0;
const GLOW_BLUR_RADIUS: usize = 3;

/// A randomized rounded rectangle, always finite, non-negative and fully
/// inside the canvas it was generated for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutoutRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub radius: f32,
}

/// Generate one cutout rect for a tier. Width and height are bounded by the
/// tier's size fraction of the matching canvas dimension and the rect is
/// placed so it never leaves the canvas.
pub fn random_cutout_rect(
    canvas_w: u32,
    canvas_h: u32,
    tier: &CutoutTier,
    rng: &mut dyn RandomSource,
) -> CutoutRect {
    random_rect(canvas_w, canvas_h, tier.max_size_fraction, rng)
}

fn random_rect(
    canvas_w: u32,
    canvas_h: u32,
    max_size_fraction: f64,
    rng: &mut dyn RandomSource,
) -> CutoutRect {
    let cw = canvas_w.max(1) as f64;
    let ch = canvas_h.max(1) as f64;
    let max_w = (cw * max_size_fraction).max(2.0).min(cw);
    let max_h = (ch * max_size_fraction).max(2.0).min(ch);

    let w = rng.range_f64((max_w * 0.2).max(2.0).min(max_w), max_w);
    let h = rng.range_f64((max_h * 0.2).max(2.0).min(max_h), max_h);
    let x = rng.range_f64(0.0, (cw - w).max(0.0));
    let y = rng.range_f64(0.0, (ch - h).max(0.0));
    let radius = rng.range_f64(1.0, (w.min(h) / 2.0).max(1.0));

    CutoutRect {
        x: x as f32,
        y: y as f32,
        w: w as f32,
        h: h as f32,
        radius: radius as f32,
    }
}

fn sample_count(tier: &CutoutTier, rng: &mut dyn RandomSource) -> usize {
    rng.range_usize(tier.min_count as usize, tier.max_count as usize)
}

fn new_layer(width: u32, height: u32) -> Result<Pixmap> {
    Pixmap::new(width, height)
        .with_context(|| format!("failed to allocate {width}x{height} compositing layer"))
}

fn stretch_transform(surface: &Pixmap, image: &SourceImage) -> Transform {
    Transform::from_scale(
        surface.width() as f32 / image.width() as f32,
        surface.height() as f32 / image.height() as f32,
    )
}

fn draw_stretched(surface: &mut Pixmap, image: &SourceImage, paint: &PixmapPaint, dx: f32, dy: f32) {
    let transform = stretch_transform(surface, image).post_translate(dx, dy);
    surface.draw_pixmap(0, 0, image.pixmap().as_ref(), paint, transform, None);
}

/// Paint one fully composited frame onto `surface`.
///
/// Mutates only the surface and the session. The caller gates availability:
/// this function assumes both images are decoded and the surface matches
/// the primary image's natural dimensions.
pub fn render_frame(
    surface: &mut Pixmap,
    images: &ImageSet,
    params: &EffectParams,
    session: &mut PlaybackSession,
    now_ms: f64,
    rng: &mut dyn RandomSource,
) -> Result<()> {
    session.update_swap(params, now_ms, rng);

    let steps = sequence::steps_for(images);
    let transitioned = session.advance_sequence(steps, now_ms);
    let base_slot = steps[session.sequence_cursor.min(steps.len() - 1)].slot;
    let (base, overlay) = if session.swapped {
        (images.overlay_for(base_slot), images.slot(base_slot))
    } else {
        (images.slot(base_slot), images.overlay_for(base_slot))
    };

    surface.fill(Color::WHITE);
    draw_stretched(surface, base, &PixmapPaint::default(), 0.0, 0.0);

    composite_overlay(surface, overlay, &params.reveal_cutouts, rng)?;

    if transitioned && rng.chance(params.transition_flash_probability) {
        paint_flash_bar(surface, rng);
    }
    if session.since_transition_ms(now_ms) < ECHO_WINDOW_MS {
        paint_echo(surface, base, rng);
    }

    // The skip roll happens every frame, even when intensity is zero.
    if !rng.chance(params.glitch_layer_skip_probability) {
        composite_glitch_layer(surface, params, rng)?;
    }

    distress_surface(surface, params)?;

    session.update_artifacts(params, surface.width(), surface.height(), rng);
    composite_artifacts(surface, &session.artifacts)?;
    Ok(())
}

/// Overlay image with wide reveal cutouts, built off-screen so the holes
/// erase only the overlay, then composited onto the main surface.
fn composite_overlay(
    surface: &mut Pixmap,
    overlay: &SourceImage,
    tier: &CutoutTier,
    rng: &mut dyn RandomSource,
) -> Result<()> {
    let mut layer = new_layer(surface.width(), surface.height())?;
    draw_stretched(&mut layer, overlay, &PixmapPaint::default(), 0.0, 0.0);

    for _ in 0..sample_count(tier, rng) {
        let hole = random_cutout_rect(surface.width(), surface.height(), tier, rng);
        effects::cut_rounded_hole(&mut layer, hole.x, hole.y, hole.w, hole.h, hole.radius);
    }

    surface.draw_pixmap(
        0,
        0,
        layer.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Ok(())
}

/// Whole-frame chromatic shift and scanline pass over the composed image.
/// Both effects are strict no-ops at zero intensity and draw nothing from
/// the rng, so decision streams are unaffected.
fn distress_surface(surface: &mut Pixmap, params: &EffectParams) -> Result<(), PixelBufferError> {
    let width = surface.width() as usize;
    let height = surface.height() as usize;
    let intensity = params.intensity_fraction();
    effects::channel_shift(surface.data_mut(), width, height, intensity)?;
    effects::scanlines(surface.data_mut(), width, height, intensity)
}

/// Full-width white bar, at most 10 px tall, at a random row.
fn paint_flash_bar(surface: &mut Pixmap, rng: &mut dyn RandomSource) {
    let width = surface.width() as f32;
    let height = surface.height() as f32;
    let bar_h = rng.range_f64(2.0, 10.0).min(height as f64) as f32;
    let y = rng.range_f64(0.0, (height - bar_h).max(0.0) as f64) as f32;

    let Some(rect) = Rect::from_xywh(0.0, y, width, bar_h) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(Color::WHITE);
    paint.anti_alias = false;
    surface.fill_rect(rect, &paint, Transform::identity(), None);
}

/// Chromatic echo right after a sequence transition: the base image drawn
/// again at a small random offset with an additive blend.
fn paint_echo(surface: &mut Pixmap, base: &SourceImage, rng: &mut dyn RandomSource) {
    let dx = rng.range_f64(-5.0, 5.0) as f32;
    let dy = rng.range_f64(-5.0, 5.0) as f32;
    let paint = PixmapPaint {
        opacity: 0.4,
        blend_mode: BlendMode::Screen,
        ..PixmapPaint::default()
    };
    draw_stretched(surface, base, &paint, dx, dy);
}

/// Gradient-block glitch layer with its own holes, built off-screen.
fn composite_glitch_layer(
    surface: &mut Pixmap,
    params: &EffectParams,
    rng: &mut dyn RandomSource,
) -> Result<()> {
    let width = surface.width();
    let height = surface.height();
    let mut layer = new_layer(width, height)?;
    let intensity = params.intensity_fraction();

    for _ in 0..sample_count(&params.glitch_cutouts, rng) {
        let block = random_cutout_rect(width, height, &params.glitch_cutouts, rng);
        let bands = rng.range_usize(2, 5);
        effects::gradient_bands(
            &mut layer, block.x, block.y, block.w, block.h, bands, rng,
        );
        if rng.chance(STREAK_PROBABILITY) {
            paint_streak(&mut layer, &block, rng);
        }
        distress_block(&mut layer, &block, intensity, rng)?;
    }

    for _ in 0..rng.range_usize(2, 4) {
        let hole = random_rect(width, height, GLITCH_HOLE_FRACTION, rng);
        effects::cut_rounded_hole(&mut layer, hole.x, hole.y, hole.w, hole.h, hole.radius);
    }

    surface.draw_pixmap(
        0,
        0,
        layer.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Ok(())
}

/// Thin vertical color streak spanning the block's height.
fn paint_streak(layer: &mut Pixmap, block: &CutoutRect, rng: &mut dyn RandomSource) {
    let streak_w = rng.range_f64(1.0, 3.0) as f32;
    let x = block.x + rng.range_f64(0.0, (block.w - streak_w).max(0.0) as f64) as f32;
    let Some(rect) = Rect::from_xywh(x, block.y, streak_w, block.h) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(palette::pick(rng, 230));
    // Sub-pixel streaks must take the non-AA fill path; the AA scan
    // asserts on rects whose interior collapses to zero whole pixels.
    paint.anti_alias = false;
    layer.fill_rect(rect, &paint, Transform::identity(), None);
}

/// Intensity-scaled distress over a painted block: 2-4 horizontal row
/// displacements plus sparse noise. At zero intensity the tears have zero
/// shift and the noise writes nothing, so the buffer is left byte-identical.
pub fn distress_block(
    layer: &mut Pixmap,
    block: &CutoutRect,
    intensity: f64,
    rng: &mut dyn RandomSource,
) -> Result<(), PixelBufferError> {
    let width = layer.width() as usize;
    let height = layer.height() as usize;
    let x0 = (block.x.max(0.0) as usize).min(width);
    let x1 = ((block.x + block.w).ceil().max(0.0) as usize).min(width);
    let y0 = (block.y.max(0.0) as usize).min(height);
    let y1 = ((block.y + block.h).ceil().max(0.0) as usize).min(height);
    if x1 <= x0 || y1 <= y0 {
        return Ok(());
    }

    let max_shift = (intensity.clamp(0.0, 1.0) * 10.0).floor() as usize;
    let tears = rng.range_usize(2, 4);
    let band_h = ((y1 - y0) / tears).max(1);
    for _ in 0..tears {
        let start = rng.range_usize(y0, y1 - 1);
        let end = (start + rng.range_usize(1, band_h)).min(y1);
        let magnitude = if max_shift == 0 {
            0
        } else {
            rng.range_usize(1, max_shift) as isize
        };
        let shift = if rng.chance(0.5) { magnitude } else { -magnitude };
        effects::displace_rows(layer.data_mut(), width, height, x0, x1, start, end, shift)?;
    }

    region_noise(layer, x0, x1, y0, y1, intensity, rng);
    Ok(())
}

/// Sparse noise over painted pixels of a region. The layer is premultiplied,
/// so deltas clamp to the pixel's alpha; untouched (transparent) pixels stay
/// transparent.
fn region_noise(
    layer: &mut Pixmap,
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
    intensity: f64,
    rng: &mut dyn RandomSource,
) {
    let intensity = intensity.clamp(0.0, 1.0);
    if intensity == 0.0 {
        return;
    }
    let probability = intensity * 0.3;
    let amount = intensity * 50.0;
    let width = layer.width() as usize;
    let data = layer.data_mut();

    for y in y0..y1 {
        for x in x0..x1 {
            let i = (y * width + x) * 4;
            let alpha = data[i + 3];
            if alpha == 0 || !rng.chance(probability) {
                continue;
            }
            let delta = (rng.next_f64() - 0.5) * amount;
            for c in 0..3 {
                data[i + c] = (data[i + c] as f64 + delta).clamp(0.0, alpha as f64) as u8;
            }
        }
    }
}

/// Three-pass artifact glow: blue offset above and orange offset below,
/// blurred together, then a sharp white core, all composited additively so
/// overlapping artifacts brighten instead of occluding.
fn composite_artifacts(surface: &mut Pixmap, artifacts: &[TransientArtifact]) -> Result<()> {
    if artifacts.is_empty() {
        return Ok(());
    }
    let mut glow = new_layer(surface.width(), surface.height())?;
    let blue = Color::from_rgba8(80, 140, 255, 200);
    let orange = Color::from_rgba8(255, 140, 50, 200);

    for a in artifacts {
        let radius = (a.w.min(a.h) * 0.3).max(1.0);
        effects::fill_rounded_rect(
            &mut glow,
            a.x,
            a.y - GLOW_OFFSET,
            a.w,
            a.h,
            radius,
            blue,
            BlendMode::SourceOver,
        );
        effects::fill_rounded_rect(
            &mut glow,
            a.x,
            a.y + GLOW_OFFSET,
            a.w,
            a.h,
            radius,
            orange,
            BlendMode::SourceOver,
        );
    }
    effects::box_blur(&mut glow, GLOW_BLUR_RADIUS);

    for a in artifacts {
        let inset_x = a.w * 0.15;
        let inset_y = a.h * 0.15;
        let core_w = a.w - inset_x * 2.0;
        let core_h = a.h - inset_y * 2.0;
        let radius = (core_w.min(core_h) * 0.3).max(0.5);
        effects::fill_rounded_rect(
            &mut glow,
            a.x + inset_x,
            a.y + inset_y,
            core_w,
            core_h,
            radius,
            Color::WHITE,
            BlendMode::SourceOver,
        );
    }

    surface.draw_pixmap(
        0,
        0,
        glow.as_ref(),
        &PixmapPaint {
            blend_mode: BlendMode::Screen,
            ..PixmapPaint::default()
        },
        Transform::identity(),
        None,
    );
    Ok(())
}
