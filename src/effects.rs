//! Stateless pixel-buffer effects.
//!
//! Raw-buffer primitives operate in place on flat RGBA data and validate
//! their dimensions up front; surface primitives build tiny-skia paths and
//! paints. None of them keep state between calls, and the alpha channel is
//! never modified by the RGBA-buffer effects.

use std::error::Error;
use std::fmt::{Display, Formatter};

use tiny_skia::{
    BlendMode, Color, FillRule, GradientStop, LinearGradient, Paint, Path, PathBuilder, Pixmap,
    Point, Rect, SpreadMode, Transform,
};

use crate::palette;
use crate::rng::RandomSource;

/// Validation failures for the in-place RGBA effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelBufferError {
    DimensionsOverflow,
    BufferLengthMismatch { expected: usize, actual: usize },
}

impl Display for PixelBufferError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DimensionsOverflow => write!(f, "frame dimensions overflowed usize"),
            Self::BufferLengthMismatch { expected, actual } => write!(
                f,
                "RGBA buffer length mismatch: expected {expected} bytes, got {actual} bytes"
            ),
        }
    }
}

impl Error for PixelBufferError {}

fn check_buffer(rgba: &[u8], width: usize, height: usize) -> Result<usize, PixelBufferError> {
    let pixel_count = width
        .checked_mul(height)
        .ok_or(PixelBufferError::DimensionsOverflow)?;
    let expected = pixel_count
        .checked_mul(4)
        .ok_or(PixelBufferError::DimensionsOverflow)?;
    if rgba.len() != expected {
        return Err(PixelBufferError::BufferLengthMismatch {
            expected,
            actual: rgba.len(),
        });
    }
    Ok(pixel_count)
}

/// Chromatic misregistration: red samples from `x + shift`, blue from
/// `x - shift`, both clamped to the row. `intensity` is a `[0, 1]` fraction;
/// the shift is `floor(intensity * 10)` pixels, so low intensities are a
/// strict no-op.
pub fn channel_shift(
    rgba: &mut [u8],
    width: usize,
    height: usize,
    intensity: f64,
) -> Result<(), PixelBufferError> {
    check_buffer(rgba, width, height)?;
    let shift = (intensity.clamp(0.0, 1.0) * 10.0).floor() as usize;
    if shift == 0 || width == 0 || height == 0 {
        return Ok(());
    }

    let original = rgba.to_vec();
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let i = (row + x) * 4;
            let red_src = (row + (x + shift).min(width - 1)) * 4;
            let blue_src = (row + x.saturating_sub(shift)) * 4;
            rgba[i] = original[red_src];
            rgba[i + 2] = original[blue_src + 2];
        }
    }
    Ok(())
}

/// Periodic scanline darkening. The row period tightens as intensity rises
/// (`max(2, floor(20 - intensity * 15))`); the per-line darkness is
/// `intensity * 0.5` modulated sinusoidally by row index so long runs of
/// lines do not read as a flat grille.
pub fn scanlines(
    rgba: &mut [u8],
    width: usize,
    height: usize,
    intensity: f64,
) -> Result<(), PixelBufferError> {
    check_buffer(rgba, width, height)?;
    let intensity = intensity.clamp(0.0, 1.0);
    if intensity == 0.0 {
        return Ok(());
    }

    let period = ((20.0 - intensity * 15.0).floor() as usize).max(2);
    let base_darkness = intensity * 0.5;
    for y in (0..height).step_by(period) {
        let darkness = base_darkness * (0.75 + 0.25 * (y as f64 * 0.1).sin());
        let keep = 1.0 - darkness;
        let row = y * width * 4;
        for x in 0..width {
            let i = row + x * 4;
            rgba[i] = (rgba[i] as f64 * keep) as u8;
            rgba[i + 1] = (rgba[i + 1] as f64 * keep) as u8;
            rgba[i + 2] = (rgba[i + 2] as f64 * keep) as u8;
        }
    }
    Ok(())
}

/// Sparse signed noise. Each pixel is hit with probability
/// `intensity * 0.3`; a hit adds one shared delta in `±intensity * 25` to
/// all three color channels, clamped to `[0, 255]`. Zero intensity performs
/// no writes and draws no random samples.
pub fn noise(
    rgba: &mut [u8],
    width: usize,
    height: usize,
    intensity: f64,
    rng: &mut dyn RandomSource,
) -> Result<(), PixelBufferError> {
    let pixel_count = check_buffer(rgba, width, height)?;
    let intensity = intensity.clamp(0.0, 1.0);
    if intensity == 0.0 {
        return Ok(());
    }

    let probability = intensity * 0.3;
    let amount = intensity * 50.0;
    for p in 0..pixel_count {
        if !rng.chance(probability) {
            continue;
        }
        let delta = (rng.next_f64() - 0.5) * amount;
        let i = p * 4;
        for c in 0..3 {
            rgba[i + c] = (rgba[i + c] as f64 + delta).clamp(0.0, 255.0) as u8;
        }
    }
    Ok(())
}

/// Horizontal band displacement inside `[x0, x1) x [y0, y1)`: every row of
/// the band is shifted by `shift` pixels, with vacated pixels reading from
/// the clamped band edge. The glitch blocks use this for their internal
/// tearing. Out-of-canvas coordinates are clamped, empty bands are no-ops.
pub fn displace_rows(
    rgba: &mut [u8],
    width: usize,
    height: usize,
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
    shift: isize,
) -> Result<(), PixelBufferError> {
    check_buffer(rgba, width, height)?;
    let x0 = x0.min(width);
    let x1 = x1.min(width);
    let y0 = y0.min(height);
    let y1 = y1.min(height);
    if shift == 0 || x1 <= x0 || y1 <= y0 {
        return Ok(());
    }

    let span = x1 - x0;
    let mut segment = vec![0u8; span * 4];
    for y in y0..y1 {
        let row = y * width * 4;
        segment.copy_from_slice(&rgba[row + x0 * 4..row + x1 * 4]);
        for x in 0..span {
            let src = if shift >= 0 {
                x.saturating_sub(shift as usize)
            } else {
                (x + shift.unsigned_abs()).min(span - 1)
            };
            let dst = row + (x0 + x) * 4;
            let src = src * 4;
            // RGB moves with the tear, alpha keeps its original coverage.
            rgba[dst] = segment[src];
            rgba[dst + 1] = segment[src + 1];
            rgba[dst + 2] = segment[src + 2];
        }
    }
    Ok(())
}

/// Rounded-rectangle path with canvas-style quadratic corners. The corner
/// radius is clamped to `min(w, h) / 2` so oversized radii never produce a
/// self-intersecting outline. Returns `None` for degenerate or non-finite
/// geometry.
pub fn rounded_rect_path(x: f32, y: f32, w: f32, h: f32, radius: f32) -> Option<Path> {
    if !(x.is_finite() && y.is_finite() && w.is_finite() && h.is_finite() && radius.is_finite()) {
        return None;
    }
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    let r = radius.max(0.0).min(w.min(h) / 2.0);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Fill a rounded rectangle with a solid color and blend mode.
pub fn fill_rounded_rect(
    pixmap: &mut Pixmap,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    radius: f32,
    color: Color,
    blend_mode: BlendMode,
) {
    let Some(path) = rounded_rect_path(x, y, w, h, radius) else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint.blend_mode = blend_mode;
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
}

/// Punch a rounded-rectangle hole through the surface (destructive
/// composition; whatever is beneath this layer shows through after
/// compositing).
pub fn cut_rounded_hole(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, radius: f32) {
    fill_rounded_rect(
        pixmap,
        x,
        y,
        w,
        h,
        radius,
        Color::BLACK,
        BlendMode::DestinationOut,
    );
}

/// Fill `rect` with `bands` horizontal bands, each a multi-stop gradient
/// between two palette hues. Interior stops are explicit interpolations
/// rather than a single 2-stop ramp, which keeps wide bands from banding.
pub fn gradient_bands(
    pixmap: &mut Pixmap,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    bands: usize,
    rng: &mut dyn RandomSource,
) {
    if bands == 0 || w <= 0.0 || h <= 0.0 {
        return;
    }
    let band_h = h / bands as f32;
    for band in 0..bands {
        let band_y = y + band as f32 * band_h;
        let (from, to) = palette::pick_pair(rng, palette::GRADIENT_ALPHA);

        const INTERIOR_STOPS: usize = 4;
        let mut stops = Vec::with_capacity(INTERIOR_STOPS + 2);
        for s in 0..=INTERIOR_STOPS + 1 {
            let t = s as f32 / (INTERIOR_STOPS + 1) as f32;
            stops.push(GradientStop::new(t, palette::lerp(from, to, t)));
        }

        let Some(shader) = LinearGradient::new(
            Point::from_xy(x, band_y),
            Point::from_xy(x + w, band_y),
            stops,
            SpreadMode::Pad,
            Transform::identity(),
        ) else {
            continue;
        };
        let Some(rect) = Rect::from_xywh(x, band_y, w, band_h.max(1.0)) else {
            continue;
        };
        let mut paint = Paint::default();
        paint.shader = shader;
        paint.anti_alias = false;
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }
}

/// Separable box blur over the whole premultiplied surface. Two passes
/// (horizontal, vertical) with a sliding window; radius 0 is a no-op.
/// Used for the soft glow under the transient artifacts.
pub fn box_blur(pixmap: &mut Pixmap, radius: usize) {
    if radius == 0 {
        return;
    }
    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    if width == 0 || height == 0 {
        return;
    }

    let data = pixmap.data_mut();
    let mut scratch = data.to_vec();
    blur_axis(data, &mut scratch, width, height, radius, true);
    blur_axis(&scratch, data, width, height, radius, false);
}

fn blur_axis(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize, horizontal: bool) {
    let (lanes, lane_len) = if horizontal {
        (height, width)
    } else {
        (width, height)
    };
    let index = |lane: usize, i: usize| -> usize {
        if horizontal {
            (lane * width + i) * 4
        } else {
            (i * width + lane) * 4
        }
    };

    let window = (radius * 2 + 1) as u32;
    for lane in 0..lanes {
        let mut sums = [0u32; 4];
        for i in 0..lane_len.min(radius + 1) {
            let p = index(lane, i);
            for c in 0..4 {
                sums[c] += src[p + c] as u32;
            }
        }
        // Edge samples are weighted by replicating the lane boundaries.
        let first = index(lane, 0);
        for c in 0..4 {
            sums[c] += src[first + c] as u32 * radius.min(lane_len) as u32;
        }

        for i in 0..lane_len {
            let p = index(lane, i);
            for c in 0..4 {
                dst[p + c] = (sums[c] / window) as u8;
            }

            let leaving = index(lane, i.saturating_sub(radius));
            let entering = index(lane, (i + radius + 1).min(lane_len - 1));
            for c in 0..4 {
                sums[c] = sums[c] + src[entering + c] as u32 - src[leaving + c] as u32;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::XorShift64;

    fn make_test_frame(width: usize, height: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                out.push(((x * 17 + y * 11) & 255) as u8);
                out.push(((x * 7 + y * 19) & 255) as u8);
                out.push(((x * 23 + y * 3) & 255) as u8);
                out.push(255);
            }
        }
        out
    }

    fn alpha_of(frame: &[u8]) -> Vec<u8> {
        frame.chunks_exact(4).map(|px| px[3]).collect()
    }

    #[test]
    fn channel_shift_zero_intensity_is_noop() {
        let mut frame = make_test_frame(16, 9);
        let baseline = frame.clone();
        channel_shift(&mut frame, 16, 9, 0.0).expect("shift should succeed");
        assert_eq!(frame, baseline);
    }

    #[test]
    fn channel_shift_preserves_green_and_alpha() {
        let width = 24;
        let height = 12;
        let mut frame = make_test_frame(width, height);
        let before: Vec<(u8, u8)> = frame.chunks_exact(4).map(|px| (px[1], px[3])).collect();

        channel_shift(&mut frame, width, height, 0.8).expect("shift should succeed");

        let after: Vec<(u8, u8)> = frame.chunks_exact(4).map(|px| (px[1], px[3])).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn channel_shift_rejects_invalid_buffer_length() {
        let mut frame = vec![0u8; 15];
        let err = channel_shift(&mut frame, 2, 2, 1.0).expect_err("length mismatch should fail");
        assert!(matches!(err, PixelBufferError::BufferLengthMismatch { .. }));
    }

    #[test]
    fn scanlines_zero_intensity_is_noop() {
        let mut frame = make_test_frame(8, 8);
        let baseline = frame.clone();
        scanlines(&mut frame, 8, 8, 0.0).expect("scanlines should succeed");
        assert_eq!(frame, baseline);
    }

    #[test]
    fn scanlines_darken_only_periodic_rows() {
        let width = 8;
        let height = 40;
        let mut frame = vec![200u8; width * height * 4];
        scanlines(&mut frame, width, height, 1.0).expect("scanlines should succeed");

        // intensity 1.0 -> period max(2, floor(5)) = 5
        for y in 0..height {
            let i = y * width * 4;
            if y % 5 == 0 {
                assert!(frame[i] < 200, "row {y} should be darkened");
            } else {
                assert_eq!(frame[i], 200, "row {y} should be untouched");
            }
        }
    }

    #[test]
    fn noise_zero_intensity_is_noop_and_draws_no_samples() {
        let mut frame = make_test_frame(8, 8);
        let baseline = frame.clone();
        let mut rng = XorShift64::from_seed(5);
        let mut check = XorShift64::from_seed(5);
        noise(&mut frame, 8, 8, 0.0, &mut rng).expect("noise should succeed");
        assert_eq!(frame, baseline);
        assert_eq!(rng.next_u64(), check.next_u64(), "rng must be untouched");
    }

    #[test]
    fn noise_is_deterministic_for_same_seed() {
        let mut a = make_test_frame(32, 18);
        let mut b = a.clone();
        let mut rng_a = XorShift64::from_seed(42);
        let mut rng_b = XorShift64::from_seed(42);

        noise(&mut a, 32, 18, 0.9, &mut rng_a).expect("noise should succeed");
        noise(&mut b, 32, 18, 0.9, &mut rng_b).expect("noise should succeed");
        assert_eq!(a, b, "same seed must produce byte-identical output");
    }

    #[test]
    fn noise_preserves_alpha() {
        let mut frame = make_test_frame(16, 16);
        let before = alpha_of(&frame);
        let mut rng = XorShift64::from_seed(1);
        noise(&mut frame, 16, 16, 1.0, &mut rng).expect("noise should succeed");
        assert_eq!(before, alpha_of(&frame));
    }

    #[test]
    fn displace_rows_zero_shift_is_noop() {
        let mut frame = make_test_frame(16, 16);
        let baseline = frame.clone();
        displace_rows(&mut frame, 16, 16, 2, 14, 3, 9, 0).expect("displace should succeed");
        assert_eq!(frame, baseline);
    }

    #[test]
    fn displace_rows_only_touches_the_band() {
        let width = 16;
        let height = 16;
        let mut frame = make_test_frame(width, height);
        let baseline = frame.clone();
        displace_rows(&mut frame, width, height, 4, 12, 5, 8, 3).expect("displace should succeed");

        for y in 0..height {
            for x in 0..width {
                let i = (y * width + x) * 4;
                let inside = (5..8).contains(&y) && (4..12).contains(&x);
                if !inside {
                    assert_eq!(
                        &frame[i..i + 4],
                        &baseline[i..i + 4],
                        "pixel ({x},{y}) outside the band must not change"
                    );
                }
            }
        }
    }

    #[test]
    fn displace_rows_clamps_out_of_canvas_band() {
        let mut frame = make_test_frame(8, 8);
        displace_rows(&mut frame, 8, 8, 0, 100, 0, 100, 2).expect("clamped band should succeed");
    }

    #[test]
    fn rounded_rect_clamps_oversized_radius() {
        // radius far beyond min(w, h) / 2 must still yield a valid path
        let path = rounded_rect_path(0.0, 0.0, 10.0, 4.0, 100.0);
        assert!(path.is_some());
    }

    #[test]
    fn rounded_rect_rejects_degenerate_geometry() {
        assert!(rounded_rect_path(0.0, 0.0, 0.0, 4.0, 1.0).is_none());
        assert!(rounded_rect_path(0.0, 0.0, 4.0, -1.0, 1.0).is_none());
        assert!(rounded_rect_path(f32::NAN, 0.0, 4.0, 4.0, 1.0).is_none());
    }

    #[test]
    fn cut_rounded_hole_erases_coverage() {
        let mut pixmap = Pixmap::new(32, 32).expect("pixmap");
        pixmap.fill(Color::from_rgba8(200, 60, 60, 255));
        cut_rounded_hole(&mut pixmap, 8.0, 8.0, 16.0, 16.0, 4.0);

        let center = pixmap.pixel(16, 16).expect("pixel");
        assert_eq!(center.alpha(), 0, "hole center must be fully erased");
        let corner = pixmap.pixel(2, 2).expect("pixel");
        assert_eq!(corner.alpha(), 255, "outside the hole must be untouched");
    }

    #[test]
    fn gradient_bands_cover_the_rect() {
        let mut pixmap = Pixmap::new(64, 32).expect("pixmap");
        let mut rng = XorShift64::from_seed(8);
        gradient_bands(&mut pixmap, 0.0, 0.0, 64.0, 32.0, 4, &mut rng);

        let px = pixmap.pixel(32, 16).expect("pixel");
        assert!(px.alpha() > 0, "band interior must be painted");
    }

    #[test]
    fn box_blur_zero_radius_is_noop() {
        let mut pixmap = Pixmap::new(16, 16).expect("pixmap");
        pixmap.fill(Color::from_rgba8(10, 200, 40, 255));
        let baseline = pixmap.data().to_vec();
        box_blur(&mut pixmap, 0);
        assert_eq!(pixmap.data(), &baseline[..]);
    }

    #[test]
    fn box_blur_spreads_an_impulse() {
        let mut pixmap = Pixmap::new(9, 9).expect("pixmap");
        {
            let data = pixmap.data_mut();
            let center = (4 * 9 + 4) * 4;
            data[center] = 255;
            data[center + 3] = 255;
        }
        box_blur(&mut pixmap, 2);

        let beside = pixmap.pixel(5, 4).expect("pixel");
        assert!(beside.red() > 0, "energy must spread to neighbors");
        let center = pixmap.pixel(4, 4).expect("pixel");
        assert!(center.red() < 255, "peak must flatten");
    }
}
