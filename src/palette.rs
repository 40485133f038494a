//! Fixed palette of saturated hues used by the glitch gradient blocks and
//! vertical streaks. Colors are stored as straight (unpremultiplied) RGB;
//! alpha is applied at the paint site.

use tiny_skia::Color;

use crate::rng::RandomSource;

/// Saturated hue entries, straight RGB.
pub const SATURATED_HUES: [(u8, u8, u8); 8] = [
    (255, 0, 128),  // hot magenta
    (0, 255, 255),  // cyan
    (255, 230, 0),  // yellow
    (0, 255, 96),   // green
    (255, 96, 0),   // orange
    (160, 0, 255),  // violet
    (255, 32, 32),  // red
    (32, 64, 255),  // blue
];

/// Shared alpha for gradient-block fills.
pub const GRADIENT_ALPHA: u8 = 217;

/// Pick a palette hue at the given alpha.
pub fn pick(rng: &mut dyn RandomSource, alpha: u8) -> Color {
    let (r, g, b) = SATURATED_HUES[rng.bounded(SATURATED_HUES.len() - 1)];
    Color::from_rgba8(r, g, b, alpha)
}

/// Pick two distinct palette hues for a gradient span.
pub fn pick_pair(rng: &mut dyn RandomSource, alpha: u8) -> (Color, Color) {
    let first = rng.bounded(SATURATED_HUES.len() - 1);
    let mut second = rng.bounded(SATURATED_HUES.len() - 1);
    if second == first {
        second = (second + 1) % SATURATED_HUES.len();
    }
    let (r0, g0, b0) = SATURATED_HUES[first];
    let (r1, g1, b1) = SATURATED_HUES[second];
    (
        Color::from_rgba8(r0, g0, b0, alpha),
        Color::from_rgba8(r1, g1, b1, alpha),
    )
}

/// Linear interpolation between two colors in straight RGBA space.
pub fn lerp(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    Color::from_rgba(
        a.red() + (b.red() - a.red()) * t,
        a.green() + (b.green() - a.green()) * t,
        a.blue() + (b.blue() - a.blue()) * t,
        a.alpha() + (b.alpha() - a.alpha()) * t,
    )
    .unwrap_or(a)
}
