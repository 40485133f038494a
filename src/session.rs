//! Per-playback mutable state.
//!
//! Everything the compositor mutates between frames lives here rather than
//! in module-level statics: the swap timer, the flash-sequence cursor, the
//! transient artifact population and the throttling timestamp. A session is
//! created when playback starts and reset whenever the images change or
//! playback stops.

use crate::params::EffectParams;
use crate::rng::RandomSource;
use crate::sequence::SequenceStep;

/// Short-lived glowing rectangle ("firefly"). Aged every frame, culled on
/// zero lifespan or by random early removal, jittered occasionally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransientArtifact {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    /// Remaining lifespan in frames.
    pub life: u32,
    /// Tall orientation instead of the default wide one.
    pub vertical: bool,
}

impl TransientArtifact {
    /// Spawn a new artifact fully inside the canvas. Sizes scale with the
    /// canvas dimension; intensity widens the size range slightly.
    pub fn spawn(
        canvas_w: u32,
        canvas_h: u32,
        intensity: f64,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let cw = canvas_w.max(1) as f64;
        let ch = canvas_h.max(1) as f64;

        let max_w_fraction = 0.06 + intensity.clamp(0.0, 1.0) * 0.04;
        let mut w = rng.range_f64(cw * 0.02, cw * max_w_fraction).max(2.0);
        let mut h = (w * rng.range_f64(0.25, 0.55)).max(2.0);
        let vertical = rng.chance(0.5);
        if vertical {
            std::mem::swap(&mut w, &mut h);
        }
        w = w.min(cw);
        h = h.min(ch);

        let x = rng.range_f64(0.0, (cw - w).max(0.0));
        let y = rng.range_f64(0.0, (ch - h).max(0.0));
        let life = rng.range_usize(10, 40) as u32;

        Self {
            x: x as f32,
            y: y as f32,
            w: w as f32,
            h: h as f32,
            life,
            vertical,
        }
    }
}

/// Mutable state for one playback run.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    /// Whether base and overlay are currently exchanged.
    pub swapped: bool,
    /// When the active swap expires. Meaningless while `swapped` is false.
    pub swap_end_ms: f64,
    pub artifacts: Vec<TransientArtifact>,
    /// Index into the flash-sequence table.
    pub sequence_cursor: usize,
    /// When the current sequence step started.
    pub step_started_ms: f64,
    /// When the last step transition happened (drives the chromatic echo).
    pub last_transition_ms: f64,
    /// Timestamp of the last actually rendered frame, for throttling.
    pub last_render_ms: Option<f64>,
}

impl PlaybackSession {
    pub fn new(now_ms: f64) -> Self {
        Self {
            swapped: false,
            swap_end_ms: 0.0,
            artifacts: Vec::new(),
            sequence_cursor: 0,
            step_started_ms: now_ms,
            last_transition_ms: f64::NEG_INFINITY,
            last_render_ms: None,
        }
    }

    /// Drop all transient state and restart the sequence at `now_ms`.
    pub fn reset(&mut self, now_ms: f64) {
        *self = Self::new(now_ms);
    }

    /// Step 1 of the frame algorithm: expire or start a base/overlay swap.
    /// A new swap can only begin when no swap is active, so a swap never
    /// retriggers before its duration has fully elapsed.
    pub fn update_swap(&mut self, params: &EffectParams, now_ms: f64, rng: &mut dyn RandomSource) {
        if self.swapped {
            if now_ms >= self.swap_end_ms {
                self.swapped = false;
            }
            return;
        }
        if rng.chance(params.swap_probability) {
            self.swapped = true;
            self.swap_end_ms = now_ms + params.swap_duration_ms;
        }
    }

    /// Advance the flash sequence when the current step's hold has elapsed.
    /// Returns true on a transition.
    pub fn advance_sequence(&mut self, steps: &[SequenceStep], now_ms: f64) -> bool {
        if steps.is_empty() {
            return false;
        }
        let cursor = self.sequence_cursor.min(steps.len() - 1);
        if now_ms - self.step_started_ms < steps[cursor].duration_ms {
            self.sequence_cursor = cursor;
            return false;
        }
        self.sequence_cursor = (cursor + 1) % steps.len();
        self.step_started_ms = now_ms;
        self.last_transition_ms = now_ms;
        true
    }

    /// Milliseconds since the last sequence transition.
    pub fn since_transition_ms(&self, now_ms: f64) -> f64 {
        now_ms - self.last_transition_ms
    }

    /// Step 5a of the frame algorithm: age, cull, jitter, then spawn.
    ///
    /// The three stochastic sub-steps are deliberately independent and run
    /// in this order every frame; a jittered artifact stays eligible for
    /// culling on later frames like any other.
    pub fn update_artifacts(
        &mut self,
        params: &EffectParams,
        canvas_w: u32,
        canvas_h: u32,
        rng: &mut dyn RandomSource,
    ) {
        // Age and cull.
        self.artifacts.retain_mut(|artifact| {
            artifact.life = artifact.life.saturating_sub(1);
            if artifact.life == 0 {
                return false;
            }
            !rng.chance(params.artifact_cull_probability)
        });

        // Jitter a fraction of the survivors, clamped to the canvas.
        let max_x = canvas_w.max(1) as f32;
        let max_y = canvas_h.max(1) as f32;
        for artifact in &mut self.artifacts {
            if !rng.chance(params.artifact_jitter_probability) {
                continue;
            }
            let dx = rng.range_f64(-4.0, 4.0) as f32;
            let dy = rng.range_f64(-4.0, 4.0) as f32;
            artifact.x = (artifact.x + dx).clamp(0.0, (max_x - artifact.w).max(0.0));
            artifact.y = (artifact.y + dy).clamp(0.0, (max_y - artifact.h).max(0.0));
        }

        // Spawn toward the target, hard-stopping at the 1.5x soft bound.
        let cap = params.artifact_cap();
        let intensity = params.intensity_fraction();
        let spawn_chance = 0.15 + intensity * 0.5;
        let attempts = if self.artifacts.len() < params.artifact_target_count as usize {
            3
        } else {
            1
        };
        for _ in 0..attempts {
            if self.artifacts.len() >= cap {
                break;
            }
            if rng.chance(spawn_chance) {
                self.artifacts
                    .push(TransientArtifact::spawn(canvas_w, canvas_h, intensity, rng));
            }
        }
    }
}
