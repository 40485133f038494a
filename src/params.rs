//! Tunable parameters for the compositor and scheduler.
//!
//! Every probability the original effect hid behind an inline random call is
//! a named, documented field here, so behavior is tunable and reproducible
//! under a seeded random source. Params load from YAML with per-field
//! defaults and are validated before the engine starts.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// One tier of randomized rounded-rect cutouts. The wide "reveal" tier cuts
/// big holes through the overlay; the fine "glitch" tier sizes the small
/// gradient blocks and their holes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CutoutTier {
    /// Minimum number of cutouts per frame.
    pub min_count: u32,
    /// Maximum number of cutouts per frame (inclusive).
    pub max_count: u32,
    /// Upper bound on cutout width/height as a fraction of the matching
    /// canvas dimension.
    pub max_size_fraction: f64,
}

impl CutoutTier {
    fn validate(&self, label: &str) -> Result<()> {
        if self.max_count < self.min_count {
            bail!(
                "{label}: max_count ({}) must be >= min_count ({})",
                self.max_count,
                self.min_count
            );
        }
        if !(self.max_size_fraction > 0.0 && self.max_size_fraction <= 1.0) {
            bail!(
                "{label}: max_size_fraction must be in (0, 1], got {}",
                self.max_size_fraction
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectParams {
    /// Overall glitch strength, 0-100. Scales noise amount, channel-shift
    /// magnitude and artifact spawning.
    #[serde(default = "default_glitch_intensity")]
    pub glitch_intensity: u32,

    /// Minimum time between rendered frames, in milliseconds. Drives both
    /// live playback throttling and the exported frame delay.
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: f64,

    /// Wide reveal cutouts punched through the overlay layer.
    #[serde(default = "default_reveal_cutouts")]
    pub reveal_cutouts: CutoutTier,

    /// Fine cutouts and block sizing for the glitch-pattern layer.
    #[serde(default = "default_glitch_cutouts")]
    pub glitch_cutouts: CutoutTier,

    /// Per-frame probability of starting a temporary base/overlay swap.
    /// A new swap cannot begin while a previous one is active.
    #[serde(default = "default_swap_probability")]
    pub swap_probability: f64,

    /// How long a swap lasts once triggered, in milliseconds.
    #[serde(default = "default_swap_duration_ms")]
    pub swap_duration_ms: f64,

    /// Steady-state population target for the glowing transient artifacts.
    /// Spawning stops once the live count reaches 1.5x this value.
    #[serde(default = "default_artifact_target_count")]
    pub artifact_target_count: u32,

    /// Probability that the glitch-pattern layer is skipped entirely for a
    /// frame, yielding occasional clean frames.
    #[serde(default = "default_glitch_layer_skip_probability")]
    pub glitch_layer_skip_probability: f64,

    /// Per-frame probability of an artifact being culled before its
    /// lifespan runs out.
    #[serde(default = "default_artifact_cull_probability")]
    pub artifact_cull_probability: f64,

    /// Per-frame probability of an artifact receiving positional jitter.
    #[serde(default = "default_artifact_jitter_probability")]
    pub artifact_jitter_probability: f64,

    /// Probability of painting a white flash bar when the flash sequence
    /// advances to its next step.
    #[serde(default = "default_transition_flash_probability")]
    pub transition_flash_probability: f64,
}

fn default_glitch_intensity() -> u32 {
    50
}

fn default_frame_delay_ms() -> f64 {
    100.0
}

fn default_reveal_cutouts() -> CutoutTier {
    CutoutTier {
        min_count: 2,
        max_count: 6,
        max_size_fraction: 0.45,
    }
}

fn default_glitch_cutouts() -> CutoutTier {
    CutoutTier {
        min_count: 3,
        max_count: 9,
        max_size_fraction: 0.18,
    }
}

fn default_swap_probability() -> f64 {
    0.08
}

fn default_swap_duration_ms() -> f64 {
    250.0
}

fn default_artifact_target_count() -> u32 {
    6
}

fn default_glitch_layer_skip_probability() -> f64 {
    0.7
}

fn default_artifact_cull_probability() -> f64 {
    0.1
}

fn default_artifact_jitter_probability() -> f64 {
    0.3
}

fn default_transition_flash_probability() -> f64 {
    0.3
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            glitch_intensity: default_glitch_intensity(),
            frame_delay_ms: default_frame_delay_ms(),
            reveal_cutouts: default_reveal_cutouts(),
            glitch_cutouts: default_glitch_cutouts(),
            swap_probability: default_swap_probability(),
            swap_duration_ms: default_swap_duration_ms(),
            artifact_target_count: default_artifact_target_count(),
            glitch_layer_skip_probability: default_glitch_layer_skip_probability(),
            artifact_cull_probability: default_artifact_cull_probability(),
            artifact_jitter_probability: default_artifact_jitter_probability(),
            transition_flash_probability: default_transition_flash_probability(),
        }
    }
}

impl EffectParams {
    /// Glitch intensity as a `[0, 1]` fraction for the effect primitives.
    pub fn intensity_fraction(&self) -> f64 {
        (self.glitch_intensity.min(100) as f64) / 100.0
    }

    /// Hard ceiling on the live artifact population.
    pub fn artifact_cap(&self) -> usize {
        (self.artifact_target_count as f64 * 1.5).floor() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.glitch_intensity > 100 {
            bail!(
                "glitch_intensity must be 0-100, got {}",
                self.glitch_intensity
            );
        }
        if !(self.frame_delay_ms.is_finite() && self.frame_delay_ms > 0.0) {
            bail!("frame_delay_ms must be > 0, got {}", self.frame_delay_ms);
        }
        if !(self.swap_duration_ms.is_finite() && self.swap_duration_ms > 0.0) {
            bail!(
                "swap_duration_ms must be > 0, got {}",
                self.swap_duration_ms
            );
        }
        self.reveal_cutouts.validate("reveal_cutouts")?;
        self.glitch_cutouts.validate("glitch_cutouts")?;

        for (name, value) in [
            ("swap_probability", self.swap_probability),
            (
                "glitch_layer_skip_probability",
                self.glitch_layer_skip_probability,
            ),
            ("artifact_cull_probability", self.artifact_cull_probability),
            (
                "artifact_jitter_probability",
                self.artifact_jitter_probability,
            ),
            (
                "transition_flash_probability",
                self.transition_flash_probability,
            ),
        ] {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                bail!("{name} must be in [0, 1], got {value}");
            }
        }
        Ok(())
    }

    /// Load and validate a params file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read params file {}", path.display()))?;
        let params: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse params file {}", path.display()))?;
        params
            .validate()
            .with_context(|| format!("invalid params in {}", path.display()))?;
        Ok(params)
    }
}
