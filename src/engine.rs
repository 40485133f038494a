//! Engine boundary.
//!
//! Thin facade over the scheduler and the capture/encode pipeline: load
//! images and start playback, stop it, retune parameters mid-session, and
//! record the live surface into GIF bytes. Input errors surface here
//! synchronously, before any rendering starts.

use anyhow::{bail, Result};
use log::info;

use crate::capture::{self, DEFAULT_SAMPLE_RATE};
use crate::clock::Clock;
use crate::encoding::{self, FfmpegMode};
use crate::images::{ImageSet, SourceImage};
use crate::params::EffectParams;
use crate::rng::XorShift64;
use crate::scheduler::{Scheduler, TickOutcome};

pub struct GlitchEngine {
    scheduler: Scheduler,
    recording: bool,
}

impl GlitchEngine {
    pub fn new(params: EffectParams, rng: XorShift64) -> Result<Self> {
        Ok(Self {
            scheduler: Scheduler::new(params, rng)?,
            recording: false,
        })
    }

    /// Load images and begin playback at `now_ms`. Fewer than two images,
    /// more than three, or a zero-sized image is rejected here and the
    /// scheduler never starts.
    pub fn start(&mut self, images: Vec<SourceImage>, now_ms: f64) -> Result<()> {
        let set = ImageSet::from_vec(images)?;
        info!(
            "starting playback with {} images at {}x{}",
            set.len(),
            set.primary().width(),
            set.primary().height()
        );
        self.scheduler.set_images(set, now_ms)?;
        self.scheduler.start(now_ms)
    }

    /// Stop playback. Idempotent; safe before `start` and safe while a
    /// capture is in flight (the capture keeps sampling a frozen surface).
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn update_params(&mut self, params: EffectParams) -> Result<()> {
        self.scheduler.update_params(params)
    }

    /// Drive one scheduler step. The caller owns the refresh cadence.
    pub fn tick(&mut self, now_ms: f64) -> Result<TickOutcome> {
        self.scheduler.tick(now_ms)
    }

    pub fn surface(&self) -> Option<&tiny_skia::Pixmap> {
        self.scheduler.surface()
    }

    /// Capture `duration_ms` of live output and encode it into looping GIF
    /// bytes, reporting monotonic 0..1 progress. Refuses re-entry while a
    /// prior record is in flight; the caller debounces the trigger on top
    /// of this.
    pub fn record(
        &mut self,
        clock: &mut dyn Clock,
        duration_ms: f64,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<Vec<u8>> {
        self.record_with_mode(clock, duration_ms, FfmpegMode::Auto, on_progress)
    }

    pub fn record_with_mode(
        &mut self,
        clock: &mut dyn Clock,
        duration_ms: f64,
        mode: FfmpegMode,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<Vec<u8>> {
        if self.recording {
            bail!("a capture/encode is already in flight");
        }
        self.recording = true;
        let result = self.record_inner(clock, duration_ms, mode, on_progress);
        self.recording = false;
        result
    }

    fn record_inner(
        &mut self,
        clock: &mut dyn Clock,
        duration_ms: f64,
        mode: FfmpegMode,
        on_progress: &mut dyn FnMut(f64),
    ) -> Result<Vec<u8>> {
        let stream = capture::capture(&mut self.scheduler, clock, duration_ms, DEFAULT_SAMPLE_RATE)?;
        encoding::encode_gif_with_mode(&stream, mode, on_progress)
    }
}
