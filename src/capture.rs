//! Canvas capture.
//!
//! Samples the scheduler's live surface at a fixed rate for a fixed
//! wall-clock duration, buffering raw RGBA frames in memory. The capture
//! only reads rendered pixels; it never mutates compositor state beyond
//! driving the scheduler's own tick, so it runs interleaved with live
//! playback. Stopping playback mid-capture does not shorten the recording,
//! the frames simply stop changing.

use anyhow::{bail, Result};
use log::debug;

use crate::clock::Clock;
use crate::scheduler::Scheduler;

/// Default sample rate, in samples per second.
pub const DEFAULT_SAMPLE_RATE: u32 = 60;
/// Default capture length, in milliseconds.
pub const DEFAULT_DURATION_MS: f64 = 3000.0;

/// A finished, time-bounded recording of raw RGBA frames. Append-only while
/// capturing, immutable afterwards.
#[derive(Debug, Clone)]
pub struct CapturedStream {
    pub width: u32,
    pub height: u32,
    /// Samples per second the frames were taken at.
    pub sample_rate: u32,
    /// Premultiplied RGBA, one entry per sample, all `width * height * 4`.
    pub frames: Vec<Vec<u8>>,
    /// Wall-clock span the samples cover.
    pub duration_ms: f64,
}

impl CapturedStream {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Record `duration_ms` of the scheduler's surface at `sample_rate`.
///
/// The clock paces the sampling, so tests drive this with a manual clock
/// and no real time passes. Fails up front when no surface exists or the
/// requested span is degenerate; the error is reported once and the caller
/// may re-invoke the whole capture.
pub fn capture(
    scheduler: &mut Scheduler,
    clock: &mut dyn Clock,
    duration_ms: f64,
    sample_rate: u32,
) -> Result<CapturedStream> {
    if !(duration_ms > 0.0 && duration_ms.is_finite()) {
        bail!("capture duration must be positive, got {duration_ms}ms");
    }
    if sample_rate == 0 {
        bail!("capture sample rate must be positive");
    }
    let Some(surface) = scheduler.surface() else {
        bail!("surface cannot be captured: no image set is loaded");
    };
    let width = surface.width();
    let height = surface.height();

    let interval_ms = 1000.0 / sample_rate as f64;
    let sample_count = ((duration_ms / 1000.0) * sample_rate as f64).floor().max(1.0) as usize;
    debug!("capturing {sample_count} samples at {sample_rate}/s ({duration_ms}ms)");

    let mut frames = Vec::with_capacity(sample_count);
    for _ in 0..sample_count {
        scheduler.tick(clock.now_ms())?;
        let surface = scheduler
            .surface()
            .ok_or_else(|| anyhow::anyhow!("surface disappeared mid-capture"))?;
        frames.push(surface.data().to_vec());
        clock.sleep_ms(interval_ms);
    }

    Ok(CapturedStream {
        width,
        height,
        sample_rate,
        frames,
        duration_ms: sample_count as f64 * interval_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::images::{ImageSet, SourceImage};
    use crate::params::EffectParams;
    use crate::rng::XorShift64;

    fn loaded_scheduler() -> Scheduler {
        let mut scheduler =
            Scheduler::new(EffectParams::default(), XorShift64::from_seed(3)).expect("scheduler");
        let solid = |v: u8| {
            let rgba = vec![v; 16 * 16 * 4];
            SourceImage::from_rgba(16, 16, &rgba).expect("image")
        };
        scheduler
            .set_images(
                ImageSet::from_vec(vec![solid(30), solid(220)]).expect("set"),
                0.0,
            )
            .expect("images");
        scheduler
    }

    #[test]
    fn capture_without_images_fails_up_front() {
        let mut scheduler =
            Scheduler::new(EffectParams::default(), XorShift64::from_seed(3)).expect("scheduler");
        let mut clock = ManualClock::starting_at(0.0);
        let err = capture(&mut scheduler, &mut clock, 1000.0, 60).unwrap_err();
        assert!(err.to_string().contains("cannot be captured"));
    }

    #[test]
    fn capture_rejects_degenerate_spans() {
        let mut scheduler = loaded_scheduler();
        let mut clock = ManualClock::starting_at(0.0);
        assert!(capture(&mut scheduler, &mut clock, 0.0, 60).is_err());
        assert!(capture(&mut scheduler, &mut clock, -5.0, 60).is_err());
        assert!(capture(&mut scheduler, &mut clock, 1000.0, 0).is_err());
    }

    #[test]
    fn capture_covers_the_requested_duration() {
        let mut scheduler = loaded_scheduler();
        scheduler.start(0.0).expect("start");
        let mut clock = ManualClock::starting_at(0.0);

        let stream = capture(&mut scheduler, &mut clock, 3000.0, 60).expect("capture");
        assert_eq!(stream.frame_count(), 180);
        assert!((stream.duration_ms - 3000.0).abs() <= 50.0);
        assert_eq!((stream.width, stream.height), (16, 16));
        for frame in &stream.frames {
            assert_eq!(frame.len(), 16 * 16 * 4);
        }
    }

    #[test]
    fn capture_continues_when_playback_is_stopped() {
        let mut scheduler = loaded_scheduler();
        let mut clock = ManualClock::starting_at(0.0);

        // Never started; every tick is skipped but sampling still elapses.
        let stream = capture(&mut scheduler, &mut clock, 500.0, 60).expect("capture");
        assert_eq!(stream.frame_count(), 30);
        assert!(clock.now_ms() >= 500.0);
    }
}
