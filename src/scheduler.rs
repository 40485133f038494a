//! Animation scheduler.
//!
//! A two-state machine (Stopped, Running) that owns the drawing surface and
//! the playback session, and throttles compositor invocations to the
//! configured frame delay. The caller drives it at any refresh rate;
//! `tick` decides whether the frame is actually rendered.

use anyhow::{bail, Result};
use tiny_skia::Pixmap;

use crate::compositor;
use crate::images::ImageSet;
use crate::params::EffectParams;
use crate::rng::XorShift64;
use crate::session::PlaybackSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stopped,
    Running,
}

/// What a single `tick` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was composited onto the surface.
    Rendered,
    /// Less than `frame_delay_ms` elapsed since the last render.
    Throttled,
    /// Not running, or no image set is loaded. Never an error.
    Skipped,
}

pub struct Scheduler {
    state: State,
    params: EffectParams,
    images: Option<ImageSet>,
    surface: Option<Pixmap>,
    session: PlaybackSession,
    rng: XorShift64,
}

impl Scheduler {
    pub fn new(params: EffectParams, rng: XorShift64) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            state: State::Stopped,
            params,
            images: None,
            surface: None,
            session: PlaybackSession::new(0.0),
            rng,
        })
    }

    /// Load a new image set. Resets the session (stale swap flags and
    /// artifact geometry must not survive an image change) and resizes the
    /// surface to the new primary image's natural dimensions.
    pub fn set_images(&mut self, images: ImageSet, now_ms: f64) -> Result<()> {
        let primary = images.primary();
        let surface = Pixmap::new(primary.width(), primary.height()).ok_or_else(|| {
            anyhow::anyhow!(
                "cannot allocate {}x{} surface",
                primary.width(),
                primary.height()
            )
        })?;
        self.images = Some(images);
        self.surface = Some(surface);
        self.session.reset(now_ms);
        Ok(())
    }

    /// Transition Stopped -> Running. Requires a loaded image set; this is
    /// the synchronous input check, nothing renders before it passes.
    pub fn start(&mut self, now_ms: f64) -> Result<()> {
        if self.images.is_none() {
            bail!("cannot start playback without a loaded image set");
        }
        self.session.reset(now_ms);
        self.state = State::Running;
        Ok(())
    }

    /// Transition to Stopped. Idempotent and safe before `start`.
    pub fn stop(&mut self) {
        self.state = State::Stopped;
    }

    pub fn is_running(&self) -> bool {
        self.state == State::Running
    }

    /// Replace the tunable parameters mid-session.
    pub fn update_params(&mut self, params: EffectParams) -> Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    /// The live surface, present once an image set is loaded.
    pub fn surface(&self) -> Option<&Pixmap> {
        self.surface.as_ref()
    }

    /// One scheduler step at `now_ms`. Renders at most once per
    /// `frame_delay_ms`; a tick without images or while stopped is silently
    /// skipped so the caller can retry on its next refresh.
    pub fn tick(&mut self, now_ms: f64) -> Result<TickOutcome> {
        if self.state == State::Stopped {
            return Ok(TickOutcome::Skipped);
        }
        let (Some(images), Some(surface)) = (self.images.as_ref(), self.surface.as_mut()) else {
            return Ok(TickOutcome::Skipped);
        };
        if let Some(last) = self.session.last_render_ms {
            if now_ms - last < self.params.frame_delay_ms {
                return Ok(TickOutcome::Throttled);
            }
        }

        compositor::render_frame(
            surface,
            images,
            &self.params,
            &mut self.session,
            now_ms,
            &mut self.rng,
        )?;
        self.session.last_render_ms = Some(now_ms);
        Ok(TickOutcome::Rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::SourceImage;

    fn solid(size: u32, value: u8) -> SourceImage {
        let rgba = vec![value; (size * size * 4) as usize];
        SourceImage::from_rgba(size, size, &rgba).expect("image should build")
    }

    fn pair(size: u32) -> ImageSet {
        ImageSet::from_vec(vec![solid(size, 60), solid(size, 200)]).expect("set")
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(EffectParams::default(), XorShift64::from_seed(1)).expect("scheduler")
    }

    #[test]
    fn start_without_images_is_an_input_error() {
        let mut s = scheduler();
        assert!(s.start(0.0).is_err());
        assert!(!s.is_running());
    }

    #[test]
    fn stop_is_idempotent_and_safe_before_start() {
        let mut s = scheduler();
        s.stop();
        s.stop();
        assert!(!s.is_running());

        s.set_images(pair(16), 0.0).expect("images");
        s.start(0.0).expect("start");
        s.stop();
        s.stop();
        assert!(!s.is_running());
    }

    #[test]
    fn tick_skips_while_stopped() {
        let mut s = scheduler();
        s.set_images(pair(16), 0.0).expect("images");
        assert_eq!(s.tick(0.0).expect("tick"), TickOutcome::Skipped);
    }

    #[test]
    fn tick_throttles_below_frame_delay() {
        let mut s = scheduler();
        s.set_images(pair(16), 0.0).expect("images");
        s.start(0.0).expect("start");

        assert_eq!(s.tick(0.0).expect("tick"), TickOutcome::Rendered);
        assert_eq!(s.tick(50.0).expect("tick"), TickOutcome::Throttled);
        assert_eq!(s.tick(99.9).expect("tick"), TickOutcome::Throttled);
        assert_eq!(s.tick(100.0).expect("tick"), TickOutcome::Rendered);
    }

    #[test]
    fn surface_matches_primary_dimensions() {
        let mut s = scheduler();
        s.set_images(pair(24), 0.0).expect("images");
        let surface = s.surface().expect("surface");
        assert_eq!((surface.width(), surface.height()), (24, 24));

        // A differently sized set resizes the surface and resets state.
        s.set_images(pair(48), 10.0).expect("images");
        let surface = s.surface().expect("surface");
        assert_eq!((surface.width(), surface.height()), (48, 48));
        assert!(s.session().artifacts.is_empty());
    }

    #[test]
    fn set_images_resets_session_state() {
        let mut s = scheduler();
        s.set_images(pair(16), 0.0).expect("images");
        s.start(0.0).expect("start");
        for frame in 0..30 {
            s.tick(frame as f64 * 100.0).expect("tick");
        }

        s.set_images(pair(16), 3000.0).expect("images");
        assert!(!s.session().swapped);
        assert!(s.session().artifacts.is_empty());
        assert_eq!(s.session().sequence_cursor, 0);
    }
}
