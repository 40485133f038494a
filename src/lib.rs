//! Procedural glitch-animation engine.
//!
//! Given two or three still images, the engine composites an unpredictable
//! sequence of frames (image swaps, rounded-rect cutouts, gradient glitch
//! blocks, glowing transient artifacts) onto a CPU raster surface at a
//! tunable cadence, then captures the live surface and transcodes the
//! capture into a looping, palette-optimized GIF via ffmpeg.
//!
//! Every stochastic decision flows through an injected [`rng::RandomSource`]
//! and every timestamp through a [`clock::Clock`], so whole playback and
//! capture runs replay deterministically in tests.

pub mod capture;
pub mod clock;
pub mod compositor;
pub mod effects;
pub mod encoding;
pub mod engine;
pub mod images;
pub mod palette;
pub mod params;
pub mod rng;
pub mod scheduler;
pub mod sequence;
pub mod session;

pub use engine::GlitchEngine;
pub use images::{ImageSet, SourceImage};
pub use params::EffectParams;
