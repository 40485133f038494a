//! Base-image flash sequences.
//!
//! Each frame's base image follows a fixed table of `{slot, duration}`
//! steps — a long hold on the first image punctuated by progressively
//! longer flashes of the others. The table depends on whether two or three
//! images are loaded.

use crate::images::ImageSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceStep {
    /// 1-based image slot shown as the base for this step.
    pub slot: u8,
    /// How long the step holds, in milliseconds.
    pub duration_ms: f64,
}

const fn step(slot: u8, duration_ms: f64) -> SequenceStep {
    SequenceStep { slot, duration_ms }
}

/// Two-image flash pattern: open on a long hold of image 1, then trade
/// increasingly sustained flashes with image 2 before settling back.
pub const PAIR_STEPS: [SequenceStep; 11] = [
    step(1, 800.0),
    step(2, 50.0),
    step(1, 200.0),
    step(2, 100.0),
    step(1, 100.0),
    step(2, 150.0),
    step(1, 50.0),
    step(2, 300.0),
    step(1, 30.0),
    step(2, 500.0),
    step(1, 1000.0),
];

/// Three-image flash pattern: the same cadence widened to rotate through
/// the third slot.
pub const TRIPLE_STEPS: [SequenceStep; 13] = [
    step(1, 800.0),
    step(2, 50.0),
    step(3, 100.0),
    step(1, 200.0),
    step(2, 100.0),
    step(3, 150.0),
    step(1, 100.0),
    step(2, 150.0),
    step(3, 300.0),
    step(1, 50.0),
    step(2, 500.0),
    step(3, 200.0),
    step(1, 1000.0),
];

/// The sequence table for an image set's shape.
pub fn steps_for(images: &ImageSet) -> &'static [SequenceStep] {
    match images {
        ImageSet::Pair(..) => &PAIR_STEPS,
        ImageSet::Triple(..) => &TRIPLE_STEPS,
    }
}

/// Total wall-clock length of one loop through a table.
pub fn loop_duration_ms(steps: &[SequenceStep]) -> f64 {
    steps.iter().map(|s| s.duration_ms).sum()
}
