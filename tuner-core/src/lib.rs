// tuner-core/src/lib.rs

//! The core logic for the guitar tuner.
//! This crate is responsible for audio capture, pitch detection,
//! note and cents calculation and matching against tuning presets.
//! It is completely headless and contains no GUI code.

pub mod acquisition;
pub mod audio;
pub mod config;
pub mod error;
pub mod pitch;
pub mod presets;
pub mod tuning;
pub mod worker;

pub use error::{Result, TunerError};

use presets::{StringSpec, TuningPreset};
use tuning::TuningDirection;

/// One analysis window of mono samples in roughly [-1, 1].
///
/// Produced once per acquisition cycle and dropped after processing.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// What the presentation layer shows after each cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    /// The active tuning, for the reference row of strings.
    pub preset: &'static TuningPreset,
    /// Name of the detected note, e.g. "A2".
    pub note: Option<String>,
    /// Detected frequency in Hz.
    pub frequency_hz: Option<f64>,
    /// Offset from the matched string's target, in cents.
    pub cents: Option<i32>,
    /// Index of the matched string, low string first.
    pub string_index: usize,
    /// True when the cents offset is within the in-tune window.
    pub in_tune: bool,
}

impl Readout {
    /// The string currently being tuned.
    pub fn target_string(&self) -> Option<&'static StringSpec> {
        self.preset.string(self.string_index)
    }

    /// Strings of the active preset, low to high.
    pub fn strings(&self) -> &'static [StringSpec] {
        self.preset.strings
    }

    pub fn direction(&self) -> Option<TuningDirection> {
        self.cents.map(TuningDirection::from_cents)
    }
}
