//! # Musical Tuning Module
//!
//! Converts detected frequencies into note names and measures how far a
//! frequency sits from a target in cents. Everything here assumes twelve-tone
//! equal temperament with A4 = 440 Hz.

use std::fmt;

/// Reference pitch for A4 in Hz.
pub const A4_HZ: f64 = 440.0;

/// A played note is "in tune" when it is strictly within this many cents.
pub const IN_TUNE_CENTS: i32 = 5;

/// Pitch classes starting at C, sharps only.
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A note name with its octave, printed as e.g. "A4" or "C#3".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteName {
    pitch_class: usize,
    octave: i32,
}

impl NoteName {
    /// Pitch class name ("C", "C#", ..., "B").
    pub fn pitch_class(&self) -> &'static str {
        NOTE_NAMES[self.pitch_class]
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave)
    }
}

/// Frequency of C0, 4.75 octaves below A4.
fn c0_hz() -> f64 {
    A4_HZ * 2.0_f64.powf(-4.75)
}

/// Maps a frequency to the nearest equal-tempered note.
///
/// Half steps above C0 are rounded with halves going up, then split into a
/// pitch class and an octave. Returns `None` for non-positive or non-finite
/// input, which has no pitch.
pub fn frequency_to_note(freq_hz: f64) -> Option<NoteName> {
    if !freq_hz.is_finite() || freq_hz <= 0.0 {
        return None;
    }
    let half_steps = 12.0 * (freq_hz / c0_hz()).log2();
    let rounded = (half_steps + 0.5).floor() as i64;

    Some(NoteName {
        pitch_class: rounded.rem_euclid(12) as usize,
        octave: rounded.div_euclid(12) as i32,
    })
}

/// Signed deviation of `detected_hz` from `target_hz`, in whole cents.
///
/// Rounded toward negative infinity: positive means sharp, negative flat.
pub fn cents_off(detected_hz: f64, target_hz: f64) -> i32 {
    (1200.0 * (detected_hz / target_hz).log2()).floor() as i32
}

/// Whether a cents offset counts as in tune.
pub fn is_in_tune(cents: i32) -> bool {
    cents.abs() < IN_TUNE_CENTS
}

/// What the player should do with the tuning peg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningDirection {
    InTune,
    /// The string is flat.
    TuneHigher,
    /// The string is sharp.
    TuneLower,
}

impl TuningDirection {
    pub fn from_cents(cents: i32) -> Self {
        if is_in_tune(cents) {
            TuningDirection::InTune
        } else if cents < 0 {
            TuningDirection::TuneHigher
        } else {
            TuningDirection::TuneLower
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TuningDirection::InTune => "In Tune!",
            TuningDirection::TuneHigher => "Tune Higher",
            TuningDirection::TuneLower => "Tune Lower",
        }
    }
}

/// Dial angle for a cents offset: -50..=+50 cents sweeps 0..=180 degrees,
/// 90 degrees is in tune.
pub fn needle_angle_degrees(cents: i32) -> f32 {
    (90.0 + cents as f32 * 1.8).clamp(0.0, 180.0)
}
