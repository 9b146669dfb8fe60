//! Runtime settings for the tuner.
//!
//! The settings are plain serde data so the application can keep them in a
//! JSON file next to the binary. Missing fields fall back to the defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TunerError};
use crate::presets::{self, TuningPreset};

/// Number of samples analysed per cycle. At 44.1 kHz this covers about
/// 93 ms, i.e. seven to eight periods of a low E string.
pub const DEFAULT_WINDOW_SIZE: usize = 4096;

/// One cycle per display refresh at 60 Hz.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Id or display name of the active tuning preset.
    pub preset: String,
    /// Samples per analysis window.
    pub window_size: usize,
    /// Delay between the start of two acquisition cycles.
    pub tick_interval_ms: u64,
    /// Preferred capture sample rate; the device may pick a nearby one.
    pub target_sample_rate: u32,
    /// Parameters of the pitch estimator.
    pub detector: DetectorParams,
}

/// Thresholds used by the autocorrelation estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Buffers quieter than this RMS level carry no pitch.
    pub rms_floor: f32,
    /// Amplitude under which leading/trailing samples are trimmed.
    pub trim_threshold: f32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            rms_floor: 0.01,
            trim_threshold: 0.2,
        }
    }
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            preset: presets::STANDARD.id.to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            target_sample_rate: 44_100,
            detector: DetectorParams::default(),
        }
    }
}

impl TunerConfig {
    /// Checks every field and resolves the preset name.
    pub fn validate(&self) -> Result<&'static TuningPreset> {
        if self.window_size < 64 {
            return Err(TunerError::InvalidConfig(format!(
                "window_size must be at least 64 samples, got {}",
                self.window_size
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(TunerError::InvalidConfig(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.target_sample_rate == 0 {
            return Err(TunerError::InvalidConfig(
                "target_sample_rate must be positive".to_string(),
            ));
        }
        let DetectorParams {
            rms_floor,
            trim_threshold,
        } = self.detector;
        if !(rms_floor > 0.0 && rms_floor < 1.0) {
            return Err(TunerError::InvalidConfig(format!(
                "rms_floor must be in (0, 1), got {rms_floor}"
            )));
        }
        if !(trim_threshold > 0.0 && trim_threshold < 1.0) {
            return Err(TunerError::InvalidConfig(format!(
                "trim_threshold must be in (0, 1), got {trim_threshold}"
            )));
        }
        self.active_preset()
    }

    pub fn active_preset(&self) -> Result<&'static TuningPreset> {
        presets::preset_by_name(&self.preset)
            .ok_or_else(|| TunerError::UnknownPreset(self.preset.clone()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
