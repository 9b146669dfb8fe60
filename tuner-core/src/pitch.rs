//! # Pitch Detection Module
//!
//! Time-domain pitch estimation for a single plucked string. The estimator
//! autocorrelates a trimmed window of samples and reads the fundamental
//! period off the first dominant peak after the zero-lag decay.
//!
//! ## Features
//! - RMS noise gate so ambient noise never reports a pitch
//! - Edge trimming to drop low-energy transients at the window borders
//! - Parabolic interpolation for sub-sample period accuracy
//! - Pure function: the same buffer always gives the same answer

use crate::SampleBuffer;
use crate::config::DetectorParams;

/// A detected fundamental frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    pub frequency_hz: f64,
}

/// Estimates the fundamental frequency of a buffer.
///
/// # Arguments
/// * `buffer` - One analysis window and its sample rate
/// * `params` - Noise floor and trim threshold
///
/// # Returns
/// * `Some(estimate)` - Detected frequency in Hz
/// * `None` - Silence, or no usable period in the window
pub fn estimate(buffer: &SampleBuffer, params: &DetectorParams) -> Option<PitchEstimate> {
    detect_pitch_autocorrelation(buffer.samples(), buffer.sample_rate(), params)
        .map(|frequency_hz| PitchEstimate { frequency_hz })
}

/// Autocorrelation pitch detector over a raw slice of samples.
pub fn detect_pitch_autocorrelation(
    signal: &[f32],
    sample_rate: u32,
    params: &DetectorParams,
) -> Option<f64> {
    if signal.is_empty() || sample_rate == 0 {
        return None;
    }

    // --- Noise Gate ---
    if rms(signal) < params.rms_floor as f64 {
        return None;
    }

    // --- Trim the window borders ---
    let (start, end) = trim_bounds(signal, params.trim_threshold);
    let trimmed = &signal[start..end];
    if trimmed.len() < 3 {
        return None;
    }

    let correlation = autocorrelate(trimmed);

    // --- Skip the decay away from the zero-lag peak ---
    let mut lag = 0;
    while lag + 1 < correlation.len() && correlation[lag] > correlation[lag + 1] {
        lag += 1;
    }

    // --- Highest peak from there on; the first one wins on ties ---
    let mut peak = lag;
    for (i, &value) in correlation.iter().enumerate().skip(lag + 1) {
        if value > correlation[peak] {
            peak = i;
        }
    }
    if peak == 0 {
        return None;
    }

    let period = refine_peak(&correlation, peak);
    let frequency = sample_rate as f64 / period;

    if frequency.is_finite() && frequency > 0.0 {
        Some(frequency)
    } else {
        None
    }
}

/// Root mean square level of a signal.
pub fn rms(signal: &[f32]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let energy: f64 = signal.iter().map(|&s| s as f64 * s as f64).sum();
    (energy / signal.len() as f64).sqrt()
}

/// Finds the `start..end` range left after trimming both window borders.
///
/// The start is the first sample of the front half quieter than `threshold`;
/// the end is the first sample quieter than `threshold` when scanning the
/// back half from the last sample. A half with no quiet sample is not
/// trimmed.
fn trim_bounds(signal: &[f32], threshold: f32) -> (usize, usize) {
    let n = signal.len();
    let half = n / 2;

    let start = (0..half)
        .find(|&i| signal[i].abs() < threshold)
        .unwrap_or(0);
    let end = (1..half)
        .map(|i| n - i)
        .find(|&i| signal[i].abs() < threshold)
        .unwrap_or(n - 1);

    (start, end.max(start))
}

/// Unnormalised autocorrelation `c[lag] = sum(x[j] * x[j + lag])` for every
/// lag of the signal. Quadratic in the signal length.
fn autocorrelate(signal: &[f32]) -> Vec<f64> {
    let n = signal.len();
    (0..n)
        .map(|lag| {
            signal[..n - lag]
                .iter()
                .zip(&signal[lag..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum::<f64>()
        })
        .collect()
}

/// Refines an integer peak lag with a parabola through its two neighbours.
///
/// A peak on the first or last lag has no neighbour on one side and is
/// returned unchanged, as is a flat neighbourhood.
fn refine_peak(correlation: &[f64], peak: usize) -> f64 {
    if peak == 0 || peak + 1 >= correlation.len() {
        return peak as f64;
    }

    let x1 = correlation[peak - 1];
    let x2 = correlation[peak];
    let x3 = correlation[peak + 1];
    let a = (x1 + x3 - 2.0 * x2) / 2.0;
    let b = (x3 - x1) / 2.0;

    if a != 0.0 {
        peak as f64 - b / (2.0 * a)
    } else {
        peak as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> SampleBuffer {
        let samples = (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        SampleBuffer::new(samples, sample_rate)
    }

    fn assert_within_percent(detected: f64, expected: f64, percent: f64) {
        let error = (detected - expected).abs() / expected * 100.0;
        assert!(
            error < percent,
            "detected {detected:.3} Hz, expected {expected} Hz ({error:.3}% off)"
        );
    }

    #[test]
    fn detects_a2_sine() {
        let buffer = sine(110.0, 44_100, 4096, 0.5);
        let estimate = estimate(&buffer, &DetectorParams::default()).expect("pitch");
        assert_within_percent(estimate.frequency_hz, 110.0, 1.0);
    }

    #[test]
    fn detects_open_strings_of_standard_tuning() {
        for freq in [82.41_f32, 146.83, 196.0, 246.94, 329.63] {
            let buffer = sine(freq, 44_100, 4096, 0.6);
            let estimate = estimate(&buffer, &DetectorParams::default())
                .unwrap_or_else(|| panic!("no pitch for {freq} Hz"));
            assert_within_percent(estimate.frequency_hz, freq as f64, 1.0);
        }
    }

    #[test]
    fn detects_at_48k() {
        let buffer = sine(440.0, 48_000, 2048, 0.4);
        let estimate = estimate(&buffer, &DetectorParams::default()).expect("pitch");
        assert_within_percent(estimate.frequency_hz, 440.0, 1.0);
    }

    #[test]
    fn harmonics_do_not_move_the_fundamental() {
        let sample_rate = 44_100;
        let samples: Vec<f32> = (0..4096)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.5 * (2.0 * PI * 110.0 * t).sin()
                    + 0.25 * (2.0 * PI * 220.0 * t).sin()
                    + 0.1 * (2.0 * PI * 330.0 * t).sin()
            })
            .collect();
        let buffer = SampleBuffer::new(samples, sample_rate);
        let estimate = estimate(&buffer, &DetectorParams::default()).expect("pitch");
        assert_within_percent(estimate.frequency_hz, 110.0, 1.0);
    }

    #[test]
    fn silence_has_no_pitch() {
        let buffer = SampleBuffer::new(vec![0.0; 4096], 44_100);
        assert_eq!(estimate(&buffer, &DetectorParams::default()), None);
    }

    #[test]
    fn quiet_signal_is_gated() {
        // RMS of a 0.01 amplitude sine is about 0.007.
        let buffer = sine(110.0, 44_100, 4096, 0.01);
        assert!(rms(buffer.samples()) < 0.01);
        assert_eq!(estimate(&buffer, &DetectorParams::default()), None);
    }

    #[test]
    fn estimate_is_idempotent() {
        let buffer = sine(196.0, 44_100, 4096, 0.5);
        let params = DetectorParams::default();
        let first = estimate(&buffer, &params);
        let second = estimate(&buffer, &params);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn degenerate_buffers_do_not_panic() {
        let params = DetectorParams::default();
        assert_eq!(detect_pitch_autocorrelation(&[], 44_100, &params), None);
        assert_eq!(detect_pitch_autocorrelation(&[0.9], 44_100, &params), None);
        assert_eq!(detect_pitch_autocorrelation(&[0.9, -0.9], 44_100, &params), None);
        assert_eq!(detect_pitch_autocorrelation(&[0.5; 16], 0, &params), None);
        // A constant loud signal decays monotonically: the peak lands on the
        // last lag and must not be interpolated past the end.
        let result = detect_pitch_autocorrelation(&[0.9; 64], 44_100, &params);
        assert!(result.map_or(true, |f| f.is_finite() && f > 0.0));
    }

    #[test]
    fn trim_skips_loud_borders() {
        let signal = [0.9, 0.5, 0.1, 0.3, 0.3, 0.3, 0.05, 0.9];
        assert_eq!(trim_bounds(&signal, 0.2), (2, 6));
        // Nothing quiet: keep everything up to the last sample.
        assert_eq!(trim_bounds(&[0.9; 8], 0.2), (0, 7));
    }

    #[test]
    fn autocorrelation_of_known_signal() {
        let c = autocorrelate(&[1.0, 2.0, 3.0]);
        assert_eq!(c, vec![14.0, 8.0, 3.0]);
    }

    #[test]
    fn parabola_moves_toward_the_larger_neighbour() {
        let c = [0.0, 1.0, 4.0, 3.0, 0.0];
        let refined = refine_peak(&c, 2);
        assert!(refined > 2.0 && refined < 2.5, "{refined}");
        assert_eq!(refine_peak(&c, 0), 0.0);
        assert_eq!(refine_peak(&c, 4), 4.0);
        assert_eq!(refine_peak(&[1.0, 1.0, 1.0], 1), 1.0);
    }
}
