//! # Audio Capture Module
//!
//! The acquisition loop only needs three things from the audio system:
//! ask for the microphone, pull successive analysis windows from it, and let
//! it go. Those are the [`AudioSource`] and [`CaptureSession`] traits. The
//! production implementation sits on top of CPAL (Cross-Platform Audio
//! Library).
//!
//! ## Features
//! - Default input device selection
//! - Closest supported sample rate, any channel count (downmixed to mono)
//! - Rolling analysis window fed from the device callback
//! - Device errors surfaced on the next pull
//! - Stream released when the session is dropped

use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::collections::VecDeque;

use crate::SampleBuffer;
use crate::error::{Result, TunerError};

/// Something that can hand out microphone sessions.
pub trait AudioSource {
    type Session: CaptureSession;

    /// Requests microphone access and starts capturing.
    ///
    /// Fails with [`TunerError::PermissionDenied`] when access is refused or
    /// there is no input device, and [`TunerError::Capture`] for any other
    /// failure to open the stream.
    fn request_access(&mut self, window_size: usize) -> Result<Self::Session>;
}

/// A live capture. Dropping the session releases the device.
pub trait CaptureSession {
    fn sample_rate(&self) -> u32;

    /// The most recent analysis window.
    ///
    /// # Returns
    /// * `Ok(Some(buffer))` - A full window of `window_size` samples
    /// * `Ok(None)` - Not enough audio has arrived yet
    /// * `Err(TunerError::Capture)` - The stream failed and is unusable
    fn next_buffer(&mut self) -> Result<Option<SampleBuffer>>;
}

/// Capacity of the callback -> session channel, in device callbacks.
const CALLBACK_QUEUE: usize = 64;

/// Microphone input through the default CPAL host.
#[derive(Debug, Clone)]
pub struct CpalSource {
    target_sample_rate: u32,
}

impl CpalSource {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }
}

impl AudioSource for CpalSource {
    type Session = CpalSession;

    fn request_access(&mut self, window_size: usize) -> Result<CpalSession> {
        start_audio_capture(self.target_sample_rate, window_size)
    }
}

/// An open CPAL input stream plus the rolling window it feeds.
pub struct CpalSession {
    stream: cpal::Stream,
    window: RollingWindow,
}

impl CaptureSession for CpalSession {
    fn sample_rate(&self) -> u32 {
        self.window.sample_rate
    }

    fn next_buffer(&mut self) -> Result<Option<SampleBuffer>> {
        self.window.next_buffer()
    }
}

/// The latest `window_size` samples received from the device callback.
struct RollingWindow {
    frames: Receiver<Vec<f32>>,
    errors: Receiver<String>,
    samples: VecDeque<f32>,
    window_size: usize,
    sample_rate: u32,
}

impl RollingWindow {
    fn new(
        frames: Receiver<Vec<f32>>,
        errors: Receiver<String>,
        window_size: usize,
        sample_rate: u32,
    ) -> Self {
        Self {
            frames,
            errors,
            samples: VecDeque::with_capacity(window_size * 2),
            window_size,
            sample_rate,
        }
    }

    /// Drains pending callback frames and returns the newest full window.
    ///
    /// A reported stream error, or the error channel closing, ends the
    /// session with [`TunerError::Capture`].
    fn next_buffer(&mut self) -> Result<Option<SampleBuffer>> {
        match self.errors.try_recv() {
            Ok(message) => return Err(TunerError::Capture(message)),
            Err(TryRecvError::Disconnected) => {
                return Err(TunerError::Capture("audio stream closed".to_string()));
            }
            Err(TryRecvError::Empty) => {}
        }

        for frame in self.frames.try_iter() {
            self.samples.extend(frame);
        }
        let excess = self.samples.len().saturating_sub(self.window_size);
        self.samples.drain(..excess);

        if self.samples.len() < self.window_size {
            return Ok(None);
        }
        Ok(Some(SampleBuffer::new(
            self.samples.iter().copied().collect(),
            self.sample_rate,
        )))
    }
}

impl Drop for CpalSession {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            tracing::warn!("Error pausing input stream: {}", e);
        }
        tracing::info!("Released audio input stream");
    }
}

/// Opens the default input device and starts streaming into a session.
///
/// # Arguments
/// * `target_sample_rate` - Preferred rate; the nearest supported one is used
/// * `window_size` - Samples per analysis window
fn start_audio_capture(target_sample_rate: u32, window_size: usize) -> Result<CpalSession> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| TunerError::PermissionDenied("no input device available".to_string()))?;

    match device.name() {
        Ok(name) => tracing::info!("Using audio input device: {}", name),
        Err(e) => tracing::debug!("Input device has no name: {}", e),
    }

    let (config, channels) = select_stream_config(&device, target_sample_rate)
        .map_err(|e| TunerError::Capture(format!("{e:#}")))?;
    let sample_rate = config.sample_rate.0;
    tracing::info!(
        "Selected sample rate: {} Hz, {} channel(s)",
        sample_rate,
        channels
    );

    let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Vec<f32>>(CALLBACK_QUEUE);
    let (error_tx, error_rx) = crossbeam_channel::bounded::<String>(1);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Frames are dropped when the session falls behind.
                let _ = frame_tx.try_send(downmix(data, channels));
            },
            stream_error_handler(error_tx),
            None,
        )
        .map_err(|e| match e {
            BuildStreamError::DeviceNotAvailable => {
                TunerError::PermissionDenied("input device not available".to_string())
            }
            other => TunerError::Capture(other.to_string()),
        })?;

    stream
        .play()
        .map_err(|e| TunerError::Capture(e.to_string()))?;

    Ok(CpalSession {
        stream,
        window: RollingWindow::new(frame_rx, error_rx, window_size, sample_rate),
    })
}

fn stream_error_handler(
    errors: Sender<String>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        tracing::error!("An error occurred on the audio stream: {}", err);
        let _ = errors.try_send(err.to_string());
    }
}

/// Picks an f32 input configuration at the rate closest to the target.
fn select_stream_config(
    device: &cpal::Device,
    target_rate: u32,
) -> anyhow::Result<(cpal::StreamConfig, u16)> {
    let configs = device
        .supported_input_configs()
        .context("querying supported input configurations")?
        .collect::<Vec<_>>();
    let supported = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("no suitable f32 input format found"))?;

    let rate = nearest_rate(&supported, target_rate);
    let channels = supported.channels();
    let config: cpal::StreamConfig = supported.with_sample_rate(rate).into();
    Ok((config, channels))
}

/// Finds the best supported configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Mono is preferred over multi-channel,
/// then the range closest to the target rate wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (c.channels() != 1, distance)
        })
}

/// The supported rate of `range` closest to `target_rate`.
fn nearest_rate(range: &SupportedStreamConfigRange, target_rate: u32) -> cpal::SampleRate {
    let rate = target_rate.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    cpal::SampleRate(rate)
}

/// Averages interleaved frames down to one channel.
fn downmix(data: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::{SampleFormat, SampleRate, SupportedBufferSize};

    fn range(
        channels: u16,
        min: u32,
        max: u32,
        format: SampleFormat,
    ) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    fn window(size: usize) -> (RollingWindow, Sender<Vec<f32>>, Sender<String>) {
        let (frame_tx, frame_rx) = crossbeam_channel::unbounded();
        let (error_tx, error_rx) = crossbeam_channel::bounded(1);
        (RollingWindow::new(frame_rx, error_rx, size, 44_100), frame_tx, error_tx)
    }

    #[test]
    fn window_warms_up_until_full() {
        let (mut window, frames, _errors) = window(256);
        frames.send(vec![0.1; 100]).unwrap();
        assert_eq!(window.next_buffer(), Ok(None));

        frames.send(vec![0.2; 156]).unwrap();
        let buffer = window.next_buffer().unwrap().expect("full window");
        assert_eq!(buffer.len(), 256);
        assert_eq!(buffer.sample_rate(), 44_100);
    }

    #[test]
    fn window_keeps_only_the_newest_samples() {
        let (mut window, frames, _errors) = window(4);
        frames.send(vec![1.0, 2.0, 3.0]).unwrap();
        frames.send(vec![4.0, 5.0, 6.0]).unwrap();
        let buffer = window.next_buffer().unwrap().expect("full window");
        assert_eq!(buffer.samples(), &[3.0, 4.0, 5.0, 6.0]);

        // Without new audio the same window is handed out again.
        let again = window.next_buffer().unwrap().expect("full window");
        assert_eq!(again.samples(), &[3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn stream_error_ends_the_session() {
        let (mut window, frames, errors) = window(4);
        frames.send(vec![0.5; 8]).unwrap();
        errors.send("device unplugged".to_string()).unwrap();
        assert_eq!(
            window.next_buffer(),
            Err(TunerError::Capture("device unplugged".to_string()))
        );
    }

    #[test]
    fn closed_error_channel_ends_the_session() {
        let (mut window, _frames, errors) = window(4);
        drop(errors);
        assert!(matches!(window.next_buffer(), Err(TunerError::Capture(_))));
    }

    #[test]
    fn config_ranking_prefers_f32_then_mono_then_rate() {
        let configs = vec![
            range(2, 44_100, 48_000, SampleFormat::F32),
            range(1, 44_100, 44_100, SampleFormat::I16),
            range(1, 8_000, 16_000, SampleFormat::F32),
            range(1, 48_000, 48_000, SampleFormat::F32),
        ];
        let best = find_supported_config(configs, 44_100).expect("f32 config");
        assert_eq!(best, range(1, 48_000, 48_000, SampleFormat::F32));
    }

    #[test]
    fn stereo_is_used_when_nothing_else_is_offered() {
        let configs = vec![
            range(2, 44_100, 48_000, SampleFormat::F32),
            range(1, 44_100, 48_000, SampleFormat::I16),
        ];
        let best = find_supported_config(configs, 44_100).expect("f32 config");
        assert_eq!(best.channels(), 2);
    }

    #[test]
    fn no_f32_format_means_no_config() {
        let configs = vec![range(1, 44_100, 48_000, SampleFormat::I16)];
        assert_eq!(find_supported_config(configs, 44_100), None);
    }

    #[test]
    fn rate_is_clamped_into_the_supported_range() {
        let wide = range(1, 8_000, 96_000, SampleFormat::F32);
        assert_eq!(nearest_rate(&wide, 44_100), SampleRate(44_100));
        let high = range(1, 48_000, 96_000, SampleFormat::F32);
        assert_eq!(nearest_rate(&high, 44_100), SampleRate(48_000));
        let low = range(1, 8_000, 22_050, SampleFormat::F32);
        assert_eq!(nearest_rate(&low, 44_100), SampleRate(22_050));
    }

    #[test]
    fn mono_passes_through() {
        assert_eq!(downmix(&[0.1, -0.2, 0.3], 1), vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn stereo_is_averaged() {
        assert_eq!(downmix(&[0.5, 0.1, -1.0, 0.0], 2), vec![0.3, -0.5]);
    }

    #[test]
    fn trailing_partial_frame_is_averaged_on_its_own() {
        assert_eq!(downmix(&[0.2, 0.4, 0.6], 2), vec![0.3, 0.6]);
    }
}
