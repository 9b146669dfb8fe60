//! # Acquisition Loop
//!
//! Owns the capture session and the tuning state. Each call to
//! [`AcquisitionLoop::tick`] is one cycle: pull the current window, estimate
//! the pitch, map it to a note and a string, compute the cents offset and
//! update [`TuningState`].
//!
//! ```text
//! Idle --start--> RequestingAccess --granted--> Running --stop--> Idle
//!                        |                         |
//!                        +--denied--> Idle         +--error/teardown--> Stopped
//! ```
//!
//! The session is an owned value: leaving `Running` drops it, and a new one
//! is only requested after the old one is gone.

use crate::audio::{AudioSource, CaptureSession};
use crate::config::DetectorParams;
use crate::error::{Result, TunerError};
use crate::pitch::{self, PitchEstimate};
use crate::presets::TuningPreset;
use crate::tuning::{self, NoteName};
use crate::{Readout, SampleBuffer};

/// Lifecycle of the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No stream held. Initial state and the state after an explicit stop.
    Idle,
    /// Waiting for the audio source to grant the microphone.
    RequestingAccess,
    /// A session is live and cycles are being processed.
    Running,
    /// Torn down after a capture failure or shutdown. Needs an explicit start.
    Stopped,
}

/// The tuner's view of the world, updated once per cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningState {
    pub active_preset: &'static TuningPreset,
    pub selected_string_index: usize,
    pub last_estimate: Option<PitchEstimate>,
    pub last_note: Option<NoteName>,
    pub last_cents_offset: Option<i32>,
}

impl TuningState {
    pub fn new(active_preset: &'static TuningPreset) -> Self {
        Self {
            active_preset,
            selected_string_index: 0,
            last_estimate: None,
            last_note: None,
            last_cents_offset: None,
        }
    }

    /// Forgets the last detection but keeps the selected string.
    fn clear_detection(&mut self) {
        self.last_estimate = None;
        self.last_note = None;
        self.last_cents_offset = None;
    }

    /// Folds one estimate (or its absence) into the state.
    pub fn apply(&mut self, estimate: Option<PitchEstimate>) {
        let Some(estimate) = estimate else {
            self.clear_detection();
            return;
        };
        let frequency = estimate.frequency_hz;
        let index = self.active_preset.closest_string(frequency);
        let target = self.active_preset.strings[index].target_frequency_hz;

        self.selected_string_index = index;
        self.last_estimate = Some(estimate);
        self.last_note = tuning::frequency_to_note(frequency);
        self.last_cents_offset = Some(tuning::cents_off(frequency, target));
    }

    pub fn readout(&self) -> Readout {
        Readout {
            preset: self.active_preset,
            note: self.last_note.map(|n| n.to_string()),
            frequency_hz: self.last_estimate.map(|e| e.frequency_hz),
            cents: self.last_cents_offset,
            string_index: self.selected_string_index,
            in_tune: self.last_cents_offset.is_some_and(tuning::is_in_tune),
        }
    }
}

/// Result of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cycle {
    /// The state was updated from a fresh window.
    Analysed(Option<PitchEstimate>),
    /// The session has not filled a window yet; state untouched.
    Warming,
}

pub struct AcquisitionLoop<S: AudioSource> {
    source: S,
    session: Option<S::Session>,
    phase: LoopState,
    state: TuningState,
    window_size: usize,
    params: DetectorParams,
}

impl<S: AudioSource> AcquisitionLoop<S> {
    pub fn new(
        source: S,
        preset: &'static TuningPreset,
        window_size: usize,
        params: DetectorParams,
    ) -> Self {
        Self {
            source,
            session: None,
            phase: LoopState::Idle,
            state: TuningState::new(preset),
            window_size,
            params,
        }
    }

    pub fn phase(&self) -> LoopState {
        self.phase
    }

    pub fn state(&self) -> &TuningState {
        &self.state
    }

    pub fn readout(&self) -> Readout {
        self.state.readout()
    }

    pub fn is_running(&self) -> bool {
        self.phase == LoopState::Running
    }

    /// Requests the microphone and starts running.
    ///
    /// On denial the loop goes back to `Idle` and the error is returned; it
    /// is not retried. Starting while already running is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.phase == LoopState::Running {
            return Ok(());
        }
        self.release_session();
        self.phase = LoopState::RequestingAccess;
        tracing::info!("Requesting microphone access");

        match self.source.request_access(self.window_size) {
            Ok(session) => {
                tracing::info!(
                    "Capture running at {} Hz, window {} samples",
                    session.sample_rate(),
                    self.window_size
                );
                self.session = Some(session);
                self.phase = LoopState::Running;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Microphone access failed: {}", e);
                self.phase = LoopState::Idle;
                Err(e)
            }
        }
    }

    /// Explicit stop: releases the session and returns to `Idle`.
    pub fn stop(&mut self) {
        self.release_session();
        self.state.clear_detection();
        self.phase = LoopState::Idle;
    }

    /// Tears the loop down for good (component teardown). A later `start`
    /// is still allowed.
    pub fn teardown(&mut self) {
        self.release_session();
        self.state.clear_detection();
        self.phase = LoopState::Stopped;
    }

    /// Switches the active tuning.
    ///
    /// The selected string goes back to 0. A running loop is torn down and
    /// restarted so the new preset never sees a window from the old session.
    pub fn select_preset(&mut self, preset: &'static TuningPreset) -> Result<()> {
        let was_running = self.phase == LoopState::Running;
        tracing::info!("Switching preset to {}", preset.name);

        if was_running {
            self.teardown();
        }
        self.state = TuningState::new(preset);

        if was_running { self.start() } else { Ok(()) }
    }

    /// Runs one acquisition cycle.
    ///
    /// A capture failure releases the session, moves the loop to `Stopped`
    /// and is returned to the caller.
    pub fn tick(&mut self) -> Result<Cycle> {
        let Some(session) = self.session.as_mut() else {
            return Err(TunerError::NotRunning);
        };

        let buffer = match session.next_buffer() {
            Ok(Some(buffer)) => buffer,
            Ok(None) => return Ok(Cycle::Warming),
            Err(e) => {
                tracing::error!("Capture failed, stopping tuner: {}", e);
                self.teardown();
                return Err(e);
            }
        };

        let estimate = self.analyse(buffer);
        self.state.apply(estimate);
        Ok(Cycle::Analysed(estimate))
    }

    /// Consumes the cycle's buffer.
    fn analyse(&self, buffer: SampleBuffer) -> Option<PitchEstimate> {
        pitch::estimate(&buffer, &self.params)
    }

    fn release_session(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("Capture session released");
        }
    }
}

impl<S: AudioSource> Drop for AcquisitionLoop<S> {
    fn drop(&mut self) {
        self.release_session();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory audio source that synthesises sine windows.

    use super::*;
    use std::f32::consts::PI;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    pub const RATE: u32 = 44_100;

    #[derive(Debug, Default)]
    pub struct Counters {
        pub opened: AtomicUsize,
        pub live: AtomicUsize,
        pub max_live: AtomicUsize,
    }

    /// Shared knobs the test can turn while the loop owns the source.
    #[derive(Debug)]
    pub struct Controls {
        pub frequency: Mutex<Option<f32>>,
        pub deny: Mutex<bool>,
        pub fail_next: Mutex<bool>,
        pub warmup_cycles: AtomicUsize,
    }

    #[derive(Debug, Clone)]
    pub struct SineSource {
        pub counters: Arc<Counters>,
        pub controls: Arc<Controls>,
    }

    impl SineSource {
        pub fn new(frequency: Option<f32>) -> Self {
            Self {
                counters: Arc::new(Counters::default()),
                controls: Arc::new(Controls {
                    frequency: Mutex::new(frequency),
                    deny: Mutex::new(false),
                    fail_next: Mutex::new(false),
                    warmup_cycles: AtomicUsize::new(0),
                }),
            }
        }

        pub fn set_frequency(&self, frequency: Option<f32>) {
            *self.controls.frequency.lock().unwrap() = frequency;
        }
    }

    pub struct SineSession {
        counters: Arc<Counters>,
        controls: Arc<Controls>,
        window_size: usize,
    }

    impl AudioSource for SineSource {
        type Session = SineSession;

        fn request_access(&mut self, window_size: usize) -> Result<SineSession> {
            if *self.controls.deny.lock().unwrap() {
                return Err(TunerError::PermissionDenied("user said no".to_string()));
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.max_live.fetch_max(live, Ordering::SeqCst);
            Ok(SineSession {
                counters: Arc::clone(&self.counters),
                controls: Arc::clone(&self.controls),
                window_size,
            })
        }
    }

    impl CaptureSession for SineSession {
        fn sample_rate(&self) -> u32 {
            RATE
        }

        fn next_buffer(&mut self) -> Result<Option<SampleBuffer>> {
            if std::mem::take(&mut *self.controls.fail_next.lock().unwrap()) {
                return Err(TunerError::Capture("device unplugged".to_string()));
            }
            let warming = self
                .controls
                .warmup_cycles
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if warming {
                return Ok(None);
            }
            let samples = match *self.controls.frequency.lock().unwrap() {
                Some(freq) => (0..self.window_size)
                    .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / RATE as f32).sin())
                    .collect(),
                None => vec![0.0; self.window_size],
            };
            Ok(Some(SampleBuffer::new(samples, RATE)))
        }
    }

    impl Drop for SineSession {
        fn drop(&mut self) {
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
