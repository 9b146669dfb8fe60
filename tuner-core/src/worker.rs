//! # Tuner Worker
//!
//! Runs an [`AcquisitionLoop`] on a dedicated thread. The thread is the only
//! owner of the loop and its capture session, so cycles never overlap.
//!
//! Scheduling is a self-rescheduling tick: after each cycle the thread waits
//! for whatever is left of the tick interval, or for a command, whichever
//! comes first. While the loop is not running the thread just blocks on the
//! command channel. Shutting down is cooperative: the current cycle finishes,
//! the session is released and the thread exits.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::Readout;
use crate::acquisition::{AcquisitionLoop, Cycle, LoopState};
use crate::audio::AudioSource;
use crate::config::TunerConfig;
use crate::error::{Result, TunerError};
use crate::presets::TuningPreset;

/// Requests sent from the application to the worker.
#[derive(Debug, Clone)]
pub enum Command {
    Start,
    Stop,
    SelectPreset(&'static TuningPreset),
    Shutdown,
}

/// Notifications sent from the worker back to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum TunerEvent {
    /// The loop changed lifecycle state.
    State(LoopState),
    /// A cycle finished (or the preset changed) and the display should update.
    Readout(Readout),
    /// Something the user needs to know about.
    Error(TunerError),
}

/// Handle to the worker thread. Dropping it shuts the worker down.
#[derive(Debug)]
pub struct TunerWorker {
    commands: Sender<Command>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TunerWorker {
    /// Spawns the worker thread.
    ///
    /// The audio source is built on the worker thread by `make_source`, so
    /// sources whose streams cannot cross threads work as well.
    ///
    /// # Returns
    /// * `Ok((worker, events))` - Worker handle and the event receiver
    /// * `Err(e)` - The configuration is invalid
    pub fn spawn<S, F>(
        config: TunerConfig,
        make_source: F,
    ) -> Result<(Self, Receiver<TunerEvent>)>
    where
        S: AudioSource + 'static,
        F: FnOnce() -> S + Send + 'static,
    {
        let preset = config.validate()?;
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();

        let thread_handle = thread::Builder::new()
            .name("tuner-worker".to_string())
            .spawn(move || {
                tracing::info!("Tuner worker started");
                let tuner = AcquisitionLoop::new(
                    make_source(),
                    preset,
                    config.window_size,
                    config.detector,
                );
                let mut runner = Runner {
                    tuner,
                    events: event_tx,
                    interval: config.tick_interval(),
                    overrun_reported: false,
                };
                runner.send(TunerEvent::Readout(runner.tuner.readout()));
                runner.run(&command_rx);
                tracing::info!("Tuner worker finished");
            })
            .map_err(|e| TunerError::Capture(format!("failed to spawn tuner worker: {e}")))?;

        Ok((
            Self {
                commands: command_tx,
                thread_handle: Some(thread_handle),
            },
            event_rx,
        ))
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn select_preset(&self, preset: &'static TuningPreset) {
        self.send(Command::SelectPreset(preset));
    }

    pub fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("Tuner worker is gone, command dropped");
        }
    }

    /// Asks the worker to stop and waits for it to release the microphone.
    pub fn shutdown(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                tracing::error!("Tuner worker panicked");
            }
        }
    }
}

impl Drop for TunerWorker {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

/// Worker-thread side: the loop plus its outgoing channel.
struct Runner<S: AudioSource> {
    tuner: AcquisitionLoop<S>,
    events: Sender<TunerEvent>,
    interval: Duration,
    overrun_reported: bool,
}

impl<S: AudioSource> Runner<S> {
    fn run(&mut self, commands: &Receiver<Command>) {
        loop {
            if !self.tuner.is_running() {
                // Nothing to schedule: sleep until told otherwise.
                match commands.recv() {
                    Ok(command) => {
                        if !self.handle(command) {
                            break;
                        }
                    }
                    Err(_) => break,
                }
                continue;
            }

            let cycle_start = Instant::now();
            self.cycle();

            let elapsed = cycle_start.elapsed();
            if elapsed > self.interval && !self.overrun_reported {
                tracing::warn!(
                    "Acquisition cycle took {:?}, longer than the {:?} tick; \
                     reduce window_size or raise tick_interval_ms",
                    elapsed,
                    self.interval
                );
                self.overrun_reported = true;
            }

            // Wait out the rest of the tick, waking early for commands.
            let deadline = cycle_start + self.interval;
            loop {
                let timeout = deadline.saturating_duration_since(Instant::now());
                match commands.recv_timeout(timeout) {
                    Ok(command) => {
                        if !self.handle(command) {
                            self.tuner.teardown();
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => {
                        self.tuner.teardown();
                        return;
                    }
                }
            }
        }
        self.tuner.teardown();
    }

    fn cycle(&mut self) {
        match self.tuner.tick() {
            Ok(Cycle::Analysed(_)) => self.send(TunerEvent::Readout(self.tuner.readout())),
            Ok(Cycle::Warming) => {}
            Err(e) => {
                self.send(TunerEvent::Error(e));
                self.send(TunerEvent::State(self.tuner.phase()));
                self.send(TunerEvent::Readout(self.tuner.readout()));
            }
        }
    }

    /// Applies one command. Returns `false` when the worker should exit.
    fn handle(&mut self, command: Command) -> bool {
        tracing::debug!("Tuner command: {:?}", command);
        match command {
            Command::Start => {
                if self.tuner.is_running() {
                    return true;
                }
                self.send(TunerEvent::State(LoopState::RequestingAccess));
                if let Err(e) = self.tuner.start() {
                    self.send(TunerEvent::Error(e));
                }
                self.send(TunerEvent::State(self.tuner.phase()));
            }
            Command::Stop => {
                self.tuner.stop();
                self.send(TunerEvent::State(self.tuner.phase()));
                self.send(TunerEvent::Readout(self.tuner.readout()));
            }
            Command::SelectPreset(preset) => {
                if let Err(e) = self.tuner.select_preset(preset) {
                    self.send(TunerEvent::Error(e));
                }
                self.send(TunerEvent::State(self.tuner.phase()));
                self.send(TunerEvent::Readout(self.tuner.readout()));
            }
            Command::Shutdown => {
                tracing::info!("Received shutdown signal");
                return false;
            }
        }
        true
    }

    fn send(&self, event: TunerEvent) {
        // The receiver disappears when the application exits first.
        let _ = self.events.send(event);
    }
}
