//! # Fretwise - Guitar Tuner GUI
//!
//! Main application for the Fretwise guitar tuner. It shows the detected
//! note, a cents dial and the strings of the selected tuning, and lets the
//! player start/stop the microphone and switch tunings.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Tuner Thread**: `TunerWorker` owns the microphone and runs the
//!   acquisition loop
//! - **Communication**: Crossbeam channels for commands and tuner events
//! - **Updates**: 60 FPS polling of tuner events via subscription

mod ui;
mod widgets;

use crossbeam_channel::Receiver;
use iced::{self, Element, Subscription, Task, Theme};
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tuner_core::{
    Readout,
    acquisition::{LoopState, TuningState},
    audio::CpalSource,
    config::TunerConfig,
    presets::{self, TuningPreset},
    worker::{TunerEvent, TunerWorker},
};
use ui::main_display::create_main_view;

/// Settings file, read at start-up and rewritten when the preset changes.
const SETTINGS_PATH: &str = "tuner_settings.json";

/// Main entry point for the Fretwise application.
pub fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Fretwise...");
    let result = iced::application("Fretwise", TunerApp::update, TunerApp::view)
        .subscription(TunerApp::subscription)
        .theme(TunerApp::theme)
        .exit_on_close_request(false)
        .run();
    tracing::info!("Application finished with result: {:?}", result);
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    /// Player picked a tuning from the list.
    PresetSelected(PresetChoice),
    /// "Start Tuner" pressed; this is what asks for the microphone.
    StartTuner,
    StopTuner,
    DismissError,
    /// Timer tick for polling tuner events.
    Tick,
    CloseRequested(iced::window::Id),
}

/// A tuning preset as an entry of the preset picker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetChoice(pub &'static TuningPreset);

impl PresetChoice {
    pub fn all() -> Vec<PresetChoice> {
        presets::PRESETS.iter().map(|&p| PresetChoice(p)).collect()
    }
}

impl fmt::Display for PresetChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name)
    }
}

/// UI-specific data needed for rendering the interface.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub phase: LoopState,
    pub readout: Readout,
    pub error: Option<String>,
}

/// Main application state.
#[derive(Debug)]
struct TunerApp {
    worker: Option<TunerWorker>,
    events: Option<Receiver<TunerEvent>>,
    settings: TunerConfig,
    display_data: AppDisplayData,
}

impl Default for TunerApp {
    /// Loads the settings and spawns the tuner worker. The microphone is
    /// not touched until the player presses start.
    fn default() -> Self {
        let mut settings = match load_settings(SETTINGS_PATH) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Using default settings ({}): {:#}", SETTINGS_PATH, e);
                TunerConfig::default()
            }
        };

        let mut error = None;
        let preset = match settings.validate() {
            Ok(preset) => preset,
            Err(e) => {
                tracing::warn!("Invalid settings, falling back to defaults: {}", e);
                error = Some(e.to_string());
                settings = TunerConfig::default();
                &presets::STANDARD
            }
        };

        let (worker, events) = match spawn_worker(&settings) {
            Ok((worker, events)) => (Some(worker), Some(events)),
            Err(e) => {
                tracing::error!("Could not start the tuner worker: {}", e);
                error = Some(e.to_string());
                (None, None)
            }
        };

        Self {
            worker,
            events,
            settings,
            display_data: AppDisplayData {
                phase: LoopState::Idle,
                readout: TuningState::new(preset).readout(),
                error,
            },
        }
    }
}

fn spawn_worker(
    settings: &TunerConfig,
) -> tuner_core::Result<(TunerWorker, Receiver<TunerEvent>)> {
    let target_sample_rate = settings.target_sample_rate;
    TunerWorker::spawn(settings.clone(), move || CpalSource::new(target_sample_rate))
}

impl TunerApp {
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::PresetSelected(PresetChoice(preset)) => {
                tracing::info!("Preset selected: {}", preset.name);
                // Show the new strings right away; the worker confirms with
                // a readout of its own once it has switched.
                self.display_data.readout = TuningState::new(preset).readout();
                if let Some(worker) = &self.worker {
                    worker.select_preset(preset);
                }
                self.settings.preset = preset.id.to_string();
                if let Err(e) = save_settings(&self.settings, SETTINGS_PATH) {
                    tracing::warn!("Error saving settings: {:#}", e);
                }
            }
            Message::StartTuner => {
                self.display_data.error = None;
                if let Some(worker) = &self.worker {
                    worker.start();
                }
            }
            Message::StopTuner => {
                if let Some(worker) = &self.worker {
                    worker.stop();
                }
            }
            Message::DismissError => {
                self.display_data.error = None;
            }
            Message::Tick => {
                if let Some(receiver) = &self.events {
                    let events: Vec<TunerEvent> = receiver.try_iter().collect();
                    for event in events {
                        self.process_tuner_event(event);
                    }
                }
            }
            Message::CloseRequested(_) => {
                tracing::info!("Window close requested, releasing the microphone...");
                self.events = None;
                if let Some(worker) = self.worker.take() {
                    worker.shutdown();
                }
                return iced::exit();
            }
        }
        Task::none()
    }

    fn process_tuner_event(&mut self, event: TunerEvent) {
        match event {
            TunerEvent::State(phase) => {
                tracing::debug!("Tuner state: {:?}", phase);
                self.display_data.phase = phase;
            }
            TunerEvent::Readout(readout) => {
                self.display_data.readout = readout;
            }
            TunerEvent::Error(e) => {
                self.display_data.error = Some(e.to_string());
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data)
    }

    /// Ticks every 16ms (60 FPS) and listens for the window being closed.
    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(std::time::Duration::from_millis(16)).map(|_| Message::Tick),
            iced::window::close_requests().map(Message::CloseRequested),
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Saves the tuner settings as pretty-printed JSON.
fn save_settings(settings: &TunerConfig, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let json_string = serde_json::to_string_pretty(settings)?;
    let mut file = File::create(path)?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}

/// Loads the tuner settings from a JSON file. Missing fields take their
/// default values.
fn load_settings(path: impl AsRef<Path>) -> anyhow::Result<TunerConfig> {
    let mut file = File::open(path)?;
    let mut data = String::new();
    file.read_to_string(&mut data)?;
    let settings: TunerConfig = serde_json::from_str(&data)?;
    Ok(settings)
}
