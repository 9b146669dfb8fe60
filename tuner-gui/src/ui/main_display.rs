//! # Main Display Module
//!
//! Layout of the tuner screen: preset picker, start/stop control, the
//! detected note with its cents dial, and the row of strings.

use iced::widget::{Space, button, column, container, pick_list, row, text};
use iced::{Alignment, Color, Element, Length};
use tuner_core::acquisition::LoopState;

use super::cent_meter::{self, CentMeter};
use crate::widgets::string_row::StringRow;
use crate::{AppDisplayData, Message, PresetChoice};

/// Creates the complete main application view
pub fn create_main_view(data: &AppDisplayData) -> Element<'static, Message> {
    let title = text("Fretwise").size(28);

    let preset_picker = column![
        text("Select Tuning").size(14),
        pick_list(
            PresetChoice::all(),
            Some(PresetChoice(data.readout.preset)),
            Message::PresetSelected,
        )
        .width(Length::Fill),
    ]
    .spacing(6);

    let body = match data.phase {
        LoopState::Idle | LoopState::Stopped => create_start_panel(),
        LoopState::RequestingAccess => create_waiting_panel(),
        LoopState::Running => create_tuner_panel(data),
    };

    let mut content = column![title, preset_picker].spacing(16);
    if let Some(error) = &data.error {
        content = content.push(create_error_banner(error));
    }
    content = content.push(body);

    container(content.padding(20).max_width(520.0))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .into()
}

/// Start button shown before the microphone is open.
fn create_start_panel() -> Element<'static, Message> {
    column![
        Space::with_height(40),
        button(text("Start Tuner").size(22))
            .padding([14, 32])
            .on_press(Message::StartTuner),
        text("This will request microphone access").size(12),
    ]
    .spacing(12)
    .align_x(Alignment::Center)
    .width(Length::Fill)
    .into()
}

fn create_waiting_panel() -> Element<'static, Message> {
    container(text("Waiting for microphone access...").size(16))
        .padding(40)
        .center_x(Length::Fill)
        .into()
}

/// Dial, note read-out, target string and the reference row.
fn create_tuner_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let readout = &data.readout;

    let note = text(readout.note.clone().unwrap_or_else(|| "--".to_string())).size(64);
    let frequency = text(match readout.frequency_hz {
        Some(freq) => format!("{:.1} Hz", freq),
        None => "Play a string...".to_string(),
    })
    .size(14);

    let (string_label, target_note) = match readout.target_string() {
        Some(string) => (
            format!("String {}", readout.preset.string_number(readout.string_index)),
            string.note_name,
        ),
        None => (String::new(), ""),
    };
    let target = container(
        column![text(string_label).size(12), text(target_note).size(20)]
            .align_x(Alignment::Center),
    )
    .padding([6, 16]);

    let status: Element<'static, Message> = match readout.direction() {
        Some(direction) => text(direction.label())
            .size(20)
            .color(cent_meter::direction_color(direction))
            .into(),
        None => Space::with_height(26).into(),
    };

    let dial = CentMeter::new(readout.cents).view();

    // The reference row only highlights a string while audio is flowing.
    let highlighted = readout.frequency_hz.map(|_| readout.string_index);
    let strings = column![
        text("All Strings").size(12),
        StringRow::new(readout.strings(), highlighted).view(),
    ]
    .spacing(6)
    .align_x(Alignment::Center);

    let stop = button(text("Stop").size(14))
        .padding([6, 16])
        .on_press(Message::StopTuner);

    column![
        dial,
        note,
        frequency,
        target,
        status,
        Space::with_height(10),
        strings,
        stop,
    ]
    .spacing(8)
    .align_x(Alignment::Center)
    .width(Length::Fill)
    .into()
}

fn create_error_banner(message: &str) -> Element<'static, Message> {
    container(
        row![
            text(message.to_string())
                .size(14)
                .color(Color::from_rgb8(0xEF, 0x44, 0x44))
                .width(Length::Fill),
            button(text("Dismiss").size(12))
                .padding([4, 8])
                .on_press(Message::DismissError),
        ]
        .spacing(10)
        .align_y(Alignment::Center),
    )
    .padding(10)
    .into()
}
