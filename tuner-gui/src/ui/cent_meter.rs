//! # Cent Meter Widget
//!
//! A half-circle dial showing how far the played string is from its target.
//! The left part of the arc is the flat zone, the middle the in-tune window
//! and the right part the sharp zone. The needle spans -50..+50 cents.

use iced::widget::canvas::{self, Geometry, Path, Stroke, path::Arc};
use iced::widget::container;
use iced::{Color, Element, Point, Radians, Rectangle, Renderer, Theme, mouse};
use std::f32::consts::PI;
use tuner_core::tuning::{self, IN_TUNE_CENTS, TuningDirection};

pub const FLAT_COLOR: Color = iced::color!(0x3B, 0x82, 0xF6); // Blue
pub const IN_TUNE_COLOR: Color = iced::color!(0x22, 0xC5, 0x5E); // Green
pub const SHARP_COLOR: Color = iced::color!(0xEF, 0x44, 0x44); // Red

const ARC_WIDTH: f32 = 14.0;

/// Colour used for a tuning direction everywhere in the UI.
pub fn direction_color(direction: TuningDirection) -> Color {
    match direction {
        TuningDirection::InTune => IN_TUNE_COLOR,
        TuningDirection::TuneHigher => FLAT_COLOR,
        TuningDirection::TuneLower => SHARP_COLOR,
    }
}

/// Cents dial for the string being tuned.
pub struct CentMeter {
    /// Current cents offset (None if no pitch detected)
    cents: Option<i32>,
}

impl CentMeter {
    pub fn new(cents: Option<i32>) -> Self {
        Self { cents }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(160.0)),
        )
        .into()
    }
}

/// Screen angle of a dial position. 0 degrees is the far left of the arc,
/// 180 the far right; the arc bulges upwards.
fn screen_angle(dial_degrees: f32) -> f32 {
    PI + dial_degrees.to_radians()
}

fn zone(center: Point, radius: f32, from_degrees: f32, to_degrees: f32) -> Path {
    Path::new(|builder| {
        builder.arc(Arc {
            center,
            radius,
            start_angle: Radians(screen_angle(from_degrees)),
            end_angle: Radians(screen_angle(to_degrees)),
        });
    })
}

impl<Message> canvas::Program<Message> for CentMeter {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let center = Point::new(bounds.width / 2.0, bounds.height - 10.0);
        let radius = (bounds.width / 2.0).min(bounds.height - 20.0) - ARC_WIDTH;
        if radius <= 0.0 {
            return vec![frame.into_geometry()];
        }

        // Zone boundaries sit at the edge of the in-tune window.
        let flat_edge = tuning::needle_angle_degrees(-IN_TUNE_CENTS);
        let sharp_edge = tuning::needle_angle_degrees(IN_TUNE_CENTS);
        for (from, to, color) in [
            (0.0, flat_edge, FLAT_COLOR),
            (flat_edge, sharp_edge, IN_TUNE_COLOR),
            (sharp_edge, 180.0, SHARP_COLOR),
        ] {
            frame.stroke(
                &zone(center, radius, from, to),
                Stroke::default().with_width(ARC_WIDTH).with_color(color),
            );
        }

        // Draw needle
        if let Some(cents) = self.cents {
            let angle = screen_angle(tuning::needle_angle_degrees(cents));
            let length = radius - ARC_WIDTH;
            let tip = Point::new(
                center.x + length * angle.cos(),
                center.y + length * angle.sin(),
            );
            let color = direction_color(TuningDirection::from_cents(cents));
            frame.stroke(
                &Path::line(center, tip),
                Stroke::default().with_width(4.0).with_color(color),
            );
        }

        frame.fill(&Path::circle(center, 6.0), Color::from_rgb8(0x63, 0x66, 0xf1));

        vec![frame.into_geometry()]
    }
}
