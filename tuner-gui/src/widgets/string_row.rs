//! # String Row Widget
//!
//! Reference row with one cell per string of the active tuning, lowest string
//! on the left. Each cell shows the guitar string number and the target note;
//! the string currently being tuned is highlighted.

use iced::alignment::{Horizontal, Vertical};
use iced::widget::canvas::{self, Fill, Geometry, Path, Stroke, Text};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};
use tuner_core::presets::StringSpec;

const ROW_HEIGHT: f32 = 64.0;
const CELL_GAP: f32 = 8.0;

#[derive(Debug, Clone)]
pub struct StringRow {
    strings: &'static [StringSpec],
    /// Highlighted string, low string first. None while stopped.
    selected: Option<usize>,
}

impl StringRow {
    pub fn new(strings: &'static [StringSpec], selected: Option<usize>) -> Self {
        Self { strings, selected }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(ROW_HEIGHT)),
        )
        .into()
    }
}

impl<Message> canvas::Program<Message> for StringRow {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let palette = theme.palette();

        let count = self.strings.len();
        if count == 0 {
            return vec![frame.into_geometry()];
        }
        let cell_width = (bounds.width - CELL_GAP * (count - 1) as f32) / count as f32;

        for (i, string) in self.strings.iter().enumerate() {
            let x = i as f32 * (cell_width + CELL_GAP);
            let is_selected = self.selected == Some(i);

            let (background, text_color) = if is_selected {
                (palette.primary, Color::WHITE)
            } else {
                (
                    Color::from_rgb8(0x2D, 0x2D, 0x44),
                    Color::from_rgb8(0xA0, 0xA0, 0xB0),
                )
            };

            let cell =
                Path::rectangle(Point::new(x, 0.0), Size::new(cell_width, bounds.height));
            frame.fill(&cell, Fill::from(background));
            if is_selected {
                frame.stroke(
                    &cell,
                    Stroke::default().with_width(2.0).with_color(Color::WHITE),
                );
            }

            let center_x = x + cell_width / 2.0;
            frame.fill_text(Text {
                // Guitar numbering: the lowest string is the highest number.
                content: (count - i).to_string(),
                position: Point::new(center_x, bounds.height * 0.3),
                color: text_color,
                size: 12.0.into(),
                horizontal_alignment: Horizontal::Center,
                vertical_alignment: Vertical::Center,
                ..Text::default()
            });
            frame.fill_text(Text {
                content: string.note_name.to_string(),
                position: Point::new(center_x, bounds.height * 0.68),
                color: text_color,
                size: if is_selected { 18.0.into() } else { 15.0.into() },
                horizontal_alignment: Horizontal::Center,
                vertical_alignment: Vertical::Center,
                ..Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}
