//! Custom canvas widgets.

pub mod string_row;
