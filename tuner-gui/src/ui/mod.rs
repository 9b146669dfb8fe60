//! # UI Module
//!
//! Views of the Fretwise guitar tuner.

pub mod cent_meter;
pub mod main_display;
