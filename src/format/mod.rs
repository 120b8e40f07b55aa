//! Audio format conversion utilities.
//!
//! This module provides the two format stages of the bridge:
//! - Sample rate conversion ([`StreamResampler`]), int16 in / float out
//! - Sample format conversion (f32 ↔ integer widths) for sink delivery

mod convert;
mod resample;

pub use convert::{f32_to_i16, f32_to_i32, i16_to_f32};
pub use resample::StreamResampler;
