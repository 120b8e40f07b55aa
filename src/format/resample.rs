//! Sample rate conversion.
//!
//! This module provides streaming resampling using linear interpolation.
//! The quality is deliberately modest; the point is a stateful converter
//! whose input rate can be retuned between batches as the producer's clock
//! drifts.

use crate::error::BridgeError;

/// Streaming linear resampler for interleaved int16 frames.
///
/// Converts chip-rate int16 input into host-rate float output, carrying the
/// fractional read position and the previous chunk's final frame across
/// calls so chunk boundaries interpolate seamlessly. The input rate may be
/// retuned at any time between [`process`](Self::process) calls; the output
/// rate and channel count are fixed at construction.
///
/// Output is linear PCM centred at 0 with nominal range [-1, 1]. The int16
/// divisor is 32 768 (not 32 767) so -32 768 maps to exactly -1.0. No
/// saturation is applied; interpolation between in-range samples cannot
/// meaningfully exceed the range, and downstream conversion clamps.
#[derive(Debug, Clone)]
pub struct StreamResampler {
    input_rate: f64,
    output_rate: u32,
    channels: usize,
    /// Fractional read head relative to the current input chunk. May rest
    /// in [-1.0, 0.0) between chunks, where index -1 addresses `last_frame`.
    position: f64,
    /// Final frame of the previous chunk, for cross-chunk interpolation.
    last_frame: Vec<i16>,
}

impl StreamResampler {
    /// Creates a resampler converting `input_rate` Hz to `output_rate` Hz.
    pub fn new(input_rate: f64, output_rate: u32, channels: usize) -> Result<Self, BridgeError> {
        if !(input_rate > 0.0) || output_rate == 0 {
            return Err(BridgeError::InvalidResampleRate {
                input: input_rate,
                output: output_rate,
            });
        }
        if channels == 0 {
            return Err(BridgeError::InvalidChannels { channels: 0 });
        }

        Ok(Self {
            input_rate,
            output_rate,
            channels,
            position: 0.0,
            last_frame: vec![0; channels],
        })
    }

    /// Current input rate in Hz.
    #[must_use]
    pub fn input_rate(&self) -> f64 {
        self.input_rate
    }

    /// Retunes the input rate.
    ///
    /// Takes effect on the next [`process`](Self::process) call; the read
    /// position is preserved so retuning does not glitch. Non-positive
    /// rates are ignored.
    pub fn set_input_rate(&mut self, rate: f64) {
        if rate > 0.0 {
            self.input_rate = rate;
        }
    }

    /// Resamples one chunk of interleaved int16 frames into `output`.
    ///
    /// Consumes the whole chunk and produces as many output frames as the
    /// rate ratio and `output`'s capacity allow, returning the frame count.
    /// Slice lengths must be multiples of the channel count.
    pub fn process(&mut self, input: &[i16], output: &mut [f32]) -> usize {
        let channels = self.channels;
        debug_assert_eq!(input.len() % channels, 0, "partial input frame");
        debug_assert_eq!(output.len() % channels, 0, "partial output frame");

        let input_frames = input.len() / channels;
        let capacity = output.len() / channels;
        if input_frames == 0 || capacity == 0 {
            return 0;
        }

        let ratio = self.input_rate / f64::from(self.output_rate);
        let last_index = (input_frames - 1) as f64;
        let mut produced = 0;

        while produced < capacity && self.position < last_index {
            let index = self.position.floor() as isize;
            let frac = self.position - index as f64;
            let out_base = produced * channels;

            for ch in 0..channels {
                // Index -1 is the previous chunk's final frame.
                let s0 = if index < 0 {
                    self.last_frame[ch]
                } else {
                    input[index as usize * channels + ch]
                };
                let s1 = input[(index + 1) as usize * channels + ch];
                let interpolated = f64::from(s0) + (f64::from(s1) - f64::from(s0)) * frac;
                output[out_base + ch] = (interpolated / 32768.0) as f32;
            }

            produced += 1;
            self.position += ratio;
        }

        // Retain the newest frame and rebase the position onto the next
        // chunk; -1 addresses the frame saved here.
        let last = (input_frames - 1) * channels;
        self.last_frame.copy_from_slice(&input[last..last + channels]);
        self.position -= input_frames as f64;
        if self.position < -1.0 {
            self.position = -1.0;
        }

        produced
    }
}
