//! # bridge-audio
//!
//! Real-time audio bridge between an emulated sound chip and a host output
//! device.
//!
//! An emulated chip produces stereo 16-bit frames at a drifting, non-standard
//! rate derived from emulation cycle timing (typically 44-50 kHz, varying with
//! emulation load). The host consumes frames at a fixed rate via a periodic
//! pull callback. `bridge-audio` couples the two clock domains without
//! glitches, dropouts, or unbounded latency build-up.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bridge_audio::{AudioBridge, BridgeConfig};
//!
//! let config = BridgeConfig::new(48_000, 1_000_000.0);
//! let (mut producer, consumer) = AudioBridge::new(config)?.split();
//!
//! // Emulator thread: one call per generated frame.
//! producer.push_sample(left, right, cycles_per_sample);
//!
//! // Host audio thread: keep the stream alive for the session's duration.
//! let stream = bridge_audio::start_output_stream(consumer, 48_000, 2)?;
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Producer thread**: The emulator pushes one frame per call into a small
//!   int16 ring, measures the chip's effective rate, and drains the ring
//!   through a linear resampler into the float output ring. It never blocks.
//! - **Output ring**: A lock-free SPSC queue that is the only state crossing
//!   between the two threads.
//! - **Sink thread**: The host audio callback pulls float frames; short reads
//!   are zero-filled so the device buffer is always serviced in full.
//!
//! A slow feedback loop biases the resample ratio by ±0.02% to hold the
//! output ring near 25% occupancy, absorbing residual clock drift between the
//! emulated chip and the host device.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod config;
mod error;
pub mod format;
mod pipeline;
pub mod sink;
mod stats;

pub use config::BridgeConfig;
pub use error::{BridgeError, SinkError};
pub use pipeline::{
    spsc_ring, AudioBridge, BridgeConsumer, BridgeProducer, RateEstimator, RingConsumer,
    RingProducer, RingStats,
};
pub use sink::{
    default_output_rate, start_output_stream, MockSinkDevice, SinkAdapter, SinkDevice,
    SinkSampleFormat, SinkStats,
};
pub use stats::BridgeStats;
