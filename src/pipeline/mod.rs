//! Lock-free pipeline internals.
//!
//! The pipeline is three stages glued by two SPSC rings:
//!
//! ```text
//! Emulator thread                                   Host audio thread
//!      │                                                   │
//! push_sample ──► [int16 ring] ──► resampler ──► [f32 ring] ──► pull_samples
//!      │              ▲                │              ▲
//!      └── cycle timing └── rate estimate + drift ────┘
//! ```
//!
//! Both rings live in [`ring_buffer`]; the first is private to the producer
//! thread (a scratch FIFO decoupling per-frame pushes from batch
//! resampling), the second is the actual cross-thread boundary.

mod bridge;
mod rate;
mod ring_buffer;

pub use bridge::{AudioBridge, BridgeConsumer, BridgeProducer};
pub use rate::RateEstimator;
pub use ring_buffer::{spsc_ring, RingConsumer, RingProducer, RingStats};
