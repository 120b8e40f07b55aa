//! Bridge health counters and stats snapshots.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::pipeline::RingStats;

/// Internal counters shared between the producer and consumer handles.
///
/// Every counter is written by exactly one side and read without further
/// synchronisation by the other; values may be momentarily stale but are
/// never torn.
pub(crate) struct BridgeState {
    /// `push_sample` invocations.
    pub push_calls: AtomicU64,
    /// `process_chunk` invocations.
    pub chunk_calls: AtomicU64,
    /// Resampler batches executed.
    pub resample_calls: AtomicU64,
    /// Resampler outputs rejected by the sanity bound.
    pub resampler_overflows: AtomicU64,
    /// Latest EMA rate estimate, stored as `f64` bits.
    pub estimated_rate_bits: AtomicU64,
}

impl BridgeState {
    pub fn new() -> Self {
        Self {
            push_calls: AtomicU64::new(0),
            chunk_calls: AtomicU64::new(0),
            resample_calls: AtomicU64::new(0),
            resampler_overflows: AtomicU64::new(0),
            estimated_rate_bits: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    pub fn publish_rate(&self, rate: f64) {
        self.estimated_rate_bits
            .store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn estimated_rate(&self) -> f64 {
        f64::from_bits(self.estimated_rate_bits.load(Ordering::Relaxed))
    }
}

/// A point-in-time snapshot of bridge health.
///
/// Returned by [`BridgeProducer::stats()`](crate::BridgeProducer::stats).
/// All values are for instrumentation only; counters from the two rings are
/// sampled independently and are not required to be mutually consistent.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeStats {
    /// Total `push_sample` calls.
    pub push_calls: u64,
    /// Total `process_chunk` calls.
    pub chunk_calls: u64,
    /// Total resampler batches executed.
    pub resample_calls: u64,
    /// Resampler outputs rejected by the sanity bound.
    pub resampler_overflows: u64,
    /// Current EMA estimate of the producer rate in Hz (0.0 before the
    /// first accepted observation).
    pub estimated_rate: f64,
    /// Input ring counters.
    pub input: RingStats,
    /// Output ring counters.
    pub output: RingStats,
    /// Frames currently buffered in the input ring.
    pub input_frames: usize,
    /// Frames currently buffered in the output ring.
    pub output_frames: usize,
    /// Output ring occupancy in `[0, 1]`.
    pub output_fill: f32,
}
