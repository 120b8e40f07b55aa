//! The bridge: input ring -> resampler -> output ring.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::format::StreamResampler;
use crate::pipeline::rate::RateEstimator;
use crate::pipeline::ring_buffer::{spsc_ring, RingConsumer, RingProducer, RingStats};
use crate::stats::{BridgeState, BridgeStats};

/// Don't resample until at least this many input frames are buffered.
const MIN_DRAIN_FRAMES: usize = 16;

/// Upper bound on input frames consumed per drain pass.
const MAX_DRAIN_FRAMES: usize = 128;

/// Extra output frames allocated beyond the rate-ratio estimate.
const OUTPUT_HEADROOM_FRAMES: usize = 32;

/// A resampler batch above this is treated as corrupt and dropped.
const MAX_RESAMPLED_FRAMES: usize = 10_000;

/// Rate changes larger than this rebuild the resampler instead of nudging it.
const RECONFIGURE_THRESHOLD_HZ: f64 = 100.0;

/// Output ring occupancy the drift controller steers toward.
const TARGET_FILL: f64 = 0.25;

/// Dead band around the fill target.
const FILL_BAND: f64 = 0.05;

/// Relative rate nudge applied outside the dead band (±0.02%).
const DRIFT_NUDGE: f64 = 0.0002;

/// Initial scratch sizes in frames; both grow on demand.
const INITIAL_INPUT_SCRATCH_FRAMES: usize = 128;
const INITIAL_OUTPUT_SCRATCH_FRAMES: usize = 2048;

/// Rate-limited warnings fire on the 1st occurrence and every Nth after.
const WARN_EVERY: u64 = 100;

/// Couples an emulated sample producer to a fixed-rate host consumer.
///
/// Construction allocates everything up front (two rings, scratch buffers,
/// the rate estimator); [`split()`](Self::split) then hands one half to each
/// thread. The resampler itself is created lazily on the first drained batch
/// because the producer's rate is unknown until cycle timing arrives.
///
/// Dropping both halves releases all buffers.
///
/// # Example
///
/// ```
/// use bridge_audio::{AudioBridge, BridgeConfig};
///
/// let config = BridgeConfig::new(48_000, 1_000_000.0);
/// let (mut producer, mut consumer) = AudioBridge::new(config).unwrap().split();
///
/// producer.push_sample(100, -100, 1_000_000.0 / 48_000.0);
///
/// let mut out = [0.0f32; 64];
/// consumer.pull_samples(&mut out); // zero-filled until the bridge warms up
/// ```
pub struct AudioBridge {
    producer: BridgeProducer,
    consumer: BridgeConsumer,
}

impl AudioBridge {
    /// Builds a bridge from the given configuration.
    ///
    /// Fails with a [`BridgeError`] on invalid configuration, leaving no
    /// partial state.
    pub fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;
        let channels = usize::from(config.channels);

        let (input_prod, input_cons) = spsc_ring::<i16>(config.input_ring_frames(), channels);
        let (output_prod, output_cons) =
            spsc_ring::<f32>(config.output_ring_frames as usize, channels);
        let state = Arc::new(BridgeState::new());

        debug!(
            target_hz = config.target_sample_rate,
            channels,
            input_ring_frames = input_prod.capacity(),
            output_ring_frames = output_prod.capacity(),
            "audio bridge initialised"
        );

        Ok(Self {
            producer: BridgeProducer {
                input_prod,
                input_cons,
                output_prod,
                resampler: None,
                estimator: RateEstimator::new(config.target_sample_rate, config.sync_base),
                input_scratch: vec![0; INITIAL_INPUT_SCRATCH_FRAMES * channels],
                output_scratch: vec![0.0; INITIAL_OUTPUT_SCRATCH_FRAMES * channels],
                target_rate: config.target_sample_rate,
                channels,
                configured_rate: 0.0,
                output_overruns: 0,
                state: Arc::clone(&state),
            },
            consumer: BridgeConsumer {
                output_cons,
                channels,
                underruns: 0,
                state,
            },
        })
    }

    /// Splits the bridge into its two thread handles.
    ///
    /// The producer half belongs on the emulator thread, the consumer half
    /// on the host audio thread. Both are `Send`; neither can be cloned, so
    /// each ring keeps exactly one producer and one consumer.
    #[must_use]
    pub fn split(self) -> (BridgeProducer, BridgeConsumer) {
        (self.producer, self.consumer)
    }
}

/// The emulator-thread half of the bridge.
///
/// Sole writer and reader of the input ring, sole owner of the resampler,
/// sole writer of the output ring. All methods are wait-free; the only
/// allocations after construction are rare scratch-buffer growth.
pub struct BridgeProducer {
    input_prod: RingProducer<i16>,
    input_cons: RingConsumer<i16>,
    output_prod: RingProducer<f32>,
    resampler: Option<StreamResampler>,
    estimator: RateEstimator,
    input_scratch: Vec<i16>,
    output_scratch: Vec<f32>,
    target_rate: u32,
    channels: usize,
    /// Rate the resampler was last built from; nudges don't move it.
    configured_rate: f64,
    output_overruns: u64,
    state: Arc<BridgeState>,
}

impl BridgeProducer {
    /// Feeds one stereo frame plus its cycle cost.
    ///
    /// Called once per frame the chip produces. The frame is queued on the
    /// input ring (dropping the oldest queued frame if the ring is full),
    /// the cycle timing updates the rate estimate, and any sufficiently
    /// large backlog is drained through the resampler into the output ring.
    ///
    /// This entry point is stereo; bridges with other channel counts use
    /// [`process_chunk`](Self::process_chunk).
    pub fn push_sample(&mut self, left: i16, right: i16, cycles_per_sample: f32) {
        debug_assert_eq!(self.channels, 2, "push_sample is a stereo entry point");
        self.state.push_calls.fetch_add(1, Ordering::Relaxed);

        self.enqueue_frame([left, right]);
        self.estimator.observe(f64::from(cycles_per_sample));
        self.state.publish_rate(self.estimator.current_rate());
        self.drain_input();
    }

    /// Feeds a whole interleaved chunk plus its per-frame cycle cost.
    ///
    /// The batched counterpart of [`push_sample`](Self::push_sample) for
    /// emulators that hand over a frame's worth of audio at a time. Bypasses
    /// the input ring and goes straight through the resampler, sharing the
    /// estimator, drift controller, and output ring with the push path.
    pub fn process_chunk(&mut self, samples: &[i16], cycles_per_sample: f64) {
        debug_assert_eq!(samples.len() % self.channels, 0, "partial frame chunk");
        let frames = samples.len() / self.channels;
        if frames == 0 {
            return;
        }
        self.state.chunk_calls.fetch_add(1, Ordering::Relaxed);

        self.estimator.observe(cycles_per_sample);
        self.state.publish_rate(self.estimator.current_rate());

        if self.input_scratch.len() < samples.len() {
            self.input_scratch.resize(samples.len() * 2, 0);
        }
        self.input_scratch[..samples.len()].copy_from_slice(samples);

        let base = self.configure_resampler(self.estimator.current_rate());
        self.resample_scratch(frames, base);
    }

    /// Current smoothed estimate of the producer rate in Hz.
    #[must_use]
    pub fn estimated_rate(&self) -> f64 {
        self.estimator.current_rate()
    }

    /// Output ring occupancy in `[0, 1]`.
    #[must_use]
    pub fn fill_fraction(&self) -> f32 {
        self.output_prod.fill_fraction()
    }

    /// Snapshot of bridge health counters.
    #[must_use]
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            push_calls: self.state.push_calls.load(Ordering::Relaxed),
            chunk_calls: self.state.chunk_calls.load(Ordering::Relaxed),
            resample_calls: self.state.resample_calls.load(Ordering::Relaxed),
            resampler_overflows: self.state.resampler_overflows.load(Ordering::Relaxed),
            estimated_rate: self.state.estimated_rate(),
            input: self.input_prod.stats(),
            output: self.output_prod.stats(),
            input_frames: self.input_cons.available_read(),
            output_frames: self.output_prod.available_read(),
            output_fill: self.output_prod.fill_fraction(),
        }
    }

    /// Queues one frame, keeping the newest on overflow.
    fn enqueue_frame(&mut self, frame: [i16; 2]) {
        if !self.input_prod.write(&frame) {
            // Full: discard the oldest queued frame and retry.
            let mut dropped = [0i16; 2];
            let _ = self.input_cons.read(&mut dropped);
            let _ = self.input_prod.write(&frame);
        }
    }

    /// Drains buffered input frames through the resampler.
    fn drain_input(&mut self) {
        let available = self.input_cons.available_read();
        if available < MIN_DRAIN_FRAMES {
            return;
        }

        let frames = available.min(MAX_DRAIN_FRAMES);
        let needed = frames * self.channels;
        if self.input_scratch.len() < needed {
            self.input_scratch.resize(needed * 2, 0);
        }

        let read = self.input_cons.read(&mut self.input_scratch[..needed]);
        if read == 0 {
            return;
        }

        let base = self.configure_resampler(self.estimator.current_rate());
        self.resample_scratch(read, base);
    }

    /// Creates or retunes the resampler for the measured rate.
    ///
    /// Returns the base input rate in effect (before the drift nudge).
    fn configure_resampler(&mut self, measured: f64) -> f64 {
        let drift = self.drift_adjustment();

        if self.resampler.is_none() {
            // First batch: the estimate may still be cold, so never start
            // below the target rate.
            let base = measured.max(f64::from(self.target_rate));
            match StreamResampler::new(base * drift, self.target_rate, self.channels) {
                Ok(rs) => {
                    debug!(
                        input_hz = base,
                        output_hz = self.target_rate,
                        "resampler configured"
                    );
                    self.resampler = Some(rs);
                    self.configured_rate = base;
                }
                Err(err) => {
                    error!(%err, "resampler initialisation failed");
                }
            }
            return base;
        }

        let base = if measured > 0.0 {
            measured
        } else {
            self.configured_rate
        };
        if (base - self.configured_rate).abs() > RECONFIGURE_THRESHOLD_HZ {
            // Large jump (PAL <-> NTSC style): rebuild instead of nudging so
            // the phase accumulator starts clean.
            match StreamResampler::new(base * drift, self.target_rate, self.channels) {
                Ok(rs) => {
                    debug!(
                        from_hz = self.configured_rate,
                        to_hz = base,
                        "resampler reconfigured"
                    );
                    self.resampler = Some(rs);
                    self.configured_rate = base;
                }
                Err(err) => {
                    error!(%err, "resampler reconfiguration failed");
                }
            }
        } else if let Some(rs) = self.resampler.as_mut() {
            rs.set_input_rate(base * drift);
        }
        base
    }

    /// Slow feedback keeping the output ring near its fill target.
    fn drift_adjustment(&self) -> f64 {
        let fill = f64::from(self.output_prod.fill_fraction());
        if fill < TARGET_FILL - FILL_BAND {
            // Ring running dry: resample as if the chip were slightly
            // slower, yielding more output frames per input frame.
            1.0 - DRIFT_NUDGE
        } else if fill > TARGET_FILL + FILL_BAND {
            1.0 + DRIFT_NUDGE
        } else {
            1.0
        }
    }

    /// Resamples the staged input frames and enqueues the result.
    fn resample_scratch(&mut self, frames: usize, base_rate: f64) {
        self.state.resample_calls.fetch_add(1, Ordering::Relaxed);

        let expected = (frames as f64 * f64::from(self.target_rate) / base_rate) as usize
            + OUTPUT_HEADROOM_FRAMES;
        let needed = expected * self.channels;
        if self.output_scratch.len() < needed {
            self.output_scratch.resize(needed * 2, 0.0);
        }

        let Some(rs) = self.resampler.as_mut() else {
            return;
        };
        let produced = rs.process(
            &self.input_scratch[..frames * self.channels],
            &mut self.output_scratch[..needed],
        );

        if produced > MAX_RESAMPLED_FRAMES {
            self.state.resampler_overflows.fetch_add(1, Ordering::Relaxed);
            error!(produced, "resampled frame count exceeds sanity bound; dropping batch");
            return;
        }
        if produced == 0 {
            return;
        }

        if !self
            .output_prod
            .write(&self.output_scratch[..produced * self.channels])
        {
            self.output_overruns += 1;
            if self.output_overruns % WARN_EVERY == 1 {
                warn!(
                    dropped = produced,
                    occurrences = self.output_overruns,
                    fill = self.output_prod.fill_fraction(),
                    "output ring full; dropping resampled frames"
                );
            }
        }
    }
}

/// The host-thread half of the bridge.
///
/// Sole reader of the output ring. Wait-free and allocation-free.
pub struct BridgeConsumer {
    output_cons: RingConsumer<f32>,
    channels: usize,
    underruns: u64,
    state: Arc<BridgeState>,
}

impl BridgeConsumer {
    /// Fills `dst` with interleaved output frames.
    ///
    /// `dst` is always written in full: frames the output ring cannot supply
    /// are zero-filled (an underrun, counted and logged at most every 100th
    /// occurrence). Returns the number of frames that actually came from the
    /// ring — 0 means the entire buffer is silence.
    ///
    /// `dst.len()` must be a multiple of the channel count.
    pub fn pull_samples(&mut self, dst: &mut [f32]) -> usize {
        debug_assert_eq!(dst.len() % self.channels, 0, "partial frame pull");
        let requested = dst.len() / self.channels;
        if requested == 0 {
            return 0;
        }

        let read = self.output_cons.read(dst);
        if read < requested {
            dst[read * self.channels..].fill(0.0);
            self.underruns += 1;
            if self.underruns % WARN_EVERY == 1 {
                warn!(
                    requested,
                    read,
                    occurrences = self.underruns,
                    "output ring underrun; zero-filling"
                );
            }
        }
        read
    }

    /// Output ring occupancy in `[0, 1]`.
    #[must_use]
    pub fn fill_fraction(&self) -> f32 {
        self.output_cons.fill_fraction()
    }

    /// Frames currently available without underrunning.
    #[must_use]
    pub fn available_frames(&self) -> usize {
        self.output_cons.available_read()
    }

    /// Output ring counters.
    #[must_use]
    pub fn output_stats(&self) -> RingStats {
        self.output_cons.stats()
    }

    /// Current smoothed estimate of the producer rate in Hz.
    #[must_use]
    pub fn estimated_rate(&self) -> f64 {
        self.state.estimated_rate()
    }

    /// Interleaved channels per frame.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYNC_BASE: f64 = 1_000_000.0;

    fn cycles_for(rate: f64) -> f32 {
        (SYNC_BASE / rate) as f32
    }

    fn make_bridge(target: u32) -> (BridgeProducer, BridgeConsumer) {
        AudioBridge::new(BridgeConfig::new(target, SYNC_BASE))
            .unwrap()
            .split()
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let mut config = BridgeConfig::new(48_000, SYNC_BASE);
        config.channels = 0;
        assert!(AudioBridge::new(config).is_err());
    }

    #[test]
    fn test_resampler_configured_lazily() {
        let (mut producer, _consumer) = make_bridge(48_000);
        assert!(producer.resampler.is_none());

        // The first drain happens once 16 frames are buffered.
        for _ in 0..16 {
            producer.push_sample(100, -100, cycles_for(48_000.0));
        }
        assert!(producer.resampler.is_some());
        assert!((producer.configured_rate - 48_000.0).abs() < 1.0);
    }

    #[test]
    fn test_push_then_pull_round_trip() {
        let (mut producer, mut consumer) = make_bridge(48_000);
        for _ in 0..64 {
            producer.push_sample(1000, 1000, cycles_for(48_000.0));
        }

        let mut out = [0.0f32; 16];
        let read = consumer.pull_samples(&mut out);
        assert_eq!(read, 8);
        let expected = 1000.0 / 32768.0;
        for &sample in &out {
            assert!((sample - expected).abs() < 1e-4, "{sample} != {expected}");
        }
    }

    #[test]
    fn test_pull_zero_fills_on_underrun() {
        let (_producer, mut consumer) = make_bridge(48_000);
        let mut out = [1.0f32; 32];
        assert_eq!(consumer.pull_samples(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(consumer.output_stats().underruns, 1);
    }

    #[test]
    fn test_input_overrun_drops_exactly_one_oldest_frame() {
        // Small target rate -> 16-frame input ring (15 usable).
        let (mut producer, _consumer) = make_bridge(1_000);
        let capacity = producer.input_prod.capacity();
        assert_eq!(capacity, 16);

        // Queue frames without draining, overflowing the ring.
        const TOTAL: i16 = 500;
        for n in 0..TOTAL {
            producer.enqueue_frame([n, -n]);
        }

        let stats = producer.input_prod.stats();
        let usable = (capacity - 1) as i16;
        assert_eq!(stats.overruns, (TOTAL - usable) as u64);
        assert_eq!(producer.input_cons.available_read(), usable as usize);

        // Only the newest frames survive, still in order.
        let mut out = vec![0i16; usable as usize * 2];
        assert_eq!(producer.input_cons.read(&mut out), usable as usize);
        for (i, frame) in out.chunks_exact(2).enumerate() {
            let n = TOTAL - usable + i as i16;
            assert_eq!(frame, [n, -n]);
        }
    }

    #[test]
    fn test_batched_chunk_produces_expected_frames() {
        let (mut producer, consumer) = make_bridge(48_000);

        // One 480-frame chunk at exactly the target rate.
        let chunk = vec![200i16; 480 * 2];
        producer.process_chunk(&chunk, f64::from(cycles_for(48_000.0)));

        let produced = consumer.available_frames();
        assert!(
            (produced as i64 - 480).unsigned_abs() <= 2,
            "produced {produced}"
        );

        let stats = producer.stats();
        assert_eq!(stats.chunk_calls, 1);
        assert_eq!(stats.resample_calls, 1);
    }

    #[test]
    fn test_stats_track_calls() {
        let (mut producer, _consumer) = make_bridge(48_000);
        for _ in 0..32 {
            producer.push_sample(0, 0, cycles_for(48_000.0));
        }
        let stats = producer.stats();
        assert_eq!(stats.push_calls, 32);
        assert!(stats.resample_calls >= 1);
        assert!((stats.estimated_rate - 48_000.0).abs() < 1.0);
    }

    #[test]
    fn test_reconfigure_on_large_rate_change() {
        let (mut producer, _consumer) = make_bridge(48_000);
        for _ in 0..16 {
            producer.push_sample(0, 0, cycles_for(48_000.0));
        }
        let first_rate = producer.configured_rate;

        // Force the estimate far away; the next drain must rebuild.
        producer.estimator = RateEstimator::new(48_000, SYNC_BASE);
        for _ in 0..32 {
            producer.push_sample(0, 0, cycles_for(44_100.0));
        }
        assert!((producer.configured_rate - 44_100.0).abs() < 1.0);
        assert!((first_rate - producer.configured_rate).abs() > RECONFIGURE_THRESHOLD_HZ);
    }

    #[test]
    fn test_drift_adjustment_bounds() {
        let (producer, _consumer) = make_bridge(48_000);
        // Empty ring: below the band, pull-faster nudge.
        assert_eq!(producer.drift_adjustment(), 1.0 - DRIFT_NUDGE);
    }
}
