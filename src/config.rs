//! Configuration for the audio bridge.

use crate::error::BridgeError;

/// Smallest input ring the bridge will allocate, in frames.
const MIN_INPUT_RING_FRAMES: u32 = 16;

/// Configuration for an [`AudioBridge`](crate::AudioBridge).
///
/// Use [`BridgeConfig::new()`] for sensible defaults, then adjust fields as
/// needed. Validation happens in [`AudioBridge::new()`]; an invalid
/// configuration fails construction with a [`BridgeError`] and leaves no
/// partial state.
///
/// [`AudioBridge::new()`]: crate::AudioBridge::new
///
/// # Example
///
/// ```
/// use bridge_audio::BridgeConfig;
///
/// let config = BridgeConfig {
///     output_ring_frames: 4096,
///     ..BridgeConfig::new(48_000, 1_000_000.0)
/// };
/// assert_eq!(config.target_sample_rate, 48_000);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Output (sink) sample rate in Hz. Must be positive.
    pub target_sample_rate: u32,

    /// Number of interleaved channels per frame. Must be at least 1;
    /// typically 2. [`push_sample`](crate::BridgeProducer::push_sample)
    /// requires stereo.
    pub channels: u16,

    /// Requested output ring capacity in frames, rounded up to the next
    /// power of two at construction. Sized for roughly 40 ms of audio by
    /// [`BridgeConfig::new()`].
    ///
    /// Larger values tolerate more scheduling jitter at the cost of latency.
    pub output_ring_frames: u32,

    /// Cycle-timing scale in cycles per second. The producer's instantaneous
    /// rate for an observation is `sync_base / cycles_per_sample`; the exact
    /// scale comes from the emulator's clocking and only the ratio matters
    /// here. Must be positive.
    pub sync_base: f64,
}

impl BridgeConfig {
    /// Creates a configuration for the given output rate and cycle base.
    ///
    /// Defaults: stereo, output ring sized for ~40 ms at the target rate.
    #[must_use]
    pub fn new(target_sample_rate: u32, sync_base: f64) -> Self {
        Self {
            target_sample_rate,
            channels: 2,
            output_ring_frames: target_sample_rate / 25,
            sync_base,
        }
    }

    /// Input ring capacity in frames: ~10 ms at the target rate, never
    /// smaller than 16 frames.
    pub(crate) fn input_ring_frames(&self) -> usize {
        (self.target_sample_rate / 100).max(MIN_INPUT_RING_FRAMES) as usize
    }

    /// Checks the configuration for validity.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.target_sample_rate == 0 {
            return Err(BridgeError::InvalidSampleRate);
        }
        if self.channels == 0 {
            return Err(BridgeError::InvalidChannels {
                channels: self.channels,
            });
        }
        if self.output_ring_frames == 0 {
            return Err(BridgeError::InvalidRingCapacity);
        }
        if !(self.sync_base > 0.0) {
            return Err(BridgeError::InvalidSyncBase {
                value: self.sync_base,
            });
        }
        Ok(())
    }
}
