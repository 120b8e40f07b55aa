//! Sink adapter: format conversion and delivery to the host device.
//!
//! The bridge's output is float frames pulled by the host audio thread. A
//! [`SinkDevice`] abstracts the handful of operations every pull-model
//! device API offers (query space, acquire a buffer, release it); the
//! [`SinkAdapter`] drives one pull event end to end: pull from the bridge,
//! convert to the device's integer width, copy, release.
//!
//! Two device implementations ship with the crate:
//!
//! - [`MockSinkDevice`]: An in-memory device for tests
//! - [`start_output_stream`]: A CPAL-backed stream that skips the adapter
//!   and feeds the host callback buffer directly

mod mock;
mod output;

pub use mock::MockSinkDevice;
pub use output::{default_output_rate, start_output_stream};

use tracing::trace;

use crate::error::{BridgeError, SinkError};
use crate::format::{f32_to_i16, f32_to_i32};
use crate::pipeline::BridgeConsumer;

/// A pull-model host audio device.
///
/// The adapter consumes exactly three capabilities, shaped after shared-mode
/// render APIs: ask how many frames the device can take, borrow that much of
/// its buffer, and hand the buffer back. The event that triggers a pull is
/// the caller's business — wire the device's ready signal to
/// [`SinkAdapter::on_pull`].
///
/// # Implementation Notes
///
/// - `acquire` returns the device buffer as raw bytes; the adapter writes
///   little-endian integers of the configured width into it
/// - A `release` must follow every successful `acquire` with the same count
/// - Errors are surfaced to the pull caller; the bridge is unaffected
pub trait SinkDevice {
    /// Frames the device can accept right now (buffer size minus padding).
    fn available_frames(&mut self) -> Result<u32, SinkError>;

    /// Borrows the device buffer for `frames` frames.
    fn acquire(&mut self, frames: u32) -> Result<&mut [u8], SinkError>;

    /// Returns the buffer to the device for playback.
    fn release(&mut self, frames: u32) -> Result<(), SinkError>;
}

/// Integer width delivered to the sink device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkSampleFormat {
    /// Signed 16-bit little-endian.
    Int16,
    /// Signed 32-bit little-endian.
    Int32,
}

impl SinkSampleFormat {
    /// Bytes per sample in this format.
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int32 => 4,
        }
    }
}

/// Statistics about a sink adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkStats {
    /// Pull events serviced (including device-full no-ops).
    pub pull_events: u64,
    /// Frames delivered to the device.
    pub frames_written: u64,
    /// Pull events where the bridge had nothing and silence was delivered.
    pub underruns: u64,
}

/// Drives one host device from a bridge's consumer half.
///
/// Owns a float scratch (2 × the device buffer) and a matching byte scratch
/// in the configured integer width; both are allocated once at construction
/// so pull events never allocate.
///
/// # Example
///
/// ```
/// use bridge_audio::{
///     AudioBridge, BridgeConfig, MockSinkDevice, SinkAdapter, SinkSampleFormat,
/// };
///
/// let (_producer, mut consumer) =
///     AudioBridge::new(BridgeConfig::new(48_000, 1_000_000.0)).unwrap().split();
/// let device = MockSinkDevice::new(512, 2, SinkSampleFormat::Int16);
/// let mut adapter = SinkAdapter::new(device, 2, SinkSampleFormat::Int16, 512).unwrap();
///
/// adapter.on_pull(&mut consumer).unwrap();
/// ```
pub struct SinkAdapter<D: SinkDevice> {
    device: D,
    format: SinkSampleFormat,
    channels: usize,
    float_scratch: Vec<f32>,
    byte_scratch: Vec<u8>,
    stats: SinkStats,
}

impl<D: SinkDevice> SinkAdapter<D> {
    /// Creates an adapter for `device` with the given frame layout.
    ///
    /// `sink_buffer_frames` is the device's buffer size; the scratch buffers
    /// are sized at twice that for headroom.
    pub fn new(
        device: D,
        channels: u16,
        format: SinkSampleFormat,
        sink_buffer_frames: u32,
    ) -> Result<Self, BridgeError> {
        if channels == 0 {
            return Err(BridgeError::InvalidChannels { channels });
        }
        if sink_buffer_frames == 0 {
            return Err(BridgeError::InvalidSinkBuffer);
        }

        let channels = usize::from(channels);
        let scratch_frames = 2 * sink_buffer_frames as usize;
        Ok(Self {
            device,
            format,
            channels,
            float_scratch: vec![0.0; scratch_frames * channels],
            byte_scratch: vec![0; scratch_frames * channels * format.bytes_per_sample()],
            stats: SinkStats::default(),
        })
    }

    /// Services one device pull event.
    ///
    /// Queries the device for space, pulls that much from the bridge,
    /// converts to the configured integer width, and delivers it. A full
    /// device is a successful no-op; an empty bridge delivers silence and
    /// counts an underrun. Device errors are returned to the caller.
    pub fn on_pull(&mut self, bridge: &mut BridgeConsumer) -> Result<(), SinkError> {
        self.stats.pull_events += 1;

        let mut available = self.device.available_frames()?;
        if available == 0 {
            // Device buffer full; nothing to do.
            return Ok(());
        }

        let scratch_frames = (self.float_scratch.len() / self.channels) as u32;
        available = available.min(scratch_frames);
        let frames = available as usize;

        let pulled_from_ring = bridge.pull_samples(&mut self.float_scratch[..frames * self.channels]);

        let bytes = frames * self.channels * self.format.bytes_per_sample();
        if pulled_from_ring == 0 {
            // Bridge had nothing: deliver silence rather than stale data.
            self.stats.underruns += 1;
            trace!(frames, "bridge empty on pull; delivering silence");
            let buffer = self.device.acquire(available)?;
            if buffer.len() < bytes {
                return Err(SinkError::ShortBuffer {
                    needed: bytes,
                    acquired: buffer.len(),
                });
            }
            buffer[..bytes].fill(0);
            self.device.release(available)?;
            return Ok(());
        }

        self.encode(frames);

        let buffer = self.device.acquire(available)?;
        if buffer.len() < bytes {
            return Err(SinkError::ShortBuffer {
                needed: bytes,
                acquired: buffer.len(),
            });
        }
        buffer[..bytes].copy_from_slice(&self.byte_scratch[..bytes]);
        self.device.release(available)?;

        self.stats.frames_written += frames as u64;
        Ok(())
    }

    /// Converts the first `frames` of float scratch into the byte scratch.
    fn encode(&mut self, frames: usize) {
        let samples = frames * self.channels;
        match self.format {
            SinkSampleFormat::Int16 => {
                for (i, &sample) in self.float_scratch[..samples].iter().enumerate() {
                    let value = f32_to_i16(sample);
                    self.byte_scratch[i * 2..i * 2 + 2].copy_from_slice(&value.to_le_bytes());
                }
            }
            SinkSampleFormat::Int32 => {
                for (i, &sample) in self.float_scratch[..samples].iter().enumerate() {
                    let value = f32_to_i32(sample);
                    self.byte_scratch[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
                }
            }
        }
    }

    /// Current adapter statistics.
    #[must_use]
    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// Consumes the adapter, returning the device.
    pub fn into_device(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::pipeline::AudioBridge;

    const SYNC_BASE: f64 = 1_000_000.0;

    fn warmed_bridge(value: i16) -> (crate::BridgeProducer, BridgeConsumer) {
        let (mut producer, consumer) = AudioBridge::new(BridgeConfig::new(48_000, SYNC_BASE))
            .unwrap()
            .split();
        let cycles = (SYNC_BASE / 48_000.0) as f32;
        for _ in 0..256 {
            producer.push_sample(value, value, cycles);
        }
        (producer, consumer)
    }

    #[test]
    fn test_new_rejects_bad_layout() {
        let device = MockSinkDevice::new(64, 2, SinkSampleFormat::Int16);
        assert!(SinkAdapter::new(device, 0, SinkSampleFormat::Int16, 64).is_err());
        let device = MockSinkDevice::new(64, 2, SinkSampleFormat::Int16);
        assert!(SinkAdapter::new(device, 2, SinkSampleFormat::Int16, 0).is_err());
    }

    #[test]
    fn test_on_pull_delivers_converted_frames() {
        let (_producer, mut consumer) = warmed_bridge(8192); // 0.25 in float
        let device = MockSinkDevice::new(64, 2, SinkSampleFormat::Int16);
        let mut adapter = SinkAdapter::new(device, 2, SinkSampleFormat::Int16, 64).unwrap();

        adapter.on_pull(&mut consumer).unwrap();

        let stats = adapter.stats();
        assert_eq!(stats.pull_events, 1);
        assert_eq!(stats.frames_written, 64);
        assert_eq!(stats.underruns, 0);

        let released = adapter.into_device().released_i16();
        assert_eq!(released.len(), 64 * 2);
        // 8192/32768 = 0.25 -> 0.25 * 32767 = 8191 (truncation toward zero)
        for &sample in &released {
            assert_eq!(sample, 8191);
        }
    }

    #[test]
    fn test_on_pull_empty_bridge_delivers_silence() {
        let (_producer, mut consumer) = AudioBridge::new(BridgeConfig::new(48_000, SYNC_BASE))
            .unwrap()
            .split();
        let device = MockSinkDevice::new(32, 2, SinkSampleFormat::Int16);
        let mut adapter = SinkAdapter::new(device, 2, SinkSampleFormat::Int16, 32).unwrap();

        adapter.on_pull(&mut consumer).unwrap();

        let stats = adapter.stats();
        assert_eq!(stats.underruns, 1);
        assert_eq!(stats.frames_written, 0);

        let released = adapter.into_device().released_bytes().to_vec();
        assert_eq!(released.len(), 32 * 2 * 2);
        assert!(released.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_on_pull_device_full_is_noop() {
        let (_producer, mut consumer) = warmed_bridge(100);
        let mut device = MockSinkDevice::new(32, 2, SinkSampleFormat::Int16);
        device.set_padding(32); // no space
        let mut adapter = SinkAdapter::new(device, 2, SinkSampleFormat::Int16, 32).unwrap();

        adapter.on_pull(&mut consumer).unwrap();

        let stats = adapter.stats();
        assert_eq!(stats.pull_events, 1);
        assert_eq!(stats.frames_written, 0);
        assert_eq!(stats.underruns, 0);
        assert!(adapter.into_device().released_bytes().is_empty());
    }

    #[test]
    fn test_available_clamped_to_scratch() {
        let (_producer, mut consumer) = warmed_bridge(100);
        // Device claims far more space than the adapter's scratch holds.
        let device = MockSinkDevice::new(4096, 2, SinkSampleFormat::Int16);
        let mut adapter = SinkAdapter::new(device, 2, SinkSampleFormat::Int16, 16).unwrap();

        adapter.on_pull(&mut consumer).unwrap();

        // Clamped to 2 x 16 frames of scratch.
        let released = adapter.into_device().released_bytes().to_vec();
        assert_eq!(released.len(), 32 * 2 * 2);
    }

    #[test]
    fn test_int32_scaling() {
        let (_producer, mut consumer) = warmed_bridge(-16384); // -0.5 in float
        let device = MockSinkDevice::new(16, 2, SinkSampleFormat::Int32);
        let mut adapter = SinkAdapter::new(device, 2, SinkSampleFormat::Int32, 16).unwrap();

        adapter.on_pull(&mut consumer).unwrap();

        let released = adapter.into_device().released_bytes().to_vec();
        assert_eq!(released.len(), 16 * 2 * 4);
        for chunk in released.chunks_exact(4) {
            let value = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let expected = (-0.5f64 * 2_147_483_647.0) as i32;
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn test_partial_ring_pull_pads_with_silence() {
        // Warm the bridge with fewer frames than the device wants.
        let (mut producer, mut consumer) = AudioBridge::new(BridgeConfig::new(48_000, SYNC_BASE))
            .unwrap()
            .split();
        let cycles = (SYNC_BASE / 48_000.0) as f32;
        for _ in 0..32 {
            producer.push_sample(8192, 8192, cycles);
        }
        let buffered = consumer.available_frames();
        assert!(buffered > 0 && buffered < 64);

        let device = MockSinkDevice::new(64, 2, SinkSampleFormat::Int16);
        let mut adapter = SinkAdapter::new(device, 2, SinkSampleFormat::Int16, 64).unwrap();
        adapter.on_pull(&mut consumer).unwrap();

        let released = adapter.into_device().released_i16();
        assert_eq!(released.len(), 64 * 2);
        // Real frames first, zero padding after.
        assert_eq!(released[0], 8191);
        assert_eq!(*released.last().unwrap(), 0);
    }
}
