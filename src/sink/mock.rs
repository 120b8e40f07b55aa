//! Mock sink device for testing.

use crate::error::SinkError;
use crate::sink::{SinkDevice, SinkSampleFormat};

/// An in-memory [`SinkDevice`] that records everything released to it.
///
/// Useful for testing a [`SinkAdapter`](crate::SinkAdapter) or any code
/// driving pull events without real audio hardware. The device reports
/// `buffer_frames - padding` available frames; adjust the padding with
/// [`set_padding`](Self::set_padding) to simulate a filling device buffer.
///
/// # Example
///
/// ```
/// use bridge_audio::{MockSinkDevice, SinkDevice, SinkSampleFormat};
///
/// let mut device = MockSinkDevice::new(256, 2, SinkSampleFormat::Int16);
/// assert_eq!(device.available_frames().unwrap(), 256);
///
/// device.set_padding(200);
/// assert_eq!(device.available_frames().unwrap(), 56);
/// ```
pub struct MockSinkDevice {
    buffer_frames: u32,
    padding: u32,
    bytes_per_frame: usize,
    staging: Vec<u8>,
    released: Vec<u8>,
    acquired: Option<u32>,
}

impl MockSinkDevice {
    /// Creates a mock device with the given buffer size and frame layout.
    #[must_use]
    pub fn new(buffer_frames: u32, channels: u16, format: SinkSampleFormat) -> Self {
        Self {
            buffer_frames,
            padding: 0,
            bytes_per_frame: usize::from(channels) * format.bytes_per_sample(),
            staging: Vec::new(),
            released: Vec::new(),
            acquired: None,
        }
    }

    /// Sets the simulated device padding (frames already queued).
    pub fn set_padding(&mut self, frames: u32) {
        self.padding = frames.min(self.buffer_frames);
    }

    /// All bytes released to the device so far, in order.
    #[must_use]
    pub fn released_bytes(&self) -> &[u8] {
        &self.released
    }

    /// Released bytes decoded as little-endian i16 samples.
    #[must_use]
    pub fn released_i16(&self) -> Vec<i16> {
        self.released
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

impl SinkDevice for MockSinkDevice {
    fn available_frames(&mut self) -> Result<u32, SinkError> {
        Ok(self.buffer_frames - self.padding)
    }

    fn acquire(&mut self, frames: u32) -> Result<&mut [u8], SinkError> {
        if self.acquired.is_some() {
            return Err(SinkError::device("acquire while a buffer is outstanding"));
        }
        if frames > self.buffer_frames - self.padding {
            return Err(SinkError::device("acquire beyond available frames"));
        }
        self.staging.clear();
        self.staging.resize(frames as usize * self.bytes_per_frame, 0);
        self.acquired = Some(frames);
        Ok(&mut self.staging)
    }

    fn release(&mut self, frames: u32) -> Result<(), SinkError> {
        match self.acquired.take() {
            Some(acquired) if acquired == frames => {
                self.released
                    .extend_from_slice(&self.staging[..frames as usize * self.bytes_per_frame]);
                Ok(())
            }
            Some(_) => Err(SinkError::device("release count mismatch")),
            None => Err(SinkError::device("release without acquire")),
        }
    }
}
