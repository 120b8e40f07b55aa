//! Error types for bridge-audio.
//!
//! Errors are split into two categories:
//! - **Construction errors** ([`BridgeError`]): Invalid configuration or a
//!   failed audio backend; prevent a bridge or stream from being created.
//! - **Device errors** ([`SinkError`]): Returned by [`SinkDevice`] operations
//!   during a pull event; surfaced to the caller while the bridge itself is
//!   unaffected.
//!
//! Runtime losses — ring overruns, pull underruns, rejected rate
//! observations — are deliberately *not* errors. They are counted in
//! [`BridgeStats`](crate::BridgeStats) and reported through rate-limited
//! logging so the audio hot paths never branch on a `Result`.
//!
//! [`SinkDevice`]: crate::SinkDevice

/// Fatal errors that prevent a bridge or output stream from being created.
///
/// These are returned from [`AudioBridge::new()`] and the sink constructors
/// and indicate the component cannot be built; no partial state is left
/// behind. Runtime conditions (buffer pressure, rate outliers) are handled
/// via stats and logging instead.
///
/// [`AudioBridge::new()`]: crate::AudioBridge::new
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The target sample rate must be positive.
    #[error("target sample rate must be positive")]
    InvalidSampleRate,

    /// The channel count must be at least 1.
    #[error("channel count must be at least 1 (got {channels})")]
    InvalidChannels {
        /// The rejected channel count.
        channels: u16,
    },

    /// The output ring capacity must be non-zero.
    #[error("output ring capacity must be non-zero frames")]
    InvalidRingCapacity,

    /// The cycle-timing base must be positive.
    #[error("sync base must be positive (got {value})")]
    InvalidSyncBase {
        /// The rejected cycles-per-second value.
        value: f64,
    },

    /// Resampler rates must both be positive.
    #[error("resampler rates must be positive ({input} Hz -> {output} Hz)")]
    InvalidResampleRate {
        /// The rejected input rate.
        input: f64,
        /// The rejected output rate.
        output: u32,
    },

    /// The sink device buffer must hold at least one frame.
    #[error("sink buffer must be non-zero frames")]
    InvalidSinkBuffer,

    /// An error from the underlying audio library (CPAL).
    #[error("audio backend error: {0}")]
    Backend(String),
}

/// Errors returned by [`SinkDevice`](crate::SinkDevice) operations.
///
/// A failed pull event leaves the bridge untouched; the sink thread may
/// retry on the next device callback.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The device reported an error.
    #[error("device error: {reason}")]
    Device {
        /// Description of what went wrong.
        reason: String,
    },

    /// The device handed back a buffer smaller than the frames it promised.
    #[error("device buffer too small: needed {needed} bytes, acquired {acquired}")]
    ShortBuffer {
        /// Bytes required for the requested frames.
        needed: usize,
        /// Bytes the device actually provided.
        acquired: usize,
    },
}

impl SinkError {
    /// Creates a device error with the given reason.
    pub fn device(reason: impl Into<String>) -> Self {
        Self::Device {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_display() {
        let err = BridgeError::InvalidChannels { channels: 0 };
        assert_eq!(err.to_string(), "channel count must be at least 1 (got 0)");
    }

    #[test]
    fn test_bridge_error_backend() {
        let err = BridgeError::Backend("no device".to_string());
        assert_eq!(err.to_string(), "audio backend error: no device");
    }

    #[test]
    fn test_sink_error_device() {
        let err = SinkError::device("buffer query failed");
        assert_eq!(err.to_string(), "device error: buffer query failed");
    }

    #[test]
    fn test_sink_error_short_buffer() {
        let err = SinkError::ShortBuffer {
            needed: 1024,
            acquired: 512,
        };
        assert!(err.to_string().contains("1024"));
        assert!(err.to_string().contains("512"));
    }
}
