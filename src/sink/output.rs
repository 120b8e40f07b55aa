//! CPAL output stream driving a bridge consumer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use tracing::{debug, error};

use crate::error::BridgeError;
use crate::format::f32_to_i16;
use crate::pipeline::BridgeConsumer;

/// Sample rate of the default output device.
///
/// Build the bridge with this rate so no hidden device-side resampling
/// happens behind the bridge's back.
pub fn default_output_rate() -> Result<u32, BridgeError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| BridgeError::Backend("no default output device".to_string()))?;
    let config = device
        .default_output_config()
        .map_err(|e| BridgeError::Backend(e.to_string()))?;
    Ok(config.sample_rate().0)
}

/// Starts an output stream on the default device, fed from `consumer`.
///
/// Each device callback is serviced with one [`pull_samples`] call; short
/// reads surface as silence, so the device is never starved. The stream
/// plays until the returned [`cpal::Stream`] is dropped — keep it alive for
/// the duration of the session.
///
/// `sample_rate` must match the rate the bridge was configured with, and
/// `channels` its channel count.
///
/// [`pull_samples`]: BridgeConsumer::pull_samples
pub fn start_output_stream(
    mut consumer: BridgeConsumer,
    sample_rate: u32,
    channels: u16,
) -> Result<cpal::Stream, BridgeError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| BridgeError::Backend("no default output device".to_string()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| BridgeError::Backend(e.to_string()))?;

    let config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: BufferSize::Default,
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // pull_samples zero-fills any shortfall.
                    let _ = consumer.pull_samples(data);
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| BridgeError::Backend(e.to_string()))?,
        cpal::SampleFormat::I16 => {
            let mut scratch: Vec<f32> = Vec::new();
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        if scratch.len() < data.len() {
                            scratch.resize(data.len(), 0.0);
                        }
                        let len = data.len();
                        let _ = consumer.pull_samples(&mut scratch[..len]);
                        for (out, &sample) in data.iter_mut().zip(&scratch[..len]) {
                            *out = f32_to_i16(sample);
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
                .map_err(|e| BridgeError::Backend(e.to_string()))?
        }
        other => {
            return Err(BridgeError::Backend(format!(
                "unsupported sample format: {other:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| BridgeError::Backend(e.to_string()))?;
    debug!(sample_rate, channels, "output stream started");

    Ok(stream)
}
