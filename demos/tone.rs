//! Plays a synthesized chip tone through the default output device.
//!
//! A background thread stands in for the emulated chip, pushing stereo
//! frames at a deliberately off-target rate with a slow wobble, which
//! exercises the rate estimator and the drift controller against a real
//! host device.
//!
//! Run with: cargo run --example tone

use std::time::{Duration, Instant};

use bridge_audio::{default_output_rate, start_output_stream, AudioBridge, BridgeConfig};

/// Arbitrary cycle scale; an emulator would pass its master clock here.
const SYNC_BASE: f64 = 1_000_000.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    let target_rate = default_output_rate()?;
    println!("Playing a 220 Hz tone for 5 seconds at {target_rate} Hz...");

    let config = BridgeConfig::new(target_rate, SYNC_BASE);
    let (mut producer, consumer) = AudioBridge::new(config)?.split();

    // Keep the stream alive for the duration; dropping it stops playback.
    let _stream = start_output_stream(consumer, target_rate, 2)?;

    // The "chip": a 220 Hz square wave at a drifting ~44.3 kHz, paced in
    // roughly millisecond bursts like an emulator's scanline loop.
    let chip = std::thread::spawn(move || {
        let nominal_rate = 44_300.0f64;
        let mut phase = 0.0f64;
        let mut carry = 0.0f64;
        let start = Instant::now();

        while start.elapsed() < Duration::from_secs(5) {
            let t = start.elapsed().as_secs_f64();
            // +/-0.2% wobble, the kind of drift emulation load produces.
            let rate = nominal_rate * (1.0 + 0.002 * (t * 3.0).sin());
            let cycles_per_sample = (SYNC_BASE / rate) as f32;

            carry += rate / 1000.0;
            let frames = carry as usize;
            carry -= frames as f64;

            for _ in 0..frames {
                phase += 220.0 / rate;
                if phase >= 1.0 {
                    phase -= 1.0;
                }
                let sample = if phase < 0.5 { 6_000 } else { -6_000 };
                producer.push_sample(sample, sample, cycles_per_sample);
            }

            std::thread::sleep(Duration::from_millis(1));
        }

        producer.stats()
    });

    let stats = chip.join().expect("chip thread panicked");
    println!("Done. Stats: {stats:#?}");

    Ok(())
}
