//! Producer rate measurement.

use tracing::{debug, warn};

/// EMA smoothing factor. The time constant is around 10^4 samples (~0.2 s at
/// 48 kHz): fast enough to track warm-up, slow enough to ignore per-frame
/// emulator jitter.
const EMA_ALPHA: f64 = 1e-4;

/// Outlier warnings stop after this many rejections.
const MAX_OUTLIER_WARNINGS: u64 = 5;

/// Accepted-observation count between progress logs.
const LOG_INTERVAL: u64 = 10_000;

/// Estimates the effective sample rate of the emulated chip.
///
/// Each produced frame carries the cycle cost the emulator paid for it; the
/// instantaneous rate is `sync_base / cycles_per_sample`. Individual
/// observations are noisy (DMA contention, display sync), so the estimator
/// keeps an exponentially-weighted moving average and rejects observations
/// outside `[0.5, 1.5] ×` the target rate entirely.
pub struct RateEstimator {
    target_rate: f64,
    sync_base: f64,
    current: f64,
    ema: f64,
    accepted: u64,
    rejected: u64,
}

impl RateEstimator {
    /// Creates an estimator for the given target rate and cycle base.
    #[must_use]
    pub fn new(target_rate: u32, sync_base: f64) -> Self {
        Self {
            target_rate: f64::from(target_rate),
            sync_base,
            current: 0.0,
            ema: 0.0,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Feeds one cycle-timing observation.
    ///
    /// Returns `true` if the observation was accepted into the average.
    pub fn observe(&mut self, cycles_per_sample: f64) -> bool {
        if !(cycles_per_sample > 0.0) {
            self.rejected += 1;
            return false;
        }

        let instant = self.sync_base / cycles_per_sample;
        let min_rate = self.target_rate * 0.5;
        let max_rate = self.target_rate * 1.5;
        if instant < min_rate || instant > max_rate {
            self.rejected += 1;
            if self.rejected <= MAX_OUTLIER_WARNINGS {
                warn!(
                    rate_hz = instant,
                    cycles = cycles_per_sample,
                    "rejected outlier rate observation"
                );
            }
            return false;
        }

        if self.accepted == 0 {
            self.current = instant;
            self.ema = instant;
            debug!(rate_hz = instant, "initial rate measurement");
        } else {
            self.ema = EMA_ALPHA * instant + (1.0 - EMA_ALPHA) * self.ema;
            self.current = self.ema;
        }

        self.accepted += 1;
        if self.accepted % LOG_INTERVAL == 0 {
            debug!(
                instant_hz = instant,
                ema_hz = self.ema,
                accepted = self.accepted,
                "rate measurement"
            );
        }
        true
    }

    /// Current smoothed rate estimate in Hz.
    ///
    /// Returns 0.0 until the first observation has been accepted.
    #[must_use]
    pub fn current_rate(&self) -> f64 {
        self.current
    }

    /// Number of observations accepted into the average.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Number of observations rejected as outliers or invalid.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
