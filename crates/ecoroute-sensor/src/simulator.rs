//! Virtual grid-intensity sensor.

use std::f64::consts::PI;
use std::sync::Mutex;

use chrono::{Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use ecoroute_core::config::MIN_THRESHOLD;
use ecoroute_core::{CarbonReading, CarbonStatus};

use crate::CarbonSensor;

/// Lowest intensity the simulator reports in the clean band.
const LOW_BAND_FLOOR: f64 = 40.0;
/// Width of the dirty band above the threshold.
const HIGH_BAND_WIDTH: f64 = 400.0;
/// Maximum random deviation from the daily curve.
const JITTER: f64 = 40.0;

/// Classify an intensity against the threshold. At or above is HIGH.
pub fn classify(intensity: f64, threshold: f64) -> CarbonStatus {
    if intensity >= threshold {
        CarbonStatus::High
    } else {
        CarbonStatus::Low
    }
}

/// Simulated grid: solar dip around midday, evening peak.
pub struct CarbonSimulator {
    threshold: f64,
    rng: Mutex<StdRng>,
}

impl CarbonSimulator {
    /// Thresholds below `MIN_THRESHOLD` are raised to it; configuration
    /// rejects such values before they get here.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.max(MIN_THRESHOLD),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic simulator for tests and reproducible demos.
    pub fn with_seed(threshold: f64, seed: u64) -> Self {
        Self {
            threshold: threshold.max(MIN_THRESHOLD),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Baseline intensity for an hour of the day (UTC).
    ///
    /// Oscillates around the threshold so both classifications occur
    /// within a day: lowest at 13:00, highest at 01:00.
    pub fn baseline(&self, hour: u32) -> f64 {
        let phase = 2.0 * PI * (f64::from(hour % 24) - 1.0) / 24.0;
        self.threshold + 0.6 * self.threshold * phase.cos()
    }

    fn sample(&self, force: Option<CarbonStatus>, hour: u32) -> f64 {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match force {
            Some(CarbonStatus::Low) => {
                let floor = if self.threshold > LOW_BAND_FLOOR { LOW_BAND_FLOOR } else { 0.0 };
                rng.gen_range(floor..self.threshold)
            }
            Some(CarbonStatus::High) => {
                rng.gen_range(self.threshold..=self.threshold + HIGH_BAND_WIDTH)
            }
            None => {
                let jitter = rng.gen_range(-JITTER..=JITTER);
                (self.baseline(hour) + jitter).max(0.0)
            }
        }
    }
}

impl CarbonSensor for CarbonSimulator {
    fn read(&self, force: Option<CarbonStatus>) -> CarbonReading {
        let intensity = self.sample(force, Utc::now().hour());
        let status = classify(intensity, self.threshold);
        debug!(intensity, %status, forced = force.is_some(), "carbon reading");
        CarbonReading::new(intensity, status)
    }
}
