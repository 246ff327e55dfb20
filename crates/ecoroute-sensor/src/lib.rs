//! ecoroute-sensor — where carbon readings come from.
//!
//! The router only consumes the [`CarbonSensor`] contract. The bundled
//! [`CarbonSimulator`] stands in for a live grid feed: it follows a
//! daily intensity curve with random jitter and can be forced into
//! either band for demos and tests.

pub mod simulator;

use ecoroute_core::{CarbonReading, CarbonStatus};

pub use simulator::{CarbonSimulator, classify};

/// Source of grid carbon readings.
///
/// `force` pins the classification of the produced reading; the
/// intensity is still drawn so that it agrees with that classification.
pub trait CarbonSensor: Send + Sync {
    fn read(&self, force: Option<CarbonStatus>) -> CarbonReading;
}
