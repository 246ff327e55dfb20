//! ecoroute-metrics — observability for routing and reconciliation.
//!
//! ```text
//! RoutingMetrics
//!   ├── record_forecast(mode, execution_kg) ← each successful forecast
//!   ├── record_failure()                    ← each total routing failure
//!   ├── record_reconcile(action)            ← each reconciliation
//!   └── record_reading(intensity)           ← each sensor read
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics
//! ```

pub mod collector;
pub mod prometheus;

pub use collector::RoutingMetrics;
pub use prometheus::render_prometheus;
