//! ecoroute-orchestrator — the facade callers talk to.
//!
//! # Request flow
//!
//! ```text
//! get_forecast(country, mode?)
//!   ├── CarbonSensor::read(mode)            (exactly once)
//!   ├── InfrastructureController::reconcile (same status)
//!   └── ServiceRouter::route                (same status)
//!         └── OrchestrationOutcome { result + metadata | error }
//!
//! get_status(mode?)
//!   ├── CarbonSensor::read(mode)
//!   └── InfrastructureController::reconcile (side effect of polling)
//! ```
//!
//! `run_status_poller` drives `get_status` on a fixed interval so the
//! managed workload follows the grid even when nobody asks for forecasts.

pub mod orchestrator;
pub mod poller;

pub use orchestrator::Orchestrator;
pub use poller::run_status_poller;
