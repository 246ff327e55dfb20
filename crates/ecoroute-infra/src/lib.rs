//! ecoroute-infra — keeps the heavy forecasting workload aligned with
//! grid carbon policy.
//!
//! # Architecture
//!
//! ```text
//! InfrastructureController
//!   ├── Option<Arc<dyn ControlPlane>>   (absent → degraded, reconcile is a no-op)
//!   │     ├── DockerControlPlane        (Docker Engine API over the unix socket)
//!   │     └── InMemoryControlPlane      (tests, --simulate-infra)
//!   └── plan(status, observed) → TargetAction
//! ```
//!
//! # Policy
//!
//! | status | observed    | action                         |
//! |--------|-------------|--------------------------------|
//! | HIGH   | running     | stop                           |
//! | HIGH   | not running | none                           |
//! | LOW    | not running | start, then wait out warm-up   |
//! | LOW    | running     | none                           |
//!
//! Reconciliation is best-effort: every control-plane failure is logged
//! and absorbed so that forecasting never stalls on infrastructure.

pub mod control_plane;
pub mod controller;
pub mod docker;
pub mod error;
pub mod memory;

pub use control_plane::{BoxFuture, ControlPlane};
pub use controller::{InfrastructureController, ReconcileAction, TargetAction, find_target, plan};
pub use docker::DockerControlPlane;
pub use error::{InfraResult, InfrastructureError};
pub use memory::{CALL_LOG_CAPACITY, ControlCall, InMemoryControlPlane};
