//! The control-plane contract consumed by the controller.

use std::future::Future;
use std::pin::Pin;

use ecoroute_core::{ManagedTarget, TargetState};

use crate::error::InfraResult;

/// Boxed future alias for control-plane calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lists, starts, stops and inspects workloads.
///
/// Start and stop are expected to be idempotent on the control plane
/// side: concurrent reconciliations may issue them redundantly.
pub trait ControlPlane: Send + Sync {
    /// Every known target, running or not.
    fn list_targets(&self) -> BoxFuture<'_, InfraResult<Vec<ManagedTarget>>>;

    fn start<'a>(&'a self, id: &'a str) -> BoxFuture<'a, InfraResult<()>>;

    fn stop<'a>(&'a self, id: &'a str) -> BoxFuture<'a, InfraResult<()>>;

    /// Current state of one target; `NotFound` if it no longer exists.
    fn status<'a>(&'a self, id: &'a str) -> BoxFuture<'a, InfraResult<TargetState>>;
}
