//! Infrastructure controller: carbon status in, one start/stop out.
//!
//! Each reconciliation polls the control plane fresh, locates the managed
//! target by substring match, and applies the policy table. Nothing about
//! observed state is cached between calls.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use ecoroute_core::{CarbonStatus, ManagedTarget, TargetState};

use crate::control_plane::ControlPlane;
use crate::error::InfraResult;

/// What the policy wants done to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetAction {
    Start,
    Stop,
    None,
}

/// What a reconciliation actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileAction {
    /// No control plane available; degraded mode.
    Skipped,
    /// No listed target matched the managed identifier.
    TargetMissing,
    /// Observed state already matched policy.
    NoChange,
    Started,
    Stopped,
    /// A control-plane call failed; the error was logged.
    Failed,
}

impl ReconcileAction {
    pub const ALL: [ReconcileAction; 6] = [
        ReconcileAction::Skipped,
        ReconcileAction::TargetMissing,
        ReconcileAction::NoChange,
        ReconcileAction::Started,
        ReconcileAction::Stopped,
        ReconcileAction::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileAction::Skipped => "skipped",
            ReconcileAction::TargetMissing => "target_missing",
            ReconcileAction::NoChange => "no_change",
            ReconcileAction::Started => "started",
            ReconcileAction::Stopped => "stopped",
            ReconcileAction::Failed => "failed",
        }
    }
}

/// The policy table.
pub fn plan(status: CarbonStatus, observed: TargetState) -> TargetAction {
    match (status, observed.is_running()) {
        (CarbonStatus::High, true) => TargetAction::Stop,
        (CarbonStatus::Low, false) => TargetAction::Start,
        _ => TargetAction::None,
    }
}

/// First listed target whose name contains `identifier`.
///
/// Listing order decides between several matches.
pub fn find_target<'a>(targets: &'a [ManagedTarget], identifier: &str) -> Option<&'a ManagedTarget> {
    let mut matches = targets.iter().filter(|t| t.name.contains(identifier));
    let first = matches.next()?;
    let others: Vec<&str> = matches.map(|t| t.name.as_str()).collect();
    if !others.is_empty() {
        warn!(
            identifier,
            chosen = %first.name,
            ignored = ?others,
            "several targets match the managed identifier, using the first listed"
        );
    }
    Some(first)
}

/// Keeps one named target's run-state aligned with carbon policy.
pub struct InfrastructureController {
    control_plane: Option<Arc<dyn ControlPlane>>,
    target_name: String,
    warmup: Duration,
}

impl InfrastructureController {
    pub fn new(
        control_plane: Option<Arc<dyn ControlPlane>>,
        target_name: impl Into<String>,
        warmup: Duration,
    ) -> Self {
        Self {
            control_plane,
            target_name: target_name.into(),
            warmup,
        }
    }

    /// A controller that never touches infrastructure.
    pub fn degraded(target_name: impl Into<String>) -> Self {
        Self::new(None, target_name, Duration::ZERO)
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn is_degraded(&self) -> bool {
        self.control_plane.is_none()
    }

    /// Align the managed target with `status`. Never fails.
    ///
    /// After a start the caller is held for the warm-up period so that
    /// traffic routed next finds the service initialised.
    pub async fn reconcile(&self, status: CarbonStatus) -> ReconcileAction {
        let Some(control_plane) = self.control_plane.as_deref() else {
            debug!(%status, "no control plane, skipping reconciliation");
            return ReconcileAction::Skipped;
        };

        match self.try_reconcile(control_plane, status).await {
            Ok(action) => action,
            Err(e) => {
                error!(target_name = %self.target_name, %status, error = %e, "infrastructure error");
                ReconcileAction::Failed
            }
        }
    }

    async fn try_reconcile(
        &self,
        control_plane: &dyn ControlPlane,
        status: CarbonStatus,
    ) -> InfraResult<ReconcileAction> {
        let targets = control_plane.list_targets().await?;
        let Some(target) = find_target(&targets, &self.target_name) else {
            warn!(target_name = %self.target_name, "managed target not found, cannot scale");
            return Ok(ReconcileAction::TargetMissing);
        };

        match plan(status, target.state) {
            TargetAction::Stop => {
                info!(target = %target.name, %status, "grid dirty, stopping heavy workload to save energy");
                control_plane.stop(&target.id).await?;
                Ok(ReconcileAction::Stopped)
            }
            TargetAction::Start => {
                info!(target = %target.name, %status, "grid clean, starting heavy workload for performance");
                control_plane.start(&target.id).await?;

                if !self.warmup.is_zero() {
                    info!(warmup_ms = self.warmup.as_millis() as u64, "waiting for service to initialise");
                    tokio::time::sleep(self.warmup).await;
                }

                match control_plane.status(&target.id).await {
                    Ok(state) => debug!(target = %target.name, ?state, "state after warm-up"),
                    Err(e) => debug!(target = %target.name, error = %e, "state re-read after warm-up failed"),
                }
                Ok(ReconcileAction::Started)
            }
            TargetAction::None => {
                debug!(target = %target.name, state = ?target.state, %status, "target already aligned");
                Ok(ReconcileAction::NoChange)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ControlCall, InMemoryControlPlane};

    const TARGET: &str = "performance_service";

    fn controller_with(plane: Arc<InMemoryControlPlane>, warmup: Duration) -> InfrastructureController {
        InfrastructureController::new(Some(plane as Arc<dyn ControlPlane>), TARGET, warmup)
    }

    fn target(name: &str, state: TargetState) -> ManagedTarget {
        ManagedTarget {
            id: format!("id-{name}"),
            name: name.to_string(),
            state,
        }
    }

    #[test]
    fn policy_table() {
        assert_eq!(plan(CarbonStatus::High, TargetState::Running), TargetAction::Stop);
        assert_eq!(plan(CarbonStatus::High, TargetState::Stopped), TargetAction::None);
        assert_eq!(plan(CarbonStatus::High, TargetState::Unknown), TargetAction::None);
        assert_eq!(plan(CarbonStatus::Low, TargetState::Stopped), TargetAction::Start);
        assert_eq!(plan(CarbonStatus::Low, TargetState::Unknown), TargetAction::Start);
        assert_eq!(plan(CarbonStatus::Low, TargetState::Running), TargetAction::None);
    }

    #[test]
    fn find_target_uses_substring_match() {
        let targets = vec![
            target("energy-grid-eco_service-1", TargetState::Running),
            target("energy-grid-performance_service-1", TargetState::Stopped),
        ];
        let found = find_target(&targets, TARGET).unwrap();
        assert_eq!(found.name, "energy-grid-performance_service-1");
        assert!(find_target(&targets, "nope").is_none());
    }

    #[test]
    fn find_target_takes_first_of_several() {
        let targets = vec![
            target("a-performance_service-1", TargetState::Running),
            target("b-performance_service-2", TargetState::Stopped),
        ];
        assert_eq!(find_target(&targets, TARGET).unwrap().name, "a-performance_service-1");
    }

    #[tokio::test]
    async fn degraded_controller_skips() {
        let controller = InfrastructureController::degraded(TARGET);
        assert!(controller.is_degraded());
        assert_eq!(controller.reconcile(CarbonStatus::Low).await, ReconcileAction::Skipped);
    }

    #[tokio::test]
    async fn high_stops_running_target() {
        let plane = Arc::new(
            InMemoryControlPlane::new().with_target("stack-performance_service-1", TargetState::Running),
        );
        let controller = controller_with(plane.clone(), Duration::ZERO);

        assert_eq!(controller.reconcile(CarbonStatus::High).await, ReconcileAction::Stopped);
        assert_eq!(plane.state_of("stack-performance_service-1"), TargetState::Stopped);
    }

    #[tokio::test]
    async fn reconcile_high_twice_is_idempotent() {
        let plane = Arc::new(
            InMemoryControlPlane::new().with_target("stack-performance_service-1", TargetState::Stopped),
        );
        let controller = controller_with(plane.clone(), Duration::ZERO);

        assert_eq!(controller.reconcile(CarbonStatus::High).await, ReconcileAction::NoChange);
        plane.clear_calls();
        assert_eq!(controller.reconcile(CarbonStatus::High).await, ReconcileAction::NoChange);
        assert!(plane.lifecycle_calls().is_empty());
        assert_eq!(plane.calls(), vec![ControlCall::List]);
    }

    #[tokio::test]
    async fn low_with_running_target_is_noop() {
        let plane = Arc::new(
            InMemoryControlPlane::new().with_target("stack-performance_service-1", TargetState::Running),
        );
        let controller = controller_with(plane.clone(), Duration::from_secs(5));

        assert_eq!(controller.reconcile(CarbonStatus::Low).await, ReconcileAction::NoChange);
        assert!(plane.lifecycle_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn low_starts_target_and_waits_for_warmup() {
        let plane = Arc::new(
            InMemoryControlPlane::new().with_target("stack-performance_service-1", TargetState::Stopped),
        );
        let controller = controller_with(plane.clone(), Duration::from_secs(5));

        let began = tokio::time::Instant::now();
        assert_eq!(controller.reconcile(CarbonStatus::Low).await, ReconcileAction::Started);
        assert!(began.elapsed() >= Duration::from_secs(5));

        assert_eq!(plane.state_of("stack-performance_service-1"), TargetState::Running);
        assert_eq!(
            plane.calls(),
            vec![
                ControlCall::List,
                ControlCall::Start("stack-performance_service-1".to_string()),
                ControlCall::Status("stack-performance_service-1".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_path_does_not_wait() {
        let plane = Arc::new(
            InMemoryControlPlane::new().with_target("stack-performance_service-1", TargetState::Running),
        );
        let controller = controller_with(plane, Duration::from_secs(5));

        let began = tokio::time::Instant::now();
        controller.reconcile(CarbonStatus::High).await;
        assert!(began.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_target_is_reported_not_raised() {
        let plane = Arc::new(InMemoryControlPlane::new().with_target("unrelated", TargetState::Running));
        let controller = controller_with(plane.clone(), Duration::ZERO);

        assert_eq!(controller.reconcile(CarbonStatus::High).await, ReconcileAction::TargetMissing);
        assert!(plane.lifecycle_calls().is_empty());
    }

    #[tokio::test]
    async fn control_plane_failures_are_absorbed() {
        let plane = Arc::new(
            InMemoryControlPlane::new().with_target("stack-performance_service-1", TargetState::Running),
        );
        let controller = controller_with(plane.clone(), Duration::ZERO);

        plane.fail_stop(true);
        assert_eq!(controller.reconcile(CarbonStatus::High).await, ReconcileAction::Failed);

        plane.fail_list(true);
        assert_eq!(controller.reconcile(CarbonStatus::Low).await, ReconcileAction::Failed);
    }
}
