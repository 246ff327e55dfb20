//! In-process control plane.
//!
//! Holds a fixed list of targets and flips their state on start/stop.
//! Recent calls are recorded so callers can assert exactly what the
//! controller asked for. Failures can be injected per operation.

use std::collections::VecDeque;
use std::sync::Mutex;

use ecoroute_core::{ManagedTarget, TargetState};

use crate::control_plane::{BoxFuture, ControlPlane};
use crate::error::{InfraResult, InfrastructureError};

/// One call received by the in-memory control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    List,
    Start(String),
    Stop(String),
    Status(String),
}

/// Calls kept in the log. Older entries are dropped first.
pub const CALL_LOG_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Inner {
    targets: Vec<ManagedTarget>,
    calls: VecDeque<ControlCall>,
    fail_list: bool,
    fail_start: bool,
    fail_stop: bool,
}

impl Inner {
    fn record(&mut self, call: ControlCall) {
        if self.calls.len() == CALL_LOG_CAPACITY {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
    }
}

#[derive(Debug, Default)]
pub struct InMemoryControlPlane {
    inner: Mutex<Inner>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target whose id equals its name.
    pub fn with_target(self, name: &str, state: TargetState) -> Self {
        self.lock().targets.push(ManagedTarget {
            id: name.to_string(),
            name: name.to_string(),
            state,
        });
        self
    }

    pub fn fail_list(&self, fail: bool) {
        self.lock().fail_list = fail;
    }

    pub fn fail_start(&self, fail: bool) {
        self.lock().fail_start = fail;
    }

    pub fn fail_stop(&self, fail: bool) {
        self.lock().fail_stop = fail;
    }

    /// The most recent calls, oldest first.
    pub fn calls(&self) -> Vec<ControlCall> {
        self.lock().calls.iter().cloned().collect()
    }

    /// Only the state-changing calls.
    pub fn lifecycle_calls(&self) -> Vec<ControlCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, ControlCall::Start(_) | ControlCall::Stop(_)))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current state of the target with this name.
    pub fn state_of(&self, name: &str) -> TargetState {
        self.lock()
            .targets
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.state)
            .unwrap_or(TargetState::NotFound)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn transition(&self, id: &str, call: ControlCall, to: TargetState) -> InfraResult<()> {
        let mut inner = self.lock();
        let failing = match call {
            ControlCall::Start(_) => inner.fail_start,
            ControlCall::Stop(_) => inner.fail_stop,
            _ => false,
        };
        inner.record(call);
        if failing {
            return Err(InfrastructureError::Api {
                status: 500,
                message: format!("injected failure for {id}"),
            });
        }
        let target = inner
            .targets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| InfrastructureError::TargetNotFound(id.to_string()))?;
        target.state = to;
        Ok(())
    }
}

impl ControlPlane for InMemoryControlPlane {
    fn list_targets(&self) -> BoxFuture<'_, InfraResult<Vec<ManagedTarget>>> {
        let result = {
            let mut inner = self.lock();
            inner.record(ControlCall::List);
            if inner.fail_list {
                Err(InfrastructureError::Unavailable("injected list failure".to_string()))
            } else {
                Ok(inner.targets.clone())
            }
        };
        Box::pin(async move { result })
    }

    fn start<'a>(&'a self, id: &'a str) -> BoxFuture<'a, InfraResult<()>> {
        let result = self.transition(id, ControlCall::Start(id.to_string()), TargetState::Running);
        Box::pin(async move { result })
    }

    fn stop<'a>(&'a self, id: &'a str) -> BoxFuture<'a, InfraResult<()>> {
        let result = self.transition(id, ControlCall::Stop(id.to_string()), TargetState::Stopped);
        Box::pin(async move { result })
    }

    fn status<'a>(&'a self, id: &'a str) -> BoxFuture<'a, InfraResult<TargetState>> {
        let state = {
            let mut inner = self.lock();
            inner.record(ControlCall::Status(id.to_string()));
            inner
                .targets
                .iter()
                .find(|t| t.id == id)
                .map(|t| t.state)
                .unwrap_or(TargetState::NotFound)
        };
        Box::pin(async move { Ok(state) })
    }
}
