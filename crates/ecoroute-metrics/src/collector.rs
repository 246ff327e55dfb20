//! Lock-free counters shared between request handlers and the poller.

use std::sync::atomic::{AtomicU64, Ordering};

use ecoroute_core::RoutingMode;
use ecoroute_infra::ReconcileAction;

#[derive(Debug, Default)]
pub struct RoutingMetrics {
    forecasts_performance: AtomicU64,
    forecasts_fallback: AtomicU64,
    forecasts_eco: AtomicU64,
    forecast_failures: AtomicU64,
    status_polls: AtomicU64,
    reconcile: [AtomicU64; ReconcileAction::ALL.len()],
    /// f64 bits of the most recent intensity.
    last_intensity: AtomicU64,
    /// Reported execution carbon, micrograms, summed.
    execution_carbon_ug: AtomicU64,
}

impl RoutingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_forecast(&self, mode: RoutingMode, execution_carbon_kg: f64) {
        self.forecast_counter(mode).fetch_add(1, Ordering::Relaxed);
        let ug = (execution_carbon_kg.max(0.0) * 1e9).round() as u64;
        self.execution_carbon_ug.fetch_add(ug, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.forecast_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_status_poll(&self) {
        self.status_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconcile(&self, action: ReconcileAction) {
        self.reconcile[reconcile_index(action)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reading(&self, intensity: f64) {
        self.last_intensity.store(intensity.to_bits(), Ordering::Relaxed);
    }

    pub fn forecasts(&self, mode: RoutingMode) -> u64 {
        self.forecast_counter(mode).load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.forecast_failures.load(Ordering::Relaxed)
    }

    pub fn status_polls(&self) -> u64 {
        self.status_polls.load(Ordering::Relaxed)
    }

    pub fn reconciles(&self, action: ReconcileAction) -> u64 {
        self.reconcile[reconcile_index(action)].load(Ordering::Relaxed)
    }

    pub fn last_intensity(&self) -> f64 {
        f64::from_bits(self.last_intensity.load(Ordering::Relaxed))
    }

    pub fn execution_carbon_kg(&self) -> f64 {
        self.execution_carbon_ug.load(Ordering::Relaxed) as f64 / 1e9
    }

    fn forecast_counter(&self, mode: RoutingMode) -> &AtomicU64 {
        match mode {
            RoutingMode::Performance => &self.forecasts_performance,
            RoutingMode::Fallback => &self.forecasts_fallback,
            RoutingMode::Eco => &self.forecasts_eco,
        }
    }
}

fn reconcile_index(action: ReconcileAction) -> usize {
    match action {
        ReconcileAction::Skipped => 0,
        ReconcileAction::TargetMissing => 1,
        ReconcileAction::NoChange => 2,
        ReconcileAction::Started => 3,
        ReconcileAction::Stopped => 4,
        ReconcileAction::Failed => 5,
    }
}
