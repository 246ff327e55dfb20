//! Orchestrator composing sensor, controller and router.

use std::sync::Arc;

use tracing::{error, info};

use ecoroute_core::config::Settings;
use ecoroute_core::{CarbonReading, CarbonStatus, ForecastMetadata, OrchestrationOutcome, ServiceKind};
use ecoroute_infra::{ControlPlane, InfrastructureController};
use ecoroute_metrics::RoutingMetrics;
use ecoroute_router::{ServiceClient, ServiceEndpoint, ServiceRouter};
use ecoroute_sensor::CarbonSensor;

/// Single decision-maker for one managed workload and two services.
///
/// Holds no per-request state: concurrent calls share only the sensor,
/// the control-plane handle and the metrics counters.
pub struct Orchestrator {
    sensor: Arc<dyn CarbonSensor>,
    controller: InfrastructureController,
    router: ServiceRouter,
    metrics: Arc<RoutingMetrics>,
}

impl Orchestrator {
    pub fn new(sensor: Arc<dyn CarbonSensor>, controller: InfrastructureController, router: ServiceRouter) -> Self {
        Self {
            sensor,
            controller,
            router,
            metrics: Arc::new(RoutingMetrics::new()),
        }
    }

    /// Wire an orchestrator from resolved settings.
    ///
    /// `control_plane` is `None` when infrastructure control is disabled
    /// or the control plane could not be reached at startup.
    pub fn from_settings(
        settings: &Settings,
        sensor: Arc<dyn CarbonSensor>,
        control_plane: Option<Arc<dyn ControlPlane>>,
        client: Arc<dyn ServiceClient>,
    ) -> Self {
        let controller = InfrastructureController::new(
            control_plane,
            settings.infrastructure.target_name.clone(),
            settings.infrastructure.warmup,
        );
        let router = ServiceRouter::new(
            client,
            ServiceEndpoint::from_settings(ServiceKind::Performance, &settings.performance),
            ServiceEndpoint::from_settings(ServiceKind::Eco, &settings.eco),
        );
        Self::new(sensor, controller, router)
    }

    /// Share an existing metrics registry.
    pub fn with_metrics(mut self, metrics: Arc<RoutingMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<RoutingMetrics> {
        &self.metrics
    }

    pub fn controller(&self) -> &InfrastructureController {
        &self.controller
    }

    /// Read the sensor and reconcile infrastructure against it.
    ///
    /// Cheap and meant to be polled; the reconciliation is intentional.
    pub async fn get_status(&self, mode: Option<CarbonStatus>) -> CarbonReading {
        let reading = self.read(mode);
        self.metrics.record_status_poll();
        self.reconcile(reading.status).await;
        reading
    }

    /// Serve one forecast. Never fails: total failure is an outcome.
    pub async fn get_forecast(&self, country_code: &str, mode: Option<CarbonStatus>) -> OrchestrationOutcome {
        // One read per call: reconciliation and routing see the same status.
        let reading = self.read(mode);
        info!(
            intensity = reading.intensity,
            status = %reading.status,
            %country_code,
            "carbon intensity read for forecast"
        );

        self.reconcile(reading.status).await;

        match self.router.route(reading.status, country_code).await {
            Ok(result) => {
                self.metrics.record_forecast(result.mode, result.execution_carbon_kg);
                info!(model = %result.selected_model_label, rows = result.frame.len(), "forecast served");
                let metadata = ForecastMetadata {
                    selected_model_label: result.selected_model_label.clone(),
                    execution_carbon_footprint_kg: result.execution_carbon_kg,
                    carbon_context: reading,
                };
                OrchestrationOutcome::Success { result, metadata }
            }
            Err(e) => {
                self.metrics.record_failure();
                error!(%country_code, error = %e, "forecast failed on every allowed service");
                OrchestrationOutcome::Failure { error: e.to_string() }
            }
        }
    }

    fn read(&self, mode: Option<CarbonStatus>) -> CarbonReading {
        let reading = self.sensor.read(mode);
        self.metrics.record_reading(reading.intensity);
        reading
    }

    async fn reconcile(&self, status: CarbonStatus) {
        let action = self.controller.reconcile(status).await;
        self.metrics.record_reconcile(action);
    }
}
