//! End-to-end scenarios through the orchestrator facade.
//!
//! The sensor, control plane and prediction services are all in-process
//! doubles; everything between them is the real code.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use ecoroute_core::{CarbonReading, CarbonStatus, OrchestrationOutcome, RoutingMode, ServiceKind, TargetState};
use ecoroute_infra::{CALL_LOG_CAPACITY, ControlCall, ControlPlane, InMemoryControlPlane, InfrastructureController, ReconcileAction};
use ecoroute_orchestrator::Orchestrator;
use ecoroute_router::{BoxFuture, ServiceClient, ServiceEndpoint, ServiceError, ServiceRouter};
use ecoroute_sensor::CarbonSensor;

const TARGET: &str = "energy-grid-performance_service-1";
const PERF_URL: &str = "http://performance:8001/predict/";
const ECO_URL: &str = "http://eco:8002/predict/";

/// Returns queued readings in order and counts reads.
struct SequenceSensor {
    readings: Mutex<VecDeque<(f64, CarbonStatus)>>,
    reads: AtomicUsize,
}

impl SequenceSensor {
    fn new(readings: &[(f64, CarbonStatus)]) -> Self {
        Self {
            readings: Mutex::new(readings.iter().copied().collect()),
            reads: AtomicUsize::new(0),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Alternates LOW and HIGH forever.
struct FlappingSensor {
    reads: AtomicUsize,
}

impl CarbonSensor for FlappingSensor {
    fn read(&self, _force: Option<CarbonStatus>) -> CarbonReading {
        if self.reads.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            CarbonReading::new(100.0, CarbonStatus::Low)
        } else {
            CarbonReading::new(500.0, CarbonStatus::High)
        }
    }
}

impl CarbonSensor for SequenceSensor {
    fn read(&self, _force: Option<CarbonStatus>) -> CarbonReading {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let (intensity, status) = self
            .readings
            .lock()
            .unwrap()
            .pop_front()
            .expect("sensor read more often than scripted");
        CarbonReading::new(intensity, status)
    }
}

#[derive(Default)]
struct FakeServices {
    responses: HashMap<String, Result<Value, ServiceError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeServices {
    fn respond(mut self, url: &str, response: Result<Value, ServiceError>) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn touched_performance(&self) -> bool {
        self.calls().iter().any(|u| u.starts_with(PERF_URL))
    }
}

impl ServiceClient for FakeServices {
    fn get_json<'a>(&'a self, url: &'a str, _timeout: Duration) -> BoxFuture<'a, Result<Value, ServiceError>> {
        self.calls.lock().unwrap().push(url.to_string());
        let response = self
            .responses
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(ServiceError::unreachable(url, "connection refused")));
        Box::pin(async move { response })
    }
}

fn build(
    sensor: Arc<SequenceSensor>,
    plane: Arc<InMemoryControlPlane>,
    services: Arc<FakeServices>,
) -> Orchestrator {
    let controller = InfrastructureController::new(
        Some(plane as Arc<dyn ControlPlane>),
        "performance_service",
        Duration::from_secs(5),
    );
    let router = ServiceRouter::new(
        services,
        ServiceEndpoint::new(ServiceKind::Performance, PERF_URL, Duration::from_secs(15), "XGBoost"),
        ServiceEndpoint::new(ServiceKind::Eco, ECO_URL, Duration::from_secs(10), "Holt-Winters"),
    );
    Orchestrator::new(sensor, controller, router)
}

#[tokio::test(start_paused = true)]
async fn clean_grid_success() {
    let sensor = Arc::new(SequenceSensor::new(&[(50.0, CarbonStatus::Low)]));
    let plane = Arc::new(InMemoryControlPlane::new().with_target(TARGET, TargetState::Stopped));
    let services = Arc::new(FakeServices::default().respond(
        "http://performance:8001/predict/DE",
        Ok(json!({
            "data": [{"datetime_utc": "2024-01-01T00:00:00Z", "value": 10}],
            "execution_carbon_kg": 0.02
        })),
    ));

    let orch = build(sensor.clone(), plane.clone(), services.clone());
    let outcome = orch.get_forecast("DE", None).await;

    let OrchestrationOutcome::Success { result, metadata } = outcome else {
        panic!("expected a successful clean-grid forecast");
    };
    assert_eq!(result.frame.len(), 1);
    assert!(result.frame.is_time_indexed());
    assert_eq!(metadata.execution_carbon_footprint_kg, 0.02);
    assert!(metadata.selected_model_label.contains("Performance Mode"));
    assert_eq!(metadata.carbon_context.intensity, 50.0);
    assert_eq!(metadata.carbon_context.status, CarbonStatus::Low);
    assert_eq!(plane.state_of(TARGET), TargetState::Running);
    assert_eq!(orch.metrics().forecasts(RoutingMode::Performance), 1);
    assert_eq!(orch.metrics().reconciles(ReconcileAction::Started), 1);
}

#[tokio::test]
async fn dirty_grid_uses_eco_and_stops_heavy_workload() {
    let sensor = Arc::new(SequenceSensor::new(&[(600.0, CarbonStatus::High)]));
    let plane = Arc::new(InMemoryControlPlane::new().with_target(TARGET, TargetState::Running));
    let services = Arc::new(
        FakeServices::default().respond("http://eco:8002/predict/DE", Ok(json!([{"value": 5}]))),
    );

    let orch = build(sensor, plane.clone(), services.clone());
    let outcome = orch.get_forecast("DE", None).await;

    let metadata = outcome.metadata().expect("dirty grid forecast should succeed");
    assert_eq!(outcome.result().unwrap().frame.len(), 1);
    assert_eq!(metadata.execution_carbon_footprint_kg, 0.0);
    assert!(metadata.selected_model_label.contains("Eco Mode"));
    assert_eq!(plane.state_of(TARGET), TargetState::Stopped);
    assert!(!services.touched_performance());
}

#[tokio::test(start_paused = true)]
async fn total_outage_on_low_reports_both_causes() {
    let sensor = Arc::new(SequenceSensor::new(&[(80.0, CarbonStatus::Low)]));
    let plane = Arc::new(InMemoryControlPlane::new().with_target(TARGET, TargetState::Running));
    let services = Arc::new(
        FakeServices::default()
            .respond(
                "http://performance:8001/predict/DE",
                Err(ServiceError::unreachable("http://performance:8001/predict/DE", "xgb connection refused")),
            )
            .respond(
                "http://eco:8002/predict/DE",
                Err(ServiceError::unreachable("http://eco:8002/predict/DE", "hw connection refused")),
            ),
    );

    let orch = build(sensor, plane, services);
    let outcome = orch.get_forecast("DE", None).await;

    assert!(outcome.result().is_none());
    let error = outcome.error().expect("total outage must carry an error");
    assert!(error.contains("xgb connection refused"), "{error}");
    assert!(error.contains("hw connection refused"), "{error}");
    assert_eq!(orch.metrics().failures(), 1);
}

#[tokio::test(start_paused = true)]
async fn fallback_label_names_eco_service() {
    let sensor = Arc::new(SequenceSensor::new(&[(90.0, CarbonStatus::Low)]));
    let plane = Arc::new(InMemoryControlPlane::new().with_target(TARGET, TargetState::Running));
    let services = Arc::new(
        FakeServices::default().respond("http://eco:8002/predict/PL", Ok(json!({"data": [{"value": 2}]}))),
    );

    let orch = build(sensor, plane, services);
    let outcome = orch.get_forecast("PL", None).await;

    let metadata = outcome.metadata().expect("fallback should succeed");
    assert_eq!(metadata.selected_model_label, "Holt-Winters (Auto-Fallback)");
    assert_eq!(orch.metrics().forecasts(RoutingMode::Fallback), 1);
}

#[tokio::test(start_paused = true)]
async fn forecast_reads_sensor_exactly_once() {
    // A second read would flip to HIGH: stop the target and route to eco.
    let sensor = Arc::new(SequenceSensor::new(&[(40.0, CarbonStatus::Low), (700.0, CarbonStatus::High)]));
    let plane = Arc::new(InMemoryControlPlane::new().with_target(TARGET, TargetState::Stopped));
    let services = Arc::new(FakeServices::default().respond(
        "http://performance:8001/predict/DE",
        Ok(json!({"data": [], "execution_carbon_kg": 0.01})),
    ));

    let orch = build(sensor.clone(), plane.clone(), services.clone());
    let outcome = orch.get_forecast("DE", None).await;

    assert_eq!(sensor.reads(), 1);
    assert!(outcome.is_success());
    assert_eq!(outcome.metadata().unwrap().carbon_context.status, CarbonStatus::Low);
    assert_eq!(plane.lifecycle_calls(), vec![ControlCall::Start(TARGET.to_string())]);
    assert_eq!(services.calls(), vec!["http://performance:8001/predict/DE".to_string()]);
}

#[tokio::test]
async fn status_poll_reconciles_as_side_effect() {
    let sensor = Arc::new(SequenceSensor::new(&[(650.0, CarbonStatus::High), (640.0, CarbonStatus::High)]));
    let plane = Arc::new(InMemoryControlPlane::new().with_target(TARGET, TargetState::Running));
    let services = Arc::new(FakeServices::default());

    let orch = build(sensor.clone(), plane.clone(), services.clone());

    let reading = orch.get_status(Some(CarbonStatus::High)).await;
    assert_eq!(reading.status, CarbonStatus::High);
    assert_eq!(plane.state_of(TARGET), TargetState::Stopped);

    // Already stopped: the second poll issues no lifecycle calls.
    plane.clear_calls();
    orch.get_status(None).await;
    assert!(plane.lifecycle_calls().is_empty());

    assert_eq!(sensor.reads(), 2);
    assert!(services.calls().is_empty());
    assert_eq!(orch.metrics().status_polls(), 2);
}

#[tokio::test]
async fn broken_control_plane_does_not_block_forecasts() {
    let sensor = Arc::new(SequenceSensor::new(&[(600.0, CarbonStatus::High)]));
    let plane = Arc::new(InMemoryControlPlane::new().with_target(TARGET, TargetState::Running));
    plane.fail_list(true);
    let services = Arc::new(
        FakeServices::default().respond("http://eco:8002/predict/DE", Ok(json!([{"value": 5}]))),
    );

    let orch = build(sensor, plane, services);
    let outcome = orch.get_forecast("DE", None).await;

    assert!(outcome.is_success());
    assert_eq!(orch.metrics().reconciles(ReconcileAction::Failed), 1);
}

#[tokio::test]
async fn long_running_polling_keeps_call_log_bounded() {
    let plane = Arc::new(InMemoryControlPlane::new().with_target(TARGET, TargetState::Stopped));
    let controller = InfrastructureController::new(
        Some(plane.clone() as Arc<dyn ControlPlane>),
        "performance_service",
        Duration::ZERO,
    );
    let router = ServiceRouter::new(
        Arc::new(FakeServices::default()),
        ServiceEndpoint::new(ServiceKind::Performance, PERF_URL, Duration::from_secs(15), "XGBoost"),
        ServiceEndpoint::new(ServiceKind::Eco, ECO_URL, Duration::from_secs(10), "Holt-Winters"),
    );
    let sensor = Arc::new(FlappingSensor { reads: AtomicUsize::new(0) });
    let orch = Orchestrator::new(sensor, controller, router);

    for _ in 0..2_000 {
        orch.get_status(None).await;
    }

    assert!(plane.calls().len() <= CALL_LOG_CAPACITY);
    assert_eq!(orch.metrics().reconciles(ReconcileAction::Started), 1_000);
    assert_eq!(orch.metrics().reconciles(ReconcileAction::Stopped), 1_000);
}
