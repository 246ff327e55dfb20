//! ecoroute-api — REST API for the carbon-aware router.
//!
//! Thin axum layer over [`Orchestrator`]. Handlers only parse input,
//! call the orchestrator and wrap the answer in the JSON envelope.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/status?mode=` | Current carbon reading (reconciles as a side effect) |
//! | GET | `/api/v1/forecast/{country}?mode=` | Routed forecast with carbon metadata |
//! | GET | `/healthz` | Liveness probe |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use ecoroute_orchestrator::Orchestrator;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the complete API router (REST + health + metrics).
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    let api_routes = Router::new()
        .route("/status", get(handlers::get_status))
        .route("/forecast/{country}", get(handlers::get_forecast))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
