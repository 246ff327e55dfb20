//! REST API handlers.
//!
//! Each handler delegates to the shared `Orchestrator` and returns JSON
//! wrapped in a `{success, data, error}` envelope.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{debug, warn};

use ecoroute_core::{CarbonStatus, OrchestrationOutcome};

use crate::ApiState;

/// Longest country code accepted in the forecast path.
const MAX_COUNTRY_LEN: usize = 16;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// Optional `?mode=LOW|HIGH` override shared by status and forecast.
#[derive(Debug, Default, serde::Deserialize)]
pub struct ModeQuery {
    pub mode: Option<String>,
}

impl ModeQuery {
    fn parse(&self) -> Result<Option<CarbonStatus>, String> {
        match self.mode.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e| format!("{e}")),
        }
    }
}

fn valid_country(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_COUNTRY_LEN
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ── Carbon status ──────────────────────────────────────────────

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>, Query(query): Query<ModeQuery>) -> impl IntoResponse {
    let mode = match query.parse() {
        Ok(mode) => mode,
        Err(e) => return error_response(&e, StatusCode::BAD_REQUEST).into_response(),
    };

    let reading = state.orchestrator.get_status(mode).await;
    debug!(intensity = reading.intensity, status = %reading.status, "status served");
    ApiResponse::ok(reading).into_response()
}

// ── Forecasts ──────────────────────────────────────────────────

/// GET /api/v1/forecast/:country
pub async fn get_forecast(
    State(state): State<ApiState>,
    Path(country): Path<String>,
    Query(query): Query<ModeQuery>,
) -> impl IntoResponse {
    if !valid_country(&country) {
        return error_response(&format!("invalid country code '{country}'"), StatusCode::BAD_REQUEST)
            .into_response();
    }
    let mode = match query.parse() {
        Ok(mode) => mode,
        Err(e) => return error_response(&e, StatusCode::BAD_REQUEST).into_response(),
    };

    match state.orchestrator.get_forecast(&country, mode).await {
        OrchestrationOutcome::Failure { error } => {
            warn!(%country, %error, "forecast unavailable");
            error_response(&error, StatusCode::BAD_GATEWAY).into_response()
        }
        outcome => ApiResponse::ok(outcome).into_response(),
    }
}

// ── Health ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = ecoroute_metrics::render_prometheus(state.orchestrator.metrics());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
