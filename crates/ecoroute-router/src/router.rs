//! Service router: one primary, at most one fallback.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use ecoroute_core::config::ServiceSettings;
use ecoroute_core::{CarbonStatus, ForecastFrame, RoutingDecision, RoutingMode, ServiceKind, ServiceResult};

use crate::client::ServiceClient;
use crate::error::{RoutingError, ServiceError};
use crate::payload::{normalize_payload, service_url};

/// Where and how to reach one prediction service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEndpoint {
    pub kind: ServiceKind,
    pub base_url: String,
    pub timeout: Duration,
    /// Model name shown in result labels.
    pub model_name: String,
}

impl ServiceEndpoint {
    pub fn new(kind: ServiceKind, base_url: impl Into<String>, timeout: Duration, model_name: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into(),
            timeout,
            model_name: model_name.into(),
        }
    }

    pub fn from_settings(kind: ServiceKind, settings: &ServiceSettings) -> Self {
        Self::new(kind, settings.url.clone(), settings.timeout, settings.model_name.clone())
    }
}

/// Routes forecast requests according to carbon status.
pub struct ServiceRouter {
    client: Arc<dyn ServiceClient>,
    performance: ServiceEndpoint,
    eco: ServiceEndpoint,
}

impl ServiceRouter {
    pub fn new(client: Arc<dyn ServiceClient>, performance: ServiceEndpoint, eco: ServiceEndpoint) -> Self {
        Self {
            client,
            performance,
            eco,
        }
    }

    pub fn endpoint(&self, kind: ServiceKind) -> &ServiceEndpoint {
        match kind {
            ServiceKind::Performance => &self.performance,
            ServiceKind::Eco => &self.eco,
        }
    }

    /// Serve one forecast request under `status`.
    pub async fn route(&self, status: CarbonStatus, country_code: &str) -> Result<ServiceResult, RoutingError> {
        let decision = RoutingDecision::for_status(status);
        let primary = self.endpoint(decision.primary);

        match status {
            CarbonStatus::Low => info!(%country_code, model = %primary.model_name, "grid clean, routing to performance model"),
            CarbonStatus::High => info!(%country_code, model = %primary.model_name, "grid dirty, routing to eco model"),
        }

        let primary_error = match self.call(primary, country_code).await {
            Ok((frame, kg)) => {
                let mode = match decision.primary {
                    ServiceKind::Performance => RoutingMode::Performance,
                    ServiceKind::Eco => RoutingMode::Eco,
                };
                return Ok(self.result(frame, kg, primary, mode));
            }
            Err(e) => e,
        };

        let Some(fallback_kind) = decision.fallback else {
            return Err(RoutingError::NoFallback {
                service: decision.primary,
                error: primary_error,
            });
        };

        let fallback = self.endpoint(fallback_kind);
        warn!(
            error = %primary_error,
            fallback = %fallback.model_name,
            "primary service failed, falling back"
        );

        match self.call(fallback, country_code).await {
            Ok((frame, kg)) => Ok(self.result(frame, kg, fallback, RoutingMode::Fallback)),
            Err(fallback_error) => Err(RoutingError::AllServicesFailed {
                primary: primary_error,
                fallback: fallback_error,
            }),
        }
    }

    async fn call(&self, endpoint: &ServiceEndpoint, country_code: &str) -> Result<(ForecastFrame, f64), ServiceError> {
        let url = service_url(&endpoint.base_url, country_code);
        let payload = self.client.get_json(&url, endpoint.timeout).await?;
        normalize_payload(payload).map_err(|cause| ServiceError::malformed(&url, cause))
    }

    fn result(&self, frame: ForecastFrame, execution_carbon_kg: f64, endpoint: &ServiceEndpoint, mode: RoutingMode) -> ServiceResult {
        let suffix = match mode {
            RoutingMode::Performance => "Performance Mode",
            RoutingMode::Fallback => "Auto-Fallback",
            RoutingMode::Eco => "Eco Mode",
        };
        ServiceResult {
            frame,
            execution_carbon_kg,
            selected_model_label: format!("{} ({suffix})", endpoint.model_name),
            mode,
        }
    }
}
