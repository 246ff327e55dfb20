//! Shared domain types used across ecoroute crates.
//!
//! Readings, routing decisions and forecast results are plain values:
//! created per request, passed by value, never persisted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Column that turns a forecast row sequence into a time-indexed frame.
pub const TIMESTAMP_FIELD: &str = "datetime_utc";

// ── Carbon ─────────────────────────────────────────────────────────

/// Grid carbon classification produced by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CarbonStatus {
    /// Clean grid: performance mode.
    Low,
    /// Dirty grid: eco mode.
    High,
}

impl CarbonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarbonStatus::Low => "LOW",
            CarbonStatus::High => "HIGH",
        }
    }
}

impl fmt::Display for CarbonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid carbon status '{0}' (expected LOW or HIGH)")]
pub struct ParseStatusError(pub String);

impl FromStr for CarbonStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(CarbonStatus::Low),
            "HIGH" => Ok(CarbonStatus::High),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A single sensor reading. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonReading {
    /// gCO2eq per kWh, never negative.
    pub intensity: f64,
    pub status: CarbonStatus,
    pub observed_at: DateTime<Utc>,
}

impl CarbonReading {
    pub fn new(intensity: f64, status: CarbonStatus) -> Self {
        Self {
            intensity: intensity.max(0.0),
            status,
            observed_at: Utc::now(),
        }
    }
}

// ── Infrastructure ────────────────────────────────────────────────

/// Run-state of a workload as reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    Running,
    Stopped,
    Unknown,
    NotFound,
}

impl TargetState {
    pub fn is_running(&self) -> bool {
        matches!(self, TargetState::Running)
    }
}

/// One entry of a control-plane listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedTarget {
    /// Control-plane identifier used for start/stop calls.
    pub id: String,
    /// Human-readable name, matched against the configured identifier.
    pub name: String,
    pub state: TargetState,
}

// ── Routing ───────────────────────────────────────────────────────

/// A downstream prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// The heavy model whose container is started and stopped by policy.
    Performance,
    /// The light model, always expected to be up.
    Eco,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Performance => f.write_str("performance"),
            ServiceKind::Eco => f.write_str("eco"),
        }
    }
}

/// Which branch of the routing table produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    Performance,
    Fallback,
    Eco,
}

impl RoutingMode {
    pub const ALL: [RoutingMode; 3] = [RoutingMode::Performance, RoutingMode::Fallback, RoutingMode::Eco];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingMode::Performance => "performance",
            RoutingMode::Fallback => "fallback",
            RoutingMode::Eco => "eco",
        }
    }
}

/// Primary/fallback selection for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub policy_status: CarbonStatus,
    pub primary: ServiceKind,
    pub fallback: Option<ServiceKind>,
}

impl RoutingDecision {
    /// LOW tries performance then eco; HIGH goes to eco only.
    pub fn for_status(status: CarbonStatus) -> Self {
        match status {
            CarbonStatus::Low => Self {
                policy_status: status,
                primary: ServiceKind::Performance,
                fallback: Some(ServiceKind::Eco),
            },
            CarbonStatus::High => Self {
                policy_status: status,
                primary: ServiceKind::Eco,
                fallback: None,
            },
        }
    }
}

// ── Forecast frame ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("row {0} is not a JSON object")]
    NotARecord(usize),

    #[error("row {row} has an unparseable datetime_utc value '{value}'")]
    InvalidTimestamp { row: usize, value: String },
}

/// One forecast record. `timestamp` is lifted out of `datetime_utc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    #[serde(rename = "datetime_utc", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Ordered forecast rows, optionally keyed by timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForecastFrame {
    rows: Vec<ForecastRow>,
}

impl ForecastFrame {
    /// Build a frame from the records returned by a prediction service.
    ///
    /// When any record carries `datetime_utc` the frame is time-indexed and
    /// every present string must parse. Records where it is missing or null
    /// keep `None`.
    pub fn from_records(records: Vec<Value>) -> Result<Self, FrameError> {
        let indexed = records
            .iter()
            .any(|r| r.as_object().is_some_and(|o| o.contains_key(TIMESTAMP_FIELD)));

        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let Value::Object(mut fields) = record else {
                return Err(FrameError::NotARecord(i));
            };

            let timestamp = match indexed.then(|| fields.remove(TIMESTAMP_FIELD)).flatten() {
                None | Some(Value::Null) => None,
                Some(raw) => Some(parse_timestamp(&raw).ok_or_else(|| FrameError::InvalidTimestamp {
                    row: i,
                    value: raw.to_string(),
                })?),
            };

            rows.push(ForecastRow { timestamp, fields });
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_time_indexed(&self) -> bool {
        self.rows.iter().any(|r| r.timestamp.is_some())
    }

    /// Row keyed by an exact timestamp.
    pub fn at(&self, ts: DateTime<Utc>) -> Option<&ForecastRow> {
        self.rows.iter().find(|r| r.timestamp == Some(ts))
    }
}

fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    let s = raw.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ── Results ───────────────────────────────────────────────────────

/// A successful answer from one of the prediction services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResult {
    pub frame: ForecastFrame,
    /// kg CO2eq the service reported for producing the forecast.
    pub execution_carbon_kg: f64,
    pub selected_model_label: String,
    pub mode: RoutingMode,
}

/// Context attached to every successful forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetadata {
    pub selected_model_label: String,
    pub carbon_context: CarbonReading,
    pub execution_carbon_footprint_kg: f64,
}

/// What `get_forecast` hands back to its caller. Never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrchestrationOutcome {
    Success {
        result: ServiceResult,
        metadata: ForecastMetadata,
    },
    Failure {
        error: String,
    },
}

impl OrchestrationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OrchestrationOutcome::Success { .. })
    }

    pub fn result(&self) -> Option<&ServiceResult> {
        match self {
            OrchestrationOutcome::Success { result, .. } => Some(result),
            OrchestrationOutcome::Failure { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&ForecastMetadata> {
        match self {
            OrchestrationOutcome::Success { metadata, .. } => Some(metadata),
            OrchestrationOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            OrchestrationOutcome::Success { .. } => None,
            OrchestrationOutcome::Failure { error } => Some(error),
        }
    }
}
