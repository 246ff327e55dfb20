//! ecoroute-router — picks and calls a prediction service for the
//! current carbon policy.
//!
//! # Routing
//!
//! ```text
//! LOW  ──► performance (long timeout) ──fail──► eco (auto-fallback) ──fail──► AllServicesFailed
//! HIGH ──► eco ──fail──► NoFallback
//! ```
//!
//! The HIGH branch never touches the performance service: it may have
//! just been stopped by the infrastructure controller.
//!
//! Every response is normalised into a [`ForecastFrame`] plus the
//! execution carbon the service reported (0.0 when absent).
//!
//! [`ForecastFrame`]: ecoroute_core::ForecastFrame

pub mod client;
pub mod error;
pub mod payload;
pub mod router;

pub use client::{BoxFuture, HttpServiceClient, ServiceClient};
pub use error::{RoutingError, ServiceError};
pub use payload::{normalize_payload, service_url};
pub use router::{ServiceEndpoint, ServiceRouter};
