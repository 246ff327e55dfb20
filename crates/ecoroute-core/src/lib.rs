//! ecoroute-core — shared types and configuration for the carbon-aware router.
//!
//! Every other ecoroute crate depends on this one for the reading,
//! routing and result types that flow through a request, and for the
//! `ecoroute.toml` configuration surface.

pub mod config;
pub mod duration;
pub mod types;

pub use config::{ConfigError, EcorouteConfig};
pub use duration::parse_duration;
pub use types::*;
