//! Service call and routing errors.

use ecoroute_core::ServiceKind;
use thiserror::Error;

/// A single downstream call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Connection failure, timeout, or non-2xx status.
    #[error("service unreachable at {url}: {cause}")]
    Unreachable { url: String, cause: String },

    /// The body could not be read as forecast rows.
    #[error("malformed payload from {url}: {cause}")]
    MalformedPayload { url: String, cause: String },
}

impl ServiceError {
    pub fn unreachable(url: &str, cause: impl std::fmt::Display) -> Self {
        ServiceError::Unreachable {
            url: url.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn malformed(url: &str, cause: impl std::fmt::Display) -> Self {
        ServiceError::MalformedPayload {
            url: url.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Total routing failure: nothing answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The only service the policy allows failed.
    #[error("{service} service unavailable: {error}")]
    NoFallback {
        service: ServiceKind,
        #[source]
        error: ServiceError,
    },

    /// Primary and fallback both failed; both causes are kept.
    #[error("all services failed: primary: {primary}; fallback: {fallback}")]
    AllServicesFailed {
        primary: ServiceError,
        fallback: ServiceError,
    },
}
