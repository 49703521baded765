//! Request-boundary error taxonomy.
//!
//! Every failure a handler can produce is funnelled into `ServiceError`,
//! which maps onto an HTTP status and a stable machine-readable code.

use thiserror::Error;

use crate::alert::thresholds::ThresholdError;
use crate::auth::AuthError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The named station, route or region does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The resource exists but has no readings for the requested window.
    #[error("{0}")]
    NoData(String),

    #[error("{0}")]
    Unauthorized(#[from] AuthError),

    /// Malformed path or query parameters.
    #[error("{0}")]
    Validation(String),

    /// The backing store could not be reached or failed mid-query.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) | ServiceError::NoData(_) => 404,
            ServiceError::Unauthorized(_) => 401,
            ServiceError::Validation(_) => 400,
            ServiceError::Unavailable(_) => 503,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::NoData(_) => "no_data",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Validation(_) => "validation",
            ServiceError::Unavailable(_) => "unavailable",
        }
    }
}

/// A station whose stored baseline cannot be classified is bad data, which
/// the caller cannot fix; surface it as a store problem.
impl From<ThresholdError> for ServiceError {
    fn from(err: ThresholdError) -> Self {
        ServiceError::Unavailable(StoreError::Invalid(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(ServiceError::NotFound("x".into()).status_code(), 404);
        assert_eq!(ServiceError::NoData("x".into()).status_code(), 404);
        assert_eq!(ServiceError::Unauthorized(AuthError::MissingToken).status_code(), 401);
        assert_eq!(ServiceError::Validation("x".into()).status_code(), 400);
        assert_eq!(
            ServiceError::Unavailable(StoreError::Unavailable("down".into())).status_code(),
            503
        );
    }

    #[test]
    fn test_not_found_and_no_data_are_distinguishable() {
        let missing = ServiceError::NotFound("No stations found in region Goa".into());
        let empty = ServiceError::NoData("Region Goa has no readings yet".into());
        assert_eq!(missing.status_code(), empty.status_code());
        assert_ne!(missing.code(), empty.code());
    }
}
