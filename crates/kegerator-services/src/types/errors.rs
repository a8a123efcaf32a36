// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Service layer error types.

Transport-agnostic errors that adapters map to HTTP status codes.
*/

use kegerator_state::StateError;
use thiserror::Error;

/// Service layer errors (transport-agnostic)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Resource not found (404 in HTTP)
    #[error("Not found: {resource} with id '{id}'")]
    NotFound { resource: String, id: String },

    /// Invalid input parameters (400 in HTTP)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state for operation (409 in HTTP)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal service error (500 in HTTP)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Backend error (sensors, flow meters, metrics)
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<StateError> for ServiceError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(pin) => ServiceError::NotFound {
                resource: "keg".to_string(),
                id: pin.to_string(),
            },
            StateError::SensorNotFound(pin) => ServiceError::NotFound {
                resource: "sensor".to_string(),
                id: pin.to_string(),
            },
            StateError::InvalidCalibration(reason) => ServiceError::InvalidInput(reason),
            StateError::InvalidTransition { .. } => ServiceError::InvalidState(err.to_string()),
            _ => ServiceError::Backend(err.to_string()),
        }
    }
}

impl From<kegerator_observability::MetricsError> for ServiceError {
    fn from(err: kegerator_observability::MetricsError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        let err: ServiceError = StateError::NotFound(17).into();
        assert_eq!(
            err,
            ServiceError::NotFound {
                resource: "keg".to_string(),
                id: "17".to_string()
            }
        );
    }

    #[test]
    fn test_calibration_maps_to_invalid_input() {
        let err: ServiceError = StateError::InvalidCalibration("bad".to_string()).into();
        assert_eq!(err, ServiceError::InvalidInput("bad".to_string()));
    }

    #[test]
    fn test_other_errors_map_to_backend() {
        let err: ServiceError = StateError::ThreadSpawn("no threads".to_string()).into();
        assert!(matches!(err, ServiceError::Backend(_)));
    }
}
