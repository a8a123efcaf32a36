// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! State layer errors

use thiserror::Error;

use crate::sensor::{DriverError, SensorLifecycle};

/// Errors raised by sensor channels, flow meters and the aggregate
#[derive(Error, Debug)]
pub enum StateError {
    #[error("sensor on pin {pin} unavailable: {source}")]
    SensorUnavailable {
        pin: u32,
        #[source]
        source: DriverError,
    },

    #[error("pin {pin}: recorded temperature exceeds limit: {temperature:.2} > {limit:.2}")]
    ReadingRejected { pin: u32, temperature: f64, limit: f64 },

    #[error("no keg found on pin {0}")]
    NotFound(u32),

    #[error("no sensor found on pin {0}")]
    SensorNotFound(u32),

    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("sensor on pin {pin:?} cannot {action} while {from}")]
    InvalidTransition {
        pin: Option<u32>,
        from: SensorLifecycle,
        action: &'static str,
    },

    #[error("pin {0} is configured more than once")]
    DuplicatePin(u32),

    #[error("unknown sensor model: {0}")]
    UnknownSensorModel(String),

    #[error("failed to spawn sampling thread: {0}")]
    ThreadSpawn(String),
}

pub type StateResult<T> = Result<T, StateError>;
