// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Collects every problem in one pass so an operator can fix the file in
//! one go.

use crate::{ConfigError, ConfigResult, KegeratorConfig, KNOWN_SENSOR_MODELS};
use std::collections::HashSet;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    DuplicatePin { section: String, pin: u32 },
    UnknownSensorModel { pin: u32, model: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicatePin { section, pin } => {
                write!(f, "Pin {} is used by more than one entry in [{}]", pin, section)
            }
            Self::UnknownSensorModel { pin, model } => {
                write!(
                    f,
                    "Sensor on pin {} has unknown model '{}' (known: {})",
                    pin,
                    model,
                    KNOWN_SENSOR_MODELS.join(", ")
                )
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every failed check
pub fn validate_config(config: &KegeratorConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// Run all checks and return the individual failures
pub fn collect_errors(config: &KegeratorConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_logging(config, &mut errors);
    validate_sampling(config, &mut errors);
    validate_sensors(config, &mut errors);
    validate_kegs(config, &mut errors);
    errors
}

fn validate_logging(config: &KegeratorConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("'{}' is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        });
    }
}

fn validate_sampling(config: &KegeratorConfig, errors: &mut Vec<ConfigValidationError>) {
    let sampling = &config.sampling;
    if sampling.attach_retries == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "sampling.attach_retries".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if sampling.read_retries == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "sampling.read_retries".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if sampling.poll_interval_ms == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "sampling.poll_interval_ms".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }
    if !sampling.temperature_limit_c.is_finite() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "sampling.temperature_limit_c".to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
}

fn validate_sensors(config: &KegeratorConfig, errors: &mut Vec<ConfigValidationError>) {
    let mut seen = HashSet::new();
    for sensor in &config.sensors {
        if !seen.insert(sensor.pin) {
            errors.push(ConfigValidationError::DuplicatePin {
                section: "sensors".to_string(),
                pin: sensor.pin,
            });
        }
        if !KNOWN_SENSOR_MODELS.contains(&sensor.model.to_lowercase().as_str()) {
            errors.push(ConfigValidationError::UnknownSensorModel {
                pin: sensor.pin,
                model: sensor.model.clone(),
            });
        }
        if sensor.poll_interval_ms == Some(0) {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("sensors[pin={}].poll_interval_ms", sensor.pin),
                reason: "must be greater than 0".to_string(),
            });
        }
    }
}

fn validate_kegs(config: &KegeratorConfig, errors: &mut Vec<ConfigValidationError>) {
    let mut seen = HashSet::new();
    for keg in &config.kegs {
        if !seen.insert(keg.pin) {
            errors.push(ConfigValidationError::DuplicatePin {
                section: "kegs".to_string(),
                pin: keg.pin,
            });
        }
        if !(keg.flow_constant.is_finite() && keg.flow_constant > 0.0) {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("kegs[pin={}].flow_constant", keg.pin),
                reason: "must be a positive number".to_string(),
            });
        }
        if !(keg.total_volume.is_finite() && keg.total_volume > 0.0) {
            errors.push(ConfigValidationError::InvalidValue {
                field: format!("kegs[pin={}].total_volume", keg.pin),
                reason: "must be a positive number".to_string(),
            });
        }
    }
}
