// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Every struct maps to a section of `kegerator.toml`. Sections are
//! `#[serde(default)]` so a partial file fills in the rest.

use serde::{Deserialize, Serialize};

pub use kegerator_observability::{LogFormat, LoggingConfig};

/// Sensor model names accepted in `[[sensors]]`
pub const KNOWN_SENSOR_MODELS: &[&str] = &["dht11", "dht22"];

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct KegeratorConfig {
    pub logging: LoggingConfig,
    pub sampling: SamplingConfig,
    pub pours: PourConfig,
    pub metrics: MetricsConfig,
    pub sensors: Vec<SensorConfig>,
    pub kegs: Vec<KegConfig>,
}

/// Sensor sampling defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Read attempts when attaching a sensor
    pub attach_retries: u32,
    /// Read attempts per periodic sample
    pub read_retries: u32,
    /// Default poll interval for every sensor
    pub poll_interval_ms: u64,
    /// Readings above this temperature are discarded
    pub temperature_limit_c: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            attach_retries: 4,
            read_retries: 10,
            poll_interval_ms: 10_000,
            temperature_limit_c: 100.0,
        }
    }
}

/// Pour tracking configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PourConfig {
    /// Maximum pours kept per keg (None = unbounded)
    pub history_limit: Option<usize>,
    /// A pour is closed once no pulse arrived for this long
    pub idle_timeout_ms: u64,
    /// Default number of pours returned by a listing
    pub default_list_limit: usize,
}

impl Default for PourConfig {
    fn default() -> Self {
        Self {
            history_limit: None,
            idle_timeout_ms: 3_000,
            default_list_limit: 100,
        }
    }
}

/// Metrics exposition configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "kegerator".to_string(),
        }
    }
}

/// One `[[sensors]]` entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorConfig {
    pub model: String,
    pub pin: u32,
    /// Overrides `sampling.poll_interval_ms` for this sensor
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

impl SensorConfig {
    /// Poll interval for this sensor, falling back to the sampling default
    pub fn effective_poll_interval_ms(&self, sampling: &SamplingConfig) -> u64 {
        self.poll_interval_ms.unwrap_or(sampling.poll_interval_ms)
    }
}

/// One `[[kegs]]` entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KegConfig {
    pub pin: u32,
    /// Keg type label (e.g. "sixtel", "corny")
    pub kind: String,
    #[serde(default)]
    pub contents: String,
    pub flow_constant: f64,
    /// Keg capacity in liters
    pub total_volume: f64,
}
