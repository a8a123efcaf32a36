// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Metrics sink
//!
//! Sensor channels and the keg aggregate publish labelled gauge and counter
//! updates through [`MetricsSink`]. [`PrometheusMetrics`] keeps them in a
//! private registry and renders the text exposition format on demand; the
//! HTTP endpoint that serves it lives outside this workspace.

use std::sync::Arc;

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Metrics errors
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Metrics encoding error: {0}")]
    Encoding(String),
}

/// Observability sink for sensor and keg values
///
/// Label sets are `(pin, model)` for sensors and `(pin, type, contents)`
/// for kegs.
pub trait MetricsSink: Send + Sync {
    /// Latest temperature in degrees Celsius
    fn sensor_temperature(&self, pin: u32, model: &str, celsius: f64);

    /// Latest relative humidity as a ratio (percent / 100)
    fn sensor_humidity(&self, pin: u32, model: &str, ratio: f64);

    /// Add read retries to the cumulative counter
    fn sensor_retries(&self, pin: u32, model: &str, retries: u32);

    /// Remaining keg volume in liters
    fn keg_remaining_volume(&self, pin: u32, kind: &str, contents: &str, liters: f64);

    /// Render the current values in the Prometheus text format
    fn render(&self) -> Result<String, MetricsError>;
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn sensor_temperature(&self, _pin: u32, _model: &str, _celsius: f64) {}
    fn sensor_humidity(&self, _pin: u32, _model: &str, _ratio: f64) {}
    fn sensor_retries(&self, _pin: u32, _model: &str, _retries: u32) {}
    fn keg_remaining_volume(&self, _pin: u32, _kind: &str, _contents: &str, _liters: f64) {}

    fn render(&self) -> Result<String, MetricsError> {
        Ok(String::new())
    }
}

/// Prometheus-backed sink
pub struct PrometheusMetrics {
    registry: Registry,
    temperature: GaugeVec,
    humidity: GaugeVec,
    retries: CounterVec,
    remaining_volume: GaugeVec,
}

impl PrometheusMetrics {
    /// Create the sink and register all collectors under `namespace`
    pub fn new(namespace: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let temperature = GaugeVec::new(
            Opts::new("sensor_temperature_celsius", "Latest sensor temperature reading")
                .namespace(namespace),
            &["pin", "model"],
        )?;
        let humidity = GaugeVec::new(
            Opts::new("sensor_humidity_ratio", "Latest sensor relative humidity (0-1)")
                .namespace(namespace),
            &["pin", "model"],
        )?;
        let retries = CounterVec::new(
            Opts::new("sensor_read_retries_total", "Cumulative sensor read retries")
                .namespace(namespace),
            &["pin", "model"],
        )?;
        let remaining_volume = GaugeVec::new(
            Opts::new("keg_remaining_volume_liters", "Volume left in the keg")
                .namespace(namespace),
            &["pin", "type", "contents"],
        )?;

        registry.register(Box::new(temperature.clone()))?;
        registry.register(Box::new(humidity.clone()))?;
        registry.register(Box::new(retries.clone()))?;
        registry.register(Box::new(remaining_volume.clone()))?;

        Ok(Self {
            registry,
            temperature,
            humidity,
            retries,
            remaining_volume,
        })
    }

    pub fn temperature_value(&self, pin: u32, model: &str) -> f64 {
        self.temperature.with_label_values(&[pin.to_string().as_str(), model]).get()
    }

    pub fn humidity_value(&self, pin: u32, model: &str) -> f64 {
        self.humidity.with_label_values(&[pin.to_string().as_str(), model]).get()
    }

    pub fn retries_value(&self, pin: u32, model: &str) -> f64 {
        self.retries.with_label_values(&[pin.to_string().as_str(), model]).get()
    }

    pub fn remaining_volume_value(&self, pin: u32, kind: &str, contents: &str) -> f64 {
        self.remaining_volume
            .with_label_values(&[pin.to_string().as_str(), kind, contents])
            .get()
    }
}

impl MetricsSink for PrometheusMetrics {
    fn sensor_temperature(&self, pin: u32, model: &str, celsius: f64) {
        self.temperature
            .with_label_values(&[pin.to_string().as_str(), model])
            .set(celsius);
    }

    fn sensor_humidity(&self, pin: u32, model: &str, ratio: f64) {
        self.humidity
            .with_label_values(&[pin.to_string().as_str(), model])
            .set(ratio);
    }

    fn sensor_retries(&self, pin: u32, model: &str, retries: u32) {
        self.retries
            .with_label_values(&[pin.to_string().as_str(), model])
            .inc_by(f64::from(retries));
    }

    fn keg_remaining_volume(&self, pin: u32, kind: &str, contents: &str, liters: f64) {
        self.remaining_volume
            .with_label_values(&[pin.to_string().as_str(), kind, contents])
            .set(liters);
    }

    fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }
}

/// Prometheus sink when `enabled`, otherwise [`NoopMetrics`]
pub fn build_metrics_sink(enabled: bool, namespace: &str) -> Result<Arc<dyn MetricsSink>, MetricsError> {
    if enabled {
        Ok(Arc::new(PrometheusMetrics::new(namespace)?))
    } else {
        Ok(Arc::new(NoopMetrics))
    }
}
