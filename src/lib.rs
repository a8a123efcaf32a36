//! # Kegerator - Keg Rig Monitor
//!
//! Samples temperature/humidity sensors, converts flow-meter pulses into
//! dispensed volume and serves consistent snapshots of the whole rig.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kegerator = "0.1"  # Default: services layer included
//! ```
//!
//! ## Feature Flags
//!
//! - **`services`** (default): transport-agnostic [`services::KegService`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kegerator::prelude::*;
//!
//! struct Gpio;
//!
//! impl SensorDriver for Gpio {
//!     fn read_once(&self, _model: SensorModel, _pin: u32) -> Result<RawSample, DriverError> {
//!         Err(DriverError::Hardware("not wired".to_string()))
//!     }
//! }
//!
//! let config = load_config(None, None)?;
//! let metrics = build_metrics_sink(config.metrics.enabled, &config.metrics.namespace)?;
//! let state = GlobalState::from_config(&config, Arc::new(Gpio), metrics)?;
//!
//! for failure in state.start_sensors() {
//!     eprintln!("sensor not started: {}", failure);
//! }
//!
//! // Pulse callbacks deliver counts to the keg directly.
//! let keg = state.find_by_pin(17)?;
//! keg.accumulate(42);
//!
//! let snapshot = state.snapshot();
//! println!("{} kegs", snapshot.kegs.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: kegerator-config, kegerator-observability  │
//! │  (TOML + env/CLI overrides, tracing, Prometheus sink)   │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Core: kegerator-state                                  │
//! │  (sensor channels, flow meters, aggregate lock)         │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Boundary: kegerator-services                           │
//! │  (KegService trait and DTOs for transport adapters)     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

// Re-export foundation
pub use kegerator_config as config;
pub use kegerator_observability as observability;

// Re-export core
pub use kegerator_state as state;

// Re-export boundary
#[cfg(feature = "services")]
pub use kegerator_services as services;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, KegeratorConfig};
    pub use crate::observability::{build_metrics_sink, init_logging, MetricsSink, NoopMetrics, PrometheusMetrics};
    pub use crate::state::{
        Calibration, CalibrationOutcome, DriverError, FlowMeter, GlobalState, Pour, RawSample,
        SensorDriver, SensorModel, StateError, StateSnapshot,
    };

    #[cfg(feature = "services")]
    pub use crate::services::{KegService, KegServiceImpl, ServiceError};
}
