// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Kegerator State
//!
//! Sensor sampling, pulse-based flow metering and the aggregate that keeps
//! them consistent.
//!
//! ## Lock Ordering
//! 1. Aggregate lock ([`GlobalState::lock`])
//! 2. One keg or sensor lock at a time
//!
//! Sampling threads take only their own channel lock, and no lock is held
//! across a hardware read.

pub mod error;
pub mod flow;
pub mod rate_limiter;
pub mod sensor;
pub mod state;

pub use error::{StateError, StateResult};
pub use flow::{Calibration, CalibrationOutcome, FlowMeter, KegView, Pour};
pub use rate_limiter::RateLimiter;
pub use sensor::{
    CancelToken, DriverError, RawReading, RawSample, SamplingSettings, SensorChannel, SensorDriver,
    SensorLifecycle, SensorModel, SensorReading, SensorView,
};
pub use state::{
    GlobalState, StateGuard, StateSnapshot, DEFAULT_POUR_IDLE_TIMEOUT_MS, DEFAULT_POUR_LIMIT,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
