// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # kegerator-observability
//!
//! Observability infrastructure shared by the kegerator crates: logging
//! initialisation with per-crate debug flags, and the metrics sink that the
//! sampling loops and the state aggregate publish into.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;
pub mod metrics;

pub use cli::*;
pub use config::*;
pub use init::*;
pub use metrics::{build_metrics_sink, MetricsError, MetricsSink, NoopMetrics, PrometheusMetrics};

/// Known kegerator crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "kegerator-config",
    "kegerator-observability",
    "kegerator-state",
    "kegerator-services",
];
