// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Flow Meters
//!
//! A [`FlowMeter`] converts pulse counts from a keg's flow sensor into
//! dispensed volume and groups consecutive pulses into [`Pour`]s.
//!
//! Volume per pulse is `1 / (flow_constant * 60)` liters. The flow constant
//! and the per-pulse volume are always updated together under the meter's
//! lock.

use chrono::{DateTime, Duration, Utc};
use kegerator_observability::MetricsSink;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StateError, StateResult};

/// A completed pour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pour {
    pub keg_pin: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Liters
    pub volume: f64,
}

/// How to recalibrate a meter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Calibration {
    /// Replace the flow constant
    Constant(f64),
    /// Scale the current constant, truncated to two decimals
    Coefficient(f64),
}

impl Calibration {
    /// Build from request parameters; `constant` wins when both are present
    ///
    /// Empty strings count as absent.
    pub fn from_params(constant: Option<&str>, coefficient: Option<&str>) -> StateResult<Self> {
        fn present(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        match (present(constant), present(coefficient)) {
            (Some(raw), _) => {
                let value: f64 = raw
                    .parse()
                    .map_err(|_| StateError::InvalidCalibration(format!("constant '{}' is not a number", raw)))?;
                validate_constant(value)?;
                Ok(Calibration::Constant(value))
            }
            (None, Some(raw)) => {
                let value: f64 = raw.parse().map_err(|_| {
                    StateError::InvalidCalibration(format!("coefficient '{}' is not a number", raw))
                })?;
                if !value.is_finite() {
                    return Err(StateError::InvalidCalibration(format!(
                        "coefficient must be finite, got {}",
                        value
                    )));
                }
                Ok(Calibration::Coefficient(value))
            }
            (None, None) => Err(StateError::InvalidCalibration(
                "either constant or coefficient is required".to_string(),
            )),
        }
    }
}

/// Effect of a calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CalibrationOutcome {
    Applied { previous: f64, current: f64 },
    Unchanged { constant: f64 },
}

/// Serializable view of a keg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KegView {
    pub pin: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub contents: String,
    pub flow_constant: f64,
    pub flow_per_event: f64,
    pub pulse_count: u64,
    pub total_volume: f64,
    pub dispensed_volume: f64,
    pub remaining_volume: f64,
    /// Volume of the pour still in progress, if any
    pub current_pour_volume: Option<f64>,
    pub pours: Vec<Pour>,
}

fn validate_constant(value: f64) -> StateResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(StateError::InvalidCalibration(format!(
            "flow constant must be positive and finite, got {}",
            value
        )))
    }
}

#[derive(Debug, Clone)]
struct OpenPour {
    start: DateTime<Utc>,
    last_pulse: DateTime<Utc>,
    volume: f64,
}

struct MeterState {
    contents: String,
    flow_constant: f64,
    flow_per_event: f64,
    pulse_count: u64,
    dispensed_volume: f64,
    pours: Vec<Pour>,
    current: Option<OpenPour>,
}

impl MeterState {
    fn set_flow_constant(&mut self, constant: f64) {
        self.flow_constant = constant;
        self.flow_per_event = 1.0 / (constant * 60.0);
    }
}

/// Pulse-counting flow meter for one keg
pub struct FlowMeter {
    pin: u32,
    kind: String,
    total_volume: f64,
    history_limit: Option<usize>,
    inner: Mutex<MeterState>,
}

impl FlowMeter {
    pub fn new(
        pin: u32,
        kind: impl Into<String>,
        contents: impl Into<String>,
        flow_constant: f64,
        total_volume: f64,
    ) -> StateResult<Self> {
        validate_constant(flow_constant)?;

        let mut state = MeterState {
            contents: contents.into(),
            flow_constant,
            flow_per_event: 0.0,
            pulse_count: 0,
            dispensed_volume: 0.0,
            pours: Vec::new(),
            current: None,
        };
        state.set_flow_constant(flow_constant);

        Ok(Self {
            pin,
            kind: kind.into(),
            total_volume,
            history_limit: None,
            inner: Mutex::new(state),
        })
    }

    /// Keep at most `limit` completed pours, dropping the oldest
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn total_volume(&self) -> f64 {
        self.total_volume
    }

    pub fn contents(&self) -> String {
        self.inner.lock().contents.clone()
    }

    pub fn flow_constant(&self) -> f64 {
        self.inner.lock().flow_constant
    }

    pub fn flow_per_event(&self) -> f64 {
        self.inner.lock().flow_per_event
    }

    pub fn pulse_count(&self) -> u64 {
        self.inner.lock().pulse_count
    }

    pub fn dispensed_volume(&self) -> f64 {
        self.inner.lock().dispensed_volume
    }

    /// Volume left in the keg, never below zero
    pub fn remaining_volume(&self) -> f64 {
        self.remaining_locked(&self.inner.lock())
    }

    fn remaining_locked(&self, state: &MeterState) -> f64 {
        (self.total_volume - state.dispensed_volume).max(0.0)
    }

    /// Completed pours, oldest first
    pub fn pours(&self) -> Vec<Pour> {
        self.inner.lock().pours.clone()
    }

    /// Record `pulses` new pulses observed now; returns the volume added
    pub fn accumulate(&self, pulses: u64) -> f64 {
        self.accumulate_at(pulses, Utc::now())
    }

    /// Record `pulses` new pulses observed at `at`
    ///
    /// Opens a pour if none is in progress. Zero pulses change nothing.
    pub fn accumulate_at(&self, pulses: u64, at: DateTime<Utc>) -> f64 {
        if pulses == 0 {
            return 0.0;
        }

        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let volume = pulses as f64 * state.flow_per_event;
        state.pulse_count += pulses;
        state.dispensed_volume += volume;

        match state.current.as_mut() {
            Some(open) => {
                open.volume += volume;
                if at > open.last_pulse {
                    open.last_pulse = at;
                }
            }
            None => {
                debug!(target: "kegerator-state", "[FLOW] Pour started on pin {}", self.pin);
                state.current = Some(OpenPour {
                    start: at,
                    last_pulse: at,
                    volume,
                });
            }
        }
        volume
    }

    /// Close the in-progress pour, if any, and append it to the history
    pub fn close_pour(&self) -> Option<Pour> {
        let mut state = self.inner.lock();
        self.close_locked(&mut state)
    }

    /// Close the in-progress pour if no pulse arrived within `idle`
    pub fn close_idle_pour(&self, now: DateTime<Utc>, idle: Duration) -> Option<Pour> {
        let mut state = self.inner.lock();
        let quiet_for = state.current.as_ref().map(|open| now - open.last_pulse);
        match quiet_for {
            Some(elapsed) if elapsed >= idle => self.close_locked(&mut state),
            _ => None,
        }
    }

    fn close_locked(&self, state: &mut MeterState) -> Option<Pour> {
        let open = state.current.take()?;
        let pour = Pour {
            keg_pin: self.pin,
            start_time: open.start,
            end_time: open.last_pulse,
            volume: open.volume,
        };
        state.pours.push(pour.clone());

        if let Some(limit) = self.history_limit {
            if state.pours.len() > limit {
                let excess = state.pours.len() - limit;
                state.pours.drain(..excess);
            }
        }

        debug!(
            target: "kegerator-state",
            "[FLOW] Pour finished on pin {}: {:.3} L",
            self.pin, pour.volume
        );
        Some(pour)
    }

    /// Mark the keg full again, optionally with new contents
    ///
    /// Resets dispensed volume and the pulse count and discards any pour in
    /// progress. Completed pours are kept. Returns the contents after the
    /// refill.
    pub fn refill(&self, contents: Option<String>) -> String {
        let mut state = self.inner.lock();
        if let Some(contents) = contents.filter(|c| !c.trim().is_empty()) {
            state.contents = contents;
        }
        state.dispensed_volume = 0.0;
        state.pulse_count = 0;
        state.current = None;

        info!(
            target: "kegerator-state",
            "[FLOW] Keg on pin {} refilled with {}",
            self.pin, state.contents
        );
        state.contents.clone()
    }

    /// Apply a calibration
    ///
    /// Coefficients scale the current constant, so repeated coefficient
    /// calibrations compound. A coefficient that leaves the truncated
    /// constant unchanged is reported as [`CalibrationOutcome::Unchanged`].
    pub fn calibrate(&self, calibration: Calibration) -> StateResult<CalibrationOutcome> {
        let mut state = self.inner.lock();
        let previous = state.flow_constant;

        let next = match calibration {
            Calibration::Constant(constant) => constant,
            Calibration::Coefficient(coefficient) => (previous * coefficient * 100.0).floor() / 100.0,
        };
        validate_constant(next)?;

        if matches!(calibration, Calibration::Coefficient(_)) && next == previous {
            warn!(
                target: "kegerator-state",
                "[FLOW] Calibration of pin {} left constant at {}",
                self.pin, previous
            );
            return Ok(CalibrationOutcome::Unchanged { constant: previous });
        }

        state.set_flow_constant(next);
        info!(
            target: "kegerator-state",
            "[FLOW] Pin {} calibrated: {} -> {}",
            self.pin, previous, next
        );
        Ok(CalibrationOutcome::Applied {
            previous,
            current: next,
        })
    }

    /// Publish the remaining volume gauge
    pub fn record_metrics(&self, metrics: &dyn MetricsSink) {
        let state = self.inner.lock();
        metrics.keg_remaining_volume(
            self.pin,
            &self.kind,
            &state.contents,
            self.remaining_locked(&state),
        );
    }

    pub fn view(&self) -> KegView {
        let state = self.inner.lock();
        KegView {
            pin: self.pin,
            kind: self.kind.clone(),
            contents: state.contents.clone(),
            flow_constant: state.flow_constant,
            flow_per_event: state.flow_per_event,
            pulse_count: state.pulse_count,
            total_volume: self.total_volume,
            dispensed_volume: state.dispensed_volume,
            remaining_volume: self.remaining_locked(&state),
            current_pour_volume: state.current.as_ref().map(|open| open.volume),
            pours: state.pours.clone(),
        }
    }
}
