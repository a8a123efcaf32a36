// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Sensor Channels
//!
//! One [`SensorChannel`] per temperature/humidity sensor. A channel owns the
//! latest accepted reading and an optional background sampling thread.
//!
//! ## Lifecycle
//! ```text
//! Unattached --attach--> Attached --start--> Running --stop--> Stopped
//!                                                ^                |
//!                                                +-----start------+
//! any --detach--> Detached
//! ```
//!
//! ## Locking
//! The channel lock guards the latest reading and the lifecycle. It is never
//! held across a hardware read; reads happen first and the result is
//! published under the lock afterwards.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kegerator_config::SamplingConfig;
use kegerator_observability::MetricsSink;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{StateError, StateResult};
use crate::rate_limiter::RateLimiter;

/// Longest single sleep of an idle sampling loop or retry backoff
const MAX_IDLE_SLICE: Duration = Duration::from_millis(100);

/// Supported sensor models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorModel {
    Dht11,
    Dht22,
}

impl SensorModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorModel::Dht11 => "dht11",
            SensorModel::Dht22 => "dht22",
        }
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorModel {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dht11" => Ok(SensorModel::Dht11),
            "dht22" => Ok(SensorModel::Dht22),
            _ => Err(StateError::UnknownSensorModel(s.to_string())),
        }
    }
}

/// One successful hardware transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub temperature_c: f64,
    pub humidity_pct: f64,
}

/// Result of a retried read: the sample plus how many attempts failed first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub retries_used: u32,
}

/// Hardware read failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("checksum mismatch")]
    Checksum,

    #[error("timed out waiting for sensor response")]
    Timeout,

    #[error("hardware error: {0}")]
    Hardware(String),

    #[error("read cancelled")]
    Cancelled,

    #[error("no valid reading after {attempts} attempts (last error: {last})")]
    Exhausted { attempts: u32, last: Box<DriverError> },
}

/// Cooperative cancellation flag shared between a channel and its sampling thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sleep up to `duration` in short slices; returns false if cancelled
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.is_cancelled() {
                return false;
            }
            let slice = remaining.min(MAX_IDLE_SLICE);
            thread::sleep(slice);
            remaining -= slice;
        }
        !self.is_cancelled()
    }
}

/// Hardware seam for temperature/humidity sensors
///
/// Implementors provide a single transaction; the retry loop with backoff
/// is provided and checks the cancel token between attempts.
pub trait SensorDriver: Send + Sync {
    /// Perform one read transaction
    fn read_once(&self, model: SensorModel, pin: u32) -> Result<RawSample, DriverError>;

    /// Pause between failed attempts
    fn retry_backoff(&self) -> Duration {
        Duration::from_millis(1500)
    }

    /// Read with up to `retries` attempts
    ///
    /// `retries_used` in the result is the number of failed attempts before
    /// the successful one. A budget of zero still makes one attempt.
    fn read_with_retry(
        &self,
        model: SensorModel,
        pin: u32,
        retries: u32,
        cancel: &CancelToken,
    ) -> Result<RawReading, DriverError> {
        let attempts = retries.max(1);
        let mut last = DriverError::Timeout;

        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                return Err(DriverError::Cancelled);
            }
            match self.read_once(model, pin) {
                Ok(sample) => {
                    return Ok(RawReading {
                        temperature_c: sample.temperature_c,
                        humidity_pct: sample.humidity_pct,
                        retries_used: attempt,
                    })
                }
                Err(e) => {
                    debug!(target: "kegerator-state", "[SENSOR] pin {} attempt {} failed: {}", pin, attempt + 1, e);
                    last = e;
                }
            }
            if attempt + 1 < attempts && !cancel.sleep(self.retry_backoff()) {
                return Err(DriverError::Cancelled);
            }
        }

        Err(DriverError::Exhausted {
            attempts,
            last: Box::new(last),
        })
    }
}

/// Lifecycle of a sensor channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorLifecycle {
    Unattached,
    Attached,
    Running,
    Stopped,
    Detached,
}

impl fmt::Display for SensorLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorLifecycle::Unattached => "unattached",
            SensorLifecycle::Attached => "attached",
            SensorLifecycle::Running => "running",
            SensorLifecycle::Stopped => "stopped",
            SensorLifecycle::Detached => "detached",
        };
        f.write_str(name)
    }
}

/// Retry budgets and the accepted temperature ceiling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingSettings {
    pub attach_retries: u32,
    pub read_retries: u32,
    pub temperature_limit_c: f64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            attach_retries: 4,
            read_retries: 10,
            temperature_limit_c: 100.0,
        }
    }
}

impl From<&SamplingConfig> for SamplingSettings {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            attach_retries: config.attach_retries,
            read_retries: config.read_retries,
            temperature_limit_c: config.temperature_limit_c,
        }
    }
}

/// Latest accepted reading of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub retries_used: u32,
    pub observed_at: DateTime<Utc>,
}

/// Serializable view of a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorView {
    pub pin: Option<u32>,
    pub model: SensorModel,
    pub poll_interval_ms: u64,
    pub lifecycle: SensorLifecycle,
    pub latest: Option<SensorReading>,
}

struct ChannelState {
    pin: Option<u32>,
    lifecycle: SensorLifecycle,
    latest: Option<SensorReading>,
    worker: Option<CancelToken>,
}

/// A single sensor and its sampling thread
pub struct SensorChannel {
    model: SensorModel,
    poll_interval: Duration,
    settings: SamplingSettings,
    driver: Arc<dyn SensorDriver>,
    metrics: Arc<dyn MetricsSink>,
    inner: Mutex<ChannelState>,
}

impl SensorChannel {
    pub fn new(
        model: SensorModel,
        poll_interval: Duration,
        settings: SamplingSettings,
        driver: Arc<dyn SensorDriver>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            model,
            poll_interval,
            settings,
            driver,
            metrics,
            inner: Mutex::new(ChannelState {
                pin: None,
                lifecycle: SensorLifecycle::Unattached,
                latest: None,
                worker: None,
            }),
        }
    }

    pub fn model(&self) -> SensorModel {
        self.model
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn pin(&self) -> Option<u32> {
        self.inner.lock().pin
    }

    pub fn lifecycle(&self) -> SensorLifecycle {
        self.inner.lock().lifecycle
    }

    /// Copy of the latest accepted reading
    pub fn latest(&self) -> Option<SensorReading> {
        self.inner.lock().latest.clone()
    }

    pub fn view(&self) -> SensorView {
        let inner = self.inner.lock();
        SensorView {
            pin: inner.pin,
            model: self.model,
            poll_interval_ms: self.poll_interval.as_millis() as u64,
            lifecycle: inner.lifecycle,
            latest: inner.latest.clone(),
        }
    }

    /// Bind the channel to `pin` and take an initial reading
    ///
    /// The read uses the attach retry budget. A reading above the
    /// temperature ceiling is discarded but the channel still attaches.
    pub fn attach(&self, pin: u32) -> StateResult<()> {
        {
            let inner = self.inner.lock();
            if inner.lifecycle == SensorLifecycle::Running {
                return Err(StateError::InvalidTransition {
                    pin: inner.pin,
                    from: inner.lifecycle,
                    action: "attach",
                });
            }
        }

        let token = CancelToken::new();
        let raw = self
            .driver
            .read_with_retry(self.model, pin, self.settings.attach_retries, &token)
            .map_err(|source| StateError::SensorUnavailable { pin, source })?;

        let mut inner = self.inner.lock();
        // A start may have landed while the lock was released for the read.
        if inner.lifecycle == SensorLifecycle::Running {
            return Err(StateError::InvalidTransition {
                pin: inner.pin,
                from: inner.lifecycle,
                action: "attach",
            });
        }
        inner.pin = Some(pin);
        inner.lifecycle = SensorLifecycle::Attached;

        match self.check_limit(pin, &raw) {
            Ok(()) => self.publish_locked(&mut inner, pin, &raw),
            Err(e) => warn!(target: "kegerator-state", "[SENSOR] Discarding initial reading: {}", e),
        }

        info!(
            target: "kegerator-state",
            "[SENSOR] Attached {} on pin {} (retries: {})",
            self.model, pin, raw.retries_used
        );
        Ok(())
    }

    /// Start periodic sampling
    ///
    /// Valid from Attached or Stopped; a no-op while already Running.
    pub fn start(self: &Arc<Self>) -> StateResult<()> {
        self.start_with(|channel: &SensorChannel, cancel: &CancelToken| channel.update(cancel))
    }

    /// Start periodic sampling with a custom per-tick action
    pub fn start_with<F>(self: &Arc<Self>, on_tick: F) -> StateResult<()>
    where
        F: Fn(&SensorChannel, &CancelToken) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        match inner.lifecycle {
            SensorLifecycle::Running => return Ok(()),
            SensorLifecycle::Attached | SensorLifecycle::Stopped => {}
            from => {
                return Err(StateError::InvalidTransition {
                    pin: inner.pin,
                    from,
                    action: "start",
                })
            }
        }

        let pin = inner.pin.unwrap_or_default();
        let cancel = CancelToken::new();
        let channel = Arc::clone(self);
        let loop_cancel = cancel.clone();

        thread::Builder::new()
            .name(format!("sensor-{}", pin))
            .spawn(move || sampling_loop(channel, loop_cancel, on_tick))
            .map_err(|e| StateError::ThreadSpawn(e.to_string()))?;

        inner.worker = Some(cancel);
        inner.lifecycle = SensorLifecycle::Running;
        info!(
            target: "kegerator-state",
            "[SENSOR] Sampling {} on pin {} every {:?}",
            self.model, pin, self.poll_interval
        );
        Ok(())
    }

    /// One sampling tick: read with the periodic budget and publish
    ///
    /// Failures and over-ceiling readings are logged and leave the latest
    /// reading and metrics untouched.
    pub fn update(&self, cancel: &CancelToken) {
        let Some(pin) = self.pin() else {
            warn!(target: "kegerator-state", "[SENSOR] Update on unattached {} channel", self.model);
            return;
        };

        let raw = match self
            .driver
            .read_with_retry(self.model, pin, self.settings.read_retries, cancel)
        {
            Ok(raw) => raw,
            Err(DriverError::Cancelled) => {
                debug!(target: "kegerator-state", "[SENSOR] Read on pin {} cancelled", pin);
                return;
            }
            Err(e) => {
                warn!(target: "kegerator-state", "[SENSOR] Skipping cycle on pin {}: {}", pin, e);
                return;
            }
        };

        if let Err(e) = self.check_limit(pin, &raw) {
            warn!(
                target: "kegerator-state",
                "[SENSOR] {} (retries: {})",
                e, raw.retries_used
            );
            return;
        }

        let mut inner = self.inner.lock();
        // A stopped loop may still be finishing a read.
        if cancel.is_cancelled() {
            return;
        }
        self.publish_locked(&mut inner, pin, &raw);
    }

    /// Cancel the sampling thread without waiting for it
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.lifecycle != SensorLifecycle::Running {
            return;
        }
        if let Some(worker) = inner.worker.take() {
            worker.cancel();
        }
        inner.lifecycle = SensorLifecycle::Stopped;
        info!(target: "kegerator-state", "[SENSOR] Stop requested for pin {:?}", inner.pin);
    }

    /// Cancel any sampling and release the channel; the latest reading is kept
    pub fn detach(&self) {
        let mut inner = self.inner.lock();
        if let Some(worker) = inner.worker.take() {
            worker.cancel();
        }
        inner.lifecycle = SensorLifecycle::Detached;
        info!(target: "kegerator-state", "[SENSOR] Detached pin {:?}", inner.pin);
    }

    fn check_limit(&self, pin: u32, raw: &RawReading) -> StateResult<()> {
        let limit = self.settings.temperature_limit_c;
        if raw.temperature_c.is_nan() || raw.temperature_c > limit {
            return Err(StateError::ReadingRejected {
                pin,
                temperature: raw.temperature_c,
                limit,
            });
        }
        Ok(())
    }

    fn publish_locked(&self, inner: &mut ChannelState, pin: u32, raw: &RawReading) {
        inner.latest = Some(SensorReading {
            temperature_c: raw.temperature_c,
            humidity_pct: raw.humidity_pct,
            retries_used: raw.retries_used,
            observed_at: Utc::now(),
        });

        let model = self.model.as_str();
        self.metrics.sensor_temperature(pin, model, raw.temperature_c);
        self.metrics.sensor_humidity(pin, model, raw.humidity_pct / 100.0);
        self.metrics.sensor_retries(pin, model, raw.retries_used);

        debug!(
            target: "kegerator-state",
            "[SENSOR] pin {}: {:.1}C {:.1}% (retries: {})",
            pin, raw.temperature_c, raw.humidity_pct, raw.retries_used
        );
    }
}

fn sampling_loop<F>(channel: Arc<SensorChannel>, cancel: CancelToken, on_tick: F)
where
    F: Fn(&SensorChannel, &CancelToken),
{
    let mut limiter = RateLimiter::starting_now(channel.poll_interval);
    debug!(target: "kegerator-state", "[SENSOR] Sampling loop started");

    while !cancel.is_cancelled() {
        if !limiter.should_poll_now() {
            if let Some(wait) = limiter.time_until_next_poll() {
                thread::sleep(wait.min(MAX_IDLE_SLICE));
            }
            continue;
        }
        on_tick(&*channel, &cancel);
    }

    debug!(target: "kegerator-state", "[SENSOR] Sampling loop stopped");
}
