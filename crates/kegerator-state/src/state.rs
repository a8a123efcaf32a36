// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Global State
//!
//! [`GlobalState`] aggregates every keg and sensor. The aggregate lock is
//! taken before any per-keg or per-sensor lock, so a [`StateGuard`] sees a
//! consistent set of kegs and sensors. Sampling threads only ever take their
//! own channel lock.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use kegerator_config::KegeratorConfig;
use kegerator_observability::MetricsSink;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{StateError, StateResult};
use crate::flow::{Calibration, CalibrationOutcome, FlowMeter, KegView, Pour};
use crate::sensor::{SamplingSettings, SensorChannel, SensorDriver, SensorModel, SensorView};

/// Default number of pours returned by [`GlobalState::list_pours`]
pub const DEFAULT_POUR_LIMIT: usize = 100;

/// Default quiet period after which an in-progress pour is closed
pub const DEFAULT_POUR_IDLE_TIMEOUT_MS: u64 = 3000;

/// Point-in-time copy of every keg and sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub taken_at: DateTime<Utc>,
    pub kegs: Vec<KegView>,
    pub sensors: Vec<SensorView>,
}

/// A sensor channel and the pin it is configured for
#[derive(Clone)]
struct SensorSlot {
    pin: u32,
    channel: Arc<SensorChannel>,
}

struct Aggregate {
    kegs: Vec<Arc<FlowMeter>>,
    sensors: Vec<SensorSlot>,
}

/// Aggregate of all kegs and sensors
pub struct GlobalState {
    inner: Mutex<Aggregate>,
    metrics: Arc<dyn MetricsSink>,
    pour_idle_timeout: Duration,
    default_pour_limit: usize,
}

/// Holder of the aggregate lock
///
/// Per-keg and per-sensor locks taken through the guard nest inside the
/// aggregate lock.
pub struct StateGuard<'a> {
    aggregate: MutexGuard<'a, Aggregate>,
    state: &'a GlobalState,
}

fn check_unique(pins: impl Iterator<Item = u32>) -> StateResult<()> {
    let mut seen = HashSet::new();
    for pin in pins {
        if !seen.insert(pin) {
            return Err(StateError::DuplicatePin(pin));
        }
    }
    Ok(())
}

impl GlobalState {
    /// Build from already constructed meters and channels
    pub fn new(
        kegs: Vec<FlowMeter>,
        sensors: Vec<(u32, SensorChannel)>,
        metrics: Arc<dyn MetricsSink>,
    ) -> StateResult<Self> {
        check_unique(kegs.iter().map(FlowMeter::pin))?;
        check_unique(sensors.iter().map(|(pin, _)| *pin))?;

        let aggregate = Aggregate {
            kegs: kegs.into_iter().map(Arc::new).collect(),
            sensors: sensors
                .into_iter()
                .map(|(pin, channel)| SensorSlot {
                    pin,
                    channel: Arc::new(channel),
                })
                .collect(),
        };

        Ok(Self {
            inner: Mutex::new(aggregate),
            metrics,
            pour_idle_timeout: Duration::milliseconds(DEFAULT_POUR_IDLE_TIMEOUT_MS as i64),
            default_pour_limit: DEFAULT_POUR_LIMIT,
        })
    }

    /// Build kegs and sensor channels from configuration
    pub fn from_config(
        config: &KegeratorConfig,
        driver: Arc<dyn SensorDriver>,
        metrics: Arc<dyn MetricsSink>,
    ) -> StateResult<Self> {
        let kegs = config
            .kegs
            .iter()
            .map(|keg| {
                FlowMeter::new(keg.pin, &keg.kind, &keg.contents, keg.flow_constant, keg.total_volume)
                    .map(|meter| meter.with_history_limit(config.pours.history_limit))
            })
            .collect::<StateResult<Vec<_>>>()?;

        let settings = SamplingSettings::from(&config.sampling);
        let sensors = config
            .sensors
            .iter()
            .map(|sensor| {
                let model: SensorModel = sensor.model.parse()?;
                let interval = StdDuration::from_millis(sensor.effective_poll_interval_ms(&config.sampling));
                let channel = SensorChannel::new(model, interval, settings, Arc::clone(&driver), Arc::clone(&metrics));
                Ok((sensor.pin, channel))
            })
            .collect::<StateResult<Vec<_>>>()?;

        let idle_ms = i64::try_from(config.pours.idle_timeout_ms).unwrap_or(i64::MAX);
        let state = Self::new(kegs, sensors, metrics)?
            .with_pour_idle_timeout(Duration::milliseconds(idle_ms))
            .with_default_pour_limit(config.pours.default_list_limit);

        info!(
            target: "kegerator-state",
            "[STATE] Loaded {} kegs and {} sensors",
            config.kegs.len(),
            config.sensors.len()
        );
        Ok(state)
    }

    pub fn with_pour_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pour_idle_timeout = timeout;
        self
    }

    pub fn with_default_pour_limit(mut self, limit: usize) -> Self {
        self.default_pour_limit = limit;
        self
    }

    pub fn default_pour_limit(&self) -> usize {
        self.default_pour_limit
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    /// Take the aggregate lock
    pub fn lock(&self) -> StateGuard<'_> {
        StateGuard {
            aggregate: self.inner.lock(),
            state: self,
        }
    }

    /// Consistent snapshot after closing idle pours
    pub fn snapshot(&self) -> StateSnapshot {
        let guard = self.lock();
        guard.refresh_derived_values(Utc::now());
        guard.snapshot()
    }

    /// Shared handle to the keg on `pin`, for pulse delivery without the aggregate lock
    pub fn find_by_pin(&self, pin: u32) -> StateResult<Arc<FlowMeter>> {
        self.lock().find_by_pin(pin).map(Arc::clone)
    }

    /// View of one keg after closing idle pours
    pub fn keg_view(&self, pin: u32) -> StateResult<KegView> {
        let guard = self.lock();
        guard.refresh_derived_values(Utc::now());
        Ok(guard.find_by_pin(pin)?.view())
    }

    pub fn calibrate(&self, pin: u32, calibration: Calibration) -> StateResult<CalibrationOutcome> {
        self.lock().calibrate(pin, calibration)
    }

    pub fn refill(&self, pin: u32, contents: Option<String>) -> StateResult<String> {
        self.lock().refill(pin, contents)
    }

    pub fn accumulate(&self, pin: u32, pulses: u64) -> StateResult<f64> {
        self.lock().accumulate(pin, pulses)
    }

    pub fn record_pour_metrics(&self) {
        self.lock().record_pour_metrics();
    }

    /// Completed pours across all kegs, newest first
    ///
    /// `None` uses the default limit. A limit larger than the number of
    /// pours returns all of them.
    pub fn list_pours(&self, limit: Option<usize>) -> Vec<Pour> {
        let mut pours = {
            let guard = self.lock();
            guard.refresh_derived_values(Utc::now());
            guard.collect_pours()
        };
        pours.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        pours.truncate(limit.unwrap_or(self.default_pour_limit));
        pours
    }

    /// Attach and start every configured sensor
    ///
    /// Channels are attached outside the aggregate lock. Returns the
    /// failures; the remaining sensors are still started.
    pub fn start_sensors(&self) -> Vec<StateError> {
        let slots = self.lock().aggregate.sensors.clone();
        let mut failures = Vec::new();

        for slot in slots {
            let started = slot.channel.attach(slot.pin).and_then(|()| slot.channel.start());
            if let Err(e) = started {
                error!(target: "kegerator-state", "[STATE] Sensor on pin {} not started: {}", slot.pin, e);
                failures.push(e);
            }
        }
        failures
    }

    pub fn stop_sensors(&self) {
        for slot in self.lock().aggregate.sensors.iter() {
            slot.channel.stop();
        }
    }
}

impl Drop for GlobalState {
    fn drop(&mut self) {
        for slot in self.inner.get_mut().sensors.iter() {
            slot.channel.detach();
        }
    }
}

impl<'a> StateGuard<'a> {
    /// Close pours that have been idle for the configured timeout
    ///
    /// Returns how many pours were closed.
    pub fn refresh_derived_values(&self, now: DateTime<Utc>) -> usize {
        let closed = self
            .aggregate
            .kegs
            .iter()
            .filter_map(|keg| keg.close_idle_pour(now, self.state.pour_idle_timeout))
            .count();
        if closed > 0 {
            debug!(target: "kegerator-state", "[STATE] Closed {} idle pours", closed);
        }
        closed
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            taken_at: Utc::now(),
            kegs: self.aggregate.kegs.iter().map(|keg| keg.view()).collect(),
            sensors: self
                .aggregate
                .sensors
                .iter()
                .map(|slot| {
                    let mut view = slot.channel.view();
                    view.pin.get_or_insert(slot.pin);
                    view
                })
                .collect(),
        }
    }

    pub fn find_by_pin(&self, pin: u32) -> StateResult<&Arc<FlowMeter>> {
        self.aggregate
            .kegs
            .iter()
            .find(|keg| keg.pin() == pin)
            .ok_or(StateError::NotFound(pin))
    }

    pub fn sensor(&self, pin: u32) -> StateResult<&Arc<SensorChannel>> {
        self.aggregate
            .sensors
            .iter()
            .find(|slot| slot.pin == pin)
            .map(|slot| &slot.channel)
            .ok_or(StateError::SensorNotFound(pin))
    }

    pub fn calibrate(&self, pin: u32, calibration: Calibration) -> StateResult<CalibrationOutcome> {
        self.find_by_pin(pin)?.calibrate(calibration)
    }

    pub fn refill(&self, pin: u32, contents: Option<String>) -> StateResult<String> {
        let keg = self.find_by_pin(pin)?;
        let contents = keg.refill(contents);
        keg.record_metrics(self.state.metrics.as_ref());
        Ok(contents)
    }

    pub fn accumulate(&self, pin: u32, pulses: u64) -> StateResult<f64> {
        Ok(self.find_by_pin(pin)?.accumulate(pulses))
    }

    /// Publish remaining volume for every keg
    pub fn record_pour_metrics(&self) {
        for keg in &self.aggregate.kegs {
            keg.record_metrics(self.state.metrics.as_ref());
        }
    }

    /// Completed pours of every keg, in keg order
    pub fn collect_pours(&self) -> Vec<Pour> {
        self.aggregate.kegs.iter().flat_map(|keg| keg.pours()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{DriverError, RawSample};
    use kegerator_config::{KegConfig, SensorConfig};
    use kegerator_observability::{NoopMetrics, PrometheusMetrics};

    struct FixedDriver(f64);

    impl SensorDriver for FixedDriver {
        fn read_once(&self, _model: SensorModel, pin: u32) -> Result<RawSample, DriverError> {
            if pin == 99 {
                return Err(DriverError::Hardware("no such gpio".to_string()));
            }
            Ok(RawSample {
                temperature_c: self.0,
                humidity_pct: 45.0,
            })
        }

        fn retry_backoff(&self) -> StdDuration {
            StdDuration::ZERO
        }
    }

    fn keg(pin: u32) -> FlowMeter {
        FlowMeter::new(pin, "sixtel", "Stout", 7.5, 19.5).unwrap()
    }

    fn two_kegs() -> GlobalState {
        GlobalState::new(vec![keg(17), keg(27)], Vec::new(), Arc::new(NoopMetrics)).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn test_duplicate_keg_pin_rejected() {
        let result = GlobalState::new(vec![keg(17), keg(17)], Vec::new(), Arc::new(NoopMetrics));
        assert!(matches!(result, Err(StateError::DuplicatePin(17))));
    }

    #[test]
    fn test_find_by_pin() {
        let state = two_kegs();
        assert_eq!(state.find_by_pin(27).unwrap().pin(), 27);
        assert!(matches!(state.find_by_pin(5), Err(StateError::NotFound(5))));
    }

    #[test]
    fn test_calibrate_unknown_pin() {
        let state = two_kegs();
        let err = state.calibrate(5, Calibration::Constant(5.0)).unwrap_err();
        assert!(matches!(err, StateError::NotFound(5)));
    }

    #[test]
    fn test_list_pours_newest_first() {
        let state = two_kegs();
        {
            let guard = state.lock();
            let a = guard.find_by_pin(17).unwrap();
            let b = guard.find_by_pin(27).unwrap();
            a.accumulate_at(10, at(0));
            a.close_pour();
            b.accumulate_at(10, at(20));
            b.close_pour();
            a.accumulate_at(10, at(10));
            a.close_pour();
        }

        let pours = state.list_pours(Some(2));
        let starts: Vec<_> = pours.iter().map(|p| p.start_time).collect();
        assert_eq!(starts, vec![at(20), at(10)]);

        assert_eq!(state.list_pours(None).len(), 3);
        assert_eq!(state.list_pours(Some(50)).len(), 3);
        assert!(state.list_pours(Some(0)).is_empty());
    }

    #[test]
    fn test_refresh_closes_idle_pours() {
        let state = two_kegs();
        let guard = state.lock();
        guard.find_by_pin(17).unwrap().accumulate_at(10, at(0));

        assert_eq!(guard.refresh_derived_values(at(1)), 0);
        assert_eq!(guard.refresh_derived_values(at(5)), 1);
        assert_eq!(guard.collect_pours().len(), 1);
    }

    #[test]
    fn test_refill_publishes_remaining_volume() {
        let metrics = Arc::new(PrometheusMetrics::new("kegerator").unwrap());
        let state = GlobalState::new(vec![keg(17)], Vec::new(), metrics.clone()).unwrap();
        state.accumulate(17, 450).unwrap();

        state.record_pour_metrics();
        let dispensed = 450_f64 * (1.0 / (7.5 * 60.0));
        assert_eq!(metrics.remaining_volume_value(17, "sixtel", "Stout"), 19.5 - dispensed);

        state.refill(17, Some("Porter".to_string())).unwrap();
        assert_eq!(metrics.remaining_volume_value(17, "sixtel", "Porter"), 19.5);
    }

    #[test]
    fn test_snapshot_lists_kegs_and_sensors() {
        let mut config = KegeratorConfig::default();
        config.kegs.push(KegConfig {
            pin: 17,
            kind: "sixtel".to_string(),
            contents: "Stout".to_string(),
            flow_constant: 7.5,
            total_volume: 19.5,
        });
        config.sensors.push(SensorConfig {
            model: "dht22".to_string(),
            pin: 4,
            poll_interval_ms: Some(60_000),
        });

        let state = GlobalState::from_config(&config, Arc::new(FixedDriver(3.0)), Arc::new(NoopMetrics)).unwrap();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.kegs.len(), 1);
        assert_eq!(snapshot.sensors.len(), 1);
        assert_eq!(snapshot.sensors[0].pin, Some(4));
        assert!(snapshot.sensors[0].latest.is_none());
    }

    #[test]
    fn test_from_config_rejects_unknown_model() {
        let mut config = KegeratorConfig::default();
        config.sensors.push(SensorConfig {
            model: "bmp280".to_string(),
            pin: 4,
            poll_interval_ms: None,
        });
        let result = GlobalState::from_config(&config, Arc::new(FixedDriver(3.0)), Arc::new(NoopMetrics));
        assert!(matches!(result, Err(StateError::UnknownSensorModel(_))));
    }

    #[test]
    fn test_start_sensors_reports_failures() {
        let settings = SamplingSettings {
            attach_retries: 2,
            ..SamplingSettings::default()
        };
        let driver: Arc<dyn SensorDriver> = Arc::new(FixedDriver(3.0));
        let metrics: Arc<dyn MetricsSink> = Arc::new(NoopMetrics);
        let channel = || {
            SensorChannel::new(
                SensorModel::Dht22,
                StdDuration::from_secs(60),
                settings,
                Arc::clone(&driver),
                Arc::clone(&metrics),
            )
        };
        let state = GlobalState::new(Vec::new(), vec![(4, channel()), (99, channel())], Arc::clone(&metrics)).unwrap();

        let failures = state.start_sensors();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], StateError::SensorUnavailable { pin: 99, .. }));

        let guard = state.lock();
        assert_eq!(guard.sensor(4).unwrap().lifecycle(), crate::SensorLifecycle::Running);
        assert_eq!(guard.sensor(4).unwrap().latest().unwrap().temperature_c, 3.0);
        assert!(matches!(guard.sensor(5), Err(StateError::SensorNotFound(5))));
        drop(guard);

        state.stop_sensors();
        assert_eq!(state.lock().sensor(4).unwrap().lifecycle(), crate::SensorLifecycle::Stopped);
    }
}
