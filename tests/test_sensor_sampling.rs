// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sensor channel behavior against a scripted driver

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kegerator::observability::{MetricsSink, NoopMetrics, PrometheusMetrics};
use kegerator::state::{
    DriverError, RawSample, SamplingSettings, SensorChannel, SensorDriver, SensorLifecycle, SensorModel,
};
use parking_lot::Mutex;

struct ScriptedDriver {
    script: Mutex<VecDeque<Result<RawSample, DriverError>>>,
    fallback: Result<RawSample, DriverError>,
    backoff: Duration,
    calls: AtomicU32,
}

impl ScriptedDriver {
    fn new(script: Vec<Result<RawSample, DriverError>>, fallback: Result<RawSample, DriverError>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            backoff: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SensorDriver for ScriptedDriver {
    fn read_once(&self, _model: SensorModel, _pin: u32) -> Result<RawSample, DriverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or_else(|| self.fallback.clone())
    }

    fn retry_backoff(&self) -> Duration {
        self.backoff
    }
}

fn sample(temperature_c: f64) -> Result<RawSample, DriverError> {
    Ok(RawSample {
        temperature_c,
        humidity_pct: 40.0,
    })
}

fn channel(driver: Arc<ScriptedDriver>, metrics: Arc<dyn MetricsSink>, poll_ms: u64) -> Arc<SensorChannel> {
    Arc::new(SensorChannel::new(
        SensorModel::Dht22,
        Duration::from_millis(poll_ms),
        SamplingSettings::default(),
        driver,
        metrics,
    ))
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_ceiling_boundary() -> Result<(), Box<dyn std::error::Error>> {
    let driver = Arc::new(ScriptedDriver::new(
        vec![sample(4.0), sample(100.01), sample(99.99)],
        Err(DriverError::Timeout),
    ));
    let channel = channel(driver, Arc::new(NoopMetrics), 60_000);
    channel.attach(4)?;

    let token = kegerator::state::CancelToken::new();
    channel.update(&token);
    assert_eq!(channel.latest().map(|r| r.temperature_c), Some(4.0));

    channel.update(&token);
    assert_eq!(channel.latest().map(|r| r.temperature_c), Some(99.99));
    Ok(())
}

#[test]
fn test_running_channel_publishes_metrics() -> Result<(), Box<dyn std::error::Error>> {
    let metrics = Arc::new(PrometheusMetrics::new("kegerator")?);
    let driver = Arc::new(ScriptedDriver::new(vec![sample(2.0)], sample(3.5)));
    let channel = channel(driver, metrics.clone(), 20);

    channel.attach(4)?;
    channel.start()?;

    assert!(wait_until(Duration::from_secs(2), || {
        channel.latest().map(|r| r.temperature_c) == Some(3.5)
    }));
    assert_eq!(metrics.temperature_value(4, "dht22"), 3.5);

    channel.stop();
    assert_eq!(channel.lifecycle(), SensorLifecycle::Stopped);
    Ok(())
}

#[test]
fn test_stop_cancels_blocked_read() -> Result<(), Box<dyn std::error::Error>> {
    let mut scripted = ScriptedDriver::new(vec![sample(4.0)], Err(DriverError::Checksum));
    scripted.backoff = Duration::from_secs(60);
    let driver = Arc::new(scripted);
    let channel = channel(driver.clone(), Arc::new(NoopMetrics), 20);

    channel.attach(4)?;
    channel.start()?;
    assert!(wait_until(Duration::from_secs(2), || driver.calls() >= 2));

    channel.stop();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(driver.calls(), 2);
    assert_eq!(channel.latest().map(|r| r.temperature_c), Some(4.0));
    Ok(())
}

#[test]
fn test_failing_reads_leave_stale_reading() -> Result<(), Box<dyn std::error::Error>> {
    let driver = Arc::new(ScriptedDriver::new(vec![sample(4.0)], Err(DriverError::Timeout)));
    let channel = channel(driver.clone(), Arc::new(NoopMetrics), 10);
    channel.attach(4)?;
    let first = channel.latest();

    channel.start()?;
    let budget = SamplingSettings::default().read_retries;
    assert!(wait_until(Duration::from_secs(2), || driver.calls() > 1 + 2 * budget));
    channel.stop();

    assert_eq!(channel.latest(), first);
    Ok(())
}
