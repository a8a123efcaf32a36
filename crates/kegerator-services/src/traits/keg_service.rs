/*!
Keg service trait.

Defines the stable interface for reading and adjusting keg state.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use async_trait::async_trait;
use kegerator_state::{CalibrationOutcome, KegView, Pour, StateSnapshot};

use crate::types::*;

/// Keg monitoring and maintenance service (transport-agnostic)
#[async_trait]
pub trait KegService: Send + Sync {
    /// Consistent snapshot of every keg and sensor
    ///
    /// Idle pours are closed before the snapshot is taken.
    ///
    async fn snapshot(&self) -> ServiceResult<StateSnapshot>;

    /// Completed pours across all kegs, newest first
    ///
    /// # Arguments
    /// * `limit` - Maximum number of pours; `None` uses the configured default
    ///
    async fn list_pours(&self, limit: Option<usize>) -> ServiceResult<Vec<Pour>>;

    /// Get a single keg
    ///
    /// # Errors
    /// * `ServiceError::NotFound` - No keg on that pin
    ///
    async fn find_keg(&self, pin: u32) -> ServiceResult<KegView>;

    /// Recalibrate a keg's flow constant
    ///
    /// # Errors
    /// * `ServiceError::NotFound` - No keg on that pin
    /// * `ServiceError::InvalidInput` - Missing, unparsable or non-positive calibration
    ///
    async fn calibrate(&self, params: CalibrateParams) -> ServiceResult<CalibrationOutcome>;

    /// Mark a keg full again
    ///
    /// # Errors
    /// * `ServiceError::NotFound` - No keg on that pin
    ///
    async fn refill(&self, params: RefillParams) -> ServiceResult<RefillResult>;

    /// Publish pour metrics and render the exposition text
    ///
    /// Returns an empty string when metrics are disabled.
    ///
    async fn scrape_metrics(&self) -> ServiceResult<String>;
}
