// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Keg service implementation.

Delegates to [`GlobalState`]; every call takes the aggregate lock for a
short, non-blocking section.
*/

use std::sync::Arc;

use async_trait::async_trait;
use kegerator_state::{Calibration, CalibrationOutcome, GlobalState, KegView, Pour, StateSnapshot};
use tracing::{debug, info};

use crate::traits::KegService;
use crate::types::{CalibrateParams, RefillParams, RefillResult, ServiceResult};

/// Default implementation of KegService
pub struct KegServiceImpl {
    state: Arc<GlobalState>,
}

impl KegServiceImpl {
    pub fn new(state: Arc<GlobalState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<GlobalState> {
        &self.state
    }
}

#[async_trait]
impl KegService for KegServiceImpl {
    async fn snapshot(&self) -> ServiceResult<StateSnapshot> {
        Ok(self.state.snapshot())
    }

    async fn list_pours(&self, limit: Option<usize>) -> ServiceResult<Vec<Pour>> {
        let pours = self.state.list_pours(limit);
        debug!(target: "kegerator-services", "Listing {} pours (limit: {:?})", pours.len(), limit);
        Ok(pours)
    }

    async fn find_keg(&self, pin: u32) -> ServiceResult<KegView> {
        Ok(self.state.keg_view(pin)?)
    }

    async fn calibrate(&self, params: CalibrateParams) -> ServiceResult<CalibrationOutcome> {
        let calibration = Calibration::from_params(params.constant.as_deref(), params.coefficient.as_deref())?;
        info!(target: "kegerator-services", "Calibrating keg on pin {} with {:?}", params.pin, calibration);
        Ok(self.state.calibrate(params.pin, calibration)?)
    }

    async fn refill(&self, params: RefillParams) -> ServiceResult<RefillResult> {
        info!(
            target: "kegerator-services",
            "Refilling keg on pin {} with contents: {:?}",
            params.pin, params.contents
        );
        let contents = self.state.refill(params.pin, params.contents)?;
        Ok(RefillResult {
            pin: params.pin,
            contents,
        })
    }

    async fn scrape_metrics(&self) -> ServiceResult<String> {
        self.state.record_pour_metrics();
        Ok(self.state.metrics().render()?)
    }
}
