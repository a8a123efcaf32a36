// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Data Transfer Objects for the service layer.

Request parameters arrive as raw strings from query strings or form values
and are validated here before they reach the state layer.
*/

use serde::{Deserialize, Serialize};

use super::errors::{ServiceError, ServiceResult};

/// Parameters for recalibrating a keg
///
/// `constant` takes precedence when both are given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrateParams {
    pub pin: u32,
    pub constant: Option<String>,
    pub coefficient: Option<String>,
}

/// Parameters for refilling a keg
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefillParams {
    pub pin: u32,
    /// New contents; keeps the current contents when absent
    pub contents: Option<String>,
}

/// Result of a refill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefillResult {
    pub pin: u32,
    pub contents: String,
}

fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

/// Parse a required `pin` parameter
pub fn parse_pin(raw: Option<&str>) -> ServiceResult<u32> {
    let value = present(raw).ok_or_else(|| ServiceError::InvalidInput("pin query param required".to_string()))?;
    value
        .parse()
        .map_err(|e| ServiceError::InvalidInput(format!("bad pin value '{}': {}", value, e)))
}

/// Parse an optional `limit` parameter; absent means the default limit
pub fn parse_limit(raw: Option<&str>) -> ServiceResult<Option<usize>> {
    match present(raw) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ServiceError::InvalidInput(format!("bad limit value '{}': {}", value, e))),
    }
}
