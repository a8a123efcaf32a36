// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
# Kegerator Service Layer

The stable application boundary for the keg monitor. Transport adapters
(HTTP handlers, a metrics endpoint) depend on the [`KegService`] trait and
its DTOs, never on the state layer directly.

```text
┌──────────────────────────────────────────────┐
│            TRANSPORT ADAPTERS                │
│  HTTP query handlers, /metrics endpoint      │
└──────────────────────┬───────────────────────┘
                       ↓
┌──────────────────────────────────────────────┐
│        SERVICE LAYER (This Crate)            │
│  • KegService - snapshot, pours, calibrate,  │
│                 refill, metrics scrape       │
└──────────────────────┬───────────────────────┘
                       ↓
┌──────────────────────────────────────────────┐
│              STATE LAYER                     │
│  kegerator-state: GlobalState, FlowMeter     │
└──────────────────────────────────────────────┘
```

Backend errors are translated to the transport-agnostic [`ServiceError`].
Raw request parameters are validated with [`parse_pin`] and [`parse_limit`].
*/

pub mod impls;
pub mod traits;
pub mod types;

pub use traits::KegService;

pub use types::{
    // DTOs
    parse_limit, parse_pin, CalibrateParams, RefillParams, RefillResult,
    // Errors
    ServiceError, ServiceResult,
};

pub use impls::KegServiceImpl;
