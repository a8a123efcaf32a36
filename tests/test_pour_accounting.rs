// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pulse accounting, refills, calibration and pour listing across kegs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kegerator::observability::NoopMetrics;
use kegerator::state::{Calibration, CalibrationOutcome, FlowMeter, GlobalState};

fn keg(pin: u32, contents: &str) -> FlowMeter {
    FlowMeter::new(pin, "sixtel", contents, 7.5, 19.5).expect("valid keg")
}

fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + seconds, 0).expect("valid timestamp")
}

fn rig() -> GlobalState {
    GlobalState::new(
        vec![keg(17, "Stout"), keg(27, "Pilsner"), keg(22, "Saison")],
        Vec::new(),
        Arc::new(NoopMetrics),
    )
    .expect("unique pins")
}

#[test]
fn test_accumulate_is_exact_at_current_constant() -> Result<(), Box<dyn std::error::Error>> {
    let state = rig();
    let keg = state.find_by_pin(17)?;

    let before = keg.dispensed_volume();
    keg.accumulate(123);
    assert_eq!(keg.dispensed_volume(), before + 123_f64 * keg.flow_per_event());

    state.calibrate(17, Calibration::Coefficient(0.5))?;
    let before = keg.dispensed_volume();
    keg.accumulate(40);
    assert_eq!(keg.dispensed_volume(), before + 40_f64 * (1.0 / (3.75 * 60.0)));
    Ok(())
}

#[test]
fn test_refill_resets_volume_and_keeps_history() -> Result<(), Box<dyn std::error::Error>> {
    let state = rig();
    let keg = state.find_by_pin(27)?;
    keg.accumulate_at(200, at(0));
    keg.close_pour();
    let history = keg.pours().len();

    let contents = state.refill(27, Some("IPA".to_string()))?;

    assert_eq!(contents, "IPA");
    assert_eq!(keg.contents(), "IPA");
    assert_eq!(keg.dispensed_volume(), 0.0);
    assert_eq!(keg.remaining_volume(), 19.5);
    assert_eq!(keg.pours().len(), history);
    Ok(())
}

#[test]
fn test_remaining_volume_floors_at_zero() -> Result<(), Box<dyn std::error::Error>> {
    let state = rig();
    let keg = state.find_by_pin(22)?;
    keg.accumulate(1_000_000);
    assert_eq!(keg.remaining_volume(), 0.0);

    let snapshot = state.snapshot();
    assert!(snapshot.kegs.iter().all(|k| k.remaining_volume >= 0.0));
    Ok(())
}

#[test]
fn test_unit_coefficient_is_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let state = rig();
    let outcome = state.calibrate(17, Calibration::Coefficient(1.0))?;
    assert_eq!(outcome, CalibrationOutcome::Unchanged { constant: 7.5 });
    Ok(())
}

#[test]
fn test_list_pours_across_kegs() -> Result<(), Box<dyn std::error::Error>> {
    let state = rig();
    for (pin, start) in [(22, 30), (17, 10), (27, 20)] {
        let keg = state.find_by_pin(pin)?;
        keg.accumulate_at(50, at(start));
        keg.accumulate_at(50, at(start + 2));
        keg.close_pour();
    }

    let pours = state.list_pours(Some(2));
    assert_eq!(pours.len(), 2);
    assert_eq!((pours[0].keg_pin, pours[0].start_time), (22, at(30)));
    assert_eq!((pours[1].keg_pin, pours[1].start_time), (27, at(20)));

    let all = state.list_pours(None);
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].start_time >= w[1].start_time));
    Ok(())
}

#[test]
fn test_snapshot_closes_idle_pours() -> Result<(), Box<dyn std::error::Error>> {
    let state = rig();
    let keg = state.find_by_pin(17)?;
    keg.accumulate_at(50, at(0));

    let snapshot = state.snapshot();
    let view = snapshot.kegs.iter().find(|k| k.pin == 17).expect("keg 17");
    assert!(view.current_pour_volume.is_none());
    assert_eq!(view.pours.len(), 1);
    Ok(())
}
