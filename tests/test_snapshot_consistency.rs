// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Snapshots taken while other threads calibrate, refill and pour must see
//! every keg in a consistent state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use kegerator::observability::NoopMetrics;
use kegerator::state::{Calibration, FlowMeter, GlobalState};

const PINS: [u32; 3] = [17, 22, 27];

fn rig() -> Arc<GlobalState> {
    let kegs = PINS
        .iter()
        .map(|&pin| FlowMeter::new(pin, "sixtel", "Stout", 7.5, 19.5).expect("valid keg"))
        .collect();
    Arc::new(GlobalState::new(kegs, Vec::new(), Arc::new(NoopMetrics)).expect("unique pins"))
}

#[test]
fn test_flow_per_event_matches_constant_under_contention() {
    let state = rig();
    let done = Arc::new(AtomicBool::new(false));

    let mut writers = Vec::new();
    for (i, &pin) in PINS.iter().enumerate() {
        let state = Arc::clone(&state);
        let done = Arc::clone(&done);
        writers.push(thread::spawn(move || {
            let constants = [7.5, 5.0, 6.25, 9.0];
            let mut n = i;
            while !done.load(Ordering::Relaxed) {
                let constant = constants[n % constants.len()];
                state
                    .calibrate(pin, Calibration::Constant(constant))
                    .expect("calibrate");
                if n % 7 == 0 {
                    state.refill(pin, Some(format!("batch-{}", n))).expect("refill");
                }
                n += 1;
            }
        }));
    }

    let pourers: Vec<_> = PINS
        .iter()
        .map(|&pin| {
            let keg = state.find_by_pin(pin).expect("keg");
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    keg.accumulate(3);
                }
            })
        })
        .collect();

    for _ in 0..2_000 {
        let snapshot = state.snapshot();
        assert_eq!(snapshot.kegs.len(), PINS.len());
        for keg in &snapshot.kegs {
            assert_eq!(keg.flow_per_event, 1.0 / (keg.flow_constant * 60.0));
            assert!(keg.remaining_volume >= 0.0);
            assert!(keg.dispensed_volume >= 0.0);
        }
    }

    done.store(true, Ordering::Relaxed);
    for handle in writers.into_iter().chain(pourers) {
        handle.join().expect("worker panicked");
    }
}

#[test]
fn test_snapshot_sees_refill_atomically() {
    let state = rig();
    let keg = state.find_by_pin(17).expect("keg");
    keg.accumulate(900);

    let guard = state.lock();
    guard.refill(17, Some("IPA".to_string())).expect("refill");
    let snapshot = guard.snapshot();
    drop(guard);

    let view = snapshot.kegs.iter().find(|k| k.pin == 17).expect("keg 17");
    assert_eq!(view.contents, "IPA");
    assert_eq!(view.dispensed_volume, 0.0);
    assert_eq!(view.pulse_count, 0);
}
