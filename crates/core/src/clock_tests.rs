// SPDX-License-Identifier: MIT

use super::*;
use chrono::Duration;

#[test]
fn fake_clock_does_not_move_on_its_own() {
    let clock = FakeClock::default();
    let t0 = clock.now();
    let t1 = clock.now();
    assert_eq!(t0, t1);
}

#[test]
fn fake_clock_advance_moves_forward() {
    let clock = FakeClock::default();
    let before = clock.now();
    clock.advance(Duration::minutes(15));
    let after = clock.now();
    assert_eq!(after - before, Duration::minutes(15));
}

#[test]
fn fake_clock_set_is_absolute() {
    let clock = FakeClock::default();
    let target = clock.now() + Duration::days(1);
    clock.set(target);
    assert_eq!(clock.now(), target);
}

#[test]
fn system_clock_produces_increasing_values() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}
