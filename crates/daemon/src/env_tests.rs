// SPDX-License-Identifier: MIT

use super::*;
use std::collections::HashMap;

fn lookup<'a>(vars: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
    move |name| vars.get(name).map(|v| v.to_string())
}

#[test]
fn defaults_when_no_overrides_are_set() {
    let vars = HashMap::new();

    let config = load_config_from(lookup(&vars));

    assert_eq!(config.poll_interval_ms, DispatchConfig::default().poll_interval_ms);
    assert!(config.orphan_recovery_enabled);
}

#[test]
fn override_changes_the_poll_interval() {
    let vars = HashMap::from([("DISPATCH_POLL_INTERVAL_MS", "500")]);

    let config = load_config_from(lookup(&vars));

    assert_eq!(config.poll_interval_ms, 500);
}

#[test]
fn override_changes_a_poll_enable_flag() {
    let vars = HashMap::from([("DISPATCH_ORPHAN_RECOVERY_ENABLED", "false")]);

    let config = load_config_from(lookup(&vars));

    assert!(!config.orphan_recovery_enabled);
}

#[test]
fn unparseable_override_falls_back_to_the_default() {
    let vars = HashMap::from([("DISPATCH_POLL_INTERVAL_MS", "not-a-number")]);

    let config = load_config_from(lookup(&vars));

    assert_eq!(config.poll_interval_ms, DispatchConfig::default().poll_interval_ms);
}
