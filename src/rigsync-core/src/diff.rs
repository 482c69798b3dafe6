// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-entity change detection between consecutive ticks.

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::store::{ClientState, DeviceState};
use crate::value::Value;

/// Features changed this tick, with their new values.
pub type Diff = BTreeMap<&'static str, Value>;

/// Changes on the device entity since the previous tick.
///
/// Comparison is by value equality, including transitions to and from
/// `Unset`/`Invalid`.
pub fn device_diff(catalog: &Catalog, dev: &DeviceState) -> Diff {
    let mut diffs = Diff::new();
    for f in catalog.features() {
        let cur = &dev.internal_sample(f.name).value;
        let prev = &dev.internal_prev(f.name).value;
        if cur != prev {
            diffs.insert(f.name, cur.clone());
        }
    }
    diffs
}

/// Changes a client pushed since the previous tick.
pub fn client_diff(catalog: &Catalog, client: &ClientState) -> Diff {
    let mut diffs = Diff::new();
    for f in catalog.features() {
        let cur = client.current(f.name);
        if cur != client.previous(f.name) {
            diffs.insert(f.name, cur.clone());
        }
    }
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_device_diff_tracks_value_changes() {
        let catalog = Catalog::ft897d();
        let mut dev = DeviceState::new(&catalog);
        let now = Instant::now();

        dev.begin_tick();
        dev.set_internal("freq", Value::text("14250000"), Some(now));
        let diffs = device_diff(&catalog, &dev);
        assert_eq!(diffs.get("freq"), Some(&Value::text("14250000")));
        assert!(!diffs.contains_key("mode"));
    }

    #[test]
    fn test_device_diff_reports_transition_to_invalid() {
        let catalog = Catalog::ft897d();
        let mut dev = DeviceState::new(&catalog);
        let now = Instant::now();
        dev.set_internal("s-meter", Value::text("9"), Some(now));
        dev.begin_tick();
        dev.set_internal("s-meter", Value::Invalid, Some(now));
        let diffs = device_diff(&catalog, &dev);
        assert_eq!(diffs.get("s-meter"), Some(&Value::Invalid));
    }

    #[test]
    fn test_no_diff_on_identical_tick() {
        let catalog = Catalog::ft897d();
        let mut dev = DeviceState::new(&catalog);
        let now = Instant::now();
        dev.set_internal("mode", Value::text("USB"), Some(now));
        dev.begin_tick();
        assert!(device_diff(&catalog, &dev).is_empty());
    }

    #[test]
    fn test_client_diff_after_line() {
        let catalog = Catalog::ft897d();
        let mut client = ClientState::new(&catalog);
        client.begin_tick();
        client.apply_line("mic-gain", "0.5");
        let diffs = client_diff(&catalog, &client);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs.get("mic-gain"), Some(&Value::text("0.5")));
    }
}
