// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sync routing: merges the device diff and all client diffs into the
//! work for this tick.
//!
//! Device-side changes go to every client that did not change the same
//! feature itself; client-side changes go to the device and are echoed
//! to every other client. When two clients change the same feature in
//! the same tick, the client with the lowest connection id wins and the
//! other writes are dropped (last-write-wins is a documented trade-off
//! of the design, not an error).

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::warn;

use crate::catalog::Catalog;
use crate::diff::Diff;
use crate::store::DeviceState;
use crate::value::Value;

/// Hub-assigned client connection id; increases monotonically with
/// accept order.
pub type ClientId = u64;

/// Outbound work for one tick.
#[derive(Debug, Default)]
pub struct RoutedTick {
    /// Conflict-resolved writes to push to the device, in a
    /// deterministic (client id, feature name) order.
    pub device_writes: Vec<(&'static str, Value)>,
    /// Incremental updates per client. Delivery rides on the per-tick
    /// full snapshot; the sets are kept for diagnostics and tests.
    pub client_updates: BTreeMap<ClientId, Diff>,
}

/// Merge the device diff and per-client diffs into routed work.
///
/// `client_diffs` must contain an entry for every connected client
/// (empty when the client sent nothing); `new_clients` lists clients
/// accepted this tick, which receive the full known state instead of a
/// delta.
pub fn route(
    catalog: &Catalog,
    dev: &DeviceState,
    device_diff: &Diff,
    client_diffs: &BTreeMap<ClientId, Diff>,
    new_clients: &[ClientId],
) -> RoutedTick {
    let mut routed = RoutedTick::default();
    for &id in client_diffs.keys() {
        routed.client_updates.insert(id, Diff::new());
    }

    // Device -> clients, unless some client changed the feature itself.
    for (&name, value) in device_diff {
        let contested = client_diffs.values().any(|d| d.contains_key(name));
        if contested {
            continue;
        }
        for updates in routed.client_updates.values_mut() {
            updates.insert(name, value.clone());
        }
    }

    // New clients start from the complete picture, not a delta.
    for &id in new_clients {
        let Some(updates) = routed.client_updates.get_mut(&id) else {
            continue;
        };
        for f in catalog.features() {
            let value = match &dev.internal_sample(f.name).value {
                Value::Unset => Value::Invalid,
                v => v.clone(),
            };
            updates.insert(f.name, value);
        }
    }

    // Clients -> device and all other clients. Iteration over the
    // BTreeMap resolves same-tick conflicts: lowest id claims first.
    let mut claimed: BTreeMap<&'static str, ClientId> = BTreeMap::new();
    for (&id, diff) in client_diffs {
        for (&name, value) in diff {
            if let Some(&winner) = claimed.get(name) {
                warn!(
                    "client #{} lost same-tick write of {} to client #{}",
                    id, name, winner
                );
                continue;
            }
            claimed.insert(name, id);

            match catalog.feature(name) {
                Some(f) if f.writable() => {
                    routed.device_writes.push((f.name, value.clone()));
                }
                Some(f) => {
                    warn!("ignoring client #{} write to read-only {}", id, f.name);
                    continue;
                }
                None => continue,
            }

            for (&other, updates) in routed.client_updates.iter_mut() {
                if other != id {
                    updates.insert(name, value.clone());
                }
            }
        }
    }

    routed
}

/// Non-readable writable features due for a proactive re-send: their
/// last write is older than their TTL, so the device's own state could
/// have drifted unobserved. Features without a known value yet are
/// skipped.
pub fn stale_unpolled_writes(
    catalog: &Catalog,
    dev: &DeviceState,
    now: Instant,
) -> Vec<(&'static str, Value)> {
    catalog
        .features()
        .iter()
        .filter(|f| !f.readable && f.writable())
        .filter_map(|f| {
            let sample = dev.internal_sample(f.name);
            if !sample.value.is_known() {
                return None;
            }
            let expired = sample
                .at
                .map_or(true, |at| now.saturating_duration_since(at) > f.class.ttl());
            expired.then(|| (f.name, sample.value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeviceState;
    use std::time::Instant;

    fn empty_diffs(ids: &[ClientId]) -> BTreeMap<ClientId, Diff> {
        ids.iter().map(|&id| (id, Diff::new())).collect()
    }

    #[test]
    fn test_device_change_fans_out_to_all_clients() {
        let catalog = Catalog::ft897d();
        let dev = DeviceState::new(&catalog);
        let mut device_diff = Diff::new();
        device_diff.insert("freq", Value::text("14250000"));
        let client_diffs = empty_diffs(&[1, 2]);

        let routed = route(&catalog, &dev, &device_diff, &client_diffs, &[]);
        assert!(routed.device_writes.is_empty());
        for id in [1, 2] {
            assert_eq!(
                routed.client_updates[&id].get("freq"),
                Some(&Value::text("14250000"))
            );
        }
    }

    #[test]
    fn test_client_change_beats_device_change() {
        // A feature changed by both the device and a client this tick is
        // not pushed device->clients; the client write wins.
        let catalog = Catalog::ft897d();
        let dev = DeviceState::new(&catalog);
        let mut device_diff = Diff::new();
        device_diff.insert("mode", Value::text("USB"));
        let mut client_diffs = empty_diffs(&[1, 2]);
        client_diffs
            .get_mut(&1)
            .unwrap()
            .insert("mode", Value::text("CW"));

        let routed = route(&catalog, &dev, &device_diff, &client_diffs, &[]);
        assert_eq!(routed.device_writes, vec![("mode", Value::text("CW"))]);
        // Client 2 sees the client-1 value, not the stale device value.
        assert_eq!(
            routed.client_updates[&2].get("mode"),
            Some(&Value::text("CW"))
        );
        // The writer is not echoed back its own change.
        assert!(routed.client_updates[&1].is_empty());
    }

    #[test]
    fn test_same_tick_conflict_lowest_id_wins() {
        let catalog = Catalog::ft897d();
        let dev = DeviceState::new(&catalog);
        let mut client_diffs = empty_diffs(&[3, 7]);
        client_diffs
            .get_mut(&3)
            .unwrap()
            .insert("mic-gain", Value::text("0.5"));
        client_diffs
            .get_mut(&7)
            .unwrap()
            .insert("mic-gain", Value::text("0.8"));

        let routed = route(&catalog, &dev, &Diff::new(), &client_diffs, &[]);
        // Exactly one value reaches the device.
        assert_eq!(
            routed.device_writes,
            vec![("mic-gain", Value::text("0.5"))]
        );
        // The loser is told the winning value; the winner gets no echo.
        assert_eq!(
            routed.client_updates[&7].get("mic-gain"),
            Some(&Value::text("0.5"))
        );
        assert!(routed.client_updates[&3].is_empty());
    }

    #[test]
    fn test_new_client_receives_full_state() {
        let catalog = Catalog::ft897d();
        let mut dev = DeviceState::new(&catalog);
        let now = Instant::now();
        dev.set_internal("freq", Value::text("14250000"), Some(now));
        dev.set_internal("mode", Value::text("USB"), Some(now));

        let client_diffs = empty_diffs(&[1]);
        let routed = route(&catalog, &dev, &Diff::new(), &client_diffs, &[1]);

        let updates = &routed.client_updates[&1];
        assert_eq!(updates.len(), catalog.features().len());
        assert_eq!(updates.get("freq"), Some(&Value::text("14250000")));
        assert_eq!(updates.get("mode"), Some(&Value::text("USB")));
        // Never-observed features appear as `?`, not as gaps.
        assert_eq!(updates.get("s-meter"), Some(&Value::Invalid));
    }

    #[test]
    fn test_stale_unpolled_once_per_ttl_window() {
        let catalog = Catalog::ft897d();
        let mut dev = DeviceState::new(&catalog);
        let t0 = Instant::now();

        // Seeded but never written: due immediately.
        let due = stale_unpolled_writes(&catalog, &dev, t0);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0], ("rit", Value::text("0.0")));

        // Freshly written: quiet within the TTL window.
        dev.touch_internal(&catalog, "rit", t0);
        let soon = t0 + std::time::Duration::from_secs(1);
        assert!(stale_unpolled_writes(&catalog, &dev, soon).is_empty());

        // Past the 15 s TTL it is due again.
        let later = t0 + std::time::Duration::from_secs(16);
        assert_eq!(stale_unpolled_writes(&catalog, &dev, later).len(), 1);
    }

    #[test]
    fn test_read_only_feature_write_dropped() {
        let catalog = Catalog::ft897d();
        let dev = DeviceState::new(&catalog);
        let mut client_diffs = empty_diffs(&[1, 2]);
        client_diffs
            .get_mut(&1)
            .unwrap()
            .insert("s-meter", Value::text("9"));

        let routed = route(&catalog, &dev, &Diff::new(), &client_diffs, &[]);
        assert!(routed.device_writes.is_empty());
    }
}
