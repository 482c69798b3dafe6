// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-entity state snapshots.
//!
//! The device entity keeps values in two namespaces (external paths and
//! internal names), each as a current/previous pair; clients only carry
//! the internal namespace, since their input already arrives decoded.
//! `begin_tick` rolls current into previous; the diff engine compares
//! the two afterwards.

use std::collections::HashMap;
use std::time::Instant;

use crate::catalog::Catalog;
use crate::value::{Sample, Value};

/// Shared hub state derived from device decode side effects.
#[derive(Debug, Clone)]
pub struct LinkState {
    /// Latest known PTT state, drives transmit/receive gating.
    pub transmitting: bool,
    /// Active VFO, resolves the `<vfo>` path placeholder.
    pub active_vfo: String,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            transmitting: false,
            active_vfo: "VFOA".to_string(),
        }
    }
}

/// The device entity: external and internal namespaces, current and
/// previous-tick.
#[derive(Debug)]
pub struct DeviceState {
    ext: HashMap<&'static str, Sample>,
    ext_prev: HashMap<&'static str, Sample>,
    int: HashMap<&'static str, Sample>,
    int_prev: HashMap<&'static str, Sample>,
}

impl DeviceState {
    pub fn new(catalog: &Catalog) -> Self {
        let mut ext: HashMap<&'static str, Sample> = HashMap::new();
        let mut int: HashMap<&'static str, Sample> = HashMap::new();
        for f in catalog.features() {
            let seed = match f.initial {
                Some(v) => Sample {
                    value: Value::text(v),
                    at: None,
                },
                None => Sample::unset(),
            };
            ext.entry(f.read_path).or_insert_with(|| seed.clone());
            int.insert(f.name, seed);
        }
        Self {
            ext_prev: ext.clone(),
            int_prev: int.clone(),
            ext,
            int,
        }
    }

    /// Roll the current snapshot into the previous one.
    pub fn begin_tick(&mut self) {
        self.ext_prev = self.ext.clone();
        self.int_prev = self.int.clone();
    }

    pub fn ext_sample(&self, path: &str) -> &Sample {
        static UNSET: Sample = Sample {
            value: Value::Unset,
            at: None,
        };
        self.ext.get(path).unwrap_or(&UNSET)
    }

    pub fn internal_sample(&self, name: &str) -> &Sample {
        static UNSET: Sample = Sample {
            value: Value::Unset,
            at: None,
        };
        self.int.get(name).unwrap_or(&UNSET)
    }

    pub fn internal_prev(&self, name: &str) -> &Sample {
        static UNSET: Sample = Sample {
            value: Value::Unset,
            at: None,
        };
        self.int_prev.get(name).unwrap_or(&UNSET)
    }

    /// Record a poll result for an external path. A failed poll stores
    /// `Invalid` but still refreshes the timestamp, so an unreachable
    /// path cannot be re-selected every tick.
    pub fn record_poll(&mut self, path: &str, response: Option<&str>, now: Instant) {
        if let Some(sample) = self.ext.get_mut(path) {
            let value = match response {
                Some(v) => Value::text(v),
                None => Value::Invalid,
            };
            *sample = Sample::new(value, now);
        }
    }

    /// Freeze an external path to `Invalid` without touching its
    /// timestamp (transmit/receive gating).
    pub fn freeze_ext(&mut self, path: &str) {
        if let Some(sample) = self.ext.get_mut(path) {
            sample.value = Value::Invalid;
        }
    }

    pub fn set_internal(&mut self, name: &str, value: Value, at: Option<Instant>) {
        if let Some(sample) = self.int.get_mut(name) {
            *sample = Sample { value, at };
        }
    }

    /// Record a confirmed device write of a non-readable feature: no
    /// poll will ever converge it, so both namespaces are updated in
    /// place.
    pub fn record_unpolled_write(
        &mut self,
        catalog: &Catalog,
        name: &str,
        value: Value,
        now: Instant,
    ) {
        let Some(f) = catalog.feature(name) else {
            return;
        };
        self.set_internal(f.name, value.clone(), Some(now));
        if let Some(sample) = self.ext.get_mut(f.read_path) {
            *sample = Sample::new(value, now);
        }
    }

    /// Refresh only the write timestamp of a feature (proactive
    /// re-send of an unchanged non-readable value).
    pub fn touch_internal(&mut self, catalog: &Catalog, name: &str, now: Instant) {
        if let Some(sample) = self.int.get_mut(name) {
            sample.at = Some(now);
        }
        if let Some(f) = catalog.feature(name) {
            if let Some(sample) = self.ext.get_mut(f.read_path) {
                sample.at = Some(now);
            }
        }
    }
}

/// A client entity: current/previous internal values.
#[derive(Debug)]
pub struct ClientState {
    cur: HashMap<&'static str, Value>,
    prev: HashMap<&'static str, Value>,
}

impl ClientState {
    pub fn new(catalog: &Catalog) -> Self {
        let cur: HashMap<&'static str, Value> = catalog
            .features()
            .iter()
            .map(|f| (f.name, Value::Unset))
            .collect();
        Self {
            prev: cur.clone(),
            cur,
        }
    }

    pub fn begin_tick(&mut self) {
        self.prev = self.cur.clone();
    }

    /// Apply one `<name>: <value>` line from the client. Unknown
    /// feature names are ignored.
    pub fn apply_line(&mut self, name: &str, value: &str) {
        if let Some(v) = self.cur.get_mut(name) {
            *v = Value::from(value);
        }
    }

    pub fn current(&self, name: &str) -> &Value {
        static UNSET: Value = Value::Unset;
        self.cur.get(name).unwrap_or(&UNSET)
    }

    pub fn previous(&self, name: &str) -> &Value {
        static UNSET: Value = Value::Unset;
        self.prev.get(name).unwrap_or(&UNSET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    #[test]
    fn test_device_state_seeds_initial_values() {
        let catalog = Catalog::ft897d();
        let dev = DeviceState::new(&catalog);
        assert_eq!(dev.internal_sample("rit").value, Value::text("0.0"));
        assert!(dev.internal_sample("rit").at.is_none());
        assert_eq!(dev.internal_sample("freq").value, Value::Unset);
    }

    #[test]
    fn test_begin_tick_rolls_current_into_previous() {
        let catalog = Catalog::ft897d();
        let mut dev = DeviceState::new(&catalog);
        let now = Instant::now();
        dev.set_internal("freq", Value::text("14250000"), Some(now));
        assert_eq!(dev.internal_prev("freq").value, Value::Unset);
        dev.begin_tick();
        assert_eq!(dev.internal_prev("freq").value, Value::text("14250000"));
    }

    #[test]
    fn test_record_poll_nak_refreshes_timestamp() {
        let catalog = Catalog::ft897d();
        let mut dev = DeviceState::new(&catalog);
        let now = Instant::now();
        dev.record_poll("CONTROL.vfo_select", None, now);
        let sample = dev.ext_sample("CONTROL.vfo_select");
        assert_eq!(sample.value, Value::Invalid);
        assert_eq!(sample.at, Some(now));
    }

    #[test]
    fn test_freeze_keeps_timestamp() {
        let catalog = Catalog::ft897d();
        let mut dev = DeviceState::new(&catalog);
        let now = Instant::now();
        dev.record_poll("CONTROL.rx_status", Some("SQL TRUE TONE FALSE DISC TRUE STR 9"), now);
        dev.freeze_ext("CONTROL.rx_status");
        let sample = dev.ext_sample("CONTROL.rx_status");
        assert_eq!(sample.value, Value::Invalid);
        assert_eq!(sample.at, Some(now));
    }

    #[test]
    fn test_client_line_application() {
        let catalog = Catalog::ft897d();
        let mut client = ClientState::new(&catalog);
        client.begin_tick();
        client.apply_line("mic-gain", "0.5");
        client.apply_line("no-such-feature", "1");
        assert_eq!(client.current("mic-gain"), &Value::text("0.5"));
        assert_eq!(client.previous("mic-gain"), &Value::Unset);
        assert_eq!(client.current("no-such-feature"), &Value::Unset);
    }
}
