// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Poll scheduling over the single-outstanding-request control channel.
//!
//! Each tick at most one external path is chosen for refresh. Paths
//! that cannot be read in the current transmit/receive state are frozen
//! to `?` without consuming the poll slot. Never-observed paths always
//! win over merely expired ones so every feature is observed at least
//! once regardless of TTL pressure.

use std::time::Instant;

use rand::Rng;

use crate::catalog::{Catalog, PathMeta};
use crate::store::{DeviceState, LinkState};

fn pollable(meta: &PathMeta, link: &LinkState) -> bool {
    if link.transmitting {
        meta.valid_during_tx
    } else {
        meta.valid_during_rx
    }
}

/// Freeze every gated external path to `?` for this tick. Gating is
/// re-evaluated every tick from the latest known PTT state.
pub fn gate_paths(catalog: &Catalog, dev: &mut DeviceState, link: &LinkState) {
    for meta in catalog.poll_paths() {
        if !pollable(meta, link) {
            dev.freeze_ext(meta.path);
        }
    }
}

/// Choose at most one external path to fetch this tick.
///
/// Among expired paths the winner maximizes
/// `priority * overdue_seconds * (1 + jitter)` with `jitter` drawn
/// uniformly from `[0, 1)`; the jitter keeps same-priority paths from
/// starving each other in lock step.
pub fn choose_poll<R: Rng>(
    catalog: &Catalog,
    dev: &DeviceState,
    link: &LinkState,
    now: Instant,
    rng: &mut R,
) -> Option<&'static str> {
    let candidates: Vec<&PathMeta> = catalog
        .poll_paths()
        .iter()
        .filter(|meta| pollable(meta, link))
        .collect();

    // Never-observed paths are polled immediately, in declaration order.
    for meta in &candidates {
        if dev.ext_sample(meta.path).at.is_none() {
            return Some(meta.path);
        }
    }

    let mut best: Option<(&'static str, f64)> = None;
    for meta in candidates {
        let Some(at) = dev.ext_sample(meta.path).at else {
            continue;
        };
        let age = now.saturating_duration_since(at);
        if age <= meta.ttl {
            continue;
        }
        let overdue = (age - meta.ttl).as_secs_f64();
        let jitter: f64 = rng.random();
        let score = f64::from(meta.priority) * overdue * (1.0 + jitter);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((meta.path, score));
        }
    }
    best.map(|(path, _)| path)
}
