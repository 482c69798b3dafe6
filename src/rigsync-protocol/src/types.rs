// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Positive acknowledgement of a control-channel `put`.
pub const ACK: &str = "OK";

/// Every negative control-channel reply starts with this marker.
pub const NAK_PREFIX: &str = "? ";

/// One control-channel reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    /// The returned value (`get`) or acknowledgement text (`put`).
    Ack(String),
    /// Negative reply; carries the explanatory text after the marker.
    Nak(String),
}

impl ControlReply {
    pub fn is_nak(&self) -> bool {
        matches!(self, ControlReply::Nak(_))
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            ControlReply::Ack(v) => Some(v.as_str()),
            ControlReply::Nak(_) => None,
        }
    }
}

/// A parsed full-state broadcast datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub tick: u64,
    pub entries: Vec<(String, String)>,
}

/// Receiver-side tick filter: discards any snapshot that is not newer
/// than the last one applied, guarding against UDP reordering and
/// duplication.
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    last: Option<u64>,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the snapshot should be applied; advances the tick
    /// watermark when it is.
    pub fn accept(&mut self, snapshot: &Snapshot) -> bool {
        match self.last {
            Some(last) if snapshot.tick <= last => false,
            _ => {
                self.last = Some(snapshot.tick);
                true
            }
        }
    }
}
