// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod codec;
pub mod types;

pub use codec::{
    format_get, format_put, format_snapshot, parse_feature_line, parse_reply, parse_snapshot,
};
pub use types::{ControlReply, Snapshot, SnapshotTracker, ACK, NAK_PREFIX};
