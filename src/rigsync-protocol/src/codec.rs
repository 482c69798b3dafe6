// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Wire codecs for the control channel, the client feature lines and
//! the full-state broadcast datagrams.

use std::fmt::Write as _;

use rigsync_core::catalog::resolve_path;
use rigsync_core::value::Value;

use crate::types::{ControlReply, Snapshot, NAK_PREFIX};

/// Parse one control-channel reply line.
pub fn parse_reply(line: &str) -> ControlReply {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.starts_with(NAK_PREFIX) || line == "?" {
        ControlReply::Nak(line.trim_start_matches('?').trim_start().to_string())
    } else {
        ControlReply::Ack(line.to_string())
    }
}

/// Format a control-channel read, resolving the `<vfo>` placeholder.
pub fn format_get(rig: &str, path: &str, vfo: &str) -> String {
    format!("get {}.{}\n", rig, resolve_path(path, vfo))
}

/// Format a control-channel write, resolving the `<vfo>` placeholder.
pub fn format_put(rig: &str, path: &str, vfo: &str, value: &str) -> String {
    format!("put {}.{} {}\n", rig, resolve_path(path, vfo), value)
}

/// Parse one `<name>: <value>` client line. Returns `None` for lines
/// without the separator.
pub fn parse_feature_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (name, value) = line.split_once(": ")?;
    Some((name, value))
}

/// Assemble a full-state broadcast datagram: the tick header, one line
/// per feature in the given order, and a terminating blank line.
/// Unknown values render as `?`.
pub fn format_snapshot<'a, I>(tick: u64, entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let mut out = String::new();
    let _ = writeln!(out, "tick: {}", tick);
    for (name, value) in entries {
        let _ = writeln!(out, "{}: {}", name, value);
    }
    out.push('\n');
    out
}

/// Parse a broadcast datagram back into its tick and entries.
pub fn parse_snapshot(datagram: &str) -> Option<Snapshot> {
    let mut lines = datagram.lines();
    let header = lines.next()?;
    let tick = header.strip_prefix("tick: ")?.parse().ok()?;

    let mut entries = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(": ")?;
        entries.push((name.to_string(), value.to_string()));
    }
    Some(Snapshot { tick, entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SnapshotTracker;

    #[test]
    fn test_parse_reply_ack_and_nak() {
        assert_eq!(parse_reply("14250000\n"), ControlReply::Ack("14250000".into()));
        assert_eq!(parse_reply("OK"), ControlReply::Ack("OK".into()));
        assert_eq!(
            parse_reply("? Operation not defined."),
            ControlReply::Nak("Operation not defined.".into())
        );
        assert!(parse_reply("?").is_nak());
    }

    #[test]
    fn test_format_get_resolves_placeholder() {
        assert_eq!(
            format_get("ft897d", "<vfo>.atten", "VFOB"),
            "get ft897d.VFOB.atten\n"
        );
        assert_eq!(
            format_get("ft897d", "CONTROL.rx_status", "VFOA"),
            "get ft897d.CONTROL.rx_status\n"
        );
    }

    #[test]
    fn test_format_put() {
        assert_eq!(
            format_put("ft897d", "CONTROL.freq", "VFOA", "14250000"),
            "put ft897d.CONTROL.freq 14250000\n"
        );
    }

    #[test]
    fn test_parse_feature_line() {
        assert_eq!(parse_feature_line("freq: 14250000\n"), Some(("freq", "14250000")));
        assert_eq!(parse_feature_line("dbf-low: 200 300"), Some(("dbf-low", "200 300")));
        assert_eq!(parse_feature_line("no separator"), None);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let freq = Value::text("14250000");
        let mode = Value::text("USB");
        let smeter = Value::Unset;
        let entries = vec![
            ("freq", &freq),
            ("mode", &mode),
            ("s-meter", &smeter),
        ];
        let wire = format_snapshot(42, entries);
        assert!(wire.starts_with("tick: 42\n"));
        assert!(wire.ends_with("\n\n"));

        let parsed = parse_snapshot(&wire).unwrap();
        assert_eq!(parsed.tick, 42);
        assert_eq!(parsed.entries[0], ("freq".into(), "14250000".into()));
        assert_eq!(parsed.entries[2], ("s-meter".into(), "?".into()));
    }

    #[test]
    fn test_snapshot_body_is_stable_across_ticks() {
        // Unchanged state broadcast twice differs only in the header.
        let v = Value::text("14250000");
        let entries = vec![("freq", &v)];
        let a = format_snapshot(5, entries.clone());
        let b = format_snapshot(6, entries);
        let body_a = a.split_once('\n').unwrap().1;
        let body_b = b.split_once('\n').unwrap().1;
        assert_eq!(body_a, body_b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_tracker_discards_stale_and_duplicate_ticks() {
        let mut tracker = SnapshotTracker::new();
        let snap = |tick| Snapshot {
            tick,
            entries: vec![],
        };
        assert!(tracker.accept(&snap(3)));
        assert!(!tracker.accept(&snap(3)));
        assert!(!tracker.accept(&snap(2)));
        assert!(tracker.accept(&snap(4)));
    }
}
