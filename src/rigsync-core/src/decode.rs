// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! External-to-internal decode rules and write encoding.
//!
//! Every internal feature derives its value from the raw external
//! string through a pure rule. A rule that cannot parse its input
//! yields `Value::Invalid` for that feature only; nothing propagates.

use crate::catalog::Catalog;
use crate::store::{DeviceState, LinkState};
use crate::value::Value;

/// How an external value maps onto one internal feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRule {
    /// External value used verbatim.
    Passthrough,
    /// Packed frequency digits of the five-byte hex word.
    FreqWord,
    /// Mode nibble of the five-byte hex word.
    ModeWord,
    /// Fixed token of an eight-token composite response.
    CompositeToken(usize),
    /// Fixed token of a four-token transmit-status response.
    StatusToken(usize),
    /// First token of the two-token bandpass pair.
    PairLow,
    /// Second token of the two-token bandpass pair.
    PairHigh,
}

/// How an internal value is turned back into an external write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeRule {
    Passthrough,
    /// Written as `<value> <last known high cutoff>`.
    PairLow,
    /// Written as `<last known low cutoff> <value>`.
    PairHigh,
}

/// Decode the packed frequency of a `raw_freq_and_mode_hex` response.
///
/// The first four space-separated hex bytes carry eight BCD digits,
/// most significant first; the result is in 10 Hz units.
fn decode_freq_word(raw: &str) -> Option<String> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() != 5 {
        return None;
    }

    let mut freq: u64 = 0;
    for tok in &tokens[..4] {
        let byte = u8::from_str_radix(tok, 16).ok()?;
        let high = byte >> 4;
        let low = byte & 0x0F;
        if high >= 10 || low >= 10 {
            return None;
        }
        freq = freq * 10 + u64::from(high);
        freq = freq * 10 + u64::from(low);
    }

    Some((freq * 10).to_string())
}

/// Decode the mode nibble of a `raw_freq_and_mode_hex` response.
fn decode_mode_word(raw: &str) -> Option<String> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() != 5 {
        return None;
    }
    let byte = u8::from_str_radix(tokens[4], 16).ok()?;
    let mode = match byte & 0x0F {
        0 => "LSB",
        1 => "USB",
        2 => "CW",
        3 => "CWR",
        4 => "AM",
        6 => "WFM",
        8 => "FM",
        10 => "DIG",
        12 => "PKT",
        _ => "?",
    };
    Some(mode.to_string())
}

/// Extract a fixed token from a response with an exact token count.
fn token_at(raw: &str, index: usize, expected: usize) -> Option<String> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() != expected {
        return None;
    }
    tokens.get(index).map(|t| t.to_string())
}

/// Apply one decode rule to a raw external value.
pub fn apply_rule(rule: DecodeRule, raw: &str) -> Value {
    let decoded = match rule {
        DecodeRule::Passthrough => Some(raw.to_string()),
        DecodeRule::FreqWord => decode_freq_word(raw),
        DecodeRule::ModeWord => decode_mode_word(raw),
        DecodeRule::CompositeToken(i) => token_at(raw, i, 8),
        DecodeRule::StatusToken(i) => token_at(raw, i, 4),
        DecodeRule::PairLow => token_at(raw, 0, 2),
        DecodeRule::PairHigh => token_at(raw, 1, 2),
    };
    match decoded {
        Some(s) if s == "?" => Value::Invalid,
        Some(s) => Value::Text(s),
        None => Value::Invalid,
    }
}

/// Derive every internal feature of the device entity from its external
/// samples, updating the shared link state from the PTT and VFO
/// features, then applying transmit/receive gating per feature.
pub fn propagate_device(catalog: &Catalog, dev: &mut DeviceState, link: &mut LinkState) {
    // First pass: decode and collect link-state side effects.
    let mut decoded: Vec<Value> = Vec::with_capacity(catalog.features().len());
    for f in catalog.features() {
        let ext = dev.ext_sample(f.read_path);
        let v = match &ext.value {
            Value::Text(raw) => apply_rule(f.decode, raw),
            _ => Value::Invalid,
        };

        match f.name {
            "ptt" => {
                if let Value::Text(s) = &v {
                    link.transmitting = s.to_ascii_uppercase().contains("TRUE");
                }
            }
            "vfo" => {
                if let Value::Text(s) = &v {
                    if s == "VFOA" || s == "VFOB" {
                        link.active_vfo = s.clone();
                    }
                }
            }
            _ => {}
        }
        decoded.push(v);
    }

    // Second pass: gate against the just-updated link state and store.
    // A feature whose internal sample is newer than the last external
    // observation holds an optimistic write; it stands until the next
    // successful poll of its path.
    for (f, v) in catalog.features().iter().zip(decoded) {
        let ext_at = dev.ext_sample(f.read_path).at;
        let newer_internal = match (dev.internal_sample(f.name).at, ext_at) {
            (Some(int_at), Some(e)) => int_at > e,
            (Some(_), None) => true,
            _ => false,
        };
        if newer_internal {
            continue;
        }
        let v = if f.gated(link.transmitting) {
            Value::Invalid
        } else {
            v
        };
        dev.set_internal(f.name, v, ext_at);
    }
}

/// Encode a device write for one internal feature.
///
/// Returns the unresolved external path template and the external value
/// string, or `None` for non-writable features. Bandpass edges are
/// reconstructed into the full pair using the counterpart's last known
/// value.
pub fn encode_write(
    catalog: &Catalog,
    dev: &DeviceState,
    name: &str,
    value: &Value,
) -> Option<(&'static str, String)> {
    let f = catalog.feature(name)?;
    let path = f.write_path?;
    let ext = match f.encode {
        EncodeRule::Passthrough => value.to_string(),
        EncodeRule::PairLow => {
            let high = dev.internal_sample("dbf-high").value.to_string();
            format!("{} {}", value, high)
        }
        EncodeRule::PairHigh => {
            let low = dev.internal_sample("dbf-low").value.to_string();
            format!("{} {}", low, value)
        }
    };
    Some((path, ext))
}
