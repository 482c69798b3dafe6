// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Dummy rig backend for development and testing.
//!
//! Holds rig state in memory and answers every feature path of the
//! FT-897D surface immediately. No hardware required.

use std::collections::HashMap;

use crate::{BackendReply, CapabilityRig, FeatureOps};

const MODES: &[(&str, u8)] = &[
    ("LSB", 0),
    ("USB", 1),
    ("CW", 2),
    ("CWR", 3),
    ("AM", 4),
    ("WFM", 6),
    ("FM", 8),
    ("DIG", 10),
    ("PKT", 12),
];

pub struct DummyState {
    freq_hz: u64,
    mode: &'static str,
    ptt: bool,
    high_swr: bool,
    vfo: String,
    squelched: bool,
    tone_match: bool,
    discrim_centered: bool,
    s_meter: u32,
    bandpass: (String, String),
    scalars: HashMap<String, String>,
}

impl DummyState {
    fn new() -> Self {
        let mut scalars = HashMap::new();
        let control_defaults = [
            ("CONTROL.split", "FALSE"),
            ("CONTROL.vox", "FALSE"),
            ("CONTROL.vox_gain", "50"),
            ("CONTROL.vox_delay", "500"),
            ("CONTROL.bk", "FALSE"),
            ("CONTROL.agc_mode", "FAST"),
            ("CONTROL.noise_blank", "FALSE"),
            ("CONTROL.noise_reduce", "FALSE"),
            ("CONTROL.notch_auto", "FALSE"),
            ("CONTROL.bandpass_filter", "FALSE"),
            ("CONTROL.mic_gain", "0.5"),
            ("CONTROL.power", "100"),
            ("CONTROL.speech_proc", "FALSE"),
            ("CONTROL.cw_delay", "250"),
            ("CONTROL.rit", "0.0"),
        ];
        for (path, value) in control_defaults {
            scalars.insert(path.to_string(), value.to_string());
        }
        for vfo in ["VFOA", "VFOB"] {
            let vfo_defaults = [
                ("atten", "OFF"),
                ("fm_narrow", "FALSE"),
                ("cw_dig_narrow", "FALSE"),
                ("preamp", "OFF"),
                ("tone_dcs_mode", "OFF"),
                ("tone", "88.5"),
                ("repeater_offset_frequency", "0"),
            ];
            for (suffix, value) in vfo_defaults {
                scalars.insert(format!("{}.{}", vfo, suffix), value.to_string());
            }
        }
        Self {
            freq_hz: 14_250_000,
            mode: "USB",
            ptt: false,
            high_swr: false,
            vfo: "VFOA".to_string(),
            squelched: false,
            tone_match: false,
            discrim_centered: true,
            s_meter: 5,
            bandpass: ("200".to_string(), "2800".to_string()),
            scalars,
        }
    }
}

fn bool_str(v: bool) -> &'static str {
    if v {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Encode frequency and mode into the five-byte hex word: four BCD
/// bytes in 10 Hz units, most significant first, then the mode code.
fn freq_mode_word(state: &DummyState, _path: &str) -> BackendReply {
    let mut n = state.freq_hz / 10;
    let mut digits = [0u8; 8];
    for d in digits.iter_mut().rev() {
        *d = (n % 10) as u8;
        n /= 10;
    }
    let code = MODES
        .iter()
        .find(|(name, _)| *name == state.mode)
        .map(|&(_, code)| code)
        .unwrap_or(1);
    Ok(format!(
        "{:02X} {:02X} {:02X} {:02X} {:02X}",
        (digits[0] << 4) | digits[1],
        (digits[2] << 4) | digits[3],
        (digits[4] << 4) | digits[5],
        (digits[6] << 4) | digits[7],
        code
    ))
}

fn put_freq(state: &mut DummyState, _path: &str, value: &str) -> BackendReply {
    let hz: u64 = value
        .trim()
        .parse()
        .map_err(|_| format!("Bad frequency: {}", value))?;
    if hz > 999_999_990 {
        return Err(format!("Frequency out of range: {}", hz));
    }
    state.freq_hz = hz;
    Ok("OK".to_string())
}

fn put_mode(state: &mut DummyState, _path: &str, value: &str) -> BackendReply {
    match MODES.iter().find(|(name, _)| *name == value) {
        Some(&(name, _)) => {
            state.mode = name;
            Ok("OK".to_string())
        }
        None => Err(format!("Unsupported mode {}", value)),
    }
}

fn get_vfo(state: &DummyState, _path: &str) -> BackendReply {
    Ok(state.vfo.clone())
}

fn put_vfo(state: &mut DummyState, _path: &str, value: &str) -> BackendReply {
    match value {
        "VFOA" | "VFOB" => {
            state.vfo = value.to_string();
            Ok("OK".to_string())
        }
        _ => Err(format!("Bad VFO selector: {}", value)),
    }
}

fn tx_status(state: &DummyState, _path: &str) -> BackendReply {
    Ok(format!(
        "PTT {} HIGH-SWR {}",
        bool_str(state.ptt),
        bool_str(state.high_swr)
    ))
}

fn put_transmit(state: &mut DummyState, _path: &str, value: &str) -> BackendReply {
    state.ptt = value.eq_ignore_ascii_case("TRUE");
    tracing::debug!("dummy rig PTT {}", bool_str(state.ptt));
    Ok("OK".to_string())
}

fn rx_status(state: &DummyState, _path: &str) -> BackendReply {
    Ok(format!(
        "SQL {} TONE {} DISC {} STR {}",
        bool_str(state.squelched),
        bool_str(state.tone_match),
        bool_str(state.discrim_centered),
        state.s_meter
    ))
}

fn tx_metering(state: &DummyState, _path: &str) -> BackendReply {
    let power = if state.ptt { 50 } else { 0 };
    Ok(format!("PWR {} ALC {} SWR {} MOD {}", power, 3, 15, 40))
}

fn get_bandpass(state: &DummyState, _path: &str) -> BackendReply {
    Ok(format!("{} {}", state.bandpass.0, state.bandpass.1))
}

fn put_bandpass(state: &mut DummyState, _path: &str, value: &str) -> BackendReply {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    if tokens.len() != 2 {
        return Err(format!("Bandpass needs two edges, got: {}", value));
    }
    state.bandpass = (tokens[0].to_string(), tokens[1].to_string());
    Ok("OK".to_string())
}

fn get_scalar(state: &DummyState, path: &str) -> BackendReply {
    state
        .scalars
        .get(path)
        .cloned()
        .ok_or_else(|| format!("No value for {}", path))
}

fn put_scalar(state: &mut DummyState, path: &str, value: &str) -> BackendReply {
    state.scalars.insert(path.to_string(), value.to_string());
    Ok("OK".to_string())
}

/// Build a fresh dummy rig with its full feature table.
pub fn new_dummy() -> CapabilityRig<DummyState> {
    let mut rig = CapabilityRig::new("dummy", DummyState::new())
        .with_ops(
            "CONTROL.raw_freq_and_mode_hex",
            FeatureOps {
                get: Some(freq_mode_word),
                put: None,
            },
        )
        .with_ops(
            "CONTROL.freq",
            FeatureOps {
                get: None,
                put: Some(put_freq),
            },
        )
        .with_ops(
            "CONTROL.mode",
            FeatureOps {
                get: None,
                put: Some(put_mode),
            },
        )
        .with_ops(
            "CONTROL.vfo_select",
            FeatureOps {
                get: Some(get_vfo),
                put: Some(put_vfo),
            },
        )
        .with_ops(
            "CONTROL.tx_status",
            FeatureOps {
                get: Some(tx_status),
                put: None,
            },
        )
        .with_ops(
            "CONTROL.transmit",
            FeatureOps {
                get: None,
                put: Some(put_transmit),
            },
        )
        .with_ops(
            "CONTROL.rx_status",
            FeatureOps {
                get: Some(rx_status),
                put: None,
            },
        )
        .with_ops(
            "CONTROL.tx_metering",
            FeatureOps {
                get: Some(tx_metering),
                put: None,
            },
        )
        .with_ops(
            "CONTROL.bandpass_filter_band",
            FeatureOps {
                get: Some(get_bandpass),
                put: Some(put_bandpass),
            },
        );

    let scalar_paths = [
        "CONTROL.split",
        "CONTROL.vox",
        "CONTROL.vox_gain",
        "CONTROL.vox_delay",
        "CONTROL.bk",
        "CONTROL.agc_mode",
        "CONTROL.noise_blank",
        "CONTROL.noise_reduce",
        "CONTROL.notch_auto",
        "CONTROL.bandpass_filter",
        "CONTROL.mic_gain",
        "CONTROL.power",
        "CONTROL.speech_proc",
        "CONTROL.cw_delay",
        "CONTROL.rit",
    ];
    for path in scalar_paths {
        rig = rig.with_ops(
            path,
            FeatureOps {
                get: Some(get_scalar),
                put: Some(put_scalar),
            },
        );
    }
    for vfo in ["VFOA", "VFOB"] {
        for suffix in [
            "atten",
            "fm_narrow",
            "cw_dig_narrow",
            "preamp",
            "tone_dcs_mode",
            "tone",
            "repeater_offset_frequency",
        ] {
            rig = rig.with_ops(
                format!("{}.{}", vfo, suffix),
                FeatureOps {
                    get: Some(get_scalar),
                    put: Some(put_scalar),
                },
            );
        }
    }

    rig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RigSession;

    #[test]
    fn test_freq_mode_word_encoding() {
        let mut rig = new_dummy();
        // 14.25 MHz in USB.
        assert_eq!(
            rig.get("CONTROL.raw_freq_and_mode_hex"),
            Ok("01 42 50 00 01".to_string())
        );
    }

    #[test]
    fn test_freq_put_round_trips_through_word() {
        let mut rig = new_dummy();
        rig.put("CONTROL.freq", "7074000").unwrap();
        rig.put("CONTROL.mode", "DIG").unwrap();
        assert_eq!(
            rig.get("CONTROL.raw_freq_and_mode_hex"),
            Ok("00 70 74 00 0A".to_string())
        );
    }

    #[test]
    fn test_bad_mode_rejected() {
        let mut rig = new_dummy();
        assert!(rig.put("CONTROL.mode", "SSTV").is_err());
    }

    #[test]
    fn test_rx_status_has_eight_tokens() {
        let mut rig = new_dummy();
        let status = rig.get("CONTROL.rx_status").unwrap();
        assert_eq!(status.split_whitespace().count(), 8);
    }

    #[test]
    fn test_tx_status_reflects_transmit() {
        let mut rig = new_dummy();
        rig.put("CONTROL.transmit", "TRUE").unwrap();
        assert_eq!(
            rig.get("CONTROL.tx_status"),
            Ok("PTT TRUE HIGH-SWR FALSE".to_string())
        );
    }

    #[test]
    fn test_vfo_scalars_are_independent() {
        let mut rig = new_dummy();
        rig.put("VFOB.atten", "ON").unwrap();
        assert_eq!(rig.get("VFOA.atten"), Ok("OFF".to_string()));
        assert_eq!(rig.get("VFOB.atten"), Ok("ON".to_string()));
    }

    #[test]
    fn test_bandpass_pair() {
        let mut rig = new_dummy();
        rig.put("CONTROL.bandpass_filter_band", "300 2400").unwrap();
        assert_eq!(
            rig.get("CONTROL.bandpass_filter_band"),
            Ok("300 2400".to_string())
        );
        assert!(rig.put("CONTROL.bandpass_filter_band", "300").is_err());
    }

    #[test]
    fn test_serves_every_ft897d_catalog_path() {
        // The hub polls resolved read paths and writes resolved write
        // paths; the dummy must know them all, on both VFOs.
        use rigsync_core::catalog::{resolve_path, Catalog};

        let catalog = Catalog::ft897d();
        let mut rig = new_dummy();
        for vfo in ["VFOA", "VFOB"] {
            for f in catalog.features() {
                if f.readable {
                    let path = resolve_path(f.read_path, vfo);
                    assert!(rig.get(&path).is_ok(), "path {} not readable", path);
                }
                if let Some(write_path) = f.write_path {
                    let path = resolve_path(write_path, vfo);
                    assert!(rig.test(&path).is_ok(), "path {} not known", path);
                }
            }
        }
    }
}
