// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Static catalog of synchronized features.
//!
//! The catalog declares, for every feature the hub keeps in sync, the
//! device-facing path it is read from and written to, its staleness
//! class, and its validity flags. It is built once at startup and never
//! mutated afterwards. Several internal features may read the same
//! external path (composite responses); the per-path poll metadata is
//! merged over all sharers.

use std::collections::HashMap;
use std::time::Duration;

use crate::decode::{DecodeRule, EncodeRule};

/// Placeholder in external paths resolved to the active VFO at use time.
pub const VFO_PLACEHOLDER: &str = "<vfo>";

/// Staleness class of a feature; fixes both TTL and poll priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    /// Real-time metering values (S-meter, power, SWR).
    Metering,
    /// Operationally important state (frequency, mode, PTT).
    Important,
    /// Everything without special needs.
    Default,
    /// Complex or rarely changing settings.
    Complex,
}

impl TtlClass {
    pub fn ttl(self) -> Duration {
        match self {
            TtlClass::Metering => Duration::from_millis(400),
            TtlClass::Important => Duration::from_millis(2500),
            TtlClass::Default => Duration::from_secs(6),
            TtlClass::Complex => Duration::from_secs(15),
        }
    }

    pub fn priority(self) -> u32 {
        match self {
            TtlClass::Metering => 10,
            TtlClass::Important => 6,
            TtlClass::Default => 3,
            TtlClass::Complex => 1,
        }
    }
}

/// Static descriptor of one synchronized feature.
#[derive(Debug, Clone)]
pub struct Feature {
    /// Internal name used by clients and in broadcasts.
    pub name: &'static str,
    /// Device path polled for this feature (may contain `<vfo>`).
    pub read_path: &'static str,
    /// Device path written for this feature, when writable.
    pub write_path: Option<&'static str>,
    pub class: TtlClass,
    pub readable: bool,
    pub valid_during_tx: bool,
    pub valid_during_rx: bool,
    pub decode: DecodeRule,
    pub encode: EncodeRule,
    /// Seed value for features the device cannot report.
    pub initial: Option<&'static str>,
}

impl Feature {
    pub fn writable(&self) -> bool {
        self.write_path.is_some()
    }

    /// Whether the feature is frozen to `?` in the given link state.
    pub fn gated(&self, transmitting: bool) -> bool {
        if transmitting {
            !self.valid_during_tx
        } else {
            !self.valid_during_rx
        }
    }
}

/// Merged poll metadata for one external path.
///
/// Priority is the maximum and TTL the minimum over all features
/// reading the path, so one poll satisfies every sharer.
#[derive(Debug, Clone)]
pub struct PathMeta {
    pub path: &'static str,
    pub ttl: Duration,
    pub priority: u32,
    pub valid_during_tx: bool,
    pub valid_during_rx: bool,
}

/// Immutable feature catalog with per-path poll metadata.
#[derive(Debug)]
pub struct Catalog {
    features: Vec<Feature>,
    paths: Vec<PathMeta>,
    by_name: HashMap<&'static str, usize>,
    readers: HashMap<&'static str, Vec<usize>>,
}

impl Catalog {
    pub fn from_features(features: Vec<Feature>) -> Self {
        let mut by_name = HashMap::new();
        let mut readers: HashMap<&'static str, Vec<usize>> = HashMap::new();
        let mut paths: Vec<PathMeta> = Vec::new();

        for (idx, f) in features.iter().enumerate() {
            by_name.insert(f.name, idx);
            readers.entry(f.read_path).or_default().push(idx);

            if !f.readable {
                continue;
            }
            match paths.iter_mut().find(|p| p.path == f.read_path) {
                Some(meta) => {
                    meta.priority = meta.priority.max(f.class.priority());
                    meta.ttl = meta.ttl.min(f.class.ttl());
                    meta.valid_during_tx |= f.valid_during_tx;
                    meta.valid_during_rx |= f.valid_during_rx;
                }
                None => paths.push(PathMeta {
                    path: f.read_path,
                    ttl: f.class.ttl(),
                    priority: f.class.priority(),
                    valid_during_tx: f.valid_during_tx,
                    valid_during_rx: f.valid_during_rx,
                }),
            }
        }

        Self {
            features,
            paths,
            by_name,
            readers,
        }
    }

    /// Features in declaration order. This order is also the broadcast
    /// line order, keeping snapshot bodies byte-stable.
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.by_name.get(name).map(|&i| &self.features[i])
    }

    /// Pollable external paths with merged metadata, in first-reader order.
    pub fn poll_paths(&self) -> &[PathMeta] {
        &self.paths
    }

    /// Features reading a given external path.
    pub fn readers_of(&self, path: &str) -> &[usize] {
        self.readers.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The full FT-897D feature set.
    pub fn ft897d() -> Self {
        Self::from_features(ft897d_features())
    }
}

/// Resolve the `<vfo>` placeholder in an external path.
pub fn resolve_path(path: &str, vfo: &str) -> String {
    path.replace(VFO_PLACEHOLDER, vfo)
}

fn ft897d_features() -> Vec<Feature> {
    use DecodeRule::*;
    use TtlClass::*;

    // Shorthand for a plain read/write scalar feature.
    fn scalar(
        name: &'static str,
        path: &'static str,
        class: TtlClass,
    ) -> Feature {
        Feature {
            name,
            read_path: path,
            write_path: Some(path),
            class,
            readable: true,
            valid_during_tx: true,
            valid_during_rx: true,
            decode: DecodeRule::Passthrough,
            encode: EncodeRule::Passthrough,
            initial: None,
        }
    }

    // Shorthand for a read-only slice of a composite response.
    fn composite(
        name: &'static str,
        path: &'static str,
        class: TtlClass,
        decode: DecodeRule,
        valid_during_tx: bool,
        valid_during_rx: bool,
    ) -> Feature {
        Feature {
            name,
            read_path: path,
            write_path: None,
            class,
            readable: true,
            valid_during_tx,
            valid_during_rx,
            decode,
            encode: EncodeRule::Passthrough,
            initial: None,
        }
    }

    vec![
        Feature {
            name: "freq",
            read_path: "CONTROL.raw_freq_and_mode_hex",
            write_path: Some("CONTROL.freq"),
            class: Important,
            readable: true,
            valid_during_tx: true,
            valid_during_rx: true,
            decode: FreqWord,
            encode: EncodeRule::Passthrough,
            initial: None,
        },
        Feature {
            name: "mode",
            read_path: "CONTROL.raw_freq_and_mode_hex",
            write_path: Some("CONTROL.mode"),
            class: Important,
            readable: true,
            valid_during_tx: true,
            valid_during_rx: true,
            decode: ModeWord,
            encode: EncodeRule::Passthrough,
            initial: None,
        },
        Feature {
            name: "vfo",
            read_path: "CONTROL.vfo_select",
            write_path: Some("CONTROL.vfo_select"),
            class: Important,
            readable: true,
            valid_during_tx: true,
            valid_during_rx: true,
            decode: Passthrough,
            encode: EncodeRule::Passthrough,
            initial: None,
        },
        Feature {
            name: "ptt",
            read_path: "CONTROL.tx_status",
            write_path: Some("CONTROL.transmit"),
            class: Important,
            readable: true,
            valid_during_tx: true,
            valid_during_rx: true,
            decode: StatusToken(1),
            encode: EncodeRule::Passthrough,
            initial: None,
        },
        composite(
            "high-swr",
            "CONTROL.tx_status",
            Important,
            StatusToken(3),
            true,
            false,
        ),
        scalar("split", "CONTROL.split", Default),
        scalar("vox", "CONTROL.vox", Default),
        scalar("vox-gain", "CONTROL.vox_gain", Default),
        scalar("vox-delay", "CONTROL.vox_delay", Default),
        scalar("bk", "CONTROL.bk", Default),
        scalar("atten", "<vfo>.atten", Complex),
        scalar("fm-narrow", "<vfo>.fm_narrow", Complex),
        scalar("cw-dig-narrow", "<vfo>.cw_dig_narrow", Complex),
        scalar("agc-mode", "CONTROL.agc_mode", Default),
        scalar("nb", "CONTROL.noise_blank", Default),
        scalar("dnr", "CONTROL.noise_reduce", Default),
        scalar("dnf", "CONTROL.notch_auto", Default),
        scalar("dbf", "CONTROL.bandpass_filter", Default),
        Feature {
            name: "dbf-low",
            read_path: "CONTROL.bandpass_filter_band",
            write_path: Some("CONTROL.bandpass_filter_band"),
            class: Default,
            readable: true,
            valid_during_tx: true,
            valid_during_rx: true,
            decode: PairLow,
            encode: EncodeRule::PairLow,
            initial: None,
        },
        Feature {
            name: "dbf-high",
            read_path: "CONTROL.bandpass_filter_band",
            write_path: Some("CONTROL.bandpass_filter_band"),
            class: Default,
            readable: true,
            valid_during_tx: true,
            valid_during_rx: true,
            decode: PairHigh,
            encode: EncodeRule::PairHigh,
            initial: None,
        },
        scalar("preamp", "<vfo>.preamp", Complex),
        Feature {
            // The radio cannot report RIT; the hub re-sends its last
            // known value once per TTL window instead.
            name: "rit",
            read_path: "CONTROL.rit",
            write_path: Some("CONTROL.rit"),
            class: Complex,
            readable: false,
            valid_during_tx: true,
            valid_during_rx: true,
            decode: Passthrough,
            encode: EncodeRule::Passthrough,
            initial: Some("0.0"),
        },
        composite(
            "squelched",
            "CONTROL.rx_status",
            Complex,
            CompositeToken(1),
            false,
            true,
        ),
        composite(
            "ctcss-dcs-matched",
            "CONTROL.rx_status",
            Complex,
            CompositeToken(3),
            false,
            true,
        ),
        composite(
            "discrim-centered",
            "CONTROL.rx_status",
            Complex,
            CompositeToken(5),
            false,
            true,
        ),
        composite(
            "s-meter",
            "CONTROL.rx_status",
            Metering,
            CompositeToken(7),
            false,
            true,
        ),
        scalar("mic-gain", "CONTROL.mic_gain", Default),
        scalar("nom-power", "CONTROL.power", Default),
        scalar("sp-proc", "CONTROL.speech_proc", Default),
        composite(
            "act-power",
            "CONTROL.tx_metering",
            Metering,
            CompositeToken(1),
            true,
            false,
        ),
        composite(
            "alc",
            "CONTROL.tx_metering",
            Metering,
            CompositeToken(3),
            true,
            false,
        ),
        composite(
            "swr",
            "CONTROL.tx_metering",
            Metering,
            CompositeToken(5),
            true,
            false,
        ),
        composite(
            "mod",
            "CONTROL.tx_metering",
            Metering,
            CompositeToken(7),
            true,
            false,
        ),
        scalar("tone-mode", "<vfo>.tone_dcs_mode", Complex),
        scalar("tone-freq", "<vfo>.tone", Complex),
        scalar("rpt-offset", "<vfo>.repeater_offset_frequency", Complex),
        scalar("cw-delay", "CONTROL.cw_delay", Default),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_classes() {
        assert_eq!(TtlClass::Metering.ttl(), Duration::from_millis(400));
        assert_eq!(TtlClass::Important.ttl(), Duration::from_millis(2500));
        assert_eq!(TtlClass::Default.ttl(), Duration::from_secs(6));
        assert_eq!(TtlClass::Complex.ttl(), Duration::from_secs(15));
        assert_eq!(TtlClass::Metering.priority(), 10);
        assert_eq!(TtlClass::Complex.priority(), 1);
    }

    #[test]
    fn test_shared_path_merges_priority_and_ttl() {
        // CONTROL.rx_status is shared between three Complex features
        // (priority 1, TTL 15 s) and the s-meter (priority 10, TTL 0.4 s).
        let catalog = Catalog::ft897d();
        let meta = catalog
            .poll_paths()
            .iter()
            .find(|p| p.path == "CONTROL.rx_status")
            .expect("rx_status pollable");
        assert_eq!(meta.priority, 10);
        assert_eq!(meta.ttl, Duration::from_millis(400));
    }

    #[test]
    fn test_non_readable_feature_has_no_poll_path() {
        let catalog = Catalog::ft897d();
        assert!(catalog
            .poll_paths()
            .iter()
            .all(|p| p.path != "CONTROL.rit"));
        let rit = catalog.feature("rit").unwrap();
        assert!(!rit.readable);
        assert!(rit.writable());
        assert_eq!(rit.initial, Some("0.0"));
    }

    #[test]
    fn test_read_and_write_paths_differ_for_ptt() {
        let catalog = Catalog::ft897d();
        let ptt = catalog.feature("ptt").unwrap();
        assert_eq!(ptt.read_path, "CONTROL.tx_status");
        assert_eq!(ptt.write_path, Some("CONTROL.transmit"));
    }

    #[test]
    fn test_readers_of_composite_path() {
        let catalog = Catalog::ft897d();
        let readers = catalog.readers_of("CONTROL.rx_status");
        assert_eq!(readers.len(), 4);
        let names: Vec<&str> = readers
            .iter()
            .map(|&i| catalog.features()[i].name)
            .collect();
        assert!(names.contains(&"s-meter"));
        assert!(names.contains(&"squelched"));
    }

    #[test]
    fn test_resolve_path_substitutes_active_vfo() {
        assert_eq!(resolve_path("<vfo>.atten", "VFOB"), "VFOB.atten");
        assert_eq!(resolve_path("CONTROL.freq", "VFOA"), "CONTROL.freq");
    }

    #[test]
    fn test_metering_not_writable() {
        let catalog = Catalog::ft897d();
        for name in ["s-meter", "swr", "alc", "mod", "act-power", "high-swr"] {
            assert!(
                !catalog.feature(name).unwrap().writable(),
                "{} must not be writable",
                name
            );
        }
    }
}
