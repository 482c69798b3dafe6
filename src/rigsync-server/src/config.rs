// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for rigsyncd.
//!
//! Config is loaded from the `[rigsync-server]` section of
//! `rigsync.toml`. Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./rigsync.toml`
//! 3. `~/.config/rigsync/rigsync.toml`
//! 4. `/etc/rigsync/rigsync.toml`

use std::net::IpAddr;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use rigsync_app::ConfigFile;

/// Top-level hub configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Client listener and UDP fan-out
    pub hub: HubConfig,
    /// Control connection to the rigserve server
    pub control: ControlConfig,
    /// Tick pacing and timeouts
    pub behavior: BehaviorConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Client listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// IP address for the client TCP listener
    pub listen: IpAddr,
    /// Port for the client TCP listener
    pub port: u16,
    /// UDP port on each client host that broadcasts are sent to
    pub client_udp_port: u16,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::from([127, 0, 0, 1]),
            port: 14653,
            client_udp_port: 14654,
        }
    }
}

/// Control connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// rigserve host
    pub host: String,
    /// rigserve port
    pub port: u16,
    /// Name of the rig session to drive
    pub rig: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 14652,
            rig: "ft897d".to_string(),
        }
    }
}

/// Network latency profile: fixes the per-tick readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LatencyProfile {
    Low,
    High,
}

impl LatencyProfile {
    pub fn tick_wait(self) -> Duration {
        match self {
            LatencyProfile::Low => Duration::from_millis(5),
            LatencyProfile::High => Duration::from_millis(50),
        }
    }
}

/// Tick pacing and timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Latency profile ("low" or "high")
    pub latency: LatencyProfile,
    /// Timeout for one control-channel round trip (ms)
    pub control_timeout_ms: u64,
    /// Connect attempts to the rigserve server before giving up
    pub connect_attempts: u32,
    /// Bind attempts for the client listener before giving up
    pub bind_attempts: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            latency: LatencyProfile::Low,
            control_timeout_ms: 1500,
            connect_attempts: 65,
            bind_attempts: 65,
        }
    }
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "rigsync-server"
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.control.rig.is_empty() {
            return Err("control.rig must not be empty".to_string());
        }
        if self.control.rig.contains('.') || self.control.rig.contains(' ') {
            return Err("control.rig must not contain '.' or spaces".to_string());
        }
        if self.hub.port == 0 || self.hub.client_udp_port == 0 || self.control.port == 0 {
            return Err("ports must be non-zero".to_string());
        }
        if self.behavior.connect_attempts == 0 || self.behavior.bind_attempts == 0 {
            return Err("retry attempt counts must be non-zero".to_string());
        }
        Ok(())
    }

    /// Generate an example `[rigsync-server]` section as a TOML string.
    pub fn example_toml() -> String {
        let example = Self {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            ..Self::default()
        };
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ServerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.hub.port, 14653);
        assert_eq!(cfg.hub.client_udp_port, 14654);
        assert_eq!(cfg.control.port, 14652);
        assert_eq!(cfg.behavior.latency, LatencyProfile::Low);
    }

    #[test]
    fn test_latency_profiles() {
        assert_eq!(LatencyProfile::Low.tick_wait(), Duration::from_millis(5));
        assert_eq!(LatencyProfile::High.tick_wait(), Duration::from_millis(50));
    }

    #[test]
    fn test_validate_rejects_dotted_rig_name() {
        let mut cfg = ServerConfig::default();
        cfg.control.rig = "a.b".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_example_toml_parses_back() {
        let example = ServerConfig::example_toml();
        let config: ServerConfig = toml::from_str(&example).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_section_parse_with_overrides() {
        let toml_str = r#"
            [hub]
            port = 15000

            [behavior]
            latency = "high"
        "#;
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.hub.port, 15000);
        assert_eq!(cfg.behavior.latency, LatencyProfile::High);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.control.port, 14652);
    }
}
