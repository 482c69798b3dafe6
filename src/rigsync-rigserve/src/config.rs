// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration for rigserved, loaded from the `[rigsync-rigserve]`
//! section of `rigsync.toml`.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use rigsync_app::ConfigFile;

/// Top-level rigserved configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigserveConfig {
    pub general: GeneralConfig,
    pub listen: ListenConfig,
    /// Rigs opened at startup.
    pub rigs: Vec<RigEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub listen: IpAddr,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::from([127, 0, 0, 1]),
            port: 14652,
        }
    }
}

/// One rig instance to open at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RigEntry {
    /// Backend model (e.g. "dummy").
    pub model: String,
    /// Session name clients address the rig by.
    pub name: String,
}

impl Default for RigEntry {
    fn default() -> Self {
        Self {
            model: "dummy".to_string(),
            name: "ft897d".to_string(),
        }
    }
}

impl ConfigFile for RigserveConfig {
    fn section_key() -> &'static str {
        "rigsync-rigserve"
    }
}

impl RigserveConfig {
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for rig in &self.rigs {
            if rig.name.is_empty() || rig.model.is_empty() {
                return Err("rig entries need both model and name".to_string());
            }
            if rig.name.contains('.') || rig.name.contains(' ') {
                return Err(format!("rig name '{}' must not contain '.' or spaces", rig.name));
            }
            if !seen.insert(&rig.name) {
                return Err(format!("duplicate rig name '{}'", rig.name));
            }
        }
        Ok(())
    }

    /// Generate an example `[rigsync-rigserve]` section as a TOML
    /// string.
    pub fn example_toml() -> String {
        let example = Self {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            rigs: vec![RigEntry::default()],
            ..Self::default()
        };
        toml::to_string_pretty(&example).unwrap_or_default()
    }
}
