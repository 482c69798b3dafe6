// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod logging;
mod util;

pub use config::{ConfigError, ConfigFile};
pub use logging::init_logging;
pub use util::normalize_name;
