// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::time::Instant;

/// A synchronized feature value as carried on the wire.
///
/// `Unset` means the feature was never observed; `Invalid` is the `?`
/// wire value used for features that are unreadable in the current
/// transmit/receive state or whose last read failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Unset,
    Invalid,
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            _ => f.write_str("?"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        match s {
            "?" => Value::Invalid,
            _ => Value::Text(s.to_string()),
        }
    }
}

/// A value together with the instant it was last observed or written.
#[derive(Debug, Clone)]
pub struct Sample {
    pub value: Value,
    pub at: Option<Instant>,
}

impl Sample {
    pub fn unset() -> Self {
        Self {
            value: Value::Unset,
            at: None,
        }
    }

    pub fn new(value: Value, at: Instant) -> Self {
        Self {
            value,
            at: Some(at),
        }
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::unset()
    }
}
