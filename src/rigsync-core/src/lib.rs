// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod catalog;
pub mod decode;
pub mod diff;
pub mod router;
pub mod sched;
pub mod store;
pub mod value;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use catalog::{Catalog, Feature, PathMeta, TtlClass};
pub use decode::{DecodeRule, EncodeRule};
pub use diff::Diff;
pub use router::{ClientId, RoutedTick};
pub use store::{ClientState, DeviceState, LinkState};
pub use value::{Sample, Value};
