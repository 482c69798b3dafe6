// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Capability-described rig backends.
//!
//! A backend is a flat table mapping external feature paths to get/put
//! handlers over a model-specific state struct; there is no inheritance
//! chain. `test` answers from the table alone.

use std::collections::HashMap;

mod dummy;

pub use dummy::{new_dummy, DummyState};

/// `Ok` carries the reply value; `Err` carries NAK explanatory text.
pub type BackendReply = Result<String, String>;

pub const NO_READ: &str = "Read attempted to write-only function";
pub const NO_WRITE: &str = "Write attempted to read-only function";
pub const NOT_DEF: &str = "Operation not defined.";

/// Handlers for one external path. Either direction may be absent.
pub struct FeatureOps<T> {
    pub get: Option<fn(&T, &str) -> BackendReply>,
    pub put: Option<fn(&mut T, &str, &str) -> BackendReply>,
}

/// An open rig session, as seen by the control server.
pub trait RigSession: Send {
    fn model(&self) -> &str;
    fn get(&mut self, path: &str) -> BackendReply;
    fn put(&mut self, path: &str, value: &str) -> BackendReply;
    fn test(&self, path: &str) -> BackendReply;
}

/// A rig described entirely by its feature table.
pub struct CapabilityRig<T> {
    model: String,
    state: T,
    table: HashMap<String, FeatureOps<T>>,
}

impl<T> CapabilityRig<T> {
    pub fn new(model: impl Into<String>, state: T) -> Self {
        Self {
            model: model.into(),
            state,
            table: HashMap::new(),
        }
    }

    /// Register handlers for a path. Later registrations replace
    /// earlier ones.
    pub fn with_ops(mut self, path: impl Into<String>, ops: FeatureOps<T>) -> Self {
        self.table.insert(path.into(), ops);
        self
    }

    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.table.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

impl<T: Send> RigSession for CapabilityRig<T> {
    fn model(&self) -> &str {
        &self.model
    }

    fn get(&mut self, path: &str) -> BackendReply {
        match self.table.get(path) {
            Some(FeatureOps { get: Some(op), .. }) => op(&self.state, path),
            Some(_) => Err(NO_READ.to_string()),
            None => Err(NOT_DEF.to_string()),
        }
    }

    fn put(&mut self, path: &str, value: &str) -> BackendReply {
        match self.table.get(path) {
            Some(FeatureOps { put: Some(op), .. }) => op(&mut self.state, path, value),
            Some(_) => Err(NO_WRITE.to_string()),
            None => Err(NOT_DEF.to_string()),
        }
    }

    fn test(&self, path: &str) -> BackendReply {
        if self.table.contains_key(path) {
            Ok("OK".to_string())
        } else {
            Err(NOT_DEF.to_string())
        }
    }
}

pub type BackendFactory = fn() -> Box<dyn RigSession>;

/// Registry of backend factories keyed by normalized model name.
#[derive(Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend factory under a stable name (e.g. "dummy").
    pub fn register_backend(&mut self, name: &str, factory: BackendFactory) {
        self.factories.insert(normalize_name(name), factory);
    }

    pub fn is_backend_registered(&self, name: &str) -> bool {
        self.factories.contains_key(&normalize_name(name))
    }

    pub fn registered_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate a rig backend by model name.
    pub fn build_rig(&self, name: &str) -> Result<Box<dyn RigSession>, String> {
        let factory = self
            .factories
            .get(&normalize_name(name))
            .ok_or_else(|| format!("Unknown rig backend: {}", name))?;
        Ok(factory())
    }
}

fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Register all built-in backends on a registry.
pub fn register_builtin_backends_on(registry: &mut BackendRegistry) {
    registry.register_backend("dummy", || Box::new(dummy::new_dummy()));
}
