//! Live device endpoints: parameter trees the engine binds ports to.
//!
//! A [`Device`] is a named collection of [`Parameter`]s addressed by
//! `/`-separated paths. Devices are built and owned by the device layer; the
//! execution engine only holds weak references and resolves
//! [`Address`](crate::address::Address)es against whatever is currently
//! registered. A device vanishing mid-session therefore degrades to failed
//! resolution, never to a crash.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::address::Address;
use crate::value::Value;

/// A live parameter: one addressable datum on a device.
///
/// The current value sits behind a short mutex. Writers are the execution
/// thread (bound outlets) and the device layer (external updates); the
/// critical section is a single clone, so contention is negligible. The
/// node-to-node hot path never touches a parameter.
#[derive(Debug)]
pub struct Parameter {
    path: String,
    value: Mutex<Value>,
}

impl Parameter {
    /// Creates a parameter at `path` holding `initial`.
    pub fn new(path: impl Into<String>, initial: Value) -> Self {
        Self {
            path: path.into(),
            value: Mutex::new(initial),
        }
    }

    /// The parameter's path within its device, with leading `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a clone of the current value.
    pub fn value(&self) -> Value {
        self.value.lock().clone()
    }

    /// Replaces the current value.
    pub fn set(&self, value: Value) {
        *self.value.lock() = value;
    }
}

/// A named tree of parameters, flattened to a path map.
///
/// Built mutable, then shared as `Arc<Device>` with the engine. Restructuring
/// a device means building a new one and re-registering it; parameter handles
/// from the old device keep working for whoever still holds them.
#[derive(Debug, Default)]
pub struct Device {
    name: String,
    parameters: BTreeMap<String, Arc<Parameter>>,
}

impl Device {
    /// Creates an empty device named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// The device name, as matched against [`Address::device`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a parameter at `path` with an initial value, returning its handle.
    ///
    /// The path is normalized to start with `/`. Inserting an existing path
    /// replaces the old parameter.
    pub fn insert(&mut self, path: impl Into<String>, initial: Value) -> Arc<Parameter> {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        let param = Arc::new(Parameter::new(path.clone(), initial));
        self.parameters.insert(path, Arc::clone(&param));
        param
    }

    /// Looks up the parameter at `path`, if present.
    pub fn parameter(&self, path: &str) -> Option<&Arc<Parameter>> {
        self.parameters.get(path)
    }

    /// Resolves an address against this device.
    ///
    /// Returns `None` when the address names a different device or an unknown
    /// path. The index qualifier does not participate in resolution; it
    /// selects an element of the resolved value at read time.
    pub fn resolve(&self, address: &Address) -> Option<Arc<Parameter>> {
        if address.device() != self.name {
            return None;
        }
        self.parameters.get(address.path()).cloned()
    }

    /// Number of parameters on this device.
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Iterates over `(path, parameter)` pairs in path order.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Arc<Parameter>)> {
        self.parameters.iter().map(|(p, v)| (p.as_str(), v))
    }
}
