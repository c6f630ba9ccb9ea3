//! Per-session execution state: transport clock and registered endpoints.
//!
//! [`ExecutionState`] is the context object every tick runs against. It is
//! created when a playback session starts, reset when it stops, and touched
//! only by the execution thread. It holds the logical clock (sample counter
//! and dates) plus the set of devices and live inlets currently registered,
//! so address resolution has one well-defined place to look.

use std::sync::{Arc, Weak};

use crate::address::Address;
use crate::device::{Device, Parameter};
use crate::port::PortRef;

/// Logical time, counted in samples since an arbitrary origin.
pub type TimeValue = u64;

/// Transport clock and endpoint registry for one playback session.
///
/// Time is monotonic non-decreasing within a session and resets to zero on
/// session (re)start. Devices are held weakly: the device layer owns their
/// lifetime, and a dropped device simply stops resolving.
#[derive(Debug, Default)]
pub struct ExecutionState {
    samples_since_start: u64,
    start_date: TimeValue,
    cur_date: TimeValue,
    devices: Vec<Weak<Device>>,
    inlets: Vec<PortRef>,
}

impl ExecutionState {
    /// Creates a fresh state with zeroed clocks and no registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears clocks, the device set and the inlet registry.
    ///
    /// Safe to call while nodes are still registered in a graph: their bound
    /// ports keep working, but new address lookups fail until devices are
    /// re-registered, leaving freshly rebound ports unbound.
    pub fn reset(&mut self) {
        self.samples_since_start = 0;
        self.start_date = 0;
        self.cur_date = 0;
        self.devices.clear();
        self.inlets.clear();
    }

    /// Advances the clock by `dt` samples.
    pub fn advance(&mut self, dt: u64) {
        self.samples_since_start += dt;
        self.cur_date += dt;
    }

    /// Samples elapsed since the session started.
    pub fn samples_since_start(&self) -> u64 {
        self.samples_since_start
    }

    /// The session's start date.
    pub fn start_date(&self) -> TimeValue {
        self.start_date
    }

    /// The current logical date.
    pub fn cur_date(&self) -> TimeValue {
        self.cur_date
    }

    /// Registers a device endpoint for address resolution.
    ///
    /// Idempotent per device instance: registering the same `Arc` twice keeps
    /// a single entry.
    pub fn register_device(&mut self, device: &Arc<Device>) {
        let already = self
            .devices
            .iter()
            .filter_map(Weak::upgrade)
            .any(|d| Arc::ptr_eq(&d, device));
        if !already {
            tracing::debug!(device = device.name(), "state_register_device");
            self.devices.push(Arc::downgrade(device));
        }
    }

    /// Number of registered devices still alive.
    pub fn device_count(&self) -> usize {
        self.devices.iter().filter(|d| d.strong_count() > 0).count()
    }

    /// Finds a live device by name.
    pub fn find_device(&self, name: &str) -> Option<Arc<Device>> {
        self.devices
            .iter()
            .filter_map(Weak::upgrade)
            .find(|d| d.name() == name)
    }

    /// Resolves a symbolic address to a live parameter handle.
    ///
    /// Walks the registered device set; a missing device or unknown path
    /// yields `None`, which callers treat as "port unbound" rather than an
    /// error.
    pub fn find_parameter(&self, address: &Address) -> Option<Arc<Parameter>> {
        self.devices
            .iter()
            .filter_map(Weak::upgrade)
            .find_map(|d| d.resolve(address))
    }

    /// Records a port as a live input for value propagation.
    pub fn register_inlet(&mut self, port: PortRef) {
        if !self.inlets.contains(&port) {
            self.inlets.push(port);
        }
    }

    /// Removes all inlet registrations belonging to `node`.
    pub fn unregister_node_inlets(&mut self, node: crate::node::NodeId) {
        self.inlets.retain(|p| p.node != node);
    }

    /// The ports currently registered as live inputs.
    pub fn registered_inlets(&self) -> &[PortRef] {
        &self.inlets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use crate::value::Value;

    #[test]
    fn clock_advances_and_resets() {
        let mut state = ExecutionState::new();
        state.advance(64);
        state.advance(32);
        assert_eq!(state.samples_since_start(), 96);
        assert_eq!(state.cur_date(), 96);

        state.reset();
        assert_eq!(state.samples_since_start(), 0);
        assert_eq!(state.cur_date(), 0);
    }

    #[test]
    fn device_registration_is_idempotent() {
        let mut state = ExecutionState::new();
        let mut dev = Device::new("d");
        dev.insert("/p", Value::Int(0));
        let dev = Arc::new(dev);

        state.register_device(&dev);
        state.register_device(&dev);
        assert_eq!(state.device_count(), 1);
    }

    #[test]
    fn dead_devices_stop_resolving() {
        let mut state = ExecutionState::new();
        let addr = Address::new("d", "/p");
        {
            let mut dev = Device::new("d");
            dev.insert("/p", Value::Int(1));
            let dev = Arc::new(dev);
            state.register_device(&dev);
            assert!(state.find_parameter(&addr).is_some());
        }
        // The Arc is gone; the weak registration must fail softly.
        assert!(state.find_parameter(&addr).is_none());
        assert_eq!(state.device_count(), 0);
    }

    #[test]
    fn inlet_registry() {
        let mut state = ExecutionState::new();
        let a = PortRef::new(NodeId::from_raw(1), 0);
        let b = PortRef::new(NodeId::from_raw(2), 0);
        state.register_inlet(a);
        state.register_inlet(a);
        state.register_inlet(b);
        assert_eq!(state.registered_inlets().len(), 2);

        state.unregister_node_inlets(NodeId::from_raw(1));
        assert_eq!(state.registered_inlets(), &[b]);
    }
}
