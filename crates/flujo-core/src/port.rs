//! Node ports: typed connection points with optional device bindings.
//!
//! Every node owns an ordered list of [`Inlet`]s and [`Outlet`]s. A port
//! carries either a control [`Value`] or a [`SignalBuffer`] block, decided at
//! construction and enforced when cables are connected. A port may also be
//! bound to a live device [`Parameter`]: bound inlets pull the parameter's
//! value when no cable delivers one, bound outlets push what they produce.
//!
//! Rebinding replaces the whole binding in a single assignment on the
//! execution thread, so a port is always either bound to its old target or
//! its new one, never somewhere in between.

use std::sync::Arc;

use crate::address::Address;
use crate::device::Parameter;
use crate::edge::{EdgeId, Payload};
use crate::node::{NodeId, TickContext};
use crate::value::{SignalBuffer, Value};

/// Whether a port carries control values or signal blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortKind {
    /// One optional [`Value`] per tick.
    Value,
    /// A block of samples per tick.
    Signal,
}

/// The data slot inside a port.
#[derive(Clone, Debug)]
pub(crate) enum PortData {
    /// Control slot; `None` is the explicit "no value this tick" marker.
    Value(Option<Value>),
    /// Signal slot; an empty buffer means silence/no block this tick.
    Signal(SignalBuffer),
}

impl PortData {
    fn new(kind: PortKind) -> Self {
        match kind {
            PortKind::Value => PortData::Value(None),
            PortKind::Signal => PortData::Signal(SignalBuffer::new()),
        }
    }

    fn kind(&self) -> PortKind {
        match self {
            PortData::Value(_) => PortKind::Value,
            PortData::Signal(_) => PortKind::Signal,
        }
    }

    fn clear(&mut self) {
        match self {
            PortData::Value(v) => *v = None,
            PortData::Signal(s) => s.clear(),
        }
    }
}

/// Identifies one port of one node, by direction-specific index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortRef {
    /// The owning node.
    pub node: NodeId,
    /// Index into the node's inlet or outlet list.
    pub index: usize,
}

impl PortRef {
    /// Creates a port reference.
    pub fn new(node: NodeId, index: usize) -> Self {
        Self { node, index }
    }
}

/// An input port.
#[derive(Debug)]
pub struct Inlet {
    data: PortData,
    address: Option<Address>,
    binding: Option<Arc<Parameter>>,
    /// Incoming edges, in connection order.
    pub(crate) edges: Vec<EdgeId>,
}

impl Inlet {
    /// Creates a control-value inlet.
    pub fn value_port() -> Self {
        Self::new(PortKind::Value)
    }

    /// Creates a signal inlet.
    pub fn signal_port() -> Self {
        Self::new(PortKind::Signal)
    }

    fn new(kind: PortKind) -> Self {
        Self {
            data: PortData::new(kind),
            address: None,
            binding: None,
            edges: Vec::new(),
        }
    }

    /// Attaches a symbolic address, kept for later (re)binding.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Attaches a resolved parameter binding.
    pub fn with_binding(mut self, parameter: Arc<Parameter>) -> Self {
        self.binding = Some(parameter);
        self
    }

    /// The port's kind.
    pub fn kind(&self) -> PortKind {
        self.data.kind()
    }

    /// The value delivered this tick, if any.
    pub fn value(&self) -> Option<&Value> {
        match &self.data {
            PortData::Value(v) => v.as_ref(),
            PortData::Signal(_) => None,
        }
    }

    /// The signal block delivered this tick; `None` when empty or a value port.
    pub fn signal(&self) -> Option<&SignalBuffer> {
        match &self.data {
            PortData::Signal(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// The symbolic address attached to this port.
    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// The live parameter this port is bound to.
    pub fn binding(&self) -> Option<&Arc<Parameter>> {
        self.binding.as_ref()
    }

    /// Replaces binding and address together. Execution-thread only.
    pub(crate) fn rebind(&mut self, binding: Option<Arc<Parameter>>, address: Option<Address>) {
        self.binding = binding;
        self.address = address;
    }

    /// Drops the delivered data. Bindings and addresses survive.
    pub(crate) fn reset_runtime(&mut self) {
        self.data.clear();
    }

    /// Writes the pulled payload for this tick, clearing on `None`.
    pub(crate) fn accept(&mut self, payload: Option<Payload>) {
        match (payload, &mut self.data) {
            (Some(Payload::Value(v)), PortData::Value(slot)) => *slot = Some(v),
            (Some(Payload::Signal(s)), PortData::Signal(buf)) => *buf = SignalBuffer::from(s),
            (None, data) => data.clear(),
            (Some(_), data) => {
                // Kind mismatches are rejected at connect time; tolerate here.
                debug_assert!(false, "payload kind does not match inlet kind");
                data.clear();
            }
        }
    }
}

/// An output port.
#[derive(Debug)]
pub struct Outlet {
    data: PortData,
    address: Option<Address>,
    binding: Option<Arc<Parameter>>,
    observed: bool,
    written_at: Option<u64>,
    /// Outgoing edges, in connection order.
    pub(crate) edges: Vec<EdgeId>,
}

impl Outlet {
    /// Creates a control-value outlet.
    pub fn value_port() -> Self {
        Self::new(PortKind::Value)
    }

    /// Creates a signal outlet.
    pub fn signal_port() -> Self {
        Self::new(PortKind::Signal)
    }

    fn new(kind: PortKind) -> Self {
        Self {
            data: PortData::new(kind),
            address: None,
            binding: None,
            observed: false,
            written_at: None,
            edges: Vec::new(),
        }
    }

    /// Attaches a symbolic address, kept for later (re)binding.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Attaches a resolved parameter binding.
    pub fn with_binding(mut self, parameter: Arc<Parameter>) -> Self {
        self.binding = Some(parameter);
        self
    }

    /// Flags the port for UI feedback: fresh values are echoed to the
    /// authoring thread after each tick.
    pub fn observed(mut self, observed: bool) -> Self {
        self.observed = observed;
        self
    }

    /// The port's kind.
    pub fn kind(&self) -> PortKind {
        self.data.kind()
    }

    /// Writes a value for the current tick. Call at most once per tick;
    /// leaving the port unwritten is the explicit "no value" case.
    pub fn write(&mut self, value: Value, ctx: &TickContext) {
        match &mut self.data {
            PortData::Value(slot) => {
                *slot = Some(value);
                self.written_at = Some(ctx.tick);
            }
            PortData::Signal(_) => {
                debug_assert!(false, "write() called on a signal outlet");
            }
        }
    }

    /// Borrows the signal block for writing, marking the port fresh for the
    /// current tick.
    pub fn signal_mut(&mut self, ctx: &TickContext) -> Option<&mut SignalBuffer> {
        match &mut self.data {
            PortData::Signal(buf) => {
                self.written_at = Some(ctx.tick);
                Some(buf)
            }
            PortData::Value(_) => {
                debug_assert!(false, "signal_mut() called on a value outlet");
                None
            }
        }
    }

    /// The most recently produced value, fresh or stale.
    pub fn value(&self) -> Option<&Value> {
        match &self.data {
            PortData::Value(v) => v.as_ref(),
            PortData::Signal(_) => None,
        }
    }

    /// The tick index of the last write, if any.
    pub fn written_at(&self) -> Option<u64> {
        self.written_at
    }

    /// Whether this port echoes fresh values to the authoring thread.
    pub fn is_observed(&self) -> bool {
        self.observed
    }

    /// The symbolic address attached to this port.
    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// The live parameter this port is bound to.
    pub fn binding(&self) -> Option<&Arc<Parameter>> {
        self.binding.as_ref()
    }

    /// Replaces binding and address together. Execution-thread only.
    pub(crate) fn rebind(&mut self, binding: Option<Arc<Parameter>>, address: Option<Address>) {
        self.binding = binding;
        self.address = address;
    }

    /// Drops the produced data and its freshness stamp. Without this, a
    /// rewound tick counter could mistake a stale value for a fresh one.
    pub(crate) fn reset_runtime(&mut self) {
        self.data.clear();
        self.written_at = None;
    }

    /// Payload written during `tick`, if the port is fresh.
    pub(crate) fn fresh_payload(&self, tick: u64) -> Option<Payload> {
        if self.written_at == Some(tick) {
            self.latest_payload()
        } else {
            None
        }
    }

    /// The latest payload ever produced, regardless of freshness.
    pub(crate) fn latest_payload(&self) -> Option<Payload> {
        match &self.data {
            PortData::Value(v) => v.clone().map(Payload::Value),
            PortData::Signal(s) => {
                if self.written_at.is_some() {
                    Some(Payload::Signal(s.samples().to_vec()))
                } else {
                    None
                }
            }
        }
    }
}
