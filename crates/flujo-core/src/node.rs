//! Graph node identity and the node processing capability.
//!
//! A node is a computational unit with typed input and output ports. The
//! graph stores nodes behind the object-safe [`ProcessNode`] trait: each tick
//! it hands the node its inlets (already filled by the connection policy) and
//! its outlets (to be written), plus a [`TickContext`] describing logical
//! time. Concrete node kinds live in [`crate::nodes`] and in downstream
//! crates.

use crate::port::{Inlet, Outlet};

/// Unique identifier for a node in the execution graph.
///
/// Ids index slots in the graph's node storage and are never reused within a
/// graph instance. They may be allocated by the graph itself or pre-assigned
/// by an orchestration layer that needs to reference a node before its
/// creation command reaches the execution thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Creates an id from a raw slot number.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw slot number.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Logical-time context passed to every node invocation.
#[derive(Clone, Copy, Debug)]
pub struct TickContext {
    /// Tick counter, starting at 1 for the first tick of a session.
    /// Freshness stamps on ports and delayed edges compare against this.
    pub tick: u64,
    /// Current logical date in samples.
    pub date: u64,
    /// Samples advanced by this tick. Driven externally; not assumed constant.
    pub dt: u64,
}

/// The processing capability implemented by every node kind.
///
/// `process` is invoked exactly once per tick, after the connection policy
/// has made the tick's input values visible on `inlets`. Writing an outlet
/// marks it fresh for this tick; leaving it unwritten is the explicit
/// "no value" case that strict connections propagate as such.
///
/// Implementations must not block: they run on the execution thread inside
/// the tick budget.
pub trait ProcessNode {
    /// A short human-readable label used in traces.
    fn label(&self) -> &str {
        "node"
    }

    /// Runs one tick of this node.
    fn process(&mut self, inlets: &mut [Inlet], outlets: &mut [Outlet], ctx: &TickContext);

    /// Clears internal state on session teardown. Optional.
    fn reset(&mut self) {}
}

/// Storage for one registered node: the boxed processor plus its ports and
/// per-node bookkeeping.
pub(crate) struct NodeEntry {
    pub id: NodeId,
    pub node: Box<dyn ProcessNode + Send>,
    pub inlets: Vec<Inlet>,
    pub outlets: Vec<Outlet>,
    /// Disabled nodes are skipped by the executor; their outlets stay stale.
    pub enabled: bool,
}

impl NodeEntry {
    pub fn new(
        id: NodeId,
        node: Box<dyn ProcessNode + Send>,
        inlets: Vec<Inlet>,
        outlets: Vec<Outlet>,
    ) -> Self {
        Self {
            id,
            node,
            inlets,
            outlets,
            enabled: true,
        }
    }
}

impl std::fmt::Debug for NodeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeEntry")
            .field("id", &self.id)
            .field("label", &self.node.label())
            .field("inlets", &self.inlets.len())
            .field("outlets", &self.outlets.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}
