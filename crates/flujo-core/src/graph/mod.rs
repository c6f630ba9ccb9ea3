//! The execution graph: node/edge storage, mutation API and tick driver.
//!
//! [`Graph`] owns the live network of nodes and cables. All mutation methods
//! are execution-thread-only: the graph is not internally synchronized, and
//! cross-thread safety is delegated entirely to the command bridge that feeds
//! it. The authoring layer never touches a `Graph` directly; it enqueues
//! commands that the executor applies between ticks.
//!
//! # Ordering
//!
//! A [`SchedulePolicy`] decides how the execution order is derived from the
//! edge set. Structural mutations mark the graph dirty; the next
//! [`rebuild()`](Graph::rebuild) (or the next tick) recomputes the order.
//! Delayed edges are excluded from the dependency relation, which is what
//! lets feedback loops coexist with a well-defined order. A rebuild that
//! cannot produce a valid order (a cycle with no delayed edge to break it)
//! is rejected: the previous valid order stays in force and the error is
//! surfaced to the caller.

mod exec;
mod order;

pub use order::SchedulePolicy;

use std::sync::Arc;

use thiserror::Error;

use crate::address::Address;
use crate::device::Parameter;
use crate::edge::{ConnectionKind, Edge, EdgeId, Payload};
use crate::node::{NodeEntry, NodeId, ProcessNode};
use crate::port::{Inlet, Outlet, PortRef};
use crate::state::ExecutionState;
use crate::value::Value;

/// Errors from structural graph mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The referenced node is not registered.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// A node with this id is already registered.
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),
    /// The referenced edge is not registered.
    #[error("edge {0} not found")]
    EdgeNotFound(EdgeId),
    /// An edge with this id is already registered.
    #[error("edge {0} already exists")]
    DuplicateEdgeId(EdgeId),
    /// An edge between these two ports already exists.
    #[error("an edge from {source:?} to {sink:?} already exists")]
    DuplicateEdge {
        /// Source outlet reference.
        source: PortRef,
        /// Sink inlet reference.
        sink: PortRef,
    },
    /// The port index does not exist on the node.
    #[error("port {port:?} is out of range ({direction})")]
    PortOutOfRange {
        /// The offending port reference.
        port: PortRef,
        /// `"outlet"` or `"inlet"`.
        direction: &'static str,
    },
    /// Source and sink ports carry different data kinds.
    #[error("port kinds differ between {source:?} and {sink:?}")]
    KindMismatch {
        /// Source outlet reference.
        source: PortRef,
        /// Sink inlet reference.
        sink: PortRef,
    },
}

/// Errors from schedule rebuilds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A cycle of non-delayed edges, which no policy can order.
    #[error("unbreakable cycle through nodes {nodes:?}; close feedback loops with delayed cables")]
    UnbreakableCycle {
        /// Members of the offending cycle.
        nodes: Vec<NodeId>,
    },
}

/// A fresh value on an observed outlet, collected after a tick for UI echo.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedValue {
    /// The producing node.
    pub node: NodeId,
    /// Outlet index on that node.
    pub outlet: usize,
    /// The value written this tick.
    pub value: Value,
}

/// The live dataflow graph.
pub struct Graph {
    nodes: Vec<Option<NodeEntry>>,
    edges: Vec<Option<Edge>>,
    policy: SchedulePolicy,
    parallel: bool,
    /// Node slots in execution order. Stale slots are skipped at tick time.
    order: Vec<usize>,
    /// Contiguous run lengths of `order` forming independent levels; empty
    /// unless parallel execution is active.
    level_sizes: Vec<usize>,
    dirty: bool,
    tick_index: u64,
    next_node_slot: u32,
    next_edge_slot: u32,
    /// Reusable per-node pull scratch for the serial executor.
    pull_scratch: Vec<Option<Payload>>,
}

impl Graph {
    /// Creates an empty graph with the given scheduling policy.
    pub fn new(policy: SchedulePolicy) -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            policy,
            parallel: false,
            order: Vec::new(),
            level_sizes: Vec::new(),
            dirty: false,
            tick_index: 0,
            next_node_slot: 0,
            next_edge_slot: 0,
            pull_scratch: Vec::new(),
        }
    }

    /// Enables parallel execution of independent node subsets.
    ///
    /// Only meaningful for the static policies; the dynamic policy ignores
    /// the flag with a warning, as that combination has no defined semantics.
    pub fn with_parallel_execution(mut self, parallel: bool) -> Self {
        if parallel && self.policy == SchedulePolicy::Dynamic {
            tracing::warn!("parallel execution is not supported with the dynamic policy; ignored");
            self.parallel = false;
        } else {
            self.parallel = parallel;
        }
        self
    }

    /// The scheduling policy this graph was built with.
    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    /// Whether independent node subsets run on worker threads.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    // --- Node mutations ---

    /// Registers a node, allocating its id.
    pub fn add_node(
        &mut self,
        node: Box<dyn ProcessNode + Send>,
        inlets: Vec<Inlet>,
        outlets: Vec<Outlet>,
    ) -> NodeId {
        let id = NodeId(self.next_node_slot);
        // Infallible: the slot was just allocated.
        let _ = self.insert_node(id, node, inlets, outlets);
        id
    }

    /// Registers a node under a caller-assigned id.
    ///
    /// Used by the command bridge, where ids are allocated on the authoring
    /// thread so later commands can reference the node before its creation
    /// has been applied here.
    pub fn insert_node(
        &mut self,
        id: NodeId,
        node: Box<dyn ProcessNode + Send>,
        inlets: Vec<Inlet>,
        outlets: Vec<Outlet>,
    ) -> Result<(), GraphError> {
        let idx = id.0 as usize;
        if idx >= self.nodes.len() {
            self.nodes.resize_with(idx + 1, || None);
        }
        if self.nodes[idx].is_some() {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes[idx] = Some(NodeEntry::new(id, node, inlets, outlets));
        self.next_node_slot = self.next_node_slot.max(id.0 + 1);
        self.mark_dirty();
        tracing::debug!(%id, "graph_add node");
        Ok(())
    }

    /// Unregisters a node, cascading to all its edges so no dangling edge can
    /// survive.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let idx = id.0 as usize;
        let entry = self
            .nodes
            .get(idx)
            .and_then(|n| n.as_ref())
            .ok_or(GraphError::NodeNotFound(id))?;

        let edge_ids: Vec<EdgeId> = entry
            .inlets
            .iter()
            .flat_map(|p| p.edges.iter())
            .chain(entry.outlets.iter().flat_map(|p| p.edges.iter()))
            .copied()
            .collect();

        for eid in edge_ids {
            self.disconnect_internal(eid);
        }

        self.nodes[idx] = None;
        self.mark_dirty();
        tracing::debug!(%id, "graph_remove node");
        Ok(())
    }

    /// Enables or disables a node. Disabled nodes are skipped at tick time;
    /// their outlets go stale, which strict downstream sinks see as
    /// "no value".
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), GraphError> {
        let entry = self
            .nodes
            .get_mut(id.0 as usize)
            .and_then(|n| n.as_mut())
            .ok_or(GraphError::NodeNotFound(id))?;
        entry.enabled = enabled;
        Ok(())
    }

    // --- Edge mutations ---

    /// Connects an outlet to an inlet with the given kind, allocating the
    /// edge id.
    pub fn connect(
        &mut self,
        source: PortRef,
        sink: PortRef,
        kind: ConnectionKind,
    ) -> Result<EdgeId, GraphError> {
        let id = EdgeId(self.next_edge_slot);
        self.insert_edge(id, source, sink, kind)?;
        Ok(id)
    }

    /// Connects an outlet to an inlet under a caller-assigned edge id.
    ///
    /// Cycles are allowed here: whether the resulting edge set can be ordered
    /// is decided at rebuild time, where a cycle without a delayed edge is
    /// rejected without touching the running order.
    pub fn insert_edge(
        &mut self,
        id: EdgeId,
        source: PortRef,
        sink: PortRef,
        kind: ConnectionKind,
    ) -> Result<(), GraphError> {
        let source_kind = {
            let entry = self
                .nodes
                .get(source.node.0 as usize)
                .and_then(|n| n.as_ref())
                .ok_or(GraphError::NodeNotFound(source.node))?;
            entry
                .outlets
                .get(source.index)
                .ok_or(GraphError::PortOutOfRange {
                    port: source,
                    direction: "outlet",
                })?
                .kind()
        };
        let sink_kind = {
            let entry = self
                .nodes
                .get(sink.node.0 as usize)
                .and_then(|n| n.as_ref())
                .ok_or(GraphError::NodeNotFound(sink.node))?;
            entry
                .inlets
                .get(sink.index)
                .ok_or(GraphError::PortOutOfRange {
                    port: sink,
                    direction: "inlet",
                })?
                .kind()
        };
        if source_kind != sink_kind {
            return Err(GraphError::KindMismatch { source, sink });
        }

        if self
            .edges
            .iter()
            .flatten()
            .any(|e| e.source == source && e.sink == sink)
        {
            return Err(GraphError::DuplicateEdge { source, sink });
        }

        let idx = id.0 as usize;
        if idx >= self.edges.len() {
            self.edges.resize_with(idx + 1, || None);
        }
        if self.edges[idx].is_some() {
            return Err(GraphError::DuplicateEdgeId(id));
        }
        self.edges[idx] = Some(Edge::new(id, source, sink, kind));
        self.next_edge_slot = self.next_edge_slot.max(id.0 + 1);

        // Register on both endpoint ports. Both lookups were validated above.
        if let Some(entry) = self.nodes[source.node.0 as usize].as_mut()
            && let Some(outlet) = entry.outlets.get_mut(source.index)
        {
            outlet.edges.push(id);
        }
        if let Some(entry) = self.nodes[sink.node.0 as usize].as_mut()
            && let Some(inlet) = entry.inlets.get_mut(sink.index)
        {
            inlet.edges.push(id);
        }

        self.mark_dirty();
        tracing::debug!(%id, kind = kind.name(), "graph_connect {:?} -> {:?}", source, sink);
        Ok(())
    }

    /// Disconnects an edge.
    pub fn disconnect(&mut self, id: EdgeId) -> Result<(), GraphError> {
        if self
            .edges
            .get(id.0 as usize)
            .and_then(|e| e.as_ref())
            .is_none()
        {
            return Err(GraphError::EdgeNotFound(id));
        }
        self.disconnect_internal(id);
        self.mark_dirty();
        tracing::debug!(%id, "graph_disconnect");
        Ok(())
    }

    fn disconnect_internal(&mut self, id: EdgeId) {
        let idx = id.0 as usize;
        if let Some(edge) = self.edges[idx].take() {
            if let Some(entry) = self
                .nodes
                .get_mut(edge.source.node.0 as usize)
                .and_then(|n| n.as_mut())
                && let Some(outlet) = entry.outlets.get_mut(edge.source.index)
            {
                outlet.edges.retain(|e| *e != id);
            }
            if let Some(entry) = self
                .nodes
                .get_mut(edge.sink.node.0 as usize)
                .and_then(|n| n.as_mut())
                && let Some(inlet) = entry.inlets.get_mut(edge.sink.index)
            {
                inlet.edges.retain(|e| *e != id);
            }
        }
    }

    // --- Port binding ---

    /// Rebinds an inlet to a new parameter target (or unbinds it).
    ///
    /// Applied as one assignment on the execution thread, so the port is
    /// never observed in a torn state.
    pub fn rebind_inlet(
        &mut self,
        port: PortRef,
        binding: Option<Arc<Parameter>>,
        address: Option<Address>,
    ) -> Result<(), GraphError> {
        let entry = self
            .nodes
            .get_mut(port.node.0 as usize)
            .and_then(|n| n.as_mut())
            .ok_or(GraphError::NodeNotFound(port.node))?;
        let inlet = entry
            .inlets
            .get_mut(port.index)
            .ok_or(GraphError::PortOutOfRange {
                port,
                direction: "inlet",
            })?;
        inlet.rebind(binding, address);
        Ok(())
    }

    /// Rebinds an outlet to a new parameter target (or unbinds it).
    pub fn rebind_outlet(
        &mut self,
        port: PortRef,
        binding: Option<Arc<Parameter>>,
        address: Option<Address>,
    ) -> Result<(), GraphError> {
        let entry = self
            .nodes
            .get_mut(port.node.0 as usize)
            .and_then(|n| n.as_mut())
            .ok_or(GraphError::NodeNotFound(port.node))?;
        let outlet = entry
            .outlets
            .get_mut(port.index)
            .ok_or(GraphError::PortOutOfRange {
                port,
                direction: "outlet",
            })?;
        outlet.rebind(binding, address);
        Ok(())
    }

    // --- Introspection ---

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Number of registered edges.
    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    /// Whether a node id is currently registered.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.0 as usize)
            .is_some_and(|n| n.is_some())
    }

    /// Whether an edge id is currently registered.
    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edges
            .get(id.0 as usize)
            .is_some_and(|e| e.is_some())
    }

    /// Iterates over the registered node ids.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().flatten().map(|n| n.id)
    }

    /// Iterates over the registered edge ids.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().flatten().map(|e| e.id)
    }

    /// Source and sink of an edge, if registered.
    pub fn edge_endpoints(&self, id: EdgeId) -> Option<(PortRef, PortRef)> {
        self.edges
            .get(id.0 as usize)
            .and_then(|e| e.as_ref())
            .map(|e| (e.source, e.sink))
    }

    /// Connection kind of an edge, if registered.
    pub fn edge_kind(&self, id: EdgeId) -> Option<ConnectionKind> {
        self.edges
            .get(id.0 as usize)
            .and_then(|e| e.as_ref())
            .map(|e| e.kind)
    }

    /// Borrows an inlet.
    pub fn inlet(&self, port: PortRef) -> Option<&Inlet> {
        self.nodes
            .get(port.node.0 as usize)?
            .as_ref()?
            .inlets
            .get(port.index)
    }

    /// Borrows an outlet.
    pub fn outlet(&self, port: PortRef) -> Option<&Outlet> {
        self.nodes
            .get(port.node.0 as usize)?
            .as_ref()?
            .outlets
            .get(port.index)
    }

    /// The current execution order as node ids. Empty until the first
    /// rebuild.
    pub fn execution_order(&self) -> Vec<NodeId> {
        self.order
            .iter()
            .filter_map(|&idx| self.nodes.get(idx).and_then(|n| n.as_ref()).map(|n| n.id))
            .collect()
    }

    /// Ticks executed since creation or the last [`clear()`](Self::clear).
    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    // --- Scheduling ---

    /// Flags the order as stale; the next rebuild or tick recomputes it.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether the order is stale relative to the structure.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Recomputes the execution order under the configured policy.
    ///
    /// On failure the previous valid order is kept and the error returned;
    /// the dirty flag clears either way so one mutation batch reports once.
    pub fn rebuild(&mut self) -> Result<(), ScheduleError> {
        self.dirty = false;
        let want_levels = self.parallel && self.policy != SchedulePolicy::Dynamic;
        let plan = order::build_order(&self.nodes, &self.edges, self.policy, want_levels)?;
        tracing::debug!(
            policy = self.policy.name(),
            nodes = plan.order.len(),
            levels = plan.level_sizes.len(),
            "graph_order rebuilt"
        );
        self.order = plan.order;
        self.level_sizes = plan.level_sizes;
        Ok(())
    }

    /// Executes one tick: rebuilds the order if needed (keeping the previous
    /// one on failure), advances the state clocks, then runs every enabled
    /// node exactly once in schedule order.
    ///
    /// Any mutation applied before this call is fully visible to every node
    /// of the tick; tick-time failures (unbound ports, vanished devices)
    /// degrade to "no value" and never abort the tick.
    pub fn tick(&mut self, state: &mut ExecutionState, dt: u64) {
        if self.dirty
            && let Err(e) = self.rebuild()
        {
            tracing::warn!(error = %e, "schedule rebuild failed; keeping previous order");
        }
        self.execute(state, dt);
    }

    /// Collects fresh values on observed outlets after a tick.
    pub fn collect_observed(&self, out: &mut Vec<ObservedValue>) {
        for entry in self.nodes.iter().flatten() {
            for (i, outlet) in entry.outlets.iter().enumerate() {
                if outlet.is_observed()
                    && outlet.written_at() == Some(self.tick_index)
                    && let Some(value) = outlet.value()
                {
                    out.push(ObservedValue {
                        node: entry.id,
                        outlet: i,
                        value: value.clone(),
                    });
                }
            }
        }
    }

    /// Rewinds runtime state without touching the structure: every node's
    /// internal state is reset, all delay buffers emptied and the tick
    /// counter zeroed. Restarting playback over an unchanged graph.
    pub fn reset(&mut self) {
        for entry in self.nodes.iter_mut().flatten() {
            entry.node.reset();
            for inlet in &mut entry.inlets {
                inlet.reset_runtime();
            }
            for outlet in &mut entry.outlets {
                outlet.reset_runtime();
            }
        }
        for edge in self.edges.iter_mut().flatten() {
            edge.delay.clear();
        }
        self.tick_index = 0;
        tracing::debug!("graph_reset");
    }

    /// Releases every node and edge and rewinds the tick counter.
    ///
    /// Used at session teardown; the graph afterwards behaves like a freshly
    /// constructed one (ids restart from zero for the next session).
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.order.clear();
        self.level_sizes.clear();
        self.tick_index = 0;
        self.next_node_slot = 0;
        self.next_edge_slot = 0;
        self.dirty = false;
        tracing::debug!("graph_clear");
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("policy", &self.policy)
            .field("parallel", &self.parallel)
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("tick_index", &self.tick_index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::RelayNode;

    fn relay() -> Box<dyn ProcessNode + Send> {
        Box::new(RelayNode::new())
    }

    fn one_in_one_out(graph: &mut Graph) -> NodeId {
        graph.add_node(relay(), vec![Inlet::value_port()], vec![Outlet::value_port()])
    }

    #[test]
    fn add_remove_nodes() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let a = one_in_one_out(&mut graph);
        let b = one_in_one_out(&mut graph);
        assert_eq!(graph.node_count(), 2);
        assert_ne!(a, b);

        graph.remove_node(a).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert!(matches!(
            graph.remove_node(a),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn removing_a_node_cascades_to_its_edges() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let a = one_in_one_out(&mut graph);
        let b = one_in_one_out(&mut graph);
        let e = graph
            .connect(
                PortRef::new(a, 0),
                PortRef::new(b, 0),
                ConnectionKind::ImmediateStrict,
            )
            .unwrap();

        graph.remove_node(a).unwrap();
        assert!(!graph.contains_edge(e));
        assert_eq!(graph.edge_count(), 0);
        // The surviving node's inlet no longer references the edge.
        assert!(graph.inlet(PortRef::new(b, 0)).unwrap().edges.is_empty());
    }

    #[test]
    fn duplicate_edges_are_rejected() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let a = one_in_one_out(&mut graph);
        let b = one_in_one_out(&mut graph);
        let src = PortRef::new(a, 0);
        let snk = PortRef::new(b, 0);

        graph
            .connect(src, snk, ConnectionKind::ImmediateStrict)
            .unwrap();
        assert!(matches!(
            graph.connect(src, snk, ConnectionKind::ImmediateGlutton),
            Err(GraphError::DuplicateEdge { .. })
        ));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let a = graph.add_node(relay(), vec![], vec![Outlet::signal_port()]);
        let b = graph.add_node(relay(), vec![Inlet::value_port()], vec![]);

        assert!(matches!(
            graph.connect(
                PortRef::new(a, 0),
                PortRef::new(b, 0),
                ConnectionKind::ImmediateStrict
            ),
            Err(GraphError::KindMismatch { .. })
        ));
    }

    #[test]
    fn out_of_range_ports_are_rejected() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let a = one_in_one_out(&mut graph);
        let b = one_in_one_out(&mut graph);

        assert!(matches!(
            graph.connect(
                PortRef::new(a, 3),
                PortRef::new(b, 0),
                ConnectionKind::ImmediateStrict
            ),
            Err(GraphError::PortOutOfRange { .. })
        ));
    }

    #[test]
    fn caller_assigned_ids_round_trip() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let id = NodeId::from_raw(7);
        graph
            .insert_node(id, relay(), vec![Inlet::value_port()], vec![
                Outlet::value_port(),
            ])
            .unwrap();
        assert!(graph.contains_node(id));
        // Self-allocating ids continue past the caller-assigned slot.
        let next = one_in_one_out(&mut graph);
        assert_eq!(next.index(), 8);

        assert!(matches!(
            graph.insert_node(id, relay(), vec![], vec![]),
            Err(GraphError::DuplicateNode(_))
        ));
    }

    #[test]
    fn clear_resets_everything() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let a = one_in_one_out(&mut graph);
        let b = one_in_one_out(&mut graph);
        graph
            .connect(
                PortRef::new(a, 0),
                PortRef::new(b, 0),
                ConnectionKind::ImmediateStrict,
            )
            .unwrap();
        let mut state = ExecutionState::new();
        graph.tick(&mut state, 64);
        assert_eq!(graph.tick_index(), 1);

        graph.clear();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.tick_index(), 0);
        // Ids restart for the next session.
        let fresh = one_in_one_out(&mut graph);
        assert_eq!(fresh.index(), 0);
    }

    #[test]
    fn disabled_nodes_do_not_write() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let src = graph.add_node(
            Box::new(crate::nodes::SequenceNode::repeat(Value::Int(1))),
            vec![],
            vec![Outlet::value_port()],
        );
        graph.set_enabled(src, false).unwrap();

        let mut state = ExecutionState::new();
        graph.tick(&mut state, 1);
        assert_eq!(graph.outlet(PortRef::new(src, 0)).unwrap().written_at(), None);

        graph.set_enabled(src, true).unwrap();
        graph.tick(&mut state, 1);
        assert_eq!(
            graph.outlet(PortRef::new(src, 0)).unwrap().written_at(),
            Some(2)
        );
    }

    #[test]
    fn observed_outlets_are_collected() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let src = graph.add_node(
            Box::new(crate::nodes::SequenceNode::repeat(Value::Int(9))),
            vec![],
            vec![Outlet::value_port().observed(true)],
        );

        let mut state = ExecutionState::new();
        graph.tick(&mut state, 1);

        let mut seen = Vec::new();
        graph.collect_observed(&mut seen);
        assert_eq!(seen, vec![ObservedValue {
            node: src,
            outlet: 0,
            value: Value::Int(9),
        }]);
    }

    #[test]
    fn rebind_is_a_single_swap() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let n = one_in_one_out(&mut graph);
        let port = PortRef::new(n, 0);

        let param = Arc::new(crate::device::Parameter::new("/x", Value::Int(0)));
        graph
            .rebind_inlet(port, Some(Arc::clone(&param)), Some(Address::new("d", "/x")))
            .unwrap();
        assert!(graph.inlet(port).unwrap().binding().is_some());

        graph.rebind_inlet(port, None, None).unwrap();
        assert!(graph.inlet(port).unwrap().binding().is_none());
        assert!(graph.inlet(port).unwrap().address().is_none());
    }

    #[test]
    fn reset_rewinds_runtime_state_only() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let src = graph.add_node(
            Box::new(crate::nodes::SequenceNode::new(vec![
                Some(Value::Int(1)),
                Some(Value::Int(2)),
            ])),
            vec![],
            vec![Outlet::value_port()],
        );
        let mut state = ExecutionState::new();
        graph.tick(&mut state, 1);
        graph.tick(&mut state, 1);
        assert_eq!(graph.tick_index(), 2);

        graph.reset();
        assert_eq!(graph.tick_index(), 0);
        assert_eq!(graph.node_count(), 1);
        // No stale freshness survives the rewind.
        assert_eq!(graph.outlet(PortRef::new(src, 0)).unwrap().written_at(), None);

        // The sequence starts over from its first step.
        graph.tick(&mut state, 1);
        assert_eq!(
            graph.outlet(PortRef::new(src, 0)).unwrap().value(),
            Some(&Value::Int(1))
        );
    }
}
