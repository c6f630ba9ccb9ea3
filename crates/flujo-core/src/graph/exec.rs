//! Tick execution: value propagation, node processing, delayed latching.
//!
//! Each tick runs every enabled node exactly once in schedule order. Per
//! node, three phases keep the borrows disjoint and the semantics explicit:
//!
//! 1. **pull** — compute what each inlet sees this tick from its incoming
//!    edges' kinds (and from the bound parameter when the inlet has no
//!    cables). Reads only.
//! 2. **process** — write the pulled values into the inlets and invoke the
//!    node.
//! 3. **latch** — copy freshly written outlets into the delay buffers of
//!    outgoing delayed edges and push bound outlets to their parameters.
//!
//! The parallel variant executes one dependency level at a time: nodes of a
//! level are taken out of storage, processed on rayon workers, then put
//! back. Immediate edges always cross levels, so no two nodes of a level
//! share a write-visible port; delayed edges are latched serially after the
//! level completes, preserving their next-tick visibility.

use rayon::prelude::*;

use crate::edge::{ConnectionKind, Edge, Payload};
use crate::node::{NodeEntry, TickContext};
use crate::port::Outlet;
use crate::state::ExecutionState;

use super::Graph;

impl Graph {
    /// Advances the clocks and runs one tick over the current order.
    pub(super) fn execute(&mut self, state: &mut ExecutionState, dt: u64) {
        state.advance(dt);
        self.tick_index += 1;
        let ctx = TickContext {
            tick: self.tick_index,
            date: state.cur_date(),
            dt,
        };
        if self.parallel && !self.level_sizes.is_empty() {
            self.execute_parallel(&ctx);
        } else {
            self.execute_serial(&ctx);
        }
    }

    fn execute_serial(&mut self, ctx: &TickContext) {
        for i in 0..self.order.len() {
            let idx = self.order[i];
            // Slots can be stale when a rebuild was rejected; skip quietly.
            let runnable = matches!(self.nodes.get(idx), Some(Some(e)) if e.enabled);
            if !runnable {
                continue;
            }

            let mut scratch = std::mem::take(&mut self.pull_scratch);
            compute_pull(&self.nodes, &self.edges, idx, ctx.tick, &mut scratch);
            if let Some(entry) = self.nodes[idx].as_mut() {
                apply_and_process(entry, &mut scratch, ctx);
            }
            self.pull_scratch = scratch;

            latch_and_push(&self.nodes, &mut self.edges, idx, ctx.tick);
        }
    }

    fn execute_parallel(&mut self, ctx: &TickContext) {
        let mut start = 0usize;
        for li in 0..self.level_sizes.len() {
            let len = self.level_sizes[li];
            let level: Vec<usize> = self.order[start..start + len].to_vec();
            start += len;

            // Pulls read the already-completed earlier levels; within a level
            // no immediate edge can exist, so order of extraction is free.
            let mut work: Vec<(usize, NodeEntry, Vec<Option<Payload>>)> =
                Vec::with_capacity(level.len());
            for &idx in &level {
                let runnable = matches!(self.nodes.get(idx), Some(Some(e)) if e.enabled);
                if !runnable {
                    continue;
                }
                let mut pulled = Vec::new();
                compute_pull(&self.nodes, &self.edges, idx, ctx.tick, &mut pulled);
                let Some(entry) = self.nodes[idx].take() else {
                    continue;
                };
                work.push((idx, entry, pulled));
            }

            work.par_iter_mut().for_each(|(_, entry, pulled)| {
                apply_and_process(entry, pulled, ctx);
            });

            for (idx, entry, _) in work {
                self.nodes[idx] = Some(entry);
            }
            for &idx in &level {
                latch_and_push(&self.nodes, &mut self.edges, idx, ctx.tick);
            }
        }
    }
}

/// Computes the payload visible on each inlet of node `idx` this tick.
///
/// Multiple cables into one inlet are merged by connection order with the
/// last delivering cable winning. An inlet with no cables falls back to its
/// bound parameter's current value; an unbound, cable-less inlet contributes
/// nothing.
fn compute_pull(
    nodes: &[Option<NodeEntry>],
    edges: &[Option<Edge>],
    idx: usize,
    tick: u64,
    out: &mut Vec<Option<Payload>>,
) {
    out.clear();
    let Some(Some(entry)) = nodes.get(idx) else {
        return;
    };
    for inlet in &entry.inlets {
        let mut chosen: Option<Payload> = None;
        for &eid in &inlet.edges {
            let Some(Some(edge)) = edges.get(eid.index() as usize) else {
                continue;
            };
            let candidate = match edge.kind {
                ConnectionKind::ImmediateStrict => {
                    source_outlet(nodes, edge).and_then(|o| o.fresh_payload(tick))
                }
                ConnectionKind::ImmediateGlutton => {
                    source_outlet(nodes, edge).and_then(Outlet::latest_payload)
                }
                ConnectionKind::DelayedStrict => edge.delay.read_strict(tick),
                ConnectionKind::DelayedGlutton => edge.delay.read_latest(tick),
            };
            if candidate.is_some() {
                chosen = candidate;
            }
        }
        if chosen.is_none()
            && inlet.edges.is_empty()
            && let Some(param) = inlet.binding()
        {
            chosen = Some(Payload::Value(param.value()));
        }
        out.push(chosen);
    }
}

fn source_outlet<'a>(nodes: &'a [Option<NodeEntry>], edge: &Edge) -> Option<&'a Outlet> {
    nodes
        .get(edge.source.node.index() as usize)?
        .as_ref()?
        .outlets
        .get(edge.source.index)
}

/// Writes the pulled payloads into the inlets and runs the node.
fn apply_and_process(entry: &mut NodeEntry, pulled: &mut Vec<Option<Payload>>, ctx: &TickContext) {
    for (inlet, payload) in entry.inlets.iter_mut().zip(pulled.drain(..)) {
        inlet.accept(payload);
    }
    entry.node.process(&mut entry.inlets, &mut entry.outlets, ctx);
}

/// Latches fresh outlets into outgoing delayed edges and pushes bound value
/// outlets to their live parameters.
fn latch_and_push(
    nodes: &[Option<NodeEntry>],
    edges: &mut [Option<Edge>],
    idx: usize,
    tick: u64,
) {
    let Some(Some(entry)) = nodes.get(idx) else {
        return;
    };
    for outlet in &entry.outlets {
        let Some(payload) = outlet.fresh_payload(tick) else {
            continue;
        };
        if let Some(param) = outlet.binding()
            && let Payload::Value(v) = &payload
        {
            param.set(v.clone());
        }
        for &eid in &outlet.edges {
            if let Some(Some(edge)) = edges.get_mut(eid.index() as usize)
                && edge.kind.is_delayed()
            {
                edge.delay.latch(payload.clone(), tick);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::address::Address;
    use crate::device::Device;
    use crate::edge::ConnectionKind;
    use crate::graph::{Graph, SchedulePolicy};
    use crate::node::NodeId;
    use crate::nodes::{RelayNode, SequenceNode};
    use crate::port::{Inlet, Outlet, PortRef};
    use crate::state::ExecutionState;
    use crate::value::Value;

    /// Builds source -> sink over one edge of `kind` and runs the script,
    /// returning what the sink's outlet saw each tick.
    fn run_kind(kind: ConnectionKind, script: Vec<Option<Value>>, ticks: u64) -> Vec<Option<i64>> {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let src = graph.add_node(
            Box::new(SequenceNode::new(script)),
            vec![],
            vec![Outlet::value_port()],
        );
        let snk = graph.add_node(
            Box::new(RelayNode::new()),
            vec![Inlet::value_port()],
            vec![Outlet::value_port()],
        );
        graph
            .connect(PortRef::new(src, 0), PortRef::new(snk, 0), kind)
            .unwrap();

        let mut state = ExecutionState::new();
        let mut seen = Vec::new();
        for _ in 0..ticks {
            graph.tick(&mut state, 1);
            let out = graph.outlet(PortRef::new(snk, 0)).unwrap();
            if out.written_at() == Some(graph.tick_index()) {
                seen.push(out.value().map(Value::as_int));
            } else {
                seen.push(None);
            }
        }
        seen
    }

    fn script() -> Vec<Option<Value>> {
        vec![Some(Value::Int(1)), None, Some(Value::Int(3))]
    }

    #[test]
    fn immediate_strict_reference_sequence() {
        assert_eq!(run_kind(ConnectionKind::ImmediateStrict, script(), 3), vec![
            Some(1),
            None,
            Some(3)
        ]);
    }

    #[test]
    fn immediate_glutton_reference_sequence() {
        assert_eq!(
            run_kind(ConnectionKind::ImmediateGlutton, script(), 3),
            vec![Some(1), Some(1), Some(3)]
        );
    }

    #[test]
    fn delayed_strict_reference_sequence() {
        assert_eq!(run_kind(ConnectionKind::DelayedStrict, script(), 3), vec![
            None,
            Some(1),
            None
        ]);
    }

    #[test]
    fn delayed_glutton_reference_sequence() {
        assert_eq!(run_kind(ConnectionKind::DelayedGlutton, script(), 3), vec![
            None,
            Some(1),
            Some(1)
        ]);
    }

    #[test]
    fn bound_inlet_pulls_the_parameter() {
        let mut dev = Device::new("d");
        let param = dev.insert("/x", Value::Int(41));
        let _dev = Arc::new(dev);

        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let n = graph.add_node(
            Box::new(RelayNode::new()),
            vec![Inlet::value_port()
                .with_address(Address::new("d", "/x"))
                .with_binding(Arc::clone(&param))],
            vec![Outlet::value_port()],
        );

        let mut state = ExecutionState::new();
        graph.tick(&mut state, 1);
        assert_eq!(
            graph.outlet(PortRef::new(n, 0)).unwrap().value(),
            Some(&Value::Int(41))
        );

        param.set(Value::Int(42));
        graph.tick(&mut state, 1);
        assert_eq!(
            graph.outlet(PortRef::new(n, 0)).unwrap().value(),
            Some(&Value::Int(42))
        );
    }

    #[test]
    fn bound_outlet_pushes_the_parameter() {
        let mut dev = Device::new("d");
        let param = dev.insert("/x", Value::Int(0));
        let _dev = Arc::new(dev);

        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        graph.add_node(
            Box::new(SequenceNode::repeat(Value::Int(7))),
            vec![],
            vec![Outlet::value_port().with_binding(Arc::clone(&param))],
        );

        let mut state = ExecutionState::new();
        graph.tick(&mut state, 1);
        assert_eq!(param.value(), Value::Int(7));
    }

    #[test]
    fn unbound_inlet_contributes_nothing() {
        let mut graph = Graph::new(SchedulePolicy::Dynamic);
        let n = graph.add_node(
            Box::new(RelayNode::new()),
            vec![Inlet::value_port()],
            vec![Outlet::value_port()],
        );
        let mut state = ExecutionState::new();
        graph.tick(&mut state, 1);
        assert_eq!(graph.outlet(PortRef::new(n, 0)).unwrap().written_at(), None);
    }

    #[test]
    fn delayed_feedback_loop_converges() {
        // accumulator: sum <- (seq, sum via delayed edge)
        let mut graph = Graph::new(SchedulePolicy::StaticTopo);
        let seq = graph.add_node(
            Box::new(SequenceNode::repeat(Value::Int(1))),
            vec![],
            vec![Outlet::value_port()],
        );
        let sum = graph.add_node(
            Box::new(crate::nodes::SumNode::new()),
            vec![Inlet::value_port(), Inlet::value_port()],
            vec![Outlet::value_port()],
        );
        graph
            .connect(
                PortRef::new(seq, 0),
                PortRef::new(sum, 0),
                ConnectionKind::ImmediateStrict,
            )
            .unwrap();
        graph
            .connect(
                PortRef::new(sum, 0),
                PortRef::new(sum, 1),
                ConnectionKind::DelayedGlutton,
            )
            .unwrap();

        let mut state = ExecutionState::new();
        let mut last = 0;
        for _ in 0..5 {
            graph.tick(&mut state, 1);
            last = graph
                .outlet(PortRef::new(sum, 0))
                .unwrap()
                .value()
                .unwrap()
                .as_int();
        }
        // 1, then 1+1, 1+2, ... a running total of the feedback loop.
        assert_eq!(last, 5);
    }

    #[test]
    fn parallel_execution_matches_serial() {
        fn build(parallel: bool) -> (Graph, NodeId) {
            let mut graph =
                Graph::new(SchedulePolicy::StaticBfs).with_parallel_execution(parallel);
            let src = graph.add_node(
                Box::new(SequenceNode::new(
                    (0..8).map(|i| Some(Value::Int(i))).collect(),
                )),
                vec![],
                vec![Outlet::value_port()],
            );
            // Two independent scale branches merged by a sum.
            let a = graph.add_node(
                Box::new(crate::nodes::MapNode::new(2.0, 0.0)),
                vec![Inlet::value_port()],
                vec![Outlet::value_port()],
            );
            let b = graph.add_node(
                Box::new(crate::nodes::MapNode::new(3.0, 1.0)),
                vec![Inlet::value_port()],
                vec![Outlet::value_port()],
            );
            let sum = graph.add_node(
                Box::new(crate::nodes::SumNode::new()),
                vec![Inlet::value_port(), Inlet::value_port()],
                vec![Outlet::value_port()],
            );
            for (from, to, port) in [(src, a, 0), (src, b, 0), (a, sum, 0), (b, sum, 1)] {
                let to_port = if from == src { 0 } else { port };
                graph
                    .connect(
                        PortRef::new(from, 0),
                        PortRef::new(to, to_port),
                        ConnectionKind::ImmediateStrict,
                    )
                    .unwrap();
            }
            (graph, sum)
        }

        let (mut serial, s_sum) = build(false);
        let (mut par, p_sum) = build(true);
        let mut s_state = ExecutionState::new();
        let mut p_state = ExecutionState::new();
        for _ in 0..8 {
            serial.tick(&mut s_state, 1);
            par.tick(&mut p_state, 1);
            let sv = serial.outlet(PortRef::new(s_sum, 0)).unwrap().value();
            let pv = par.outlet(PortRef::new(p_sum, 0)).unwrap().value();
            assert_eq!(sv, pv);
        }
    }
}
