//! Scheduling policies: deriving an execution order from the edge set.
//!
//! All policies work on the same dependency relation: the non-delayed edges.
//! Delayed edges never constrain the order; their one-tick lag makes any
//! relative placement of source and sink correct, which is precisely what
//! allows feedback loops. A cycle that survives the exclusion of delayed
//! edges cannot be ordered by any policy and is rejected at rebuild time.

use crate::edge::Edge;
use crate::node::{NodeEntry, NodeId};

use super::ScheduleError;

/// How the execution order is (re)computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum SchedulePolicy {
    /// Recompute a topological order whenever the graph changes. Tolerant of
    /// structural churn, highest rebuild cost.
    #[default]
    Dynamic,
    /// Fixed breadth-first order over dependency generations, recomputed only
    /// on explicit rebuild.
    StaticBfs,
    /// Fixed order preserving node insertion order, reordering only where a
    /// read-before-write dependency requires it.
    StaticFixed,
    /// Fixed order via strongly-connected-component condensation, diagnosing
    /// exactly which nodes form an unbreakable cycle when rejection is due.
    StaticTopo,
}

impl SchedulePolicy {
    /// Stable lowercase name, matching the serialized form.
    pub fn name(self) -> &'static str {
        match self {
            SchedulePolicy::Dynamic => "dynamic",
            SchedulePolicy::StaticBfs => "static-bfs",
            SchedulePolicy::StaticFixed => "static-fixed",
            SchedulePolicy::StaticTopo => "static-topo",
        }
    }
}

/// A computed execution order, plus the level partition when requested.
pub(crate) struct OrderPlan {
    /// Node slots in execution order.
    pub order: Vec<usize>,
    /// Run lengths partitioning `order` into mutually independent levels.
    /// Empty when levels were not requested.
    pub level_sizes: Vec<usize>,
}

/// Dependency view of the graph: active slots and successor lists over
/// non-delayed edges only.
struct Deps {
    active: Vec<usize>,
    /// Successor slots per slot, one entry per edge (parallel edges count).
    succs: Vec<Vec<usize>>,
    /// Incoming non-delayed edge count per slot.
    indegree: Vec<u32>,
}

fn dependencies(nodes: &[Option<NodeEntry>], edges: &[Option<Edge>]) -> Deps {
    let n = nodes.len();
    let mut deps = Deps {
        active: Vec::new(),
        succs: vec![Vec::new(); n],
        indegree: vec![0; n],
    };
    for (i, node) in nodes.iter().enumerate() {
        if node.is_some() {
            deps.active.push(i);
        }
    }
    for edge in edges.iter().flatten() {
        if edge.kind.is_delayed() {
            continue;
        }
        let from = edge.source.node.index() as usize;
        let to = edge.sink.node.index() as usize;
        // Edges to or from unregistered slots are impossible by construction;
        // tolerate them here anyway, they resolve at the next mutation.
        if nodes.get(from).is_some_and(|n| n.is_some())
            && nodes.get(to).is_some_and(|n| n.is_some())
        {
            deps.succs[from].push(to);
            deps.indegree[to] += 1;
        }
    }
    deps
}

fn cycle_error(nodes: &[Option<NodeEntry>], slots: impl Iterator<Item = usize>) -> ScheduleError {
    let mut members: Vec<NodeId> = slots
        .filter_map(|i| nodes.get(i).and_then(|n| n.as_ref()).map(|n| n.id))
        .collect();
    members.sort_unstable();
    ScheduleError::UnbreakableCycle { nodes: members }
}

/// Builds the order for `policy`, with the level partition when
/// `want_levels` is set.
pub(crate) fn build_order(
    nodes: &[Option<NodeEntry>],
    edges: &[Option<Edge>],
    policy: SchedulePolicy,
    want_levels: bool,
) -> Result<OrderPlan, ScheduleError> {
    let deps = dependencies(nodes, edges);
    let mut plan = match policy {
        SchedulePolicy::Dynamic => dynamic_order(nodes, &deps)?,
        SchedulePolicy::StaticBfs => bfs_order(nodes, &deps)?,
        SchedulePolicy::StaticFixed => fixed_order(nodes, &deps)?,
        SchedulePolicy::StaticTopo => topo_order(nodes, &deps)?,
    };
    if !want_levels {
        plan.level_sizes.clear();
    } else if plan.level_sizes.is_empty() {
        // Recompute the generation partition for policies whose order is not
        // naturally level-shaped. The partition must agree with the order,
        // so the order is rewritten level by level while keeping each
        // level's nodes in the policy's relative order.
        let levels = bfs_order(nodes, &deps)?;
        plan = align_levels(&plan.order, &levels);
    }
    Ok(plan)
}

/// Kahn's algorithm with a stack worklist; the order of structurally
/// independent nodes follows discovery order.
fn dynamic_order(nodes: &[Option<NodeEntry>], deps: &Deps) -> Result<OrderPlan, ScheduleError> {
    let mut indegree = deps.indegree.clone();
    let mut worklist: Vec<usize> = deps
        .active
        .iter()
        .copied()
        .filter(|&i| indegree[i] == 0)
        .collect();
    let mut order = Vec::with_capacity(deps.active.len());

    while let Some(idx) = worklist.pop() {
        order.push(idx);
        for &succ in &deps.succs[idx] {
            indegree[succ] -= 1;
            if indegree[succ] == 0 {
                worklist.push(succ);
            }
        }
    }

    if order.len() != deps.active.len() {
        return Err(cycle_error(
            nodes,
            deps.active.iter().copied().filter(|&i| indegree[i] > 0),
        ));
    }
    Ok(OrderPlan {
        order,
        level_sizes: Vec::new(),
    })
}

/// Breadth-first over dependency generations: every node of generation k has
/// all its dependencies in generations < k. The generations double as the
/// parallel level partition.
fn bfs_order(nodes: &[Option<NodeEntry>], deps: &Deps) -> Result<OrderPlan, ScheduleError> {
    let mut indegree = deps.indegree.clone();
    let mut frontier: Vec<usize> = deps
        .active
        .iter()
        .copied()
        .filter(|&i| indegree[i] == 0)
        .collect();
    frontier.sort_unstable();

    let mut order = Vec::with_capacity(deps.active.len());
    let mut level_sizes = Vec::new();

    while !frontier.is_empty() {
        level_sizes.push(frontier.len());
        let mut next = Vec::new();
        for &idx in &frontier {
            order.push(idx);
            for &succ in &deps.succs[idx] {
                indegree[succ] -= 1;
                if indegree[succ] == 0 {
                    next.push(succ);
                }
            }
        }
        next.sort_unstable();
        next.dedup();
        frontier = next;
    }

    if order.len() != deps.active.len() {
        return Err(cycle_error(
            nodes,
            deps.active.iter().copied().filter(|&i| indegree[i] > 0),
        ));
    }
    Ok(OrderPlan { order, level_sizes })
}

/// Insertion order with only the reordering the dependencies force: walk the
/// slots repeatedly, emitting the first node whose dependencies are all
/// satisfied.
fn fixed_order(nodes: &[Option<NodeEntry>], deps: &Deps) -> Result<OrderPlan, ScheduleError> {
    let mut indegree = deps.indegree.clone();
    let mut emitted = vec![false; indegree.len()];
    let mut order = Vec::with_capacity(deps.active.len());

    loop {
        let next = deps
            .active
            .iter()
            .copied()
            .find(|&i| !emitted[i] && indegree[i] == 0);
        let Some(idx) = next else { break };
        emitted[idx] = true;
        order.push(idx);
        for &succ in &deps.succs[idx] {
            indegree[succ] -= 1;
        }
    }

    if order.len() != deps.active.len() {
        return Err(cycle_error(
            nodes,
            deps.active.iter().copied().filter(|&i| !emitted[i]),
        ));
    }
    Ok(OrderPlan {
        order,
        level_sizes: Vec::new(),
    })
}

/// Condensation-based ordering: compute strongly connected components over
/// the non-delayed edges. Any component larger than one node (or a node with
/// a non-delayed self loop) is a cycle no delayed edge breaks; the rebuild
/// names its members and rejects. Otherwise components come out of Tarjan's
/// algorithm in reverse topological order, so reversing yields the schedule.
fn topo_order(nodes: &[Option<NodeEntry>], deps: &Deps) -> Result<OrderPlan, ScheduleError> {
    let sccs = tarjan_sccs(deps);

    for scc in &sccs {
        let self_loop = scc.len() == 1 && deps.succs[scc[0]].contains(&scc[0]);
        if scc.len() > 1 || self_loop {
            return Err(cycle_error(nodes, scc.iter().copied()));
        }
    }

    let order: Vec<usize> = sccs.into_iter().rev().map(|scc| scc[0]).collect();
    Ok(OrderPlan {
        order,
        level_sizes: Vec::new(),
    })
}

/// Iterative Tarjan over the dependency view. Components are emitted in
/// reverse topological order.
fn tarjan_sccs(deps: &Deps) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let n = deps.succs.len();
    let mut index_of = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut call: Vec<(usize, usize)> = Vec::new();
    let mut next_index = 0usize;
    let mut sccs = Vec::new();

    for &root in &deps.active {
        if index_of[root] != UNVISITED {
            continue;
        }
        index_of[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        call.push((root, 0));

        while let Some(&mut (v, ref mut child)) = call.last_mut() {
            if *child < deps.succs[v].len() {
                let w = deps.succs[v][*child];
                *child += 1;
                if index_of[w] == UNVISITED {
                    index_of[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index_of[w]);
                }
            } else {
                call.pop();
                if let Some(&mut (parent, _)) = call.last_mut() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index_of[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(component);
                }
            }
        }
    }
    sccs
}

/// Rewrites `order` so it is partitioned by the generation levels of
/// `levels`, keeping each level's members in their relative `order`.
fn align_levels(order: &[usize], levels: &OrderPlan) -> OrderPlan {
    let n = levels
        .order
        .iter()
        .copied()
        .max()
        .map_or(0, |m| m + 1)
        .max(order.iter().copied().max().map_or(0, |m| m + 1));
    let mut level_of = vec![0usize; n];
    let mut start = 0;
    for (li, &len) in levels.level_sizes.iter().enumerate() {
        for &idx in &levels.order[start..start + len] {
            level_of[idx] = li;
        }
        start += len;
    }

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); levels.level_sizes.len()];
    for &idx in order {
        buckets[level_of[idx]].push(idx);
    }

    let mut aligned = Vec::with_capacity(order.len());
    let mut level_sizes = Vec::with_capacity(buckets.len());
    for bucket in buckets {
        if bucket.is_empty() {
            continue;
        }
        level_sizes.push(bucket.len());
        aligned.extend(bucket);
    }
    OrderPlan {
        order: aligned,
        level_sizes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::ConnectionKind;
    use crate::graph::Graph;
    use crate::node::ProcessNode;
    use crate::nodes::RelayNode;
    use crate::port::{Inlet, Outlet, PortRef};

    fn relay() -> Box<dyn ProcessNode + Send> {
        Box::new(RelayNode::new())
    }

    fn chain_graph(policy: SchedulePolicy) -> (Graph, Vec<crate::node::NodeId>) {
        // c <- a -> b -> d, plus a free-standing e
        let mut g = Graph::new(policy);
        let ids: Vec<_> = (0..5)
            .map(|_| {
                g.add_node(
                    relay(),
                    vec![Inlet::value_port(), Inlet::value_port()],
                    vec![Outlet::value_port(), Outlet::value_port()],
                )
            })
            .collect();
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
        g.connect(
            PortRef::new(a, 0),
            PortRef::new(b, 0),
            ConnectionKind::ImmediateStrict,
        )
        .unwrap();
        g.connect(
            PortRef::new(a, 1),
            PortRef::new(c, 0),
            ConnectionKind::ImmediateGlutton,
        )
        .unwrap();
        g.connect(
            PortRef::new(b, 0),
            PortRef::new(d, 0),
            ConnectionKind::ImmediateStrict,
        )
        .unwrap();
        (g, ids)
    }

    fn assert_respects_deps(g: &Graph, order: &[crate::node::NodeId]) {
        let pos = |id: crate::node::NodeId| order.iter().position(|&n| n == id).unwrap();
        for id in g.node_ids() {
            // Every registered node appears exactly once.
            assert_eq!(order.iter().filter(|&&n| n == id).count(), 1);
        }
        for eid in g.edge_ids() {
            if g.edge_kind(eid).unwrap().is_delayed() {
                continue;
            }
            let (src, snk) = g.edge_endpoints(eid).unwrap();
            assert!(pos(src.node) < pos(snk.node), "edge {src:?}->{snk:?} out of order");
        }
    }

    #[test]
    fn every_policy_orders_a_dag() {
        for policy in [
            SchedulePolicy::Dynamic,
            SchedulePolicy::StaticBfs,
            SchedulePolicy::StaticFixed,
            SchedulePolicy::StaticTopo,
        ] {
            let (mut g, _) = chain_graph(policy);
            g.rebuild().unwrap_or_else(|e| panic!("{policy:?}: {e}"));
            let order = g.execution_order();
            assert_eq!(order.len(), 5);
            assert_respects_deps(&g, &order);
        }
    }

    #[test]
    fn fixed_policy_preserves_insertion_order_where_possible() {
        let mut g = Graph::new(SchedulePolicy::StaticFixed);
        let a = g.add_node(relay(), vec![Inlet::value_port()], vec![Outlet::value_port()]);
        let b = g.add_node(relay(), vec![Inlet::value_port()], vec![Outlet::value_port()]);
        let c = g.add_node(relay(), vec![Inlet::value_port()], vec![Outlet::value_port()]);
        // c must run before a; b is unconstrained and keeps its slot order.
        g.connect(
            PortRef::new(c, 0),
            PortRef::new(a, 0),
            ConnectionKind::ImmediateStrict,
        )
        .unwrap();
        g.rebuild().unwrap();
        assert_eq!(g.execution_order(), vec![b, c, a]);
    }

    #[test]
    fn immediate_cycle_is_rejected_and_previous_order_kept() {
        let (mut g, ids) = chain_graph(SchedulePolicy::StaticTopo);
        g.rebuild().unwrap();
        let before = g.execution_order();

        // Close b -> a with an immediate edge: unbreakable.
        g.connect(
            PortRef::new(ids[1], 1),
            PortRef::new(ids[0], 0),
            ConnectionKind::ImmediateStrict,
        )
        .unwrap();
        let err = g.rebuild().unwrap_err();
        let ScheduleError::UnbreakableCycle { nodes } = err;
        assert_eq!(nodes, vec![ids[0], ids[1]]);
        assert_eq!(g.execution_order(), before);
    }

    #[test]
    fn delayed_edge_breaks_the_cycle() {
        for policy in [
            SchedulePolicy::Dynamic,
            SchedulePolicy::StaticBfs,
            SchedulePolicy::StaticFixed,
            SchedulePolicy::StaticTopo,
        ] {
            let (mut g, ids) = chain_graph(policy);
            // Feedback b -> a closed by a delayed edge is schedulable.
            g.connect(
                PortRef::new(ids[1], 1),
                PortRef::new(ids[0], 0),
                ConnectionKind::DelayedStrict,
            )
            .unwrap();
            g.rebuild().unwrap_or_else(|e| panic!("{policy:?}: {e}"));
            let order = g.execution_order();
            // Non-delayed dependency a -> b still holds.
            let pos = |id| order.iter().position(|&n| n == id).unwrap();
            assert!(pos(ids[0]) < pos(ids[1]));
        }
    }

    #[test]
    fn immediate_self_loop_is_rejected() {
        let mut g = Graph::new(SchedulePolicy::StaticTopo);
        let a = g.add_node(relay(), vec![Inlet::value_port()], vec![Outlet::value_port()]);
        g.connect(
            PortRef::new(a, 0),
            PortRef::new(a, 0),
            ConnectionKind::ImmediateGlutton,
        )
        .unwrap();
        assert!(g.rebuild().is_err());
    }

    #[test]
    fn delayed_self_loop_is_fine() {
        let mut g = Graph::new(SchedulePolicy::StaticTopo);
        let a = g.add_node(relay(), vec![Inlet::value_port()], vec![Outlet::value_port()]);
        g.connect(
            PortRef::new(a, 0),
            PortRef::new(a, 0),
            ConnectionKind::DelayedGlutton,
        )
        .unwrap();
        g.rebuild().unwrap();
        assert_eq!(g.execution_order(), vec![a]);
    }

    #[test]
    fn bfs_levels_partition_dependencies() {
        let (g, _) = chain_graph(SchedulePolicy::StaticBfs);
        let mut g = g.with_parallel_execution(true);
        g.rebuild().unwrap();
        let order = g.execution_order();
        assert_eq!(order.len(), 5);
        assert_respects_deps(&g, &order);
    }
}
