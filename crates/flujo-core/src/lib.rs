//! Flujo Core - real-time dataflow execution model
//!
//! This crate provides the execution core of the Flujo intermedia engine: a
//! hierarchically authored process graph turned into a live network of
//! computational nodes connected by typed, kind-tagged cables, executed
//! tick-by-tick on a real-time thread.
//!
//! # Core Abstractions
//!
//! ## Graph
//!
//! - [`Graph`] - node/edge storage, mutation API and tick driver
//! - [`SchedulePolicy`] - how the execution order is derived from the edges
//! - [`ProcessNode`] - the object-safe processing capability of a node
//!
//! ## Ports & Connections
//!
//! - [`Inlet`] / [`Outlet`] - typed ports carrying control values or signal
//!   blocks, optionally bound to a live device parameter
//! - [`ConnectionKind`] - the four delivery semantics (immediate/delayed
//!   crossed with strict/glutton); delayed kinds are the only legal way to
//!   close a feedback loop
//!
//! ## Session context
//!
//! - [`ExecutionState`] - transport clock plus registered devices and inlets,
//!   created at session start and reset at session stop
//! - [`Device`] / [`Parameter`] - live endpoints the engine binds ports to
//! - [`Address`] - symbolic parameter references, resolved late and allowed
//!   to fail soft (a port falls back to unbound, never to an error)
//!
//! # Threading model
//!
//! A `Graph` is single-threaded by contract: every mutation and every tick
//! happens on the execution thread. Cross-thread structural changes are the
//! business of an orchestration layer (see the `flujo-engine` crate), which
//! feeds the graph owned commands through bounded queues and never touches
//! it directly. Within a tick, the optional parallel execution mode fans
//! independent nodes out to worker threads; this is an implementation detail
//! of [`Graph::tick`] and invisible to node code.
//!
//! # Example
//!
//! ```rust
//! use flujo_core::{
//!     ConnectionKind, Graph, Inlet, Outlet, PortRef, SchedulePolicy, SequenceNode,
//!     RelayNode, ExecutionState, Value,
//! };
//!
//! let mut graph = Graph::new(SchedulePolicy::Dynamic);
//! let src = graph.add_node(
//!     Box::new(SequenceNode::repeat(Value::Int(1))),
//!     vec![],
//!     vec![Outlet::value_port()],
//! );
//! let snk = graph.add_node(
//!     Box::new(RelayNode::new()),
//!     vec![Inlet::value_port()],
//!     vec![Outlet::value_port()],
//! );
//! graph
//!     .connect(
//!         PortRef::new(src, 0),
//!         PortRef::new(snk, 0),
//!         ConnectionKind::ImmediateStrict,
//!     )
//!     .unwrap();
//!
//! let mut state = ExecutionState::new();
//! graph.tick(&mut state, 64);
//! assert_eq!(
//!     graph.outlet(PortRef::new(snk, 0)).unwrap().value(),
//!     Some(&Value::Int(1))
//! );
//! ```
//!
//! # Design Principles
//!
//! - **Bounded tick cost**: no locks and no unbounded work on the hot path;
//!   per-tick allocations are limited to payload clones
//! - **Mutability under execution**: structural changes are cheap to apply
//!   between ticks and never observed half-applied within one
//! - **Soft failure at the edges**: missing devices and unbound ports
//!   degrade to "no value" and never abort a tick

pub mod address;
pub mod device;
pub mod edge;
pub mod graph;
pub mod node;
pub mod nodes;
pub mod port;
pub mod state;
pub mod value;

// Re-export main types at crate root
pub use address::{Address, AddressParseError};
pub use device::{Device, Parameter};
pub use edge::{ConnectionKind, EdgeId};
pub use graph::{Graph, GraphError, ObservedValue, SchedulePolicy, ScheduleError};
pub use node::{NodeId, ProcessNode, TickContext};
pub use nodes::{MapNode, RelayNode, SequenceNode, SumNode};
pub use port::{Inlet, Outlet, PortKind, PortRef};
pub use state::{ExecutionState, TimeValue};
pub use value::{SignalBuffer, Value};
