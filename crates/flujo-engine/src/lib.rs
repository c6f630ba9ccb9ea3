//! Flujo Engine - cross-thread orchestration for the execution graph
//!
//! This crate wires the single-threaded execution core (`flujo-core`) into a
//! two-thread system: a non-real-time **authoring thread** that mutates the
//! document, and a soft real-time **execution thread** that ticks the graph.
//! No shared mutable state crosses that boundary directly; everything flows
//! through two bounded, lock-free SPSC queues.
//!
//! # Pieces
//!
//! - [`bridge`] - the command bridge: [`ExecCommand`] one way, [`Feedback`]
//!   the other, both over fixed-capacity rings that fail (never block) when
//!   full
//! - [`Executor`] - the execution-thread side: drains commands, rebuilds the
//!   order, ticks the graph, emits echoes. Handed to an external clock
//!   driver that calls [`Executor::tick`] at its own cadence
//! - [`Session`] - the authoring-thread side: allocates ids, resolves
//!   addresses, enqueues mutations, polls feedback, owns the play/stop
//!   lifecycle
//! - [`ExecutorSettings`] - build-time configuration (scheduling policy,
//!   parallelism, queue capacity), TOML round-trippable
//!
//! # Lifecycle
//!
//! ```rust
//! use flujo_engine::{ExecutorSettings, PortSpec, Session};
//! use flujo_core::{ConnectionKind, PortRef, SequenceNode, RelayNode, Value};
//!
//! let (mut session, mut executor) =
//!     Session::start(ExecutorSettings::default(), Vec::new(), Some(64)).unwrap();
//!
//! let src = session
//!     .register_process(
//!         Box::new(SequenceNode::repeat(Value::Int(1))),
//!         &[],
//!         &[PortSpec::value()],
//!     )
//!     .unwrap();
//! let snk = session
//!     .register_process(
//!         Box::new(RelayNode::new()),
//!         &[PortSpec::value()],
//!         &[PortSpec::value().observed(true)],
//!     )
//!     .unwrap();
//! session
//!     .connect_cable(
//!         PortRef::new(src, 0),
//!         PortRef::new(snk, 0),
//!         ConnectionKind::ImmediateStrict,
//!     )
//!     .unwrap();
//!
//! // Normally a clock driver thread owns the executor; inline here.
//! executor.tick(64);
//! session.poll_feedback(|fb| println!("{fb:?}"));
//! assert!(session.is_finished());
//!
//! session.stop(&mut executor);
//! ```

pub mod bridge;
pub mod executor;
pub mod session;
pub mod settings;

pub use bridge::{
    DEFAULT_QUEUE_CAPACITY, EDITION_POLL_INTERVAL, ExecCommand, Feedback, QueueFull,
};
pub use executor::Executor;
pub use session::{PortSpec, Session, SessionError};
pub use settings::{ExecutorSettings, SettingsError};
