//! The cross-thread command bridge.
//!
//! Two fixed-capacity, lock-free, single-producer single-consumer rings
//! connect the authoring thread and the execution thread:
//!
//! - the **execution queue** carries structural and binding mutations
//!   ([`ExecCommand`]) into the execution thread, drained at the start of
//!   every tick and once more at session teardown to guarantee convergence;
//! - the **edition queue** carries [`Feedback`] the other way, drained by a
//!   periodic timer on the authoring thread
//!   ([`EDITION_POLL_INTERVAL`] is the reference period).
//!
//! Neither direction ever blocks its producer. A full execution queue fails
//! the enqueue and hands the command back ([`QueueFull`]): back-pressure the
//! caller must react to by retrying or coalescing, never a silent drop. A
//! full edition queue drops the feedback with a trace, because the tick must
//! not stall for a slow UI.
//!
//! Commands own everything they carry (boxed nodes, `Arc`ed parameters), so
//! the ownership transfer is paid at enqueue time on the authoring thread,
//! not at dequeue time on the hot path.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use flujo_core::{
    Address, ConnectionKind, Device, EdgeId, Inlet, NodeId, Outlet, Parameter, PortRef,
    ProcessNode, TimeValue, Value,
};

/// Default capacity of both rings, in commands.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Reference drain period for the edition queue on the authoring thread.
pub const EDITION_POLL_INTERVAL: Duration = Duration::from_millis(32);

/// A structural or binding mutation destined for the execution thread.
///
/// Applied in FIFO order between ticks; a batch enqueued before a tick is
/// fully applied before any node of that tick executes.
pub enum ExecCommand {
    /// Register a node under an authoring-assigned id, ports pre-built and
    /// bindings pre-resolved.
    AddNode {
        /// Authoring-assigned node id.
        id: NodeId,
        /// The processor.
        node: Box<dyn ProcessNode + Send>,
        /// Input ports, in order.
        inlets: Vec<Inlet>,
        /// Output ports, in order.
        outlets: Vec<Outlet>,
    },
    /// Unregister a node, cascading to its edges.
    RemoveNode {
        /// The node to remove.
        id: NodeId,
    },
    /// Connect a cable under an authoring-assigned edge id.
    Connect {
        /// Authoring-assigned edge id.
        id: EdgeId,
        /// Source outlet.
        source: PortRef,
        /// Sink inlet.
        sink: PortRef,
        /// Delivery semantics.
        kind: ConnectionKind,
    },
    /// Disconnect a cable.
    Disconnect {
        /// The edge to remove.
        id: EdgeId,
    },
    /// Atomically rebind (or unbind) an inlet.
    RebindInlet {
        /// The inlet to rebind.
        port: PortRef,
        /// The resolved parameter, or `None` to unbind.
        binding: Option<Arc<Parameter>>,
        /// The symbolic address kept on the port for later re-resolution.
        address: Option<Address>,
    },
    /// Atomically rebind (or unbind) an outlet.
    RebindOutlet {
        /// The outlet to rebind.
        port: PortRef,
        /// The resolved parameter, or `None` to unbind.
        binding: Option<Arc<Parameter>>,
        /// The symbolic address kept on the port for later re-resolution.
        address: Option<Address>,
    },
    /// Register a device endpoint with the execution state.
    RegisterDevice {
        /// The device, shared with the device layer.
        device: Arc<Device>,
    },
    /// Enable or disable a node.
    SetEnabled {
        /// The node to toggle.
        id: NodeId,
        /// New enablement.
        enabled: bool,
    },
    /// Release every node and edge.
    Clear,
}

impl fmt::Debug for ExecCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecCommand::AddNode {
                id,
                inlets,
                outlets,
                ..
            } => f
                .debug_struct("AddNode")
                .field("id", id)
                .field("inlets", &inlets.len())
                .field("outlets", &outlets.len())
                .finish_non_exhaustive(),
            ExecCommand::RemoveNode { id } => f.debug_struct("RemoveNode").field("id", id).finish(),
            ExecCommand::Connect {
                id,
                source,
                sink,
                kind,
            } => f
                .debug_struct("Connect")
                .field("id", id)
                .field("source", source)
                .field("sink", sink)
                .field("kind", kind)
                .finish(),
            ExecCommand::Disconnect { id } => {
                f.debug_struct("Disconnect").field("id", id).finish()
            }
            ExecCommand::RebindInlet { port, address, .. } => f
                .debug_struct("RebindInlet")
                .field("port", port)
                .field("address", address)
                .finish_non_exhaustive(),
            ExecCommand::RebindOutlet { port, address, .. } => f
                .debug_struct("RebindOutlet")
                .field("port", port)
                .field("address", address)
                .finish_non_exhaustive(),
            ExecCommand::RegisterDevice { device } => f
                .debug_struct("RegisterDevice")
                .field("device", &device.name())
                .finish(),
            ExecCommand::SetEnabled { id, enabled } => f
                .debug_struct("SetEnabled")
                .field("id", id)
                .field("enabled", enabled)
                .finish(),
            ExecCommand::Clear => f.write_str("Clear"),
        }
    }
}

/// Feedback from the execution thread to the authoring thread.
///
/// Feedback is FIFO within this direction but unordered relative to the
/// execution queue: an echo describing pre-mutation state may arrive after
/// the authoring thread issued a further mutation. Consumers must be
/// order-tolerant.
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    /// A node creation command was applied.
    NodeAdded {
        /// The node's id.
        id: NodeId,
    },
    /// A cable connection command was applied.
    CableConnected {
        /// The edge's id.
        id: EdgeId,
    },
    /// A fresh value on a UI-observable outlet.
    ValueEcho {
        /// Producing node.
        node: NodeId,
        /// Outlet index.
        outlet: usize,
        /// The value written that tick.
        value: Value,
        /// Logical date of the tick.
        date: TimeValue,
    },
    /// A schedule rebuild was rejected; the previous order stays in force.
    ScheduleRejected {
        /// Human-readable rejection reason.
        reason: String,
    },
    /// The root interval ran to completion.
    PlaybackFinished,
}

/// Back-pressure signal: the execution queue is full and the mutation was
/// not applied. The command comes back so the caller can retry it.
#[derive(Debug, Error)]
#[error("execution queue full; mutation not applied")]
pub struct QueueFull(pub ExecCommand);

/// Creates the bridge: one pair of rings with `capacity` entries each.
pub fn channel(capacity: usize) -> (AuthoringEnd, ExecutionEnd) {
    let (cmd_tx, cmd_rx) = rtrb::RingBuffer::new(capacity);
    let (fb_tx, fb_rx) = rtrb::RingBuffer::new(capacity);
    (
        AuthoringEnd {
            commands: cmd_tx,
            feedback: fb_rx,
        },
        ExecutionEnd {
            commands: cmd_rx,
            feedback: fb_tx,
        },
    )
}

/// The authoring thread's end: command producer, feedback consumer.
pub struct AuthoringEnd {
    commands: rtrb::Producer<ExecCommand>,
    feedback: rtrb::Consumer<Feedback>,
}

impl AuthoringEnd {
    /// Enqueues a mutation for the execution thread.
    ///
    /// Never blocks. On a full ring the command is handed back inside
    /// [`QueueFull`]; the mutation must be treated as not applied.
    pub fn enqueue(&mut self, command: ExecCommand) -> Result<(), QueueFull> {
        self.commands
            .push(command)
            .map_err(|rtrb::PushError::Full(cmd)| QueueFull(cmd))
    }

    /// Free command slots currently available.
    pub fn command_slots(&self) -> usize {
        self.commands.slots()
    }

    /// Drains all pending feedback, in FIFO order.
    pub fn drain_feedback(&mut self, mut f: impl FnMut(Feedback)) {
        while let Ok(fb) = self.feedback.pop() {
            f(fb);
        }
    }
}

impl fmt::Debug for AuthoringEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthoringEnd").finish_non_exhaustive()
    }
}

/// The execution thread's end: command consumer, feedback producer.
pub struct ExecutionEnd {
    commands: rtrb::Consumer<ExecCommand>,
    feedback: rtrb::Producer<Feedback>,
}

impl ExecutionEnd {
    /// Pops the next pending command, if any.
    pub fn next_command(&mut self) -> Option<ExecCommand> {
        self.commands.pop().ok()
    }

    /// Sends feedback toward the authoring thread.
    ///
    /// Never blocks. On a full ring the feedback is dropped with a trace;
    /// stalling the tick for a slow consumer is not an option.
    pub fn send_feedback(&mut self, feedback: Feedback) {
        if let Err(rtrb::PushError::Full(fb)) = self.feedback.push(feedback) {
            tracing::trace!(?fb, "edition queue full; feedback dropped");
        }
    }
}

impl fmt::Debug for ExecutionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionEnd").finish_non_exhaustive()
    }
}
