//! The authoring-thread side of a session.
//!
//! A [`Session`] is the orchestrator: it owns the authoring end of the
//! command bridge, the device list, and the bookkeeping that mirrors what
//! the execution thread will eventually apply. It never touches the graph;
//! every structural change is translated into an [`ExecCommand`] and
//! enqueued.
//!
//! Ids are allocated here, on the authoring thread, so follow-up commands
//! can reference a node or cable before its creation command has been
//! dequeued. The relationship between document state and live graph state is
//! eventually consistent: a mutation has happened *for the document* as soon
//! as it is enqueued, and *for the graph* once the executor applies it.
//! Completion notices and value echoes flow back through
//! [`poll_feedback()`](Session::poll_feedback), which the embedder drains on
//! a fixed-period timer ([`EDITION_POLL_INTERVAL`](crate::bridge::EDITION_POLL_INTERVAL)
//! is the reference period).

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use flujo_core::{
    Address, ConnectionKind, Device, EdgeId, ExecutionState, Graph, Inlet, NodeId, Outlet,
    Parameter, PortKind, PortRef, ProcessNode, TimeValue,
};

use crate::bridge::{self, ExecCommand, Feedback, QueueFull};
use crate::executor::Executor;
use crate::settings::{ExecutorSettings, SettingsError};

/// Description of one port of a process being registered.
#[derive(Debug, Clone)]
pub struct PortSpec {
    kind: PortKind,
    address: Option<Address>,
    observed: bool,
}

impl PortSpec {
    /// A control-value port.
    pub fn value() -> Self {
        Self {
            kind: PortKind::Value,
            address: None,
            observed: false,
        }
    }

    /// A signal port.
    pub fn signal() -> Self {
        Self {
            kind: PortKind::Signal,
            address: None,
            observed: false,
        }
    }

    /// Binds the port to a symbolic device address. Resolution happens at
    /// registration time; an unresolvable address leaves the port unbound
    /// with the address kept for a later rebind.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Flags the port for UI feedback (outlets only; ignored on inlets).
    pub fn observed(mut self, observed: bool) -> Self {
        self.observed = observed;
        self
    }
}

/// Errors from session mutations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The execution queue is full. The command comes back so the caller
    /// can retry it later with [`Session::resubmit`]; the mutation has not
    /// been applied.
    #[error("execution queue full; retry the returned command")]
    QueueFull(Box<ExecCommand>),
    /// The node is not registered in this session.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    /// The cable is not registered in this session.
    #[error("unknown cable {0}")]
    UnknownCable(EdgeId),
    /// The port index does not exist on the node.
    #[error("port {0:?} out of range")]
    PortOutOfRange(PortRef),
    /// A cable between these ports already exists.
    #[error("a cable from {source:?} to {sink:?} already exists")]
    DuplicateCable {
        /// Source outlet.
        source: PortRef,
        /// Sink inlet.
        sink: PortRef,
    },
}

struct NodeRecord {
    inlets: usize,
    outlets: usize,
}

struct CableRecord {
    source: PortRef,
    sink: PortRef,
}

/// Bookkeeping delta extracted from a command before it is moved into the
/// queue; applied only when the enqueue succeeds.
enum Effect {
    AddNode {
        id: NodeId,
        inlets: usize,
        outlets: usize,
    },
    RemoveNode {
        id: NodeId,
    },
    Connect {
        id: EdgeId,
        source: PortRef,
        sink: PortRef,
    },
    Disconnect {
        id: EdgeId,
    },
    Clear,
    None,
}

impl Effect {
    fn of(cmd: &ExecCommand) -> Self {
        match cmd {
            ExecCommand::AddNode {
                id,
                inlets,
                outlets,
                ..
            } => Effect::AddNode {
                id: *id,
                inlets: inlets.len(),
                outlets: outlets.len(),
            },
            ExecCommand::RemoveNode { id } => Effect::RemoveNode { id: *id },
            ExecCommand::Connect {
                id, source, sink, ..
            } => Effect::Connect {
                id: *id,
                source: *source,
                sink: *sink,
            },
            ExecCommand::Disconnect { id } => Effect::Disconnect { id: *id },
            ExecCommand::Clear => Effect::Clear,
            _ => Effect::None,
        }
    }
}

/// Authoring-side orchestrator of one playback session.
pub struct Session {
    bridge: bridge::AuthoringEnd,
    devices: Vec<Arc<Device>>,
    next_node: u32,
    next_edge: u32,
    nodes: HashMap<NodeId, NodeRecord>,
    cables: HashMap<EdgeId, CableRecord>,
    finished: bool,
}

impl Session {
    /// Builds a session and its executor.
    ///
    /// The graph and execution state are constructed per the settings, the
    /// devices registered, and the pair wired through a fresh command
    /// bridge. Hand the [`Executor`] to the clock driver; keep the
    /// [`Session`] on the authoring thread.
    ///
    /// `root_duration` is the length of the root interval in samples; when
    /// it elapses a single [`Feedback::PlaybackFinished`] is emitted. `None`
    /// plays until stopped.
    pub fn start(
        settings: ExecutorSettings,
        devices: Vec<Arc<Device>>,
        root_duration: Option<TimeValue>,
    ) -> Result<(Self, Executor), SettingsError> {
        settings.validate()?;
        let (authoring, execution) = bridge::channel(settings.queue_capacity);
        let graph =
            Graph::new(settings.scheduling).with_parallel_execution(settings.parallel);
        let mut state = ExecutionState::new();
        for device in &devices {
            state.register_device(device);
        }
        let executor = Executor::new(graph, state, execution, root_duration);
        let session = Self {
            bridge: authoring,
            devices,
            next_node: 0,
            next_edge: 0,
            nodes: HashMap::new(),
            cables: HashMap::new(),
            finished: false,
        };
        tracing::debug!(?settings, "session started");
        Ok((session, executor))
    }

    // --- Structural mutations ---

    /// Registers a process node with the given port descriptors.
    ///
    /// Port addresses are resolved against the session's devices here and
    /// the resolved handles shipped with the command, so the rebind is
    /// atomic on the execution thread.
    pub fn register_process(
        &mut self,
        node: Box<dyn ProcessNode + Send>,
        inlets: &[PortSpec],
        outlets: &[PortSpec],
    ) -> Result<NodeId, SessionError> {
        let id = NodeId::from_raw(self.next_node);
        let inlets: Vec<Inlet> = inlets.iter().map(|s| self.build_inlet(s)).collect();
        let outlets: Vec<Outlet> = outlets.iter().map(|s| self.build_outlet(s)).collect();
        self.submit(ExecCommand::AddNode {
            id,
            node,
            inlets,
            outlets,
        })?;
        Ok(id)
    }

    /// Unregisters a process node. Its cables are disconnected by cascade on
    /// the execution thread; the session's bookkeeping drops them likewise.
    pub fn unregister_process(&mut self, id: NodeId) -> Result<(), SessionError> {
        if !self.nodes.contains_key(&id) {
            return Err(SessionError::UnknownNode(id));
        }
        self.submit(ExecCommand::RemoveNode { id })
    }

    /// Connects a cable between two registered ports.
    pub fn connect_cable(
        &mut self,
        source: PortRef,
        sink: PortRef,
        kind: ConnectionKind,
    ) -> Result<EdgeId, SessionError> {
        let source_rec = self
            .nodes
            .get(&source.node)
            .ok_or(SessionError::UnknownNode(source.node))?;
        if source.index >= source_rec.outlets {
            return Err(SessionError::PortOutOfRange(source));
        }
        let sink_rec = self
            .nodes
            .get(&sink.node)
            .ok_or(SessionError::UnknownNode(sink.node))?;
        if sink.index >= sink_rec.inlets {
            return Err(SessionError::PortOutOfRange(sink));
        }
        if self
            .cables
            .values()
            .any(|c| c.source == source && c.sink == sink)
        {
            return Err(SessionError::DuplicateCable { source, sink });
        }

        let id = EdgeId::from_raw(self.next_edge);
        self.submit(ExecCommand::Connect {
            id,
            source,
            sink,
            kind,
        })?;
        Ok(id)
    }

    /// Disconnects a cable.
    pub fn disconnect_cable(&mut self, id: EdgeId) -> Result<(), SessionError> {
        if !self.cables.contains_key(&id) {
            return Err(SessionError::UnknownCable(id));
        }
        self.submit(ExecCommand::Disconnect { id })
    }

    /// Rebinds an inlet's device address; `None` unbinds.
    ///
    /// Resolution happens here, against the current device list; the port
    /// either keeps working against its old target or switches to the new
    /// one in a single step on the execution thread.
    pub fn set_inlet_address(
        &mut self,
        port: PortRef,
        address: Option<Address>,
    ) -> Result<(), SessionError> {
        let rec = self
            .nodes
            .get(&port.node)
            .ok_or(SessionError::UnknownNode(port.node))?;
        if port.index >= rec.inlets {
            return Err(SessionError::PortOutOfRange(port));
        }
        let binding = address.as_ref().and_then(|a| self.resolve(a));
        self.submit(ExecCommand::RebindInlet {
            port,
            binding,
            address,
        })
    }

    /// Rebinds an outlet's device address; `None` unbinds.
    pub fn set_outlet_address(
        &mut self,
        port: PortRef,
        address: Option<Address>,
    ) -> Result<(), SessionError> {
        let rec = self
            .nodes
            .get(&port.node)
            .ok_or(SessionError::UnknownNode(port.node))?;
        if port.index >= rec.outlets {
            return Err(SessionError::PortOutOfRange(port));
        }
        let binding = address.as_ref().and_then(|a| self.resolve(a));
        self.submit(ExecCommand::RebindOutlet {
            port,
            binding,
            address,
        })
    }

    /// Enables or disables a process node.
    pub fn set_process_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), SessionError> {
        if !self.nodes.contains_key(&id) {
            return Err(SessionError::UnknownNode(id));
        }
        self.submit(ExecCommand::SetEnabled { id, enabled })
    }

    /// Registers an additional device, for this session and for address
    /// resolution of future registrations.
    pub fn register_device(&mut self, device: Arc<Device>) -> Result<(), SessionError> {
        self.devices.push(Arc::clone(&device));
        self.submit(ExecCommand::RegisterDevice { device })
    }

    /// Retries a command previously returned by
    /// [`SessionError::QueueFull`].
    pub fn resubmit(&mut self, command: Box<ExecCommand>) -> Result<(), SessionError> {
        self.submit(*command)
    }

    // --- Feedback ---

    /// Drains pending feedback from the execution thread.
    ///
    /// Call on a fixed-period timer; consumers must tolerate echoes that
    /// describe state older than mutations they have already issued.
    pub fn poll_feedback(&mut self, mut f: impl FnMut(Feedback)) {
        let finished = &mut self.finished;
        self.bridge.drain_feedback(|fb| {
            if matches!(fb, Feedback::PlaybackFinished) {
                *finished = true;
            }
            f(fb);
        });
    }

    /// Whether the playback-finished notice has been observed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // --- Lifecycle ---

    /// Stops the session.
    ///
    /// Contract: the clock driver has already ceased invoking
    /// [`Executor::tick`] (in-flight ticks always run to completion; they
    /// are never interrupted). Pending commands are converged, the graph's
    /// nodes and edges released, the state reset, and both queues left
    /// empty.
    pub fn stop(&mut self, executor: &mut Executor) {
        executor.shutdown();
        self.bridge.drain_feedback(|_| {});
        self.nodes.clear();
        self.cables.clear();
        self.next_node = 0;
        self.next_edge = 0;
        self.finished = false;
        tracing::debug!("session stopped");
    }

    /// Stops and prepares for a fresh run: clocks at zero, node and edge
    /// sets empty, devices re-registered so new registrations resolve.
    pub fn reload(&mut self, executor: &mut Executor) {
        self.stop(executor);
        executor.register_devices(&self.devices);
        tracing::debug!("session reloaded");
    }

    /// Registered process count, per this session's bookkeeping.
    pub fn process_count(&self) -> usize {
        self.nodes.len()
    }

    /// Registered cable count, per this session's bookkeeping.
    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }

    // --- Internals ---

    fn submit(&mut self, cmd: ExecCommand) -> Result<(), SessionError> {
        let effect = Effect::of(&cmd);
        match self.bridge.enqueue(cmd) {
            Ok(()) => {
                self.apply_effect(effect);
                Ok(())
            }
            Err(QueueFull(cmd)) => {
                tracing::warn!(command = ?cmd, "execution queue full; mutation not applied");
                Err(SessionError::QueueFull(Box::new(cmd)))
            }
        }
    }

    fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AddNode {
                id,
                inlets,
                outlets,
            } => {
                self.nodes.insert(id, NodeRecord { inlets, outlets });
                self.next_node = self.next_node.max(id.index() + 1);
            }
            Effect::RemoveNode { id } => {
                self.nodes.remove(&id);
                self.cables
                    .retain(|_, c| c.source.node != id && c.sink.node != id);
            }
            Effect::Connect { id, source, sink } => {
                self.cables.insert(id, CableRecord { source, sink });
                self.next_edge = self.next_edge.max(id.index() + 1);
            }
            Effect::Disconnect { id } => {
                self.cables.remove(&id);
            }
            Effect::Clear => {
                self.nodes.clear();
                self.cables.clear();
            }
            Effect::None => {}
        }
    }

    fn resolve(&self, address: &Address) -> Option<Arc<Parameter>> {
        self.devices.iter().find_map(|d| d.resolve(address))
    }

    fn build_inlet(&self, spec: &PortSpec) -> Inlet {
        let mut inlet = match spec.kind {
            PortKind::Value => Inlet::value_port(),
            PortKind::Signal => Inlet::signal_port(),
        };
        if let Some(address) = &spec.address {
            if let Some(param) = self.resolve(address) {
                inlet = inlet.with_binding(param);
            }
            inlet = inlet.with_address(address.clone());
        }
        inlet
    }

    fn build_outlet(&self, spec: &PortSpec) -> Outlet {
        let mut outlet = match spec.kind {
            PortKind::Value => Outlet::value_port(),
            PortKind::Signal => Outlet::signal_port(),
        };
        if let Some(address) = &spec.address {
            if let Some(param) = self.resolve(address) {
                outlet = outlet.with_binding(param);
            }
            outlet = outlet.with_address(address.clone());
        }
        outlet.observed(spec.observed)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("processes", &self.nodes.len())
            .field("cables", &self.cables.len())
            .field("devices", &self.devices.len())
            .field("finished", &self.finished)
            .finish()
    }
}
