//! The execution-thread side of a session.
//!
//! An [`Executor`] owns the live [`Graph`] and [`ExecutionState`] plus the
//! execution end of the command bridge. It is handed to whatever drives the
//! clock (an audio callback, a timer thread, a test loop), which calls
//! [`tick()`](Executor::tick) with a monotonically increasing time argument
//! at its own cadence; irregular intervals are expected and tolerated.
//!
//! Every tick first drains and applies all pending commands, so a mutation
//! batch enqueued before the tick is fully visible to every node of that
//! tick. Rebuild rejections and fresh observed values are reported back over
//! the edition queue; nothing here ever blocks on the authoring thread.

use std::sync::Arc;

use flujo_core::{
    Device, ExecutionState, Graph, GraphError, ObservedValue, PortRef, TimeValue,
};

use crate::bridge::{ExecCommand, ExecutionEnd, Feedback};

/// Drives the graph on the execution thread.
#[derive(Debug)]
pub struct Executor {
    graph: Graph,
    state: ExecutionState,
    bridge: ExecutionEnd,
    last_time: TimeValue,
    root_duration: Option<TimeValue>,
    finished_sent: bool,
    observed: Vec<ObservedValue>,
}

impl Executor {
    pub(crate) fn new(
        graph: Graph,
        state: ExecutionState,
        bridge: ExecutionEnd,
        root_duration: Option<TimeValue>,
    ) -> Self {
        Self {
            graph,
            state,
            bridge,
            last_time: 0,
            root_duration,
            finished_sent: false,
            observed: Vec::new(),
        }
    }

    /// Runs one tick at logical time `now` (samples, monotonic).
    ///
    /// Applies pending commands, rebuilds the order if the structure
    /// changed (keeping the previous order and reporting when the rebuild
    /// is rejected), executes the graph, then emits value echoes and the
    /// one-shot playback-finished notice.
    pub fn tick(&mut self, now: TimeValue) {
        let dt = now.saturating_sub(self.last_time);
        self.last_time = now;

        self.run_all_commands();

        if self.graph.is_dirty()
            && let Err(e) = self.graph.rebuild()
        {
            tracing::warn!(error = %e, "schedule rejected; previous order kept");
            self.bridge.send_feedback(Feedback::ScheduleRejected {
                reason: e.to_string(),
            });
        }

        self.graph.tick(&mut self.state, dt);

        self.observed.clear();
        self.graph.collect_observed(&mut self.observed);
        let date = self.state.cur_date();
        for obs in self.observed.drain(..) {
            self.bridge.send_feedback(Feedback::ValueEcho {
                node: obs.node,
                outlet: obs.outlet,
                value: obs.value,
                date,
            });
        }

        if let Some(duration) = self.root_duration
            && !self.finished_sent
            && self.state.samples_since_start() >= duration
        {
            self.finished_sent = true;
            self.bridge.send_feedback(Feedback::PlaybackFinished);
        }
    }

    /// Drains and applies every pending command.
    ///
    /// Called at the start of each tick; also called by the session at
    /// teardown, after ticking has ceased, to guarantee convergence.
    pub fn run_all_commands(&mut self) {
        while let Some(cmd) = self.bridge.next_command() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: ExecCommand) {
        match cmd {
            ExecCommand::AddNode {
                id,
                node,
                inlets,
                outlets,
            } => {
                let inlet_count = inlets.len();
                match self.graph.insert_node(id, node, inlets, outlets) {
                    Ok(()) => {
                        for i in 0..inlet_count {
                            self.state.register_inlet(PortRef::new(id, i));
                        }
                        self.bridge.send_feedback(Feedback::NodeAdded { id });
                    }
                    Err(e) => structural_violation(&e),
                }
            }
            ExecCommand::RemoveNode { id } => match self.graph.remove_node(id) {
                Ok(()) => self.state.unregister_node_inlets(id),
                Err(e) => structural_violation(&e),
            },
            ExecCommand::Connect {
                id,
                source,
                sink,
                kind,
            } => match self.graph.insert_edge(id, source, sink, kind) {
                Ok(()) => self.bridge.send_feedback(Feedback::CableConnected { id }),
                Err(e) => structural_violation(&e),
            },
            ExecCommand::Disconnect { id } => {
                if let Err(e) = self.graph.disconnect(id) {
                    structural_violation(&e);
                }
            }
            ExecCommand::RebindInlet {
                port,
                binding,
                address,
            } => {
                if let Err(e) = self.graph.rebind_inlet(port, binding, address) {
                    structural_violation(&e);
                }
            }
            ExecCommand::RebindOutlet {
                port,
                binding,
                address,
            } => {
                if let Err(e) = self.graph.rebind_outlet(port, binding, address) {
                    structural_violation(&e);
                }
            }
            ExecCommand::RegisterDevice { device } => {
                self.state.register_device(&device);
            }
            ExecCommand::SetEnabled { id, enabled } => {
                if let Err(e) = self.graph.set_enabled(id, enabled) {
                    structural_violation(&e);
                }
            }
            ExecCommand::Clear => {
                self.graph.clear();
            }
        }
    }

    /// Tears the session down: converges pending commands, releases all
    /// nodes and edges, resets the state clocks and registrations.
    ///
    /// In-flight ticks are never interrupted; call this only after the clock
    /// driver has stopped invoking [`tick()`](Self::tick).
    pub fn shutdown(&mut self) {
        self.run_all_commands();
        self.graph.clear();
        self.state.reset();
        self.last_time = 0;
        self.finished_sent = false;
    }

    /// Re-registers devices after a shutdown, as part of a session reload.
    pub(crate) fn register_devices(&mut self, devices: &[Arc<Device>]) {
        for device in devices {
            self.state.register_device(device);
        }
    }

    /// The live graph. Execution-thread-only, like the executor itself.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The session's execution state.
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }
}

/// Taxonomy: an edge or command referencing an unregistered entity is a
/// programming invariant violation. Fatal in debug builds, logged and
/// ignored in release.
fn structural_violation(err: &GraphError) {
    debug_assert!(false, "structural inconsistency: {err}");
    tracing::error!(error = %err, "structural inconsistency; command ignored");
}
