//! Patch files: a TOML description of devices, nodes and cables.
//!
//! A patch is the CLI's stand-in for the authoring document: enough to build
//! a session, wire a graph and watch it run. Sequence scripts use the string
//! `"-"` for a silent step, since TOML has no null.
//!
//! ```toml
//! [settings]
//! scheduling = "static-topo"
//!
//! root-duration = 640
//! tick-samples = 64
//!
//! [[devices]]
//! name = "lights"
//! parameters = [{ path = "/dimmer/1", initial = 0.0 }]
//!
//! [[nodes]]
//! id = "lfo"
//! kind = "sequence"
//! values = [0.0, 0.5, 1.0, "-"]
//! loop = true
//!
//! [[nodes]]
//! id = "out"
//! kind = "relay"
//! outlet-address = "lights:/dimmer/1"
//! observed = true
//!
//! [[cables]]
//! source = "lfo:0"
//! sink = "out:0"
//! kind = "immediate-glutton"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Deserialize;

use flujo_core::{
    Address, ConnectionKind, Device, Graph, Inlet, MapNode, NodeId, Outlet, PortRef, ProcessNode,
    RelayNode, SequenceNode, SumNode, Value,
};
use flujo_engine::{ExecutorSettings, PortSpec, Session, SessionError};

/// A parsed patch file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Patch {
    /// Session build settings.
    #[serde(default)]
    pub settings: ExecutorSettings,
    /// Root interval length in samples; `None` plays until interrupted.
    #[serde(default)]
    pub root_duration: Option<u64>,
    /// Logical samples advanced per tick.
    #[serde(default = "default_tick_samples")]
    pub tick_samples: u64,
    #[serde(default)]
    devices: Vec<PatchDevice>,
    #[serde(default)]
    nodes: Vec<PatchNode>,
    #[serde(default)]
    cables: Vec<PatchCable>,
}

fn default_tick_samples() -> u64 {
    64
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PatchDevice {
    name: String,
    #[serde(default)]
    parameters: Vec<PatchParameter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PatchParameter {
    path: String,
    initial: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum PatchNodeKind {
    Sequence,
    Relay,
    Sum,
    Map,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PatchNode {
    id: String,
    kind: PatchNodeKind,
    /// Sequence script; `"-"` is a silent step.
    #[serde(default)]
    values: Vec<Value>,
    #[serde(default, rename = "loop")]
    looping: bool,
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    offset: f64,
    /// Inlet count for relay and sum nodes.
    #[serde(default)]
    inlets: Option<usize>,
    inlet_address: Option<String>,
    outlet_address: Option<String>,
    #[serde(default)]
    observed: bool,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PatchCable {
    source: String,
    sink: String,
    kind: ConnectionKind,
}

/// Port shape of an instantiated patch node.
struct NodeShape {
    node: Box<dyn ProcessNode + Send>,
    inlets: usize,
    outlets: usize,
}

impl Patch {
    /// Parses a patch from TOML text.
    pub fn from_str(input: &str) -> anyhow::Result<Self> {
        let patch: Patch = toml::from_str(input).context("failed to parse patch")?;
        patch.settings.validate().context("invalid settings")?;
        Ok(patch)
    }

    /// Reads and parses a patch file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_str(&text)
    }

    /// Builds the patch's devices.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices
            .iter()
            .map(|d| {
                let mut device = Device::new(&d.name);
                for p in &d.parameters {
                    device.insert(&p.path, p.initial.clone());
                }
                Arc::new(device)
            })
            .collect()
    }

    /// Starts a session and registers every node and cable.
    ///
    /// Returns the session, its executor, and the patch-id to node-id map.
    pub fn build_session(
        &self,
    ) -> anyhow::Result<(Session, flujo_engine::Executor, HashMap<String, NodeId>)> {
        let (mut session, mut executor) =
            Session::start(self.settings, self.devices(), self.root_duration)?;

        let mut ids = HashMap::new();
        for spec in &self.nodes {
            let shape = instantiate(spec)?;
            let inlet_specs: Vec<PortSpec> = (0..shape.inlets)
                .map(|i| {
                    let mut p = PortSpec::value();
                    if i == 0 && let Some(addr) = &spec.inlet_address {
                        p = p.with_address(parse_address(addr)?);
                    }
                    Ok(p)
                })
                .collect::<anyhow::Result<_>>()?;
            let outlet_specs: Vec<PortSpec> = (0..shape.outlets)
                .map(|i| {
                    let mut p = PortSpec::value().observed(i == 0 && spec.observed);
                    if i == 0 && let Some(addr) = &spec.outlet_address {
                        p = p.with_address(parse_address(addr)?);
                    }
                    Ok(p)
                })
                .collect::<anyhow::Result<_>>()?;

            let id = session
                .register_process(shape.node, &inlet_specs, &outlet_specs)
                .map_err(session_err)?;
            if ids.insert(spec.id.clone(), id).is_some() {
                bail!("duplicate node id '{}'", spec.id);
            }
        }

        for cable in &self.cables {
            let source = parse_port(&cable.source, &ids)?;
            let sink = parse_port(&cable.sink, &ids)?;
            session
                .connect_cable(source, sink, cable.kind)
                .map_err(session_err)?;
        }

        // Converge the initial document before the clock starts.
        executor.run_all_commands();
        Ok((session, executor, ids))
    }

    /// Builds the graph directly, without a bridge, for schedulability
    /// checks.
    pub fn build_graph(&self) -> anyhow::Result<Graph> {
        let mut graph =
            Graph::new(self.settings.scheduling).with_parallel_execution(self.settings.parallel);
        let mut ids = HashMap::new();
        for spec in &self.nodes {
            let shape = instantiate(spec)?;
            let inlets = (0..shape.inlets).map(|_| Inlet::value_port()).collect();
            let outlets = (0..shape.outlets).map(|_| Outlet::value_port()).collect();
            let id = graph.add_node(shape.node, inlets, outlets);
            if ids.insert(spec.id.clone(), id).is_some() {
                bail!("duplicate node id '{}'", spec.id);
            }
        }
        for cable in &self.cables {
            let source = parse_port(&cable.source, &ids)?;
            let sink = parse_port(&cable.sink, &ids)?;
            graph
                .connect(source, sink, cable.kind)
                .with_context(|| format!("cable {} -> {}", cable.source, cable.sink))?;
        }
        Ok(graph)
    }

    /// Number of nodes described by the patch.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of cables described by the patch.
    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }
}

fn instantiate(spec: &PatchNode) -> anyhow::Result<NodeShape> {
    Ok(match spec.kind {
        PatchNodeKind::Sequence => {
            let script: Vec<Option<Value>> = spec
                .values
                .iter()
                .map(|v| match v {
                    Value::String(s) if s == "-" => None,
                    other => Some(other.clone()),
                })
                .collect();
            let node = if spec.looping {
                SequenceNode::cycle(script)
            } else {
                SequenceNode::new(script)
            };
            NodeShape {
                node: Box::new(node),
                inlets: 0,
                outlets: 1,
            }
        }
        PatchNodeKind::Relay => {
            let n = spec.inlets.unwrap_or(1);
            NodeShape {
                node: Box::new(RelayNode::new()),
                inlets: n,
                outlets: n,
            }
        }
        PatchNodeKind::Sum => NodeShape {
            node: Box::new(SumNode::new()),
            inlets: spec.inlets.unwrap_or(2),
            outlets: 1,
        },
        PatchNodeKind::Map => NodeShape {
            node: Box::new(MapNode::new(spec.scale, spec.offset)),
            inlets: 1,
            outlets: 1,
        },
    })
}

fn parse_address(input: &str) -> anyhow::Result<Address> {
    input
        .parse()
        .with_context(|| format!("bad address '{input}'"))
}

/// Parses `"node-id:port-index"` into a [`PortRef`].
fn parse_port(input: &str, ids: &HashMap<String, NodeId>) -> anyhow::Result<PortRef> {
    let Some((name, port)) = input.rsplit_once(':') else {
        bail!("bad port reference '{input}' (expected 'node:port')");
    };
    let Some(&node) = ids.get(name) else {
        bail!("unknown node '{name}' in port reference '{input}'");
    };
    let index: usize = port
        .parse()
        .with_context(|| format!("bad port index in '{input}'"))?;
    Ok(PortRef::new(node, index))
}

fn session_err(err: SessionError) -> anyhow::Error {
    anyhow::anyhow!("{err}")
}
