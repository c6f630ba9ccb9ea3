//! Pass-through node.

use crate::node::{ProcessNode, TickContext};
use crate::port::{Inlet, Outlet};

/// Forwards each inlet to the outlet of the same index, values and signals
/// alike. Inlets that received nothing this tick forward nothing, so
/// strictness is preserved end to end.
#[derive(Default)]
pub struct RelayNode;

impl RelayNode {
    /// Creates a relay.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessNode for RelayNode {
    fn label(&self) -> &str {
        "relay"
    }

    fn process(&mut self, inlets: &mut [Inlet], outlets: &mut [Outlet], ctx: &TickContext) {
        for (inlet, outlet) in inlets.iter().zip(outlets.iter_mut()) {
            if let Some(value) = inlet.value() {
                outlet.write(value.clone(), ctx);
            } else if let Some(signal) = inlet.signal()
                && let Some(buf) = outlet.signal_mut(ctx)
            {
                buf.write_from(signal.samples());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Payload;
    use crate::value::Value;

    fn ctx(tick: u64) -> TickContext {
        TickContext {
            tick,
            date: tick,
            dt: 1,
        }
    }

    #[test]
    fn forwards_values_per_index() {
        let mut node = RelayNode::new();
        let mut inlets = vec![Inlet::value_port(), Inlet::value_port()];
        let mut outlets = vec![Outlet::value_port(), Outlet::value_port()];

        inlets[0].accept(Some(Payload::Value(Value::Int(1))));
        inlets[1].accept(None);
        node.process(&mut inlets, &mut outlets, &ctx(1));

        assert_eq!(outlets[0].value(), Some(&Value::Int(1)));
        assert_eq!(outlets[1].written_at(), None);
    }

    #[test]
    fn forwards_signals() {
        let mut node = RelayNode::new();
        let mut inlets = vec![Inlet::signal_port()];
        let mut outlets = vec![Outlet::signal_port()];

        inlets[0].accept(Some(Payload::Signal(vec![0.1, 0.2])));
        node.process(&mut inlets, &mut outlets, &ctx(1));

        assert_eq!(outlets[0].written_at(), Some(1));
    }
}
