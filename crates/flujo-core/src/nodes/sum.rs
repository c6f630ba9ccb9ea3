//! Numeric fan-in node.

use crate::node::{ProcessNode, TickContext};
use crate::port::{Inlet, Outlet};
use crate::value::Value;

/// Sums the numeric interpretation of every inlet that delivered a value
/// this tick and writes the total to the first outlet. With no inputs at all
/// the outlet stays unwritten.
#[derive(Default)]
pub struct SumNode;

impl SumNode {
    /// Creates a sum node.
    pub fn new() -> Self {
        Self
    }
}

impl ProcessNode for SumNode {
    fn label(&self) -> &str {
        "sum"
    }

    fn process(&mut self, inlets: &mut [Inlet], outlets: &mut [Outlet], ctx: &TickContext) {
        let mut total = 0.0;
        let mut any = false;
        for inlet in inlets.iter() {
            if let Some(value) = inlet.value() {
                total += value.as_float();
                any = true;
            }
        }
        if any && let Some(outlet) = outlets.first_mut() {
            outlet.write(Value::Float(total), ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Payload;

    fn ctx(tick: u64) -> TickContext {
        TickContext {
            tick,
            date: tick,
            dt: 1,
        }
    }

    #[test]
    fn sums_present_inputs() {
        let mut node = SumNode::new();
        let mut inlets = vec![
            Inlet::value_port(),
            Inlet::value_port(),
            Inlet::value_port(),
        ];
        let mut outlets = vec![Outlet::value_port()];

        inlets[0].accept(Some(Payload::Value(Value::Int(2))));
        inlets[2].accept(Some(Payload::Value(Value::Float(0.5))));
        node.process(&mut inlets, &mut outlets, &ctx(1));

        assert_eq!(outlets[0].value(), Some(&Value::Float(2.5)));
    }

    #[test]
    fn stays_silent_without_inputs() {
        let mut node = SumNode::new();
        let mut inlets = vec![Inlet::value_port()];
        let mut outlets = vec![Outlet::value_port()];
        node.process(&mut inlets, &mut outlets, &ctx(1));
        assert_eq!(outlets[0].written_at(), None);
    }
}
