//! Affine mapping node.

use crate::node::{ProcessNode, TickContext};
use crate::port::{Inlet, Outlet};
use crate::value::Value;

/// Applies `scale * x + offset` to the first inlet's numeric value and
/// writes the result to the first outlet. No input, no output.
pub struct MapNode {
    scale: f64,
    offset: f64,
}

impl MapNode {
    /// Creates a map node with the given scale and offset.
    pub fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }
}

impl ProcessNode for MapNode {
    fn label(&self) -> &str {
        "map"
    }

    fn process(&mut self, inlets: &mut [Inlet], outlets: &mut [Outlet], ctx: &TickContext) {
        if let Some(value) = inlets.first().and_then(Inlet::value)
            && let Some(outlet) = outlets.first_mut()
        {
            outlet.write(Value::Float(value.as_float() * self.scale + self.offset), ctx);
        }
    }
}
