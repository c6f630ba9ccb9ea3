//! Scripted value source.

use crate::node::{ProcessNode, TickContext};
use crate::port::{Inlet, Outlet};
use crate::value::Value;

/// Emits a scripted sequence of optional values, one step per tick, on its
/// first outlet.
///
/// A `None` step emits nothing that tick, which is how strict-connection
/// behavior is exercised deterministically. The script either plays once and
/// falls silent or loops.
pub struct SequenceNode {
    script: Vec<Option<Value>>,
    pos: usize,
    looping: bool,
}

impl SequenceNode {
    /// Plays `script` once, then emits nothing.
    pub fn new(script: Vec<Option<Value>>) -> Self {
        Self {
            script,
            pos: 0,
            looping: false,
        }
    }

    /// Plays `script` in a loop.
    pub fn cycle(script: Vec<Option<Value>>) -> Self {
        Self {
            script,
            pos: 0,
            looping: true,
        }
    }

    /// Emits `value` on every tick.
    pub fn repeat(value: Value) -> Self {
        Self::cycle(vec![Some(value)])
    }
}

impl ProcessNode for SequenceNode {
    fn label(&self) -> &str {
        "sequence"
    }

    fn process(&mut self, _inlets: &mut [Inlet], outlets: &mut [Outlet], ctx: &TickContext) {
        let len = self.script.len();
        let step = if len == 0 {
            None
        } else if self.looping {
            Some(self.pos % len)
        } else if self.pos < len {
            Some(self.pos)
        } else {
            None
        };
        self.pos += 1;

        if let Some(i) = step
            && let Some(value) = &self.script[i]
            && let Some(outlet) = outlets.first_mut()
        {
            outlet.write(value.clone(), ctx);
        }
    }

    fn reset(&mut self) {
        self.pos = 0;
    }
}
