//! Built-in node kinds.
//!
//! A small set of general-purpose processors: scripted sources, pass-through
//! relays, numeric fan-in and affine mapping. Device-addressed behavior needs
//! no dedicated node kind; any port picks it up through its binding. Richer
//! processors implement [`ProcessNode`](crate::node::ProcessNode) in
//! downstream crates.

mod map;
mod relay;
mod sequence;
mod sum;

pub use map::MapNode;
pub use relay::RelayNode;
pub use sequence::SequenceNode;
pub use sum::SumNode;
