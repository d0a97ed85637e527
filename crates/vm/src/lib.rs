//! The abstract machine: a stack-based bytecode interpreter with a tracing
//! mark-and-sweep heap, built on top of `bci_image` (the bytecode container)
//! and `bci_op` (the instruction catalogue).

mod builtins;
mod error;
mod machine;
mod render;

pub use error::{Error, Result};
pub use machine::Machine;
pub use render::{render, BuiltinNames, Style};
