//! Tagged values, the evaluation stack and the mark-and-sweep heap they live
//! in. This crate knows nothing about instructions or control flow; it's the
//! data model the interpreter operates on.

mod heap;
mod stack;
mod value;

pub use heap::{Heap, INITIAL_CAPACITY};
pub use stack::{EvalStack, StackError};
pub use value::{NativeId, Payload, Tag, ValueRef};
