//! The nine native functions reachable from bytecode, plus the curried
//! continuation stages `SWAP_CALL` invokes via `BuiltinClosure`.
//!
//! A curried builtin is a tiny state machine: each application before the
//! last produces a `BuiltinClosure` remembering what's been supplied so far
//! and which stage runs next; the last application does the actual work.

use std::io::Write;

use bci_value::{NativeId, Payload, ValueRef};

use crate::error::{Error, Result};
use crate::machine::Machine;
use crate::render::{self, Style};

pub const PRINT: NativeId = NativeId(0);
pub const PRINTLN: NativeId = NativeId(1);
pub const PRINT_LITERAL: NativeId = NativeId(2);
pub const STRING_COMPARE: NativeId = NativeId(3);
pub const STRING_CONCAT: NativeId = NativeId(4);
pub const STRING_EQUAL: NativeId = NativeId(5);
pub const STRING_LENGTH: NativeId = NativeId(6);
pub const STRING_SUBSTRING: NativeId = NativeId(7);
pub const FATAL_ERROR: NativeId = NativeId(8);

const STRING_COMPARE_1: NativeId = NativeId(9);
const STRING_CONCAT_1: NativeId = NativeId(10);
const STRING_EQUAL_1: NativeId = NativeId(11);
const STRING_SUBSTRING_1: NativeId = NativeId(12);
const STRING_SUBSTRING_2: NativeId = NativeId(13);

const NAMED: &[(NativeId, &str)] = &[
  (PRINT, "$$builtin-print"),
  (PRINTLN, "$$builtin-println"),
  (PRINT_LITERAL, "$$builtin-print-literal"),
  (STRING_COMPARE, "$$builtin-string-compare"),
  (STRING_CONCAT, "$$builtin-string-concat"),
  (STRING_EQUAL, "$$builtin-string-equal"),
  (STRING_LENGTH, "$$builtin-string-length"),
  (STRING_SUBSTRING, "$$builtin-string-substring"),
  (FATAL_ERROR, "$$builtin-fatal-error"),
];

pub fn find(name: &str) -> Option<NativeId> {
  NAMED.iter().find(|(_, n)| *n == name).map(|(id, _)| *id)
}

pub struct Names;

impl render::BuiltinNames for Names {
  fn name(&self, id: NativeId) -> &str {
    NAMED.iter().find(|(i, _)| *i == id).map(|(_, n)| *n).expect("Builtin values only ever hold a named id")
  }
}

fn string_bytes(m: &Machine<impl Write>, r: ValueRef) -> Result<Vec<u8>> {
  match m.heap().get(r) {
    Payload::String(bytes) => Ok(bytes.clone()),
    _ => Err(Error::NotAString { op: "builtin" }),
  }
}

/// Applies the convention shared by every non-final curry stage: allocate a
/// `BuiltinClosure` remembering `peek(1)` (the previous stage) and `peek(0)`
/// (the just-supplied argument), then collapse the call's three-slot region
/// down to the two slots the caller expects.
fn curry(m: &mut Machine<impl Write>, next_stage: NativeId) -> Result<()> {
  let argument = m.stack_mut().peek(0)?;
  let previous = m.stack_mut().peek(1)?;
  m.alloc_and_push(Payload::BuiltinClosure { previous, argument, function: next_stage })?;
  let closure = m.stack_mut().peek(0)?;
  m.stack_mut().set_from_top(2, closure)?;
  m.stack_mut().pop_n(2)?;
  Ok(())
}

pub fn call(id: NativeId, m: &mut Machine<impl Write>) -> Result<()> {
  match id {
    PRINT => {
      let v = m.stack_mut().pop()?;
      m.stack_mut().pop()?;
      let text = render::render(m.image(), m.heap(), &Names, v, Style::Raw)?;
      m.write_out(&text)
    }
    PRINTLN => {
      m.stack_mut().pop()?;
      m.stack_mut().pop()?;
      m.write_out("\n")
    }
    PRINT_LITERAL => {
      let v = m.stack_mut().pop()?;
      m.stack_mut().pop()?;
      let text = render::render(m.image(), m.heap(), &Names, v, Style::Literal)?;
      m.write_out(&text)
    }
    STRING_COMPARE => curry(m, STRING_COMPARE_1),
    STRING_CONCAT => curry(m, STRING_CONCAT_1),
    STRING_EQUAL => curry(m, STRING_EQUAL_1),
    STRING_SUBSTRING => curry(m, STRING_SUBSTRING_1),
    STRING_LENGTH => {
      let v = m.stack_mut().pop()?;
      m.stack_mut().pop()?;
      let len = string_bytes(m, v)?.len() as i32;
      m.alloc_and_push(Payload::Int(len))?;
      Ok(())
    }
    FATAL_ERROR => {
      let v = m.stack_mut().pop()?;
      let text = render::render(m.image(), m.heap(), &Names, v, Style::Raw)?;
      m.write_out(&format!("Fatal error: {text}\n"))?;
      Err(Error::FatalError)
    }
    STRING_COMPARE_1 => {
      let second = m.stack_mut().pop()?;
      let closure = m.stack_mut().pop()?;
      let first = match m.heap().get(closure) {
        Payload::BuiltinClosure { argument, .. } => *argument,
        _ => unreachable!("builtin continuation invoked on a non-BuiltinClosure"),
      };
      let a = string_bytes(m, first)?;
      let b = string_bytes(m, second)?;
      let cmp = match a.cmp(&b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
      };
      m.alloc_and_push(Payload::Int(cmp))?;
      Ok(())
    }
    STRING_CONCAT_1 => {
      let second = m.stack_mut().pop()?;
      let closure = m.stack_mut().pop()?;
      let first = match m.heap().get(closure) {
        Payload::BuiltinClosure { argument, .. } => *argument,
        _ => unreachable!("builtin continuation invoked on a non-BuiltinClosure"),
      };
      let mut bytes = string_bytes(m, first)?;
      bytes.extend(string_bytes(m, second)?);
      m.alloc_and_push(Payload::String(bytes))?;
      Ok(())
    }
    STRING_EQUAL_1 => {
      let second = m.stack_mut().pop()?;
      let closure = m.stack_mut().pop()?;
      let first = match m.heap().get(closure) {
        Payload::BuiltinClosure { argument, .. } => *argument,
        _ => unreachable!("builtin continuation invoked on a non-BuiltinClosure"),
      };
      let equal = string_bytes(m, first)? == string_bytes(m, second)?;
      let result = m.heap().bool_value(equal);
      m.stack_mut().push(result);
      Ok(())
    }
    STRING_SUBSTRING_1 => curry(m, STRING_SUBSTRING_2),
    STRING_SUBSTRING_2 => {
      let end = m.stack_mut().pop()?;
      let closure1 = m.stack_mut().pop()?;
      let (start, closure0) = match m.heap().get(closure1) {
        Payload::BuiltinClosure { previous, argument, .. } => (*argument, *previous),
        _ => unreachable!("builtin continuation invoked on a non-BuiltinClosure"),
      };
      let source = match m.heap().get(closure0) {
        Payload::BuiltinClosure { argument, .. } => *argument,
        _ => unreachable!("builtin continuation invoked on a non-BuiltinClosure"),
      };
      let bytes = string_bytes(m, source)?;
      let start = match m.heap().get(start) {
        Payload::Int(i) => *i,
        _ => return Err(Error::NotAnInt { op: "$$builtin-string-substring" }),
      };
      let end = match m.heap().get(end) {
        Payload::Int(i) => *i,
        _ => return Err(Error::NotAnInt { op: "$$builtin-string-substring" }),
      };
      let len = bytes.len() as i32;
      let start = start.clamp(0, len);
      let end = end.clamp(0, len);
      let slice = if end <= start { Vec::new() } else { bytes[start as usize..end as usize].to_vec() };
      m.alloc_and_push(Payload::String(slice))?;
      Ok(())
    }
    _ => unreachable!("no such native function: {id:?}"),
  }
}

#[cfg(test)]
mod tests;
