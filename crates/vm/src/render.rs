//! Rendering a value to text: the `print`/`printLiteral` builtins, the
//! top-level `RET`'s typed result, and debug trace lines all go through
//! here.

use bci_image::Image;
use bci_value::{Heap, NativeId, Payload, ValueRef};

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Style {
  /// Plain rendering: closures show as `c<ip>#<depth>`, strings unquoted.
  Raw,
  /// Strings quoted and escaped; closures show as `function`.
  Literal,
  /// Like `Literal`, with `: <Type>` appended.
  Typed,
}

impl Style {
  fn quoted(self) -> bool {
    !matches!(self, Style::Raw)
  }
}

/// Resolves a [`NativeId`] to the builtin's registered name, for rendering
/// `Builtin` and `BuiltinClosure` chains.
pub trait BuiltinNames {
  fn name(&self, id: NativeId) -> &str;
}

pub fn render(image: &Image, heap: &Heap, names: &impl BuiltinNames, v: ValueRef, style: Style) -> Result<String> {
  let mut out = String::new();
  append_value(image, heap, names, v, style, &mut out)?;
  if style == Style::Typed {
    out.push_str(": ");
    append_type(image, heap, v, &mut out)?;
  }
  Ok(out)
}

fn append_value(image: &Image, heap: &Heap, names: &impl BuiltinNames, v: ValueRef, style: Style, out: &mut String) -> Result<()> {
  if v.is_null() {
    out.push('-');
    return Ok(());
  }
  match heap.get(v) {
    Payload::Unit => out.push_str("()"),
    Payload::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
    Payload::Int(i) => out.push_str(&i.to_string()),
    Payload::String(bytes) => {
      let text = String::from_utf8_lossy(bytes);
      if style.quoted() {
        out.push('"');
        for c in text.chars() {
          if c == '"' || c == '\\' {
            out.push('\\');
          }
          out.push(c);
        }
        out.push('"');
      } else {
        out.push_str(&text);
      }
    }
    Payload::Tuple(items) => {
      out.push('(');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        append_value(image, heap, names, *item, style, out)?;
      }
      out.push(')');
    }
    Payload::Data { meta, id, fields } => {
      let data_names = image.read_data_names(*meta as usize)?;
      let ctor = data_names
        .ctor_name(*id as i32)
        .ok_or(Error::DataIdOutOfBounds { id: *id, size: data_names.ctor_count() as i32 })?;
      out.push_str(&String::from_utf8_lossy(ctor));
      for field in fields.iter() {
        out.push(' ');
        let nested_needs_parens = matches!(heap.get(*field), Payload::Data { fields, .. } if !fields.is_empty());
        if nested_needs_parens {
          out.push('(');
          append_value(image, heap, names, *field, style, out)?;
          out.push(')');
        } else {
          append_value(image, heap, names, *field, style, out)?;
        }
      }
    }
    Payload::Closure { previous_activation, ip } => {
      if style == Style::Raw {
        out.push('c');
        out.push_str(&ip.to_string());
        out.push('#');
        out.push_str(&activation_depth(heap, *previous_activation).to_string());
      } else {
        out.push_str("function");
      }
    }
    Payload::Activation { parent, closure, next_ip, state } => {
      out.push('<');
      append_value(image, heap, names, *parent, style, out)?;
      out.push_str(", ");
      append_value(image, heap, names, *closure, style, out)?;
      out.push_str(", ");
      if *next_ip == -1 {
        out.push('-');
      } else {
        out.push_str(&next_ip.to_string());
      }
      out.push_str(", ");
      match state {
        None => out.push('-'),
        Some(slots) => {
          out.push('[');
          for (i, slot) in slots.iter().enumerate() {
            if i > 0 {
              out.push_str(", ");
            }
            append_value(image, heap, names, *slot, style, out)?;
          }
          out.push(']');
        }
      }
      out.push('>');
    }
    Payload::Builtin(id) => out.push_str(names.name(*id)),
    Payload::BuiltinClosure { .. } => {
      out.push('<');
      append_builtin_closure(image, heap, names, v, style, out)?;
      out.push('>');
    }
  }
  Ok(())
}

fn append_builtin_closure(image: &Image, heap: &Heap, names: &impl BuiltinNames, v: ValueRef, style: Style, out: &mut String) -> Result<()> {
  let Payload::BuiltinClosure { previous, argument, .. } = heap.get(v) else {
    unreachable!("append_builtin_closure called on a non-BuiltinClosure");
  };
  match heap.get(*previous) {
    Payload::Builtin(id) => out.push_str(names.name(*id)),
    _ => append_builtin_closure(image, heap, names, *previous, style, out)?,
  }
  out.push(' ');
  append_value(image, heap, names, *argument, style, out)?;
  Ok(())
}

/// Walks the *dynamic* parent chain of the activation a closure captured as
/// its lexical environment, counting frames. Used only for `Raw` closure
/// rendering (`c<ip>#<depth>`) — a debugging aid, not load-bearing state.
fn activation_depth(heap: &Heap, activation: ValueRef) -> usize {
  let mut depth = 0;
  let mut current = activation;
  while !current.is_null() {
    match heap.get(current) {
      Payload::Activation { parent, .. } => {
        depth += 1;
        current = *parent;
      }
      _ => break,
    }
  }
  depth
}

fn append_type(image: &Image, heap: &Heap, v: ValueRef, out: &mut String) -> Result<()> {
  if v.is_null() {
    return Ok(());
  }
  match heap.get(v) {
    Payload::Unit => out.push_str("Unit"),
    Payload::Bool(_) => out.push_str("Bool"),
    Payload::Int(_) => out.push_str("Int"),
    Payload::String(_) => out.push_str("String"),
    Payload::Tuple(items) => {
      out.push('(');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push_str(" * ");
        }
        append_type(image, heap, *item, out)?;
      }
      out.push(')');
    }
    Payload::Data { meta, .. } => {
      let data_names = image.read_data_names(*meta as usize)?;
      out.push_str(&String::from_utf8_lossy(data_names.type_name()));
    }
    Payload::Closure { .. } => out.push_str("Closure"),
    Payload::Activation { .. } => out.push_str("Activation"),
    Payload::Builtin(_) => out.push_str("Builtin"),
    Payload::BuiltinClosure { .. } => out.push_str("BuiltinClosure"),
  }
  Ok(())
}
