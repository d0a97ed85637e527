//! Walks a code segment and renders one line of text per instruction.
//!
//! Unlike the historical reference implementation, `PUSH_STRING`,
//! `PUSH_BUILTIN` and `JMP_DATA`'s inline jump table are decoded as the
//! variable-length operands they are, rather than being stepped over as if
//! they were fixed 4-byte integers (see the crate-level docs for why).

use std::fmt::Write as _;

use bci_image::{Image, ImageError, CODE_START};

use crate::opcode::{self, find, Operand};

#[derive(Debug, thiserror::Error)]
pub enum DisasmError {
  #[error("unknown opcode {opcode} at offset {offset}")]
  UnknownOpcode { offset: usize, opcode: u8 },
  #[error(transparent)]
  Image(#[from] ImageError),
}

pub type Result<T, E = DisasmError> = std::result::Result<T, E>;

/// Disassembles the whole code segment starting at [`CODE_START`].
pub fn disassemble(image: &Image) -> Result<String> {
  let mut out = String::new();
  let mut offset = CODE_START;
  while offset < image.len() {
    writeln!(out, "{}", disassemble_one(image, &mut offset)?).unwrap();
  }
  Ok(out)
}

/// Decodes an instruction's fixed operands (not any inline jump table) into
/// display strings, advancing `offset` past each one. Used by the
/// disassembler, which fully decodes `BuiltIn`/`String` operands as the
/// variable-length data they are instead of stepping over them as a fixed
/// 4-byte integer.
pub fn decode_operands(image: &Image, instr: &crate::opcode::Instruction, offset: &mut usize) -> Result<Vec<String>> {
  let mut rendered = Vec::with_capacity(instr.arity());
  for operand in instr.operands {
    match operand {
      Operand::Int | Operand::Label => {
        rendered.push(image.read_int(*offset)?.to_string());
        *offset += 4;
      }
      Operand::BuiltIn | Operand::String => {
        let s = image.read_string(*offset)?;
        rendered.push(format!("{:?}", String::from_utf8_lossy(s)));
        *offset += s.len() + 1;
      }
    }
  }
  Ok(rendered)
}

/// Decodes an instruction's operands the way the reference `logInstruction`
/// does for its per-instruction trace: every operand is a raw 4-byte int at
/// `offset + i * 4`, regardless of its declared kind. `BuiltIn`/`String`
/// operands are not walked as variable-length data here — unlike
/// [`decode_operands`] — since the trace format never decoded them that way
/// and nothing after the operand list depends on `offset` being left past a
/// string's actual end.
pub fn decode_operands_raw(image: &Image, instr: &crate::opcode::Instruction, offset: usize) -> Result<Vec<String>> {
  let mut rendered = Vec::with_capacity(instr.arity());
  for (i, _) in instr.operands.iter().enumerate() {
    rendered.push(image.read_int(offset + i * 4)?.to_string());
  }
  Ok(rendered)
}

/// Disassembles a single instruction at `*offset`, advancing it past the
/// instruction and all of its operands (including any inline jump table).
pub fn disassemble_one(image: &Image, offset: &mut usize) -> Result<String> {
  let start = *offset;
  let byte = image.byte(*offset)?;
  let instr = find(byte).ok_or(DisasmError::UnknownOpcode { offset: start, opcode: byte })?;
  *offset += 1;

  let mut rendered = decode_operands(image, instr, offset)?;

  if byte == opcode::JMP_DATA {
    let size = image.read_int(*offset)?;
    *offset += 4;
    let mut labels = Vec::with_capacity(size.max(0) as usize);
    for i in 0..size {
      labels.push(image.read_int(*offset + i as usize * 4)?.to_string());
    }
    *offset += size.max(0) as usize * 4;
    rendered.push(format!("[{}]", labels.join(", ")));
  }

  Ok(if rendered.is_empty() {
    format!("{start:6}: {}", instr.name)
  } else {
    format!("{start:6}: {} {}", instr.name, rendered.join(" "))
  })
}
