//! The interpreter loop: decode one instruction at `ip`, dispatch it against
//! the stack and current activation, repeat until the outermost `RET`.

use std::io::{self, Stdout, Write};
use std::ops::ControlFlow;

use bci_image::{Image, CODE_START};
use bci_op::opcode;
use bci_value::{Heap, Payload, ValueRef};

use crate::builtins;
use crate::error::{Error, Result};
use crate::render::{self, Style};

pub struct Machine<W: Write = Stdout> {
  image: Image,
  heap: Heap,
  stack: bci_value::EvalStack,
  activation: ValueRef,
  ip: usize,
  out: W,
  trace: bool,
  continuous_gc: bool,
}

impl Machine<Stdout> {
  pub fn new(image: Image) -> Self {
    Self::with_io(image, io::stdout())
  }
}

impl<W: Write> Machine<W> {
  pub fn with_io(image: Image, out: W) -> Self {
    let mut machine = Machine {
      image,
      heap: Heap::new(),
      stack: bci_value::EvalStack::new(),
      activation: ValueRef::NULL,
      ip: CODE_START,
      out,
      trace: false,
      continuous_gc: false,
    };
    machine.activation = machine
      .alloc_and_push(Payload::Activation { parent: ValueRef::NULL, closure: ValueRef::NULL, next_ip: -1, state: None })
      .expect("allocating the outermost activation cannot fail");
    // The allocation contract pushes every new value as a root; once it's
    // latched into `self.activation` (which the mark phase roots directly)
    // it has no business occupying a permanent slot on the eval stack.
    machine.stack.pop().expect("the activation was just pushed");
    machine
  }

  pub fn set_trace(&mut self, on: bool) {
    self.trace = on;
  }

  pub fn set_continuous_gc(&mut self, on: bool) {
    self.continuous_gc = on;
  }

  pub fn heap(&self) -> &Heap {
    &self.heap
  }

  pub fn image(&self) -> &Image {
    &self.image
  }

  pub fn stack_mut(&mut self) -> &mut bci_value::EvalStack {
    &mut self.stack
  }

  pub fn into_output(self) -> W {
    self.out
  }

  /// Runs an unconditional mark-and-sweep; exposed for test harnesses and
  /// the `-d`-adjacent continuous-GC debug mode.
  pub fn force_gc(&mut self) {
    let activation = self.activation;
    let roots: Vec<ValueRef> = self.stack.iter().copied().collect();
    self.heap.force_collect(|h| {
      h.mark(activation);
      for r in &roots {
        h.mark(*r);
      }
    });
  }

  fn maybe_collect(&mut self) {
    let activation = self.activation;
    let roots: Vec<ValueRef> = self.stack.iter().copied().collect();
    self.heap.maybe_collect(|h| {
      h.mark(activation);
      for r in &roots {
        h.mark(*r);
      }
    });
  }

  /// The allocation contract every value constructor follows: take a
  /// collection opportunity, allocate, then push the result so it is rooted
  /// before any further nested allocation runs.
  pub(crate) fn alloc_and_push(&mut self, payload: Payload) -> Result<ValueRef> {
    self.maybe_collect();
    let r = self.heap.alloc(payload);
    self.stack.push(r);
    Ok(r)
  }

  /// Reads the top `size` stack entries, in push order, without removing
  /// them — so they stay rooted as ordinary stack slots through whatever
  /// allocation the caller is about to perform with them. Popping them
  /// first would leave the window between "popped" and "embedded in the new
  /// object" with no root at all, which is exactly the GC bug warned about
  /// in the allocation contract.
  fn peek_region(&self, size: usize) -> Result<Vec<ValueRef>> {
    (0..size).rev().map(|depth| self.stack.peek(depth).map_err(Error::from)).collect()
  }

  /// After `r` has been pushed on top of the `size`-entry region it was
  /// built from, collapses that now-redundant region down to just `r`.
  fn collapse_region(&mut self, size: usize, r: ValueRef) -> Result<()> {
    self.stack.set_from_top(size, r)?;
    self.stack.pop_n(size)?;
    Ok(())
  }

  pub(crate) fn write_out(&mut self, text: &str) -> Result<()> {
    self.out.write_all(text.as_bytes())?;
    Ok(())
  }

  fn read_int(&mut self) -> Result<i32> {
    let v = self.image.read_int(self.ip)?;
    self.ip += 4;
    Ok(v)
  }

  fn read_string(&mut self) -> Result<Vec<u8>> {
    let s = self.image.read_string(self.ip)?.to_vec();
    self.ip += s.len() + 1;
    Ok(s)
  }

  /// Executes until the outermost `RET`, or a fatal error.
  pub fn run(&mut self) -> Result<()> {
    loop {
      if self.continuous_gc {
        self.force_gc();
      }
      if self.trace {
        self.trace_line()?;
      }
      if self.step()?.is_break() {
        return Ok(());
      }
    }
  }

  fn trace_line(&mut self) -> Result<()> {
    let opcode_byte = self.image.byte(self.ip)?;
    let mut text = format!("{}: ", self.ip);
    match bci_op::find(opcode_byte) {
      None => text.push_str(&format!("Unknown opcode: {opcode_byte}")),
      Some(instr) => {
        text.push_str(instr.name);
        // Matches the reference trace, which reads every operand as a raw
        // 4-byte int for the instruction's declared arity rather than
        // decoding BuiltIn/String operands as variable-length data — that
        // fuller decoding is a disassembler-only behavior (see
        // `bci_op::decode_operands`).
        let operands = bci_op::decode_operands_raw(&self.image, instr, self.ip + 1).map_err(|e| match e {
          bci_op::DisasmError::Image(img) => Error::Image(img),
          bci_op::DisasmError::UnknownOpcode { opcode, .. } => Error::UnknownOpcode(opcode),
        })?;
        for op in &operands {
          text.push(' ');
          text.push_str(op);
        }
      }
    }
    text.push_str(": [");
    let entries: Vec<ValueRef> = self.stack.iter().copied().collect();
    for (i, v) in entries.iter().enumerate() {
      if i > 0 {
        text.push_str(", ");
      }
      text.push_str(&render::render(&self.image, &self.heap, &builtins::Names, *v, Style::Raw)?);
    }
    text.push_str("] ");
    text.push_str(&render::render(&self.image, &self.heap, &builtins::Names, self.activation, Style::Raw)?);
    text.push('\n');
    self.write_out(&text)
  }

  fn step(&mut self) -> Result<ControlFlow<()>> {
    let byte = self.image.byte(self.ip)?;
    self.ip += 1;
    match byte {
      opcode::PUSH_BUILTIN => {
        let name = self.read_string()?;
        let name = String::from_utf8_lossy(&name).into_owned();
        let id = builtins::find(&name).ok_or(Error::UnknownBuiltin(name))?;
        self.alloc_and_push(Payload::Builtin(id))?;
      }
      opcode::PUSH_CLOSURE => {
        let ip = self.read_int()? as u32;
        self.alloc_and_push(Payload::Closure { previous_activation: self.activation, ip })?;
      }
      opcode::PUSH_DATA => {
        let meta = self.read_int()? as u32;
        let id = self.read_int()? as u32;
        let size = self.read_int()? as usize;
        let fields = self.peek_region(size)?.into_boxed_slice();
        let r = self.alloc_and_push(Payload::Data { meta, id, fields })?;
        self.collapse_region(size, r)?;
      }
      opcode::PUSH_DATA_ITEM => {
        let offset = self.read_int()?;
        let data = self.stack.pop()?;
        match self.heap.get(data) {
          Payload::Data { fields, .. } => {
            let field = fields.get(offset as usize).copied();
            match field {
              Some(v) if offset >= 0 => self.stack.push(v),
              _ => return Err(Error::OffsetOutOfRange { op: "PUSH_DATA_ITEM", offset }),
            }
          }
          _ => return Err(Error::NotData { op: "PUSH_DATA_ITEM" }),
        }
      }
      opcode::PUSH_FALSE => self.stack.push(self.heap.bool_value(false)),
      opcode::PUSH_INT => {
        let value = self.read_int()?;
        self.alloc_and_push(Payload::Int(value))?;
      }
      opcode::PUSH_STRING => {
        let bytes = self.read_string()?;
        self.alloc_and_push(Payload::String(bytes))?;
      }
      opcode::PUSH_TRUE => self.stack.push(self.heap.bool_value(true)),
      opcode::PUSH_TUPLE => {
        let size = self.read_int()? as usize;
        let items = self.peek_region(size)?.into_boxed_slice();
        let r = self.alloc_and_push(Payload::Tuple(items))?;
        self.collapse_region(size, r)?;
      }
      opcode::PUSH_TUPLE_ITEM => {
        let offset = self.read_int()?;
        let data = self.stack.pop()?;
        match self.heap.get(data) {
          Payload::Tuple(items) => {
            let item = items.get(offset as usize).copied();
            match item {
              Some(v) if offset >= 0 => self.stack.push(v),
              _ => return Err(Error::OffsetOutOfRange { op: "PUSH_TUPLE_ITEM", offset }),
            }
          }
          _ => return Err(Error::NotTuple { op: "PUSH_TUPLE_ITEM" }),
        }
      }
      opcode::PUSH_UNIT => self.stack.push(self.heap.unit()),
      opcode::PUSH_VAR => {
        let index = self.read_int()?;
        let offset = self.read_int()?;
        let mut a = self.activation;
        let mut remaining = index;
        while remaining > 0 {
          let closure = match self.heap.get(a) {
            Payload::Activation { closure, .. } => *closure,
            _ => return Err(Error::NotAnActivation(index)),
          };
          if closure.is_null() {
            return Err(Error::NotAnActivation(index));
          }
          a = match self.heap.get(closure) {
            Payload::Closure { previous_activation, .. } => *previous_activation,
            _ => return Err(Error::NotAnActivation(index)),
          };
          remaining -= 1;
        }
        match self.heap.get(a) {
          Payload::Activation { state: Some(slots), .. } => {
            let v = *slots.get(offset as usize).ok_or(Error::VarOffsetOutOfBounds { offset, len: slots.len() })?;
            self.stack.push(v);
          }
          Payload::Activation { state: None, .. } => return Err(Error::NoState),
          _ => return Err(Error::NotAnActivation(index)),
        }
      }
      opcode::DUP => {
        let v = self.stack.peek(0)?;
        self.stack.push(v);
      }
      opcode::DISCARD => {
        self.stack.pop()?;
      }
      opcode::SWAP => self.stack.swap_top()?,
      opcode::ADD | opcode::SUB | opcode::MUL | opcode::DIV => {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        let (a, b) = (self.as_int(a, byte)?, self.as_int(b, byte)?);
        let result = match byte {
          opcode::ADD => a.wrapping_add(b),
          opcode::SUB => a.wrapping_sub(b),
          opcode::MUL => a.wrapping_mul(b),
          opcode::DIV => {
            if b == 0 {
              return Err(Error::DivisionByZero);
            }
            a.wrapping_div(b)
          }
          _ => unreachable!(),
        };
        self.alloc_and_push(Payload::Int(result))?;
      }
      opcode::EQ => {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        let (a, b) = (self.as_int(a, opcode::EQ)?, self.as_int(b, opcode::EQ)?);
        self.stack.push(self.heap.bool_value(a == b));
      }
      opcode::JMP => {
        let target = self.read_int()?;
        self.ip = target as usize;
      }
      opcode::JMP_DATA => {
        let size = self.read_int()?;
        let v = self.stack.pop()?;
        let id = match self.heap.get(v) {
          Payload::Data { id, .. } => *id,
          _ => return Err(Error::NotData { op: "JMP_DATA" }),
        };
        if id as i32 >= size {
          return Err(Error::DataIdOutOfBounds { id, size });
        }
        let target = self.image.read_int(self.ip + 4 * id as usize)?;
        self.ip = target as usize;
      }
      opcode::JMP_FALSE | opcode::JMP_TRUE => {
        let target = self.read_int()?;
        let v = self.stack.pop()?;
        let b = match self.heap.get(v) {
          Payload::Bool(b) => *b,
          _ => return Err(Error::NotABool { op: if byte == opcode::JMP_FALSE { "JMP_FALSE" } else { "JMP_TRUE" } }),
        };
        if b == (byte == opcode::JMP_TRUE) {
          self.ip = target as usize;
        }
      }
      opcode::SWAP_CALL => {
        let callee = self.stack.peek(1)?;
        match self.heap.get(callee) {
          Payload::Closure { ip, .. } => {
            let ip = *ip;
            let new_activation =
              self.alloc_and_push(Payload::Activation { parent: self.activation, closure: callee, next_ip: self.ip as i32, state: None })?;
            let arg = self.stack.peek(1)?;
            self.stack.set_from_top(2, arg)?;
            self.stack.pop_n(2)?;
            self.activation = new_activation;
            self.ip = ip as usize;
          }
          Payload::Builtin(id) => {
            let id = *id;
            builtins::call(id, self)?;
          }
          Payload::BuiltinClosure { function, .. } => {
            let function = *function;
            builtins::call(function, self)?;
          }
          other => return Err(Error::NotCallable(other.tag())),
        }
      }
      opcode::ENTER => {
        let size = self.read_int()?;
        match self.heap.get_mut(self.activation) {
          Payload::Activation { state, .. } => {
            if state.is_some() {
              return Err(Error::AlreadyEntered);
            }
            *state = Some(vec![ValueRef::NULL; size.max(0) as usize].into_boxed_slice());
          }
          _ => unreachable!("the current activation is always an Activation"),
        }
      }
      opcode::RET => {
        let (parent, next_ip) = match self.heap.get(self.activation) {
          Payload::Activation { parent, next_ip, .. } => (*parent, *next_ip),
          _ => unreachable!("the current activation is always an Activation"),
        };
        if parent.is_null() {
          let v = self.stack.pop()?;
          if !matches!(self.heap.get(v), Payload::Unit) {
            let text = render::render(&self.image, &self.heap, &builtins::Names, v, Style::Typed)?;
            self.write_out(&text)?;
            self.write_out("\n")?;
          }
          return Ok(ControlFlow::Break(()));
        }
        self.ip = next_ip as usize;
        self.activation = parent;
      }
      opcode::STORE_VAR => {
        let index = self.read_int()?;
        let v = self.stack.pop()?;
        match self.heap.get_mut(self.activation) {
          Payload::Activation { state: Some(slots), .. } => {
            let slot = slots.get_mut(index as usize).ok_or(Error::StoreIndexOutOfBounds { index })?;
            *slot = v;
          }
          Payload::Activation { state: None, .. } => return Err(Error::NoState),
          _ => unreachable!("the current activation is always an Activation"),
        }
      }
      other => return Err(Error::UnknownOpcode(other)),
    }
    Ok(ControlFlow::Continue(()))
  }

  fn as_int(&self, v: ValueRef, op: u8) -> Result<i32> {
    match self.heap.get(v) {
      Payload::Int(i) => Ok(*i),
      _ => Err(Error::NotAnInt { op: opcode_name(op) }),
    }
  }
}

fn opcode_name(byte: u8) -> &'static str {
  bci_op::find(byte).map(|i| i.name).unwrap_or("?")
}

#[cfg(test)]
mod tests;
