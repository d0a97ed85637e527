use std::fmt;

/// A reference to a heap-allocated [`crate::Object`].
///
/// This is the "Value reference" the specification talks about: a cheap,
/// `Copy` handle into a [`crate::Heap`]'s slab, not the object itself.
/// [`ValueRef::NULL`] is the sentinel used for cleared stack slots and
/// not-yet-entered activation state, matching the reference's use of a null
/// pointer for the same purpose.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueRef(u32);

impl ValueRef {
  pub const NULL: ValueRef = ValueRef(u32::MAX);

  pub(crate) fn new(index: u32) -> Self {
    ValueRef(index)
  }

  pub(crate) fn index(self) -> usize {
    self.0 as usize
  }

  pub fn is_null(self) -> bool {
    self.0 == u32::MAX
  }
}

impl fmt::Debug for ValueRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_null() {
      write!(f, "ValueRef(null)")
    } else {
      write!(f, "ValueRef({})", self.0)
    }
  }
}

impl Default for ValueRef {
  fn default() -> Self {
    ValueRef::NULL
  }
}

/// Identifies a native function for the `Builtin` and `BuiltinClosure` tags.
///
/// The value heap doesn't know what a builtin *does* — that's the VM's
/// business — it only needs a small `Copy` key to store in a [`Payload`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NativeId(pub u16);

/// The payload carried by a heap object, one variant per value tag.
///
/// The GC colour is *not* stored here (see [`crate::Object`]): packing it
/// into a tag byte, as the historical reference does, saves a word but
/// forces every read of the tag to mask out the colour bit first. Keeping it
/// as a separate field lets the payload be an ordinary Rust enum and the
/// compiler's own discriminant serves as the tag.
#[derive(Debug, PartialEq)]
pub enum Payload {
  Unit,
  Bool(bool),
  Int(i32),
  String(Vec<u8>),
  Tuple(Box<[ValueRef]>),
  Data {
    /// Offset into the image's data-naming table.
    meta: u32,
    id: u32,
    fields: Box<[ValueRef]>,
  },
  Closure {
    /// The lexical parent: the activation active when this closure was
    /// formed. `NULL` for a closure formed at the top level.
    previous_activation: ValueRef,
    ip: u32,
  },
  Activation {
    /// The dynamic caller, restored by `RET`. `NULL` for the outermost frame.
    parent: ValueRef,
    /// The closure entered to create this frame; `NULL` only for the
    /// outermost frame.
    closure: ValueRef,
    next_ip: i32,
    /// Allocated once, by `ENTER`; `None` beforehand.
    state: Option<Box<[ValueRef]>>,
  },
  Builtin(NativeId),
  BuiltinClosure {
    /// The previously applied builtin or builtin closure in the chain.
    previous: ValueRef,
    /// The argument this application supplied.
    argument: ValueRef,
    /// Which native stage to invoke on the next application.
    function: NativeId,
  },
}

/// The tag of a value, independent of its payload. Mirrors [`Payload`]'s
/// variants one for one; used where only the type is needed (rendering,
/// type-check error messages).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Tag {
  Unit,
  Bool,
  Int,
  String,
  Tuple,
  Data,
  Closure,
  Activation,
  Builtin,
  BuiltinClosure,
}

impl Payload {
  pub fn tag(&self) -> Tag {
    match self {
      Payload::Unit => Tag::Unit,
      Payload::Bool(_) => Tag::Bool,
      Payload::Int(_) => Tag::Int,
      Payload::String(_) => Tag::String,
      Payload::Tuple(_) => Tag::Tuple,
      Payload::Data { .. } => Tag::Data,
      Payload::Closure { .. } => Tag::Closure,
      Payload::Activation { .. } => Tag::Activation,
      Payload::Builtin(_) => Tag::Builtin,
      Payload::BuiltinClosure { .. } => Tag::BuiltinClosure,
    }
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Tag::Unit => "Unit",
      Tag::Bool => "Bool",
      Tag::Int => "Int",
      Tag::String => "String",
      Tag::Tuple => "Tuple",
      Tag::Data => "Data",
      Tag::Closure => "Closure",
      Tag::Activation => "Activation",
      Tag::Builtin => "Builtin",
      Tag::BuiltinClosure => "BuiltinClosure",
    };
    f.write_str(name)
  }
}
