use bci_value::Tag;

/// Every fatal condition the interpreter can hit. The bytecode is trusted to
/// come from a working compiler, so none of these are meant to be caught and
/// recovered from: the caller's job is to print `Display` and exit 1.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("unknown opcode: {0}")]
  UnknownOpcode(u8),
  #[error(transparent)]
  Image(#[from] bci_image::ImageError),
  #[error(transparent)]
  Stack(#[from] bci_value::StackError),
  #[error("{op}: not an int")]
  NotAnInt { op: &'static str },
  #[error("{op}: not a bool")]
  NotABool { op: &'static str },
  #[error("{op}: offset out of range: {offset}")]
  OffsetOutOfRange { op: &'static str, offset: i32 },
  #[error("{op}: not a data value")]
  NotData { op: &'static str },
  #[error("{op}: not a tuple value")]
  NotTuple { op: &'static str },
  #[error("{op}: not a string")]
  NotAString { op: &'static str },
  #[error("PUSH_VAR: intermediate not an activation record: {0}")]
  NotAnActivation(i32),
  #[error("PUSH_VAR: activation has no state")]
  NoState,
  #[error("PUSH_VAR: offset out of bounds: {offset} >= {len}")]
  VarOffsetOutOfBounds { offset: i32, len: usize },
  #[error("JMP_DATA: id out of bounds: {id} >= {size}")]
  DataIdOutOfBounds { id: u32, size: i32 },
  #[error("SWAP_CALL: not a closure: {0}")]
  NotCallable(Tag),
  #[error("ENTER: activation already has state")]
  AlreadyEntered,
  #[error("STORE_VAR: index out of bounds: {index}")]
  StoreIndexOutOfBounds { index: i32 },
  #[error("PUSH_BUILTIN: unknown builtin: {0}")]
  UnknownBuiltin(String),
  #[error("division by zero")]
  DivisionByZero,
  /// The `$$builtin-fatal-error` builtin fired. It has already printed its
  /// own diagnostic to the machine's output; the caller should exit 1
  /// without printing anything further.
  #[error("fatal error")]
  FatalError,
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
