//! Read-only view over a compiled bytecode image.
//!
//! The image is a flat byte blob produced by an external compiler: a 4-byte
//! header (ignored by the interpreter) followed by a mix of code and constant
//! data (zero-terminated strings, data naming tables) referenced by offset.

use std::fmt;

/// Offset at which the first instruction of a well-formed image starts.
pub const CODE_START: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
  #[error("read past end of image at offset {0}")]
  OutOfBounds(usize),
  #[error("unterminated string starting at offset {0}")]
  UnterminatedString(usize),
}

pub type Result<T, E = ImageError> = std::result::Result<T, E>;

/// An owned bytecode blob with little-endian, offset-addressed accessors.
pub struct Image {
  bytes: Vec<u8>,
}

impl Image {
  pub fn new(bytes: Vec<u8>) -> Self {
    Self { bytes }
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  pub fn byte(&self, offset: usize) -> Result<u8> {
    self.bytes.get(offset).copied().ok_or(ImageError::OutOfBounds(offset))
  }

  /// Reads a little-endian, two's-complement 32-bit integer at `offset`.
  pub fn read_int(&self, offset: usize) -> Result<i32> {
    let slice = self
      .bytes
      .get(offset..offset + 4)
      .ok_or(ImageError::OutOfBounds(offset))?;
    Ok(i32::from_le_bytes(slice.try_into().unwrap()))
  }

  /// Borrows the zero-terminated byte string starting at `offset`, not
  /// including the terminator.
  pub fn read_string(&self, offset: usize) -> Result<&[u8]> {
    let rest = self.bytes.get(offset..).ok_or(ImageError::OutOfBounds(offset))?;
    let end = rest
      .iter()
      .position(|&b| b == 0)
      .ok_or(ImageError::UnterminatedString(offset))?;
    Ok(&rest[..end])
  }

  /// Length in bytes of the zero-terminated string starting at `offset`,
  /// including the terminator.
  pub fn string_span(&self, offset: usize) -> Result<usize> {
    Ok(self.read_string(offset)?.len() + 1)
  }

  /// Reads a data naming table: a length `n` followed by `n + 1`
  /// zero-terminated strings (the type name, then `n` constructor names).
  pub fn read_data_names(&self, offset: usize) -> Result<DataNames<'_>> {
    let count = self.read_int(offset)?;
    let mut cursor = offset + 4;
    let mut names = Vec::with_capacity(count as usize + 1);
    for _ in 0..=count {
      let s = self.read_string(cursor)?;
      cursor += s.len() + 1;
      names.push(s);
    }
    Ok(DataNames { names })
  }
}

/// The decoded naming table for a `Data` constructor family: the type name
/// followed by each constructor's name, indexed by constructor id.
pub struct DataNames<'a> {
  names: Vec<&'a [u8]>,
}

impl<'a> DataNames<'a> {
  pub fn type_name(&self) -> &'a [u8] {
    self.names[0]
  }

  pub fn ctor_name(&self, id: i32) -> Option<&'a [u8]> {
    self.names.get(id as usize + 1).copied()
  }

  pub fn ctor_count(&self) -> usize {
    self.names.len() - 1
  }
}

impl fmt::Debug for Image {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Image").field("len", &self.bytes.len()).finish()
  }
}
