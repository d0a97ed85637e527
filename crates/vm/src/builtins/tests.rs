use bci_image::Image;
use bci_value::Payload;

use super::*;
use crate::machine::Machine;

fn machine() -> Machine<Vec<u8>> {
  Machine::with_io(Image::new(vec![0; 4]), Vec::new())
}

fn push_string(m: &mut Machine<Vec<u8>>, s: &str) -> ValueRef {
  m.alloc_and_push(Payload::String(s.as_bytes().to_vec())).unwrap()
}

fn top_string(m: &mut Machine<Vec<u8>>) -> String {
  let v = m.stack_mut().pop().unwrap();
  match m.heap().get(v) {
    Payload::String(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    other => panic!("expected a String payload, found {:?}", other.tag()),
  }
}

#[test]
fn print_writes_raw_rendering_without_newline() {
  let mut m = machine();
  m.alloc_and_push(Payload::Unit).unwrap();
  push_string(&mut m, "hi");
  call(PRINT, &mut m).unwrap();
  assert_eq!(m.into_output(), b"hi");
}

#[test]
fn println_writes_only_a_newline() {
  let mut m = machine();
  m.alloc_and_push(Payload::Unit).unwrap();
  m.alloc_and_push(Payload::Unit).unwrap();
  call(PRINTLN, &mut m).unwrap();
  assert_eq!(m.into_output(), b"\n");
}

#[test]
fn print_literal_quotes_and_escapes_the_string() {
  let mut m = machine();
  m.alloc_and_push(Payload::Unit).unwrap();
  push_string(&mut m, r#"a"b"#);
  call(PRINT_LITERAL, &mut m).unwrap();
  assert_eq!(m.into_output(), br#""a\"b""#);
}

#[test]
fn string_length_counts_bytes() {
  let mut m = machine();
  m.alloc_and_push(Payload::Unit).unwrap();
  push_string(&mut m, "hello");
  call(STRING_LENGTH, &mut m).unwrap();
  let v = m.stack_mut().pop().unwrap();
  assert_eq!(m.heap().get(v), &Payload::Int(5));
}

#[test]
fn string_concat_curries_then_joins_both_arguments() {
  let mut m = machine();
  m.alloc_and_push(Payload::Builtin(STRING_CONCAT)).unwrap();
  push_string(&mut m, "ab");
  call(STRING_CONCAT, &mut m).unwrap();
  push_string(&mut m, "cd");
  call(STRING_CONCAT_1, &mut m).unwrap();
  assert_eq!(top_string(&mut m), "abcd");
}

#[test]
fn string_equal_curries_then_compares_both_arguments() {
  let mut m = machine();
  m.alloc_and_push(Payload::Builtin(STRING_EQUAL)).unwrap();
  push_string(&mut m, "same");
  call(STRING_EQUAL, &mut m).unwrap();
  push_string(&mut m, "same");
  call(STRING_EQUAL_1, &mut m).unwrap();
  let v = m.stack_mut().pop().unwrap();
  assert_eq!(m.heap().get(v), &Payload::Bool(true));
}

#[test]
fn string_compare_orders_lexicographically() {
  let mut m = machine();
  m.alloc_and_push(Payload::Builtin(STRING_COMPARE)).unwrap();
  push_string(&mut m, "a");
  call(STRING_COMPARE, &mut m).unwrap();
  push_string(&mut m, "b");
  call(STRING_COMPARE_1, &mut m).unwrap();
  let v = m.stack_mut().pop().unwrap();
  assert_eq!(m.heap().get(v), &Payload::Int(-1));
}

#[test]
fn string_substring_curries_twice_then_slices() {
  let mut m = machine();
  m.alloc_and_push(Payload::Builtin(STRING_SUBSTRING)).unwrap();
  push_string(&mut m, "hello world");
  call(STRING_SUBSTRING, &mut m).unwrap();
  m.alloc_and_push(Payload::Int(6)).unwrap();
  call(STRING_SUBSTRING_1, &mut m).unwrap();
  m.alloc_and_push(Payload::Int(11)).unwrap();
  call(STRING_SUBSTRING_2, &mut m).unwrap();
  assert_eq!(top_string(&mut m), "world");
}

#[test]
fn fatal_error_writes_diagnostic_and_fails() {
  let mut m = machine();
  push_string(&mut m, "boom");
  let err = call(FATAL_ERROR, &mut m).unwrap_err();
  assert!(matches!(err, Error::FatalError));
}

#[test]
fn find_resolves_every_named_builtin_by_name() {
  for (id, name) in NAMED {
    assert_eq!(find(name), Some(*id));
  }
  assert_eq!(find("not-a-builtin"), None);
}
