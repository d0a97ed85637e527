use bci_image::Image;

use super::*;
use crate::error::Error;

fn image_from(parts: &[&[u8]]) -> Image {
  let mut bytes = vec![0u8; 4];
  for part in parts {
    bytes.extend_from_slice(part);
  }
  Image::new(bytes)
}

fn run(image: Image) -> (Result<()>, String) {
  let mut m = Machine::with_io(image, Vec::new());
  let result = m.run();
  let out = String::from_utf8(m.into_output()).unwrap();
  (result, out)
}

#[test]
fn arithmetic_prints_the_typed_result() {
  let image = image_from(&[
    &[opcode::PUSH_INT],
    &2i32.to_le_bytes(),
    &[opcode::PUSH_INT],
    &3i32.to_le_bytes(),
    &[opcode::ADD],
    &[opcode::RET],
  ]);
  let (result, out) = run(image);
  result.unwrap();
  assert_eq!(out, "5: Int\n");
}

#[test]
fn division_by_zero_is_a_fatal_error() {
  let image = image_from(&[
    &[opcode::PUSH_INT],
    &1i32.to_le_bytes(),
    &[opcode::PUSH_INT],
    &0i32.to_le_bytes(),
    &[opcode::DIV],
    &[opcode::RET],
  ]);
  let (result, _) = run(image);
  assert!(matches!(result, Err(Error::DivisionByZero)));
}

#[test]
fn jmp_true_takes_the_conditional_branch() {
  // PUSH_TRUE; JMP_TRUE 16; PUSH_INT 0; RET; [16] PUSH_INT 1; RET
  let image = image_from(&[
    &[opcode::PUSH_TRUE],
    &[opcode::JMP_TRUE],
    &16i32.to_le_bytes(),
    &[opcode::PUSH_INT],
    &0i32.to_le_bytes(),
    &[opcode::RET],
    &[opcode::PUSH_INT],
    &1i32.to_le_bytes(),
    &[opcode::RET],
  ]);
  let (result, out) = run(image);
  result.unwrap();
  assert_eq!(out, "1: Int\n");
}

#[test]
fn swap_call_invokes_a_closure_and_resumes_the_caller() {
  // [4]  PUSH_CLOSURE 16
  // [9]  PUSH_INT 42
  // [14] SWAP_CALL
  // [15] RET
  // [16] ENTER 1
  // [21] STORE_VAR 0
  // [26] PUSH_VAR 0 0
  // [35] RET
  let image = image_from(&[
    &[opcode::PUSH_CLOSURE],
    &16i32.to_le_bytes(),
    &[opcode::PUSH_INT],
    &42i32.to_le_bytes(),
    &[opcode::SWAP_CALL],
    &[opcode::RET],
    &[opcode::ENTER],
    &1i32.to_le_bytes(),
    &[opcode::STORE_VAR],
    &0i32.to_le_bytes(),
    &[opcode::PUSH_VAR],
    &0i32.to_le_bytes(),
    &0i32.to_le_bytes(),
    &[opcode::RET],
  ]);
  let (result, out) = run(image);
  result.unwrap();
  assert_eq!(out, "42: Int\n");
}

#[test]
fn push_data_renders_as_a_typed_constructor_application() {
  // [4]  PUSH_INT 7
  // [9]  PUSH_DATA meta=23, id=1, size=1
  // [22] RET
  // [23] data names table: "Maybe" / "None" / "Some"
  let image = image_from(&[
    &[opcode::PUSH_INT],
    &7i32.to_le_bytes(),
    &[opcode::PUSH_DATA],
    &23i32.to_le_bytes(),
    &1i32.to_le_bytes(),
    &1i32.to_le_bytes(),
    &[opcode::RET],
    &2i32.to_le_bytes(),
    b"Maybe\0None\0Some\0",
  ]);
  let (result, out) = run(image);
  result.unwrap();
  assert_eq!(out, "Some 7: Maybe\n");
}

#[test]
fn jmp_data_dispatches_on_the_constructor_id() {
  // [4]  PUSH_DATA meta=34, id=0, size=0   (None)
  // [17] JMP_DATA size=2 [30, 36]
  // [30] PUSH_INT 111; RET
  // [36] PUSH_INT 222; RET
  // [42] data names table
  let image = image_from(&[
    &[opcode::PUSH_DATA],
    &34i32.to_le_bytes(),
    &0i32.to_le_bytes(),
    &0i32.to_le_bytes(),
    &[opcode::JMP_DATA],
    &2i32.to_le_bytes(),
    &30i32.to_le_bytes(),
    &36i32.to_le_bytes(),
    &[opcode::PUSH_INT],
    &111i32.to_le_bytes(),
    &[opcode::RET],
    &[opcode::PUSH_INT],
    &222i32.to_le_bytes(),
    &[opcode::RET],
    &2i32.to_le_bytes(),
    b"Maybe\0None\0Some\0",
  ]);
  let (result, out) = run(image);
  result.unwrap();
  assert_eq!(out, "111: Int\n");
}

#[test]
fn bare_discard_on_empty_stack_underflows() {
  let image = image_from(&[&[opcode::DISCARD]]);
  let (result, _) = run(image);
  assert!(matches!(result, Err(Error::Stack(bci_value::StackError::Underflow))));
}

#[test]
fn continuous_gc_does_not_disturb_a_straight_line_program() {
  let mut parts: Vec<&[u8]> = Vec::new();
  let ints: Vec<[u8; 4]> = (0..20).map(|i: i32| i.to_le_bytes()).collect();
  for i in &ints {
    parts.push(&[opcode::PUSH_INT]);
    parts.push(i);
    parts.push(&[opcode::DISCARD]);
  }
  parts.push(&[opcode::PUSH_UNIT]);
  parts.push(&[opcode::RET]);
  let image = image_from(&parts);
  let mut m = Machine::with_io(image, Vec::new());
  m.set_continuous_gc(true);
  m.run().unwrap();
  assert!(m.heap().collections() > 0);
}
