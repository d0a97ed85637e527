pub mod disassembly;
pub mod opcode;

pub use disassembly::{decode_operands, decode_operands_raw, disassemble, disassemble_one, DisasmError};
pub use opcode::{find, find_by_name, Instruction, Operand, INSTRUCTIONS};
