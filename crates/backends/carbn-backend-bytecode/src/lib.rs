//! Bytecode backend for the Carbon compiler.
//!
//! Turns the internal AST into the linear stack-machine byte stream the
//! external VM consumes: one opcode byte per instruction followed by
//! fixed-width immediates (big-endian u64/f64, length-prefixed strings),
//! with control flow expressed as absolute offsets resolved by forward
//! patching. The output has no header or checksum — the VM knows the format
//! by convention, and offsets are absolute from byte 0.

pub mod buffer;
pub mod disasm;
pub mod emit;
pub mod opcode;

pub use buffer::{BytecodeBuffer, OperandPatch};
pub use disasm::{disassemble, verify_jump_targets, Instruction, Operand};
pub use emit::{generate, BytecodeBackend};
pub use opcode::{OpCode, OperandKind};
