//! Bytecode disassembler.
//!
//! Decodes a byte stream back into instructions using the fixed operand
//! widths of the instruction set. Used for the `--debug` listing and for
//! validating that every jump operand lands on an instruction boundary.

use std::collections::HashSet;
use std::fmt;

use carbn_core::error::CompileError;

use crate::opcode::{OpCode, OperandKind};

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Absolute offset of the opcode byte.
    pub offset: usize,
    pub opcode: OpCode,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    /// Raw u64 immediate (offsets, counts, two's-complement ints).
    Int(u64),
    Float(f64),
    Str(String),
    Byte(u8),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06} {:?}", self.offset, self.opcode)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Int(v) => write!(f, " {v}"),
            Operand::Float(v) => write!(f, " {v}"),
            Operand::Str(s) => write!(f, " {s:?}"),
            Operand::Byte(b) => write!(f, " {b}"),
        }
    }
}

/// Decode a complete byte stream.
pub fn disassemble(bytes: &[u8]) -> Result<Vec<Instruction>, CompileError> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let offset = pos;
        let opcode = OpCode::from_u8(bytes[pos]).ok_or_else(|| {
            CompileError::codegen(format!("invalid opcode {} at offset {pos}", bytes[pos]))
        })?;
        pos += 1;

        let operand = match opcode.operand_kind() {
            OperandKind::None => Operand::None,
            OperandKind::U64 => {
                let field = take(bytes, pos, 8)?;
                pos += 8;
                Operand::Int(u64::from_be_bytes(field.try_into().unwrap()))
            }
            OperandKind::F64 => {
                let field = take(bytes, pos, 8)?;
                pos += 8;
                Operand::Float(f64::from_be_bytes(field.try_into().unwrap()))
            }
            OperandKind::Str => {
                let len = *bytes.get(pos).ok_or_else(|| truncated(pos))? as usize;
                pos += 1;
                let field = take(bytes, pos, len)?;
                pos += len;
                let text = std::str::from_utf8(field).map_err(|_| {
                    CompileError::codegen(format!(
                        "string immediate at offset {offset} is not valid UTF-8"
                    ))
                })?;
                Operand::Str(text.to_string())
            }
            OperandKind::Byte => {
                let b = *bytes.get(pos).ok_or_else(|| truncated(pos))?;
                pos += 1;
                Operand::Byte(b)
            }
        };

        out.push(Instruction {
            offset,
            opcode,
            operand,
        });
    }

    Ok(out)
}

/// Check that every jump/call operand is an instruction start (or the
/// end-of-stream offset, which the VM treats as halt).
pub fn verify_jump_targets(bytes: &[u8]) -> Result<(), CompileError> {
    let instructions = disassemble(bytes)?;
    let starts: HashSet<usize> = instructions.iter().map(|i| i.offset).collect();

    for inst in &instructions {
        if !inst.opcode.is_jump() {
            continue;
        }
        let Operand::Int(target) = &inst.operand else {
            continue;
        };
        let target = *target as usize;
        if target != bytes.len() && !starts.contains(&target) {
            return Err(CompileError::codegen(format!(
                "{:?} at offset {} targets {}, which is not an instruction boundary",
                inst.opcode, inst.offset, target
            )));
        }
    }
    Ok(())
}

fn take(bytes: &[u8], pos: usize, len: usize) -> Result<&[u8], CompileError> {
    bytes.get(pos..pos + len).ok_or_else(|| truncated(pos))
}

fn truncated(pos: usize) -> CompileError {
    CompileError::codegen(format!("byte stream truncated at offset {pos}"))
}
