//! Textual mnemonics to bytes and back.
//!
//! # Syntax
//!
//! ```text
//! mov 0 2 mov 1 3 add 2 1 0 halt
//! ```
//!
//! - Tokens are separated by any whitespace; line breaks carry no meaning
//! - Mnemonics match case-insensitively
//! - Each mnemonic is followed by exactly as many decimal immediates as its
//!   descriptor declares, each of which must fit the declared width

use std::fmt::Write;
use thiserror::Error;
use crate::bytecode::symbolic::{fits, normalize, read_immediate};
use crate::bytecode::{InstructionTable, Operand, SymbolicInstruction};

/// Errors raised while encoding or decoding programs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Unknown mnemonic '{0}'")]
    UnknownMnemonic(String),

    #[error("Instruction '{mnemonic}' expects {expected} immediate(s), found {found}")]
    MissingImmediate {
        mnemonic: String,
        expected: usize,
        found: usize,
    },

    #[error("Malformed immediate '{token}' for '{mnemonic}'")]
    MalformedImmediate { mnemonic: String, token: String },

    #[error("Immediate {value} does not fit in {size} byte(s) for '{mnemonic}'")]
    ImmediateOutOfRange {
        mnemonic: String,
        value: i64,
        size: u8,
    },

    #[error("Unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("Truncated instruction '{mnemonic}' at offset {offset}")]
    TruncatedInstruction { mnemonic: String, offset: usize },

    #[error("Unresolved symbol '{0}'")]
    UnresolvedSymbol(String),
}

/// Parse mnemonic text into symbolic instructions
pub fn parse(text: &str, table: &InstructionTable) -> Result<Vec<SymbolicInstruction>, AssemblyError> {
    let mut tokens = text.split_whitespace();
    let mut instructions = Vec::new();

    while let Some(token) = tokens.next() {
        let descriptor = *table
            .lookup(token)
            .ok_or_else(|| AssemblyError::UnknownMnemonic(token.to_string()))?;

        let sizes = descriptor.immediate_sizes();
        let mut operands = Vec::with_capacity(sizes.len());
        for (index, &size) in sizes.iter().enumerate() {
            let raw = tokens.next().ok_or_else(|| AssemblyError::MissingImmediate {
                mnemonic: descriptor.name().to_string(),
                expected: sizes.len(),
                found: index,
            })?;
            let value: i64 = raw.parse().map_err(|_| AssemblyError::MalformedImmediate {
                mnemonic: descriptor.name().to_string(),
                token: raw.to_string(),
            })?;
            if !fits(size, value) {
                return Err(AssemblyError::ImmediateOutOfRange {
                    mnemonic: descriptor.name().to_string(),
                    value,
                    size,
                });
            }
            operands.push(Operand::Value(normalize(size, value)));
        }

        instructions.push(SymbolicInstruction::new(descriptor, operands));
    }

    Ok(instructions)
}

/// Assemble mnemonic text into program bytes
pub fn assemble(text: &str, table: &InstructionTable) -> Result<Vec<u8>, AssemblyError> {
    encode(&parse(text, table)?)
}

/// Concatenate fully resolved instructions into program bytes
pub fn encode(instructions: &[SymbolicInstruction]) -> Result<Vec<u8>, AssemblyError> {
    let mut bytes = Vec::with_capacity(instructions.iter().map(|i| i.encoded_len()).sum());
    for instruction in instructions {
        instruction.encode_into(&mut bytes)?;
    }
    Ok(bytes)
}

/// Decode program bytes into symbolic instructions
pub fn disassemble(bytes: &[u8], table: &InstructionTable) -> Result<Vec<SymbolicInstruction>, AssemblyError> {
    Ok(disassemble_with_offsets(bytes, table)?
        .into_iter()
        .map(|(_, instruction)| instruction)
        .collect())
}

/// Decode program bytes, pairing each instruction with its byte offset
pub fn disassemble_with_offsets(
    bytes: &[u8],
    table: &InstructionTable,
) -> Result<Vec<(usize, SymbolicInstruction)>, AssemblyError> {
    let mut offset = 0;
    let mut instructions = Vec::new();

    while offset < bytes.len() {
        let opcode = bytes[offset];
        let descriptor = *table
            .get(opcode)
            .ok_or(AssemblyError::UnknownOpcode { opcode, offset })?;

        if offset + descriptor.encoded_len() > bytes.len() {
            return Err(AssemblyError::TruncatedInstruction {
                mnemonic: descriptor.name().to_string(),
                offset,
            });
        }

        let mut cursor = offset + 1;
        let operands = descriptor
            .immediate_sizes()
            .iter()
            .map(|&size| {
                let value = read_immediate(&bytes[cursor..], size);
                cursor += size as usize;
                Operand::Value(value)
            })
            .collect();

        instructions.push((offset, SymbolicInstruction::new(descriptor, operands)));
        offset = cursor;
    }

    Ok(instructions)
}

/// Offset-annotated listing, one instruction per line
pub fn listing(bytes: &[u8], table: &InstructionTable) -> Result<String, AssemblyError> {
    let mut out = String::new();
    for (offset, instruction) in disassemble_with_offsets(bytes, table)? {
        let _ = writeln!(out, "{:04}: {}", offset, instruction);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::register::{opcodes as reg, RegisterProgramBuilder};
    use crate::vm::stack::StackProgramBuilder;
    use crate::vm::{Machine, RegisterMachine, StackMachine};

    fn register_table() -> InstructionTable {
        RegisterMachine::instruction_table().unwrap()
    }

    fn stack_table() -> InstructionTable {
        StackMachine::instruction_table().unwrap()
    }

    #[test]
    fn test_assemble_matches_builder() {
        let text = "mov 0 2 mov 1 3 add 2 1 0 halt";
        let bytes = assemble(text, &register_table()).unwrap();
        let built = RegisterProgramBuilder::new()
            .mov(0, 2)
            .mov(1, 3)
            .add(2, 1, 0)
            .halt()
            .build();

        assert_eq!(bytes, built);
        assert_eq!(bytes[0], reg::MOV);
        assert_eq!(&bytes[1..6], &[0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_assemble_is_case_insensitive_and_whitespace_agnostic() {
        let a = assemble("PUSH 2\n\tpush 3   Add", &stack_table()).unwrap();
        let b = StackProgramBuilder::new().push(2).push(3).add().build();
        assert_eq!(a, b);
    }

    #[test]
    fn test_round_trip_through_bytes() {
        let sources = [
            (register_table(), "mov 0 -1 mov 7 2147483647 cjump 0 -12 jump 5 call 0 ret swap 1 2 halt"),
            (stack_table(), "push -5 push 0 push 0 store push 9 jump cjump call 6 ret dup swap pop halt"),
        ];

        for (table, text) in sources {
            let parsed = parse(text, &table).unwrap();
            let decoded = disassemble(&assemble(text, &table).unwrap(), &table).unwrap();
            assert_eq!(parsed, decoded, "round trip failed for {:?}", text);
        }
    }

    #[test]
    fn test_parse_normalizes_unsigned_spelling() {
        let table = register_table();
        let parsed = parse("mov 255 0", &table).unwrap();
        let decoded = disassemble(&assemble("mov 255 0", &table).unwrap(), &table).unwrap();
        assert_eq!(parsed, decoded);
        assert_eq!(parsed[0].operands()[0], Operand::Value(-1));
    }

    #[test]
    fn test_unknown_mnemonic() {
        let result = assemble("push 1 frobnicate", &stack_table());
        assert_eq!(result, Err(AssemblyError::UnknownMnemonic("frobnicate".to_string())));
    }

    #[test]
    fn test_missing_immediate() {
        let result = assemble("mov 1", &register_table());
        assert_eq!(
            result,
            Err(AssemblyError::MissingImmediate {
                mnemonic: "mov".to_string(),
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn test_malformed_immediate() {
        let result = assemble("push x1", &stack_table());
        assert_eq!(
            result,
            Err(AssemblyError::MalformedImmediate {
                mnemonic: "push".to_string(),
                token: "x1".to_string(),
            })
        );
    }

    #[test]
    fn test_immediate_out_of_range() {
        let result = assemble("mov 300 1", &register_table());
        assert_eq!(
            result,
            Err(AssemblyError::ImmediateOutOfRange {
                mnemonic: "mov".to_string(),
                value: 300,
                size: 1,
            })
        );
    }

    #[test]
    fn test_disassemble_unknown_opcode() {
        let result = disassemble(&[0xEE], &stack_table());
        assert_eq!(result, Err(AssemblyError::UnknownOpcode { opcode: 0xEE, offset: 0 }));
    }

    #[test]
    fn test_disassemble_truncated_instruction() {
        let mut bytes = StackProgramBuilder::new().pop().push(7).build();
        bytes.pop();
        let result = disassemble(&bytes, &stack_table());
        assert_eq!(
            result,
            Err(AssemblyError::TruncatedInstruction {
                mnemonic: "push".to_string(),
                offset: 1,
            })
        );
    }

    #[test]
    fn test_disassemble_tracks_offsets() {
        let bytes = RegisterProgramBuilder::new().mov(0, 1).ret().jump(-6).halt().build();
        let offsets: Vec<usize> = disassemble_with_offsets(&bytes, &register_table())
            .unwrap()
            .into_iter()
            .map(|(offset, _)| offset)
            .collect();
        assert_eq!(offsets, vec![0, 6, 7, 12]);
    }

    #[test]
    fn test_listing_reassembles() {
        let table = stack_table();
        let bytes = StackProgramBuilder::new().push(4).dup().mul().halt().build();
        let text = listing(&bytes, &table).unwrap();
        assert_eq!(text, "0000: push 4\n0005: dup\n0006: mul\n0007: halt\n");

        let stripped: String = text
            .lines()
            .map(|line| line.split_once(": ").map_or(line, |(_, rest)| rest))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(assemble(&stripped, &table).unwrap(), bytes);
    }
}
