//! Instruction model shared by both machines.
//!
//! A program is a flat byte sequence: one opcode byte followed by the
//! little-endian immediates its descriptor declares, with no padding and no
//! instruction index. Decoding always walks forward from offset 0.

mod assembler;
mod descriptor;
mod image;
mod symbolic;
mod table;

pub use assembler::{
    assemble, disassemble, disassemble_with_offsets, encode, listing, parse, AssemblyError,
};
pub use descriptor::{Apply, Immediate, InstructionDescriptor};
pub use image::{ImageError, ProgramImage};
pub use symbolic::{Operand, SymbolicInstruction};
pub use table::{InstructionTable, IsaError, IMMEDIATE_SIZES};

/// Machine integer. All arithmetic wraps.
pub type Word = i32;

/// The two execution targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineKind {
    Register,
    Stack,
}

impl MachineKind {
    /// Convert a byte to a machine kind
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(MachineKind::Register),
            1 => Some(MachineKind::Stack),
            _ => None,
        }
    }

    /// Convert a machine kind to a byte
    pub fn to_byte(&self) -> u8 {
        match self {
            MachineKind::Register => 0,
            MachineKind::Stack => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MachineKind::Register => "register",
            MachineKind::Stack => "stack",
        }
    }
}

impl std::fmt::Display for MachineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
