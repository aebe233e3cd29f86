use thiserror::Error;
use crate::bytecode::IsaError;

/// Fatal faults raised while executing bytecode
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VMError {
    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Call stack underflow at pc {0}")]
    CallStackUnderflow(usize),

    #[error("Invalid program counter: {0}")]
    InvalidProgramCounter(i64),

    #[error("Unknown opcode 0x{opcode:02X} at pc {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error("Truncated instruction at pc {0}")]
    TruncatedInstruction(usize),

    #[error("Invalid register: {0}")]
    InvalidRegister(u8),

    #[error("Address out of range: {0}")]
    AddressOutOfRange(i64),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Holder mismatch: expected {0}")]
    HolderMismatch(&'static str),

    #[error("Invalid instruction table: {0}")]
    InstructionTable(#[from] IsaError),
}

/// Result type for VM operations
pub type VMResult<T> = Result<T, VMError>;
