// regstack - Register and stack bytecode machines sharing one instruction model

#[macro_use]
mod macros;

pub mod bytecode;
pub mod vm;
pub mod runtime;

pub use bytecode::{InstructionDescriptor, InstructionTable, MachineKind, ProgramImage, Word};
pub use vm::{MachineState, RegisterMachine, StackMachine, VM};
pub use runtime::Runtime;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
