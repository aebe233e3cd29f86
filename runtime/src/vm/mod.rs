mod alu;
mod error;
mod interpreter;
pub mod register;
pub mod stack;
mod state;

pub use interpreter::{Machine, VM};
pub use state::{Holder, MachineState, FRAME_SIZE, GLOBAL_FRAME_START, LOCAL_REGION_END, MEMORY_SIZE};
pub use error::{VMError, VMResult};
pub use register::RegisterMachine;
pub use stack::StackMachine;
