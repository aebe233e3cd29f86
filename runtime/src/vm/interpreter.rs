use std::marker::PhantomData;
use tracing::{debug, trace};
use crate::bytecode::{InstructionDescriptor, InstructionTable, IsaError, MachineKind};
use crate::runtime::RuntimeConfig;
use crate::vm::{Holder, MachineState, VMError, VMResult};

/// A machine flavour: its instruction set and the holder it executes against
pub trait Machine {
    const KIND: MachineKind;

    /// Every instruction this machine understands
    fn descriptors() -> Vec<InstructionDescriptor>;

    /// A fresh holder sized for `config`
    fn holder(config: &RuntimeConfig) -> Holder;

    fn instruction_table() -> Result<InstructionTable, IsaError> {
        InstructionTable::new(Self::KIND, Self::descriptors())
    }
}

/// The Virtual Machine that executes one loaded program
pub struct VM<M: Machine> {
    table: InstructionTable,
    state: MachineState,
    config: RuntimeConfig,
    machine: PhantomData<M>,
}

impl<M: Machine> VM<M> {
    pub fn new() -> VMResult<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> VMResult<Self> {
        let table = M::instruction_table()?;
        let state = MachineState::new(M::holder(&config), Vec::new());
        Ok(Self {
            table,
            state,
            config,
            machine: PhantomData,
        })
    }

    /// Build a VM with default configuration and `program` loaded
    pub fn from_program(program: Vec<u8>) -> VMResult<Self> {
        let mut vm = Self::new()?;
        vm.load_program(program);
        Ok(vm)
    }

    /// Replace the loaded program and reset all machine state
    pub fn load_program(&mut self, program: Vec<u8>) {
        if self.config.debug_mode {
            debug!(machine = %M::KIND, bytes = program.len(), "loading program");
        }
        self.state = MachineState::new(M::holder(&self.config), program);
    }

    /// Execute until the program counter leaves the program.
    ///
    /// On a fault the state is left exactly as the faulting instruction
    /// found it, apart from the counter having moved past decoded bytes.
    pub fn run(&mut self) -> VMResult<&MachineState> {
        let mut executed: u64 = 0;
        while self.state.is_running() {
            if let Err(error) = self.step() {
                if self.config.debug_mode {
                    debug!(machine = %M::KIND, pc = self.state.pc(), executed, %error, "execution faulted");
                }
                return Err(error);
            }
            executed += 1;
        }

        if self.config.debug_mode {
            debug!(
                machine = %M::KIND,
                executed,
                result = ?self.state.result(),
                "execution completed"
            );
        }
        Ok(&self.state)
    }

    /// Fetch, decode and apply a single instruction
    pub fn step(&mut self) -> VMResult<()> {
        let pc = self.state.pc();
        let opcode = self.state.fetch_opcode()?;
        let descriptor = *self
            .table
            .get(opcode)
            .ok_or(VMError::UnknownOpcode { opcode, pc })?;

        if self.config.trace_execution {
            trace!(
                machine = %M::KIND,
                pc,
                op = descriptor.name(),
                holder = ?self.state.holder(),
                "executing"
            );
        }

        descriptor.apply(&mut self.state)
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn into_state(self) -> MachineState {
        self.state
    }

    pub fn table(&self) -> &InstructionTable {
        &self.table
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
