use byteorder::{ByteOrder, LittleEndian};
use crate::bytecode::Word;
use crate::vm::{VMError, VMResult};

/// Words of flat machine memory
pub const MEMORY_SIZE: usize = 1024;
/// Words per local frame
pub const FRAME_SIZE: usize = 16;
/// Physical address of global slot 0
pub const GLOBAL_FRAME_START: usize = 513;
/// End (exclusive) of the region local frames are laid out in
pub const LOCAL_REGION_END: usize = 512;

/// Operand storage: a register file or an operand stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Holder {
    Registers(Vec<Word>),
    Stack(Vec<Word>),
}

/// Everything one run mutates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    holder: Holder,
    call_stack: Vec<usize>,
    memory: Vec<Word>,
    pc: usize,
    program: Vec<u8>,
}

impl MachineState {
    pub fn new(holder: Holder, program: Vec<u8>) -> Self {
        Self {
            holder,
            call_stack: Vec::new(),
            memory: vec![0; MEMORY_SIZE],
            pc: 0,
            program,
        }
    }

    pub fn holder(&self) -> &Holder {
        &self.holder
    }

    /// The register file, if this state drives a register machine
    pub fn registers(&self) -> Option<&[Word]> {
        match &self.holder {
            Holder::Registers(registers) => Some(registers),
            Holder::Stack(_) => None,
        }
    }

    /// The operand stack, bottom first, if this state drives a stack machine
    pub fn stack(&self) -> Option<&[Word]> {
        match &self.holder {
            Holder::Stack(stack) => Some(stack),
            Holder::Registers(_) => None,
        }
    }

    pub fn memory(&self) -> &[Word] {
        &self.memory
    }

    /// Pending return addresses, oldest first
    pub fn call_stack(&self) -> &[usize] {
        &self.call_stack
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn program(&self) -> &[u8] {
        &self.program
    }

    /// Whether the run loop should fetch another instruction
    pub fn is_running(&self) -> bool {
        self.pc < self.program.len()
    }

    /// Top-level result: `r0` or the top of the operand stack
    pub fn result(&self) -> Option<Word> {
        match &self.holder {
            Holder::Registers(registers) => registers.first().copied(),
            Holder::Stack(stack) => stack.last().copied(),
        }
    }

    /// Current number of pending calls
    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub(crate) fn fetch_opcode(&mut self) -> VMResult<u8> {
        self.fetch_u8()
    }

    pub(crate) fn fetch_u8(&mut self) -> VMResult<u8> {
        let byte = *self
            .program
            .get(self.pc)
            .ok_or(VMError::TruncatedInstruction(self.pc))?;
        self.pc += 1;
        Ok(byte)
    }

    pub(crate) fn fetch_i32(&mut self) -> VMResult<i32> {
        let end = self.pc + 4;
        if end > self.program.len() {
            return Err(VMError::TruncatedInstruction(self.pc));
        }
        let value = LittleEndian::read_i32(&self.program[self.pc..end]);
        self.pc = end;
        Ok(value)
    }

    pub(crate) fn register(&self, index: u8) -> VMResult<Word> {
        match &self.holder {
            Holder::Registers(registers) => registers
                .get(index as usize)
                .copied()
                .ok_or(VMError::InvalidRegister(index)),
            Holder::Stack(_) => Err(VMError::HolderMismatch("register file")),
        }
    }

    pub(crate) fn set_register(&mut self, index: u8, value: Word) -> VMResult<()> {
        match &mut self.holder {
            Holder::Registers(registers) => {
                let slot = registers
                    .get_mut(index as usize)
                    .ok_or(VMError::InvalidRegister(index))?;
                *slot = value;
                Ok(())
            }
            Holder::Stack(_) => Err(VMError::HolderMismatch("register file")),
        }
    }

    fn operand_stack(&mut self) -> VMResult<&mut Vec<Word>> {
        match &mut self.holder {
            Holder::Stack(stack) => Ok(stack),
            Holder::Registers(_) => Err(VMError::HolderMismatch("operand stack")),
        }
    }

    pub(crate) fn push(&mut self, value: Word) -> VMResult<()> {
        self.operand_stack()?.push(value);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> VMResult<Word> {
        self.operand_stack()?.pop().ok_or(VMError::StackUnderflow)
    }

    pub(crate) fn peek(&mut self) -> VMResult<Word> {
        self.operand_stack()?.last().copied().ok_or(VMError::StackUnderflow)
    }

    /// Move the counter by `offset` bytes from its current position
    pub(crate) fn jump_relative(&mut self, offset: i32) -> VMResult<()> {
        let target = self.pc as i64 + offset as i64;
        self.set_target(target)
    }

    pub(crate) fn call(&mut self, target: i32) -> VMResult<()> {
        let return_address = self.pc;
        self.set_target(target as i64)?;
        self.call_stack.push(return_address);
        Ok(())
    }

    pub(crate) fn ret(&mut self) -> VMResult<()> {
        self.pc = self
            .call_stack
            .pop()
            .ok_or(VMError::CallStackUnderflow(self.pc))?;
        Ok(())
    }

    pub(crate) fn halt(&mut self) {
        self.pc = self.program.len();
    }

    fn set_target(&mut self, target: i64) -> VMResult<()> {
        if target < 0 || target > self.program.len() as i64 {
            return Err(VMError::InvalidProgramCounter(target));
        }
        self.pc = target as usize;
        Ok(())
    }

    /// Map a logical address to its physical memory index.
    ///
    /// Local addresses are offset by `(call_depth - 1) * FRAME_SIZE`, with
    /// top-level code addressed as depth 1; global addresses by
    /// `GLOBAL_FRAME_START`.
    pub fn resolve_address(&self, logical: Word, global: bool) -> VMResult<usize> {
        let base = if global {
            GLOBAL_FRAME_START
        } else {
            self.call_depth().max(1).saturating_sub(1) * FRAME_SIZE
        };
        let physical = base as i64 + logical as i64;
        if physical < 0 || physical >= MEMORY_SIZE as i64 {
            return Err(VMError::AddressOutOfRange(physical));
        }
        Ok(physical as usize)
    }

    pub(crate) fn load(&self, logical: Word, global: bool) -> VMResult<Word> {
        Ok(self.memory[self.resolve_address(logical, global)?])
    }

    pub(crate) fn store(&mut self, logical: Word, global: bool, value: Word) -> VMResult<()> {
        let address = self.resolve_address(logical, global)?;
        self.memory[address] = value;
        Ok(())
    }
}
