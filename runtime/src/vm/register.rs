//! Register machine instruction set.
//!
//! Register operands are one-byte immediates naming a slot of the register
//! file. Branch offsets are relative to the first byte after the branch.

use crate::bytecode::{InstructionDescriptor, MachineKind};
use crate::runtime::RuntimeConfig;
use crate::vm::alu::{self, BinaryFn};
use crate::vm::{Holder, Machine, MachineState, VMResult};

/// Register-file machine
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterMachine;

impl Machine for RegisterMachine {
    const KIND: MachineKind = MachineKind::Register;

    fn descriptors() -> Vec<InstructionDescriptor> {
        descriptors()
    }

    fn holder(config: &RuntimeConfig) -> Holder {
        Holder::Registers(vec![0; config.register_count])
    }
}

instruction_set! {
    /// Fluent builder for register machine programs
    builder RegisterProgramBuilder;

    /// `mov dst value`: dst = value
    MOV = 0 => "mov", mov(dst: u8, value: i32), op_mov;
    /// `add dst lhs rhs`: dst = lhs + rhs
    ADD = 1 => "add", add(dst: u8, lhs: u8, rhs: u8), op_add;
    SUB = 2 => "sub", sub(dst: u8, lhs: u8, rhs: u8), op_sub;
    MUL = 3 => "mul", mul(dst: u8, lhs: u8, rhs: u8), op_mul;
    /// Faults on a zero divisor
    DIV = 4 => "div", div(dst: u8, lhs: u8, rhs: u8), op_div;
    AND = 5 => "and", and(dst: u8, lhs: u8, rhs: u8), op_and;
    OR = 6 => "or", or(dst: u8, lhs: u8, rhs: u8), op_or;
    XOR = 7 => "xor", xor(dst: u8, lhs: u8, rhs: u8), op_xor;
    /// `not dst src`: bitwise complement
    NOT = 8 => "not", not(dst: u8, src: u8), op_not;
    /// `jump offset`
    JUMP = 9 => "jump", jump(offset: i32), op_jump;
    /// `cjump cond offset`: branch when `cond` is nonzero
    CJUMP = 10 => "cjump", cjump(cond: u8, offset: i32), op_cjump;
    /// `load dst address global`: dst = memory[address]
    LOAD = 11 => "load", load(dst: u8, address: u8, global: u8), op_load;
    /// `store src address global`: memory[address] = src
    STORE = 12 => "store", store(src: u8, address: u8, global: u8), op_store;
    /// `dup dst src`: dst = src
    DUP = 13 => "dup", dup(dst: u8, src: u8), op_dup;
    GT = 14 => "gt", gt(dst: u8, lhs: u8, rhs: u8), op_gt;
    LT = 15 => "lt", lt(dst: u8, lhs: u8, rhs: u8), op_lt;
    EQ = 16 => "eq", eq(dst: u8, lhs: u8, rhs: u8), op_eq;
    /// Remainder; faults on a zero divisor
    MOD = 17 => "mod", modulo(dst: u8, lhs: u8, rhs: u8), op_mod;
    /// `call target`: absolute byte offset
    CALL = 18 => "call", call(target: i32), op_call;
    RET = 19 => "ret", ret(), op_ret;
    SWAP = 20 => "swap", swap(a: u8, b: u8), op_swap;
    HALT = 21 => "halt", halt(), op_halt;
}

fn binary(state: &mut MachineState, f: BinaryFn) -> VMResult<()> {
    let dst = state.fetch_u8()?;
    let lhs = state.fetch_u8()?;
    let rhs = state.fetch_u8()?;
    let value = f(state.register(lhs)?, state.register(rhs)?)?;
    state.set_register(dst, value)
}

fn op_mov(state: &mut MachineState) -> VMResult<()> {
    let dst = state.fetch_u8()?;
    let value = state.fetch_i32()?;
    state.set_register(dst, value)
}

fn op_add(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::add)
}

fn op_sub(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::sub)
}

fn op_mul(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::mul)
}

fn op_div(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::div)
}

fn op_and(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::and)
}

fn op_or(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::or)
}

fn op_xor(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::xor)
}

fn op_not(state: &mut MachineState) -> VMResult<()> {
    let dst = state.fetch_u8()?;
    let src = state.fetch_u8()?;
    let value = !state.register(src)?;
    state.set_register(dst, value)
}

fn op_jump(state: &mut MachineState) -> VMResult<()> {
    let offset = state.fetch_i32()?;
    state.jump_relative(offset)
}

fn op_cjump(state: &mut MachineState) -> VMResult<()> {
    let cond = state.fetch_u8()?;
    let offset = state.fetch_i32()?;
    if state.register(cond)? != 0 {
        state.jump_relative(offset)?;
    }
    Ok(())
}

fn op_load(state: &mut MachineState) -> VMResult<()> {
    let dst = state.fetch_u8()?;
    let address = state.fetch_u8()?;
    let global = state.fetch_u8()?;
    let value = state.load(state.register(address)?, state.register(global)? != 0)?;
    state.set_register(dst, value)
}

fn op_store(state: &mut MachineState) -> VMResult<()> {
    let src = state.fetch_u8()?;
    let address = state.fetch_u8()?;
    let global = state.fetch_u8()?;
    let value = state.register(src)?;
    state.store(state.register(address)?, state.register(global)? != 0, value)
}

fn op_dup(state: &mut MachineState) -> VMResult<()> {
    let dst = state.fetch_u8()?;
    let src = state.fetch_u8()?;
    let value = state.register(src)?;
    state.set_register(dst, value)
}

fn op_gt(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::gt)
}

fn op_lt(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::lt)
}

fn op_eq(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::eq)
}

fn op_mod(state: &mut MachineState) -> VMResult<()> {
    binary(state, alu::rem)
}

fn op_call(state: &mut MachineState) -> VMResult<()> {
    let target = state.fetch_i32()?;
    state.call(target)
}

fn op_ret(state: &mut MachineState) -> VMResult<()> {
    state.ret()
}

fn op_swap(state: &mut MachineState) -> VMResult<()> {
    let a = state.fetch_u8()?;
    let b = state.fetch_u8()?;
    let (va, vb) = (state.register(a)?, state.register(b)?);
    state.set_register(a, vb)?;
    state.set_register(b, va)
}

fn op_halt(state: &mut MachineState) -> VMResult<()> {
    state.halt();
    Ok(())
}
