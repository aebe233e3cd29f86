//! Stack machine instruction set.
//!
//! Binary operators pop the left operand first, then the right one, so
//! callers push the right operand before the left. Branch offsets and
//! conditions come off the operand stack; only `push` and `call` carry
//! immediates.

use crate::bytecode::{InstructionDescriptor, MachineKind};
use crate::runtime::RuntimeConfig;
use crate::vm::alu::{self, BinaryFn};
use crate::vm::{Holder, Machine, MachineState, VMResult};

/// Operand-stack machine
#[derive(Debug, Clone, Copy, Default)]
pub struct StackMachine;

impl Machine for StackMachine {
    const KIND: MachineKind = MachineKind::Stack;

    fn descriptors() -> Vec<InstructionDescriptor> {
        descriptors()
    }

    fn holder(_config: &RuntimeConfig) -> Holder {
        Holder::Stack(Vec::new())
    }
}

instruction_set! {
    /// Fluent builder for stack machine programs
    builder StackProgramBuilder;

    PUSH = 0 => "push", push(value: i32), op_push;
    POP = 1 => "pop", pop(), op_pop;
    ADD = 2 => "add", add(), op_add;
    SUB = 3 => "sub", sub(), op_sub;
    MUL = 4 => "mul", mul(), op_mul;
    DIV = 5 => "div", div(), op_div;
    AND = 6 => "and", and(), op_and;
    OR = 7 => "or", or(), op_or;
    XOR = 8 => "xor", xor(), op_xor;
    NOT = 9 => "not", not(), op_not;
    /// Pops the relative offset
    JUMP = 10 => "jump", jump(), op_jump;
    /// Pops the relative offset, then the condition
    CJUMP = 11 => "cjump", cjump(), op_cjump;
    /// Pops the global flag, then the address
    LOAD = 12 => "load", load(), op_load;
    /// Pops the global flag, the address, then the value
    STORE = 13 => "store", store(), op_store;
    DUP = 14 => "dup", dup(), op_dup;
    GT = 15 => "gt", gt(), op_gt;
    LT = 16 => "lt", lt(), op_lt;
    EQ = 17 => "eq", eq(), op_eq;
    MOD = 18 => "mod", modulo(), op_mod;
    /// `call target`: absolute byte offset
    CALL = 19 => "call", call(target: i32), op_call;
    RET = 20 => "ret", ret(), op_ret;
    SWAP = 21 => "swap", swap(), op_swap;
    HALT = 22 => "halt", halt(), op_halt;
}

fn binary(state: &mut MachineState, f: BinaryFn) -> VMResult<()> {
    let left = state.pop()?;
    let right = state.pop()?;
    let value = f(left, right)?;
    state.push(value)
}

fn op_push(state: &mut MachineState) -> VMResult<()> {
    let value = state.fetch_i32()?;
    state.push(value)
}

fn op_pop(state: &mut MachineState) -> VMResult<()> {
    state.pop().map(|_| ())
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
    let value = state.pop()?;
    state.push(!value)
}

fn op_jump(state: &mut MachineState) -> VMResult<()> {
    let offset = state.pop()?;
    state.jump_relative(offset)
}

fn op_cjump(state: &mut MachineState) -> VMResult<()> {
    let offset = state.pop()?;
    let cond = state.pop()?;
    if cond != 0 {
        state.jump_relative(offset)?;
    }
    Ok(())
}

fn op_load(state: &mut MachineState) -> VMResult<()> {
    let global = state.pop()?;
    let address = state.pop()?;
    let value = state.load(address, global != 0)?;
    state.push(value)
}

fn op_store(state: &mut MachineState) -> VMResult<()> {
    let global = state.pop()?;
    let address = state.pop()?;
    let value = state.pop()?;
    state.store(address, global != 0, value)
}

fn op_dup(state: &mut MachineState) -> VMResult<()> {
    let value = state.peek()?;
    state.push(value)
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
    let a = state.pop()?;
    let b = state.pop()?;
    state.push(a)?;
    state.push(b)
}

fn op_halt(state: &mut MachineState) -> VMResult<()> {
    state.halt();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::assemble;
    use crate::vm::{VMError, FRAME_SIZE, GLOBAL_FRAME_START, VM};

    fn run(program: Vec<u8>) -> VM<StackMachine> {
        let mut vm = VM::<StackMachine>::from_program(program).unwrap();
        vm.run().unwrap();
        vm
    }

    fn stack(vm: &VM<StackMachine>) -> Vec<i32> {
        vm.state().stack().unwrap().to_vec()
    }

    #[test]
    fn test_instruction_table_is_dense() {
        let table = StackMachine::instruction_table().unwrap();
        assert_eq!(table.len(), 23);
        for opcode in 0..=opcodes::HALT {
            assert!(table.get(opcode).is_some(), "missing opcode {}", opcode);
        }
        assert_eq!(table.lookup("push").unwrap().immediate_sizes(), &[4]);
        assert!(table.lookup("jump").unwrap().immediate_sizes().is_empty());
    }

    #[test]
    fn test_store_sum_into_local_memory() {
        let table = StackMachine::instruction_table().unwrap();
        let program = assemble("push 2 push 3 add push 0 push 0 store", &table).unwrap();
        let vm = run(program);

        assert_eq!(vm.state().memory()[0], 5);
        assert!(stack(&vm).is_empty());
    }

    #[test]
    fn test_nonzero_flag_addresses_global_frame() {
        let program = StackProgramBuilder::new()
            .push(11)
            .push(2)
            .push(1)
            .store()
            .push(2)
            .push(1)
            .load()
            .build();
        let vm = run(program);

        assert_eq!(vm.state().memory()[GLOBAL_FRAME_START + 2], 11);
        assert_eq!(vm.state().memory()[2], 0);
        assert_eq!(stack(&vm), vec![11]);
    }

    #[test]
    fn test_operand_order_left_on_top() {
        // right (3) pushed first, left (10) on top: 10 - 3, 10 / 3, 10 % 3
        let program = StackProgramBuilder::new()
            .push(3)
            .push(10)
            .sub()
            .push(3)
            .push(10)
            .div()
            .push(3)
            .push(10)
            .modulo()
            .push(3)
            .push(10)
            .gt()
            .push(3)
            .push(10)
            .lt()
            .build();

        assert_eq!(stack(&run(program)), vec![7, 3, 1, 1, 0]);
    }

    #[test]
    fn test_logic_and_not() {
        let program = StackProgramBuilder::new()
            .push(0b1100)
            .push(0b1010)
            .and()
            .push(0b1100)
            .push(0b1010)
            .or()
            .push(0b1100)
            .push(0b1010)
            .xor()
            .push(0)
            .not()
            .push(4)
            .push(4)
            .eq()
            .build();

        assert_eq!(stack(&run(program)), vec![0b1000, 0b1110, 0b0110, -1, 1]);
    }

    #[test]
    fn test_dup_swap_pop() {
        let program = StackProgramBuilder::new()
            .push(1)
            .push(2)
            .swap()
            .dup()
            .push(5)
            .pop()
            .build();

        assert_eq!(stack(&run(program)), vec![2, 1, 1]);
    }

    #[test]
    fn test_jump_pops_offset() {
        // push 5 (5 bytes) is skipped; offset counts from after the jump
        let program = StackProgramBuilder::new()
            .push(5)
            .jump()
            .push(99)
            .push(7)
            .build();

        assert_eq!(stack(&run(program)), vec![7]);
    }

    #[test]
    fn test_cjump_pops_offset_then_condition() {
        let taken = StackProgramBuilder::new()
            .push(1)
            .push(5)
            .cjump()
            .push(99)
            .build();
        assert!(stack(&run(taken)).is_empty());

        let fallthrough = StackProgramBuilder::new()
            .push(0)
            .push(5)
            .cjump()
            .push(99)
            .build();
        assert_eq!(stack(&run(fallthrough)), vec![99]);
    }

    #[test]
    fn test_call_and_return_use_call_stack() {
        // 0: call 11; 5: push 1; 10: halt; 11: push 42; 16: ret
        let program = StackProgramBuilder::new()
            .call(11)
            .push(1)
            .halt()
            .push(42)
            .ret()
            .build();
        let vm = run(program);

        assert_eq!(stack(&vm), vec![42, 1]);
        assert!(vm.state().call_stack().is_empty());
    }

    #[test]
    fn test_nested_call_uses_next_frame() {
        // 0: call 6; 5: halt; 6: call 12; 11: ret; 12: store 8 at local 0; ret
        let program = StackProgramBuilder::new()
            .call(6)
            .halt()
            .call(12)
            .ret()
            .push(8)
            .push(0)
            .push(0)
            .store()
            .ret()
            .build();
        let vm = run(program);

        assert_eq!(vm.state().memory()[FRAME_SIZE], 8);
        assert_eq!(vm.state().memory()[0], 0);
    }

    #[test]
    fn test_stack_underflow() {
        let program = StackProgramBuilder::new().push(1).add().build();
        let mut vm = VM::<StackMachine>::from_program(program).unwrap();
        assert_eq!(vm.run().unwrap_err(), VMError::StackUnderflow);
    }

    #[test]
    fn test_divide_by_zero_preserves_earlier_state() {
        let program = StackProgramBuilder::new()
            .push(4)
            .push(0)
            .push(0)
            .store()
            .push(0)
            .push(1)
            .div()
            .push(9)
            .build();
        let mut vm = VM::<StackMachine>::from_program(program).unwrap();

        assert_eq!(vm.run().unwrap_err(), VMError::DivisionByZero);
        assert_eq!(vm.state().memory()[0], 4);
        assert!(stack(&vm).is_empty());
    }

    #[test]
    fn test_jump_outside_program_faults() {
        let program = StackProgramBuilder::new().push(-100).jump().build();
        let mut vm = VM::<StackMachine>::from_program(program).unwrap();
        assert_eq!(vm.run().unwrap_err(), VMError::InvalidProgramCounter(-94));
    }
}
