//! Lowering for the register machine.
//!
//! Calling convention:
//! - results come back in `r0`
//! - the two highest registers hold the address and global flag for every
//!   `load`/`store`
//! - expressions evaluate into the lowest free temporary; registers below it
//!   are live and are spilled to frame slots above the caller's variables
//!   around a call
//! - arguments are evaluated into registers first, then stored to logical
//!   slot `FRAME_SIZE + i`, which is slot `i` of the callee's frame

use regstack::bytecode::{InstructionTable, SymbolicInstruction};
use regstack::runtime::RuntimeConfig;
use regstack::vm::register::opcodes as op;
use regstack::vm::{Machine, RegisterMachine, FRAME_SIZE};
use crate::ast::{BinaryOp, Expression, FunctionBody, FunctionDef, Statement, UnaryOp};
use crate::codegen::{
    Backend, CodegenError, CodegenResult, CompiledFunction, FunctionContext, FunctionScope, Target,
};

/// Size of an encoded `jump`
const JUMP_SIZE: i64 = 5;

pub struct RegisterBackend {
    table: InstructionTable,
    registers: usize,
}

impl RegisterBackend {
    pub fn new() -> CodegenResult<Self> {
        Self::with_registers(RuntimeConfig::default().register_count)
    }

    /// Target a register file of `registers` entries; at least one
    /// temporary besides the two scratch registers is required
    pub fn with_registers(registers: usize) -> CodegenResult<Self> {
        if registers < 3 || registers > u8::MAX as usize + 1 {
            return Err(CodegenError::RegisterPressure {
                function: String::new(),
                needed: 3,
                available: registers,
            });
        }
        Ok(Self {
            table: RegisterMachine::instruction_table()?,
            registers,
        })
    }

    fn address_register(&self) -> i64 {
        self.registers as i64 - 2
    }

    fn flag_register(&self) -> i64 {
        self.registers as i64 - 1
    }

    fn temporaries(&self) -> usize {
        self.registers - 2
    }

    fn emit(&self, ctx: &mut FunctionContext, opcode: u8, values: &[i64]) -> CodegenResult<()> {
        ctx.emit(self.instruction(opcode, values)?);
        Ok(())
    }

    /// Fail unless registers `0..=reg` are all temporaries
    fn reserve(&self, ctx: &FunctionContext, reg: usize) -> CodegenResult<i64> {
        if reg >= self.temporaries() {
            return Err(CodegenError::RegisterPressure {
                function: ctx.function().to_string(),
                needed: reg + 3,
                available: self.registers,
            });
        }
        Ok(reg as i64)
    }

    fn load_slot(&self, ctx: &mut FunctionContext, dst: i64, slot: usize) -> CodegenResult<()> {
        let (addr, flag) = (self.address_register(), self.flag_register());
        self.emit(ctx, op::MOV, &[addr, slot as i64])?;
        self.emit(ctx, op::MOV, &[flag, 0])?;
        self.emit(ctx, op::LOAD, &[dst, addr, flag])
    }

    fn store_slot(&self, ctx: &mut FunctionContext, src: i64, slot: usize) -> CodegenResult<()> {
        let (addr, flag) = (self.address_register(), self.flag_register());
        self.emit(ctx, op::MOV, &[addr, slot as i64])?;
        self.emit(ctx, op::MOV, &[flag, 0])?;
        self.emit(ctx, op::STORE, &[src, addr, flag])
    }

    /// `reg = (reg == 0)`
    fn invert(&self, ctx: &mut FunctionContext, reg: i64) -> CodegenResult<()> {
        let flag = self.flag_register();
        self.emit(ctx, op::MOV, &[flag, 0])?;
        self.emit(ctx, op::EQ, &[reg, reg, flag])
    }

    /// Evaluate `expr` into temporary `t`, leaving `0..t` untouched
    fn compile_expr(&self, ctx: &mut FunctionContext, expr: &Expression, t: usize) -> CodegenResult<()> {
        let dst = self.reserve(ctx, t)?;
        match expr {
            Expression::Number(n) => self.emit(ctx, op::MOV, &[dst, *n as i64]),
            Expression::Boolean(b) => self.emit(ctx, op::MOV, &[dst, *b as i64]),
            Expression::Identifier(name) => {
                let slot = ctx.slot(name)?;
                self.load_slot(ctx, dst, slot)
            }
            Expression::Paren(inner) => self.compile_expr(ctx, inner, t),
            Expression::Unary { op: unary, operand } => {
                self.compile_expr(ctx, operand, t)?;
                match unary {
                    UnaryOp::Neg => {
                        let flag = self.flag_register();
                        self.emit(ctx, op::MOV, &[flag, 0])?;
                        self.emit(ctx, op::SUB, &[dst, flag, dst])
                    }
                    UnaryOp::Not => self.invert(ctx, dst),
                }
            }
            Expression::Binary { op: binary, left, right } => {
                let rhs = self.reserve(ctx, t + 1)?;
                self.compile_expr(ctx, left, t)?;
                self.compile_expr(ctx, right, t + 1)?;
                let (opcode, negate) = match binary {
                    BinaryOp::Add => (op::ADD, false),
                    BinaryOp::Sub => (op::SUB, false),
                    BinaryOp::Mul => (op::MUL, false),
                    BinaryOp::Div => (op::DIV, false),
                    BinaryOp::Mod => (op::MOD, false),
                    BinaryOp::And | BinaryOp::BitAnd => (op::AND, false),
                    BinaryOp::Or | BinaryOp::BitOr => (op::OR, false),
                    BinaryOp::BitXor => (op::XOR, false),
                    BinaryOp::Eq => (op::EQ, false),
                    BinaryOp::Ne => (op::EQ, true),
                    BinaryOp::Lt => (op::LT, false),
                    BinaryOp::Le => (op::GT, true),
                    BinaryOp::Gt => (op::GT, false),
                    BinaryOp::Ge => (op::LT, true),
                };
                self.emit(ctx, opcode, &[dst, dst, rhs])?;
                if negate {
                    self.invert(ctx, dst)?;
                }
                Ok(())
            }
            Expression::Call { name, args } => self.compile_call(ctx, name, args, t),
        }
    }

    fn compile_call(
        &self,
        ctx: &mut FunctionContext,
        name: &str,
        args: &[Expression],
        t: usize,
    ) -> CodegenResult<()> {
        if args.len() > FRAME_SIZE {
            return Err(CodegenError::FrameOverflow {
                function: ctx.function().to_string(),
                slots: args.len(),
            });
        }
        if !args.is_empty() {
            self.reserve(ctx, t + args.len() - 1)?;
        }

        let base = ctx.variable_count();
        if base + t > FRAME_SIZE {
            return Err(CodegenError::FrameOverflow {
                function: ctx.function().to_string(),
                slots: base + t,
            });
        }
        for live in 0..t {
            self.store_slot(ctx, live as i64, base + live)?;
        }

        for (i, arg) in args.iter().enumerate() {
            self.compile_expr(ctx, arg, t + i)?;
        }
        for i in 0..args.len() {
            self.store_slot(ctx, (t + i) as i64, FRAME_SIZE + i)?;
        }

        let callee = ctx.scope().qualify(name);
        ctx.emit(self.symbolic(op::CALL, &callee)?);

        if t != 0 {
            self.emit(ctx, op::DUP, &[t as i64, 0])?;
        }
        for live in 0..t {
            self.load_slot(ctx, live as i64, base + live)?;
        }
        Ok(())
    }

    fn compile_block(&self, ctx: &mut FunctionContext, statements: &[Statement]) -> CodegenResult<()> {
        ctx.scoped(|ctx| {
            for statement in statements {
                self.compile_statement(ctx, statement)?;
            }
            Ok(())
        })
    }

    fn compile_statement(&self, ctx: &mut FunctionContext, statement: &Statement) -> CodegenResult<()> {
        match statement {
            Statement::VarDecl { name, value } => {
                self.compile_expr(ctx, value, 0)?;
                let slot = ctx.declare(name)?;
                self.store_slot(ctx, 0, slot)
            }
            Statement::Assign { name, value } => {
                self.compile_expr(ctx, value, 0)?;
                let slot = ctx.slot(name)?;
                self.store_slot(ctx, 0, slot)
            }
            Statement::Return(value) => {
                self.compile_expr(ctx, value, 0)?;
                self.emit(ctx, op::RET, &[])
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let else_branch = else_branch.as_deref().unwrap_or(&[]);
                self.compile_expr(ctx, condition, 0)?;

                let false_size = ctx.measure(|s| self.compile_block(s, else_branch))? as i64;
                let true_size = ctx.measure(|s| self.compile_block(s, then_branch))? as i64;

                self.emit(ctx, op::CJUMP, &[0, false_size + JUMP_SIZE])?;
                self.compile_block(ctx, else_branch)?;
                self.emit(ctx, op::JUMP, &[true_size])?;
                self.compile_block(ctx, then_branch)
            }
            Statement::While { condition, body } => {
                let start = ctx.code_size() as i64;
                self.compile_expr(ctx, condition, 0)?;
                self.invert(ctx, 0)?;

                let body_size = ctx.measure(|s| self.compile_block(s, body))? as i64;
                self.emit(ctx, op::CJUMP, &[0, body_size + JUMP_SIZE])?;
                self.compile_block(ctx, body)?;

                let end = ctx.code_size() as i64 + JUMP_SIZE;
                self.emit(ctx, op::JUMP, &[start - end])
            }
        }
    }
}

impl Backend for RegisterBackend {
    fn target(&self) -> Target {
        Target::Register
    }

    fn table(&self) -> &InstructionTable {
        &self.table
    }

    fn compile_function(&self, def: &FunctionDef, scope: &FunctionScope) -> CodegenResult<CompiledFunction> {
        let name = scope.define(&def.name);
        let mut ctx = FunctionContext::new(&name, scope);
        for arg in &def.args {
            ctx.declare(arg)?;
        }

        match &def.body {
            FunctionBody::Block(statements) => {
                self.compile_block(&mut ctx, statements)?;
                self.emit(&mut ctx, op::MOV, &[0, 0])?;
                self.emit(&mut ctx, op::RET, &[])?;
            }
            FunctionBody::Expression(expr) => {
                self.compile_expr(&mut ctx, expr, 0)?;
                self.emit(&mut ctx, op::RET, &[])?;
            }
        }

        Ok(CompiledFunction {
            name,
            arity: def.args.len(),
            body: ctx.into_code(),
        })
    }

    fn preamble(&self, entry: &str) -> CodegenResult<Vec<SymbolicInstruction>> {
        Ok(vec![self.symbolic(op::CALL, entry)?, self.instruction(op::HALT, &[])?])
    }
}
