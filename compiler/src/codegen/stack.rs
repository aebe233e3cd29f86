//! Lowering for the stack machine.
//!
//! Binary operators push the right operand before the left so the machine
//! pops them in source order. Arguments are pushed left to right, then
//! stored into the callee's frame from the last one down; the callee leaves
//! its result on the operand stack.

use regstack::bytecode::{InstructionTable, SymbolicInstruction};
use regstack::vm::stack::opcodes as op;
use regstack::vm::{Machine, StackMachine, FRAME_SIZE};
use crate::ast::{BinaryOp, Expression, FunctionBody, FunctionDef, Statement, UnaryOp};
use crate::codegen::{
    Backend, CodegenError, CodegenResult, CompiledFunction, FunctionContext, FunctionScope, Target,
};

/// Size of `push offset; jump`
const BRANCH_SIZE: i64 = 6;

pub struct StackBackend {
    table: InstructionTable,
}

impl StackBackend {
    pub fn new() -> CodegenResult<Self> {
        Ok(Self {
            table: StackMachine::instruction_table()?,
        })
    }

    fn emit(&self, ctx: &mut FunctionContext, opcode: u8, values: &[i64]) -> CodegenResult<()> {
        ctx.emit(self.instruction(opcode, values)?);
        Ok(())
    }

    fn push(&self, ctx: &mut FunctionContext, value: i64) -> CodegenResult<()> {
        self.emit(ctx, op::PUSH, &[value])
    }

    fn load_slot(&self, ctx: &mut FunctionContext, slot: usize) -> CodegenResult<()> {
        self.push(ctx, slot as i64)?;
        self.push(ctx, 0)?;
        self.emit(ctx, op::LOAD, &[])
    }

    /// Pop the top of stack into local `slot`
    fn store_slot(&self, ctx: &mut FunctionContext, slot: usize) -> CodegenResult<()> {
        self.push(ctx, slot as i64)?;
        self.push(ctx, 0)?;
        self.emit(ctx, op::STORE, &[])
    }

    fn invert(&self, ctx: &mut FunctionContext) -> CodegenResult<()> {
        self.push(ctx, 0)?;
        self.emit(ctx, op::EQ, &[])
    }

    fn compile_expr(&self, ctx: &mut FunctionContext, expr: &Expression) -> CodegenResult<()> {
        match expr {
            Expression::Number(n) => self.push(ctx, *n as i64),
            Expression::Boolean(b) => self.push(ctx, *b as i64),
            Expression::Identifier(name) => {
                let slot = ctx.slot(name)?;
                self.load_slot(ctx, slot)
            }
            Expression::Paren(inner) => self.compile_expr(ctx, inner),
            Expression::Unary { op: unary, operand } => {
                self.compile_expr(ctx, operand)?;
                match unary {
                    UnaryOp::Neg => {
                        self.push(ctx, 0)?;
                        self.emit(ctx, op::SUB, &[])
                    }
                    UnaryOp::Not => self.invert(ctx),
                }
            }
            Expression::Binary { op: binary, left, right } => {
                self.compile_expr(ctx, right)?;
                self.compile_expr(ctx, left)?;
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
                self.emit(ctx, opcode, &[])?;
                if negate {
                    self.invert(ctx)?;
                }
                Ok(())
            }
            Expression::Call { name, args } => {
                if args.len() > FRAME_SIZE {
                    return Err(CodegenError::FrameOverflow {
                        function: ctx.function().to_string(),
                        slots: args.len(),
                    });
                }
                for arg in args {
                    self.compile_expr(ctx, arg)?;
                }
                for i in (0..args.len()).rev() {
                    self.store_slot(ctx, FRAME_SIZE + i)?;
                }
                let callee = ctx.scope().qualify(name);
                ctx.emit(self.symbolic(op::CALL, &callee)?);
                Ok(())
            }
        }
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
                self.compile_expr(ctx, value)?;
                let slot = ctx.declare(name)?;
                self.store_slot(ctx, slot)
            }
            Statement::Assign { name, value } => {
                self.compile_expr(ctx, value)?;
                let slot = ctx.slot(name)?;
                self.store_slot(ctx, slot)
            }
            Statement::Return(value) => {
                self.compile_expr(ctx, value)?;
                self.emit(ctx, op::RET, &[])
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let else_branch = else_branch.as_deref().unwrap_or(&[]);
                self.compile_expr(ctx, condition)?;

                let false_size = ctx.measure(|s| self.compile_block(s, else_branch))? as i64;
                let true_size = ctx.measure(|s| self.compile_block(s, then_branch))? as i64;

                self.push(ctx, false_size + BRANCH_SIZE)?;
                self.emit(ctx, op::CJUMP, &[])?;
                self.compile_block(ctx, else_branch)?;
                self.push(ctx, true_size)?;
                self.emit(ctx, op::JUMP, &[])?;
                self.compile_block(ctx, then_branch)
            }
            Statement::While { condition, body } => {
                let start = ctx.code_size() as i64;
                self.compile_expr(ctx, condition)?;
                self.invert(ctx)?;

                let body_size = ctx.measure(|s| self.compile_block(s, body))? as i64;
                self.push(ctx, body_size + BRANCH_SIZE)?;
                self.emit(ctx, op::CJUMP, &[])?;
                self.compile_block(ctx, body)?;

                let end = ctx.code_size() as i64 + BRANCH_SIZE;
                self.push(ctx, start - end)?;
                self.emit(ctx, op::JUMP, &[])
            }
        }
    }
}

impl Backend for StackBackend {
    fn target(&self) -> Target {
        Target::Stack
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
                self.push(&mut ctx, 0)?;
                self.emit(&mut ctx, op::RET, &[])?;
            }
            FunctionBody::Expression(expr) => {
                self.compile_expr(&mut ctx, expr)?;
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
