use std::collections::HashMap;
use regstack::bytecode::SymbolicInstruction;
use regstack::vm::FRAME_SIZE;
use crate::codegen::{CodegenError, CodegenResult, FunctionScope};

/// Per-function compilation state: the variable table and the symbolic
/// instruction buffer
#[derive(Debug, Clone)]
pub struct FunctionContext<'a> {
    function: String,
    scope: &'a FunctionScope,
    variables: HashMap<String, usize>,
    code: Vec<SymbolicInstruction>,
    size: usize,
}

impl<'a> FunctionContext<'a> {
    pub fn new(function: &str, scope: &'a FunctionScope) -> Self {
        Self {
            function: function.to_string(),
            scope,
            variables: HashMap::new(),
            code: Vec::new(),
            size: 0,
        }
    }

    /// Fully qualified name of the function being compiled
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn scope(&self) -> &FunctionScope {
        self.scope
    }

    /// Assign the next frame slot to `name`
    pub fn declare(&mut self, name: &str) -> CodegenResult<usize> {
        if self.variables.contains_key(name) {
            return Err(CodegenError::DuplicateVariable {
                function: self.function.clone(),
                name: name.to_string(),
            });
        }
        let slot = self.variables.len();
        if slot >= FRAME_SIZE {
            return Err(CodegenError::FrameOverflow {
                function: self.function.clone(),
                slots: slot + 1,
            });
        }
        self.variables.insert(name.to_string(), slot);
        Ok(slot)
    }

    pub fn slot(&self, name: &str) -> CodegenResult<usize> {
        self.variables
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UndeclaredVariable {
                function: self.function.clone(),
                name: name.to_string(),
            })
    }

    /// Slots in use; the first free slot
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn emit(&mut self, instruction: SymbolicInstruction) {
        self.size += instruction.encoded_len();
        self.code.push(instruction);
    }

    /// Bytes emitted so far
    pub fn code_size(&self) -> usize {
        self.size
    }

    /// Run `f` in a nested lexical scope; declarations made inside are
    /// dropped afterwards and their slots become free again
    pub fn scoped<T, F>(&mut self, f: F) -> CodegenResult<T>
    where
        F: FnOnce(&mut Self) -> CodegenResult<T>,
    {
        let saved = self.variables.clone();
        let result = f(self);
        self.variables = saved;
        result
    }

    /// Disposable copy of the variable table and buffer
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Bytes `f` would emit, measured on a snapshot that is then discarded
    pub fn measure<F>(&self, f: F) -> CodegenResult<usize>
    where
        F: FnOnce(&mut Self) -> CodegenResult<()>,
    {
        let mut scratch = self.snapshot();
        let before = scratch.code_size();
        f(&mut scratch)?;
        Ok(scratch.code_size() - before)
    }

    pub fn into_code(self) -> Vec<SymbolicInstruction> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regstack::vm::{Machine, StackMachine};
    use regstack::vm::stack::opcodes;

    fn push(value: i64) -> SymbolicInstruction {
        let table = StackMachine::instruction_table().unwrap();
        SymbolicInstruction::with_values(*table.get(opcodes::PUSH).unwrap(), &[value])
    }

    #[test]
    fn test_slots_follow_declaration_order() {
        let scope = FunctionScope::root();
        let mut ctx = FunctionContext::new("f", &scope);
        assert_eq!(ctx.declare("a").unwrap(), 0);
        assert_eq!(ctx.declare("b").unwrap(), 1);
        assert_eq!(ctx.slot("b").unwrap(), 1);
        assert_eq!(ctx.variable_count(), 2);
    }

    #[test]
    fn test_duplicate_and_undeclared_variables() {
        let scope = FunctionScope::root();
        let mut ctx = FunctionContext::new("f", &scope);
        ctx.declare("a").unwrap();
        assert!(matches!(ctx.declare("a"), Err(CodegenError::DuplicateVariable { .. })));
        assert!(matches!(ctx.slot("zz"), Err(CodegenError::UndeclaredVariable { .. })));
    }

    #[test]
    fn test_frame_overflow() {
        let scope = FunctionScope::root();
        let mut ctx = FunctionContext::new("f", &scope);
        for i in 0..FRAME_SIZE {
            ctx.declare(&format!("v{}", i)).unwrap();
        }
        assert!(matches!(
            ctx.declare("extra"),
            Err(CodegenError::FrameOverflow { slots: 17, .. })
        ));
    }

    #[test]
    fn test_scoped_declarations_are_released() {
        let scope = FunctionScope::root();
        let mut ctx = FunctionContext::new("f", &scope);
        ctx.declare("outer").unwrap();

        let inner = ctx.scoped(|ctx| ctx.declare("inner")).unwrap();
        assert_eq!(inner, 1);
        assert!(ctx.slot("inner").is_err());
        assert_eq!(ctx.declare("next").unwrap(), 1);
    }

    #[test]
    fn test_measure_leaves_context_untouched() {
        let scope = FunctionScope::root();
        let mut ctx = FunctionContext::new("f", &scope);
        ctx.emit(push(1));

        let size = ctx
            .measure(|scratch| {
                scratch.declare("tmp")?;
                scratch.emit(push(2));
                scratch.emit(push(3));
                Ok(())
            })
            .unwrap();

        assert_eq!(size, 10);
        assert_eq!(ctx.code_size(), 5);
        assert_eq!(ctx.variable_count(), 0);
        assert_eq!(ctx.into_code().len(), 1);
    }
}
