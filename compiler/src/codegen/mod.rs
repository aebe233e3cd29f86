//! Code generation from the AST to machine bytecode.
//!
//! A session compiles every function of a unit into a symbolic buffer,
//! prunes what the entry point cannot reach, then collapses the survivors
//! into one byte stream with call targets resolved.

mod context;
mod layout;
mod register;
mod stack;

pub use context::FunctionContext;
pub use register::RegisterBackend;
pub use stack::StackBackend;

use std::collections::{BTreeMap, HashMap, HashSet};
use regstack::bytecode::{
    AssemblyError, InstructionTable, IsaError, Operand, SymbolicInstruction,
};
use regstack::ProgramImage;
use thiserror::Error;
use tracing::debug;
use crate::ast::{CompilationUnit, FunctionDef};

/// Machine a program is compiled for
pub use regstack::MachineKind as Target;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("Variable '{name}' declared twice in '{function}'")]
    DuplicateVariable { function: String, name: String },

    #[error("Undeclared variable '{name}' in '{function}'")]
    UndeclaredVariable { function: String, name: String },

    #[error("Function '{0}' defined twice")]
    DuplicateFunction(String),

    #[error("Call to undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("Entry point '{0}' is not defined")]
    MissingEntryPoint(String),

    #[error("Expression in '{function}' needs {needed} registers, {available} available")]
    RegisterPressure {
        function: String,
        needed: usize,
        available: usize,
    },

    #[error("Function '{function}' needs {slots} frame slots")]
    FrameOverflow { function: String, slots: usize },

    #[error("Target instruction set lacks opcode {0}")]
    MissingInstruction(u8),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Instruction set error: {0}")]
    Isa(#[from] IsaError),
}

pub type CodegenResult<T> = Result<T, CodegenError>;

/// One function's symbolic code, call targets still unresolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFunction {
    pub name: String,
    pub arity: usize,
    pub body: Vec<SymbolicInstruction>,
}

impl CompiledFunction {
    pub fn encoded_len(&self) -> usize {
        self.body.iter().map(|i| i.encoded_len()).sum()
    }

    /// Names of the functions this one calls, in first-call order
    pub fn callees(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.body
            .iter()
            .flat_map(|i| i.unresolved())
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

/// A collapsed program ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    pub target: Target,
    pub bytes: Vec<u8>,
    /// Byte offset of every emitted function
    pub symbols: BTreeMap<String, usize>,
}

impl CompiledProgram {
    pub fn into_image(self, name: &str) -> ProgramImage {
        ProgramImage::new(name, self.target, self.bytes)
    }
}

/// Name resolution for the functions of one unit.
///
/// Functions of an included library are registered as `library.function`.
/// A call from inside the library to a name the library itself defines
/// resolves to that definition; any other name is taken as written.
#[derive(Debug, Clone, Default)]
pub struct FunctionScope {
    prefix: String,
    names: HashSet<String>,
}

impl FunctionScope {
    /// Scope of the top-level unit
    pub fn root() -> Self {
        Self::default()
    }

    fn for_unit(prefix: String, unit: &CompilationUnit) -> Self {
        let mut names = HashSet::new();
        collect_names(unit, "", &mut names);
        Self { prefix, names }
    }

    /// Globally unique name for `name` as seen from this scope
    pub fn qualify(&self, name: &str) -> String {
        if !self.prefix.is_empty() && self.names.contains(name) {
            format!("{}{}", self.prefix, name)
        } else {
            name.to_string()
        }
    }

    /// Name a function defined in this scope is registered under
    pub fn define(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

fn collect_names(unit: &CompilationUnit, prefix: &str, names: &mut HashSet<String>) {
    for function in &unit.functions {
        names.insert(format!("{}{}", prefix, function.name));
    }
    for (library, included) in &unit.includes {
        collect_names(included, &format!("{}{}.", prefix, library), names);
    }
}

/// A lowering strategy for one machine
pub trait Backend {
    fn target(&self) -> Target;

    fn table(&self) -> &InstructionTable;

    fn compile_function(&self, def: &FunctionDef, scope: &FunctionScope) -> CodegenResult<CompiledFunction>;

    /// Code placed before every function: call the entry point, then halt
    fn preamble(&self, entry: &str) -> CodegenResult<Vec<SymbolicInstruction>>;

    /// Build an instruction with concrete immediates
    fn instruction(&self, opcode: u8, values: &[i64]) -> CodegenResult<SymbolicInstruction> {
        let descriptor = *self
            .table()
            .get(opcode)
            .ok_or(CodegenError::MissingInstruction(opcode))?;
        Ok(SymbolicInstruction::with_values(descriptor, values))
    }

    /// Build a single-operand instruction whose operand is resolved at collapse
    fn symbolic(&self, opcode: u8, name: &str) -> CodegenResult<SymbolicInstruction> {
        let descriptor = *self
            .table()
            .get(opcode)
            .ok_or(CodegenError::MissingInstruction(opcode))?;
        Ok(SymbolicInstruction::new(descriptor, vec![Operand::Unresolved(name.to_string())]))
    }
}

/// Drives one compile session over a backend
pub struct CodeGenerator<B: Backend> {
    backend: B,
    entry_point: String,
    functions: Vec<CompiledFunction>,
    index: HashMap<String, usize>,
}

impl<B: Backend> CodeGenerator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entry_point: "main".to_string(),
            functions: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_entry_point(mut self, entry_point: &str) -> Self {
        self.entry_point = entry_point.to_string();
        self
    }

    /// Compile every function of `unit`, libraries first
    pub fn compile_unit(&mut self, unit: &CompilationUnit) -> CodegenResult<()> {
        self.compile_scoped(unit, String::new())
    }

    fn compile_scoped(&mut self, unit: &CompilationUnit, prefix: String) -> CodegenResult<()> {
        for (library, included) in &unit.includes {
            self.compile_scoped(included, format!("{}{}.", prefix, library))?;
        }

        let scope = FunctionScope::for_unit(prefix, unit);
        for def in &unit.functions {
            let compiled = self.backend.compile_function(def, &scope)?;
            if self.index.contains_key(&compiled.name) {
                return Err(CodegenError::DuplicateFunction(compiled.name));
            }
            debug!(
                target_machine = %self.backend.target(),
                function = %compiled.name,
                arity = compiled.arity,
                bytes = compiled.encoded_len(),
                "compiled function"
            );
            self.index.insert(compiled.name.clone(), self.functions.len());
            self.functions.push(compiled);
        }
        Ok(())
    }

    /// Functions compiled so far, in compilation order
    pub fn functions(&self) -> &[CompiledFunction] {
        &self.functions
    }

    /// Prune unreachable functions and collapse the rest into bytes
    pub fn finish(&self) -> CodegenResult<CompiledProgram> {
        let kept = layout::reachable(&self.functions, &self.index, &self.entry_point)?;
        debug!(
            entry = %self.entry_point,
            kept = kept.len(),
            dropped = self.functions.len() - kept.len(),
            "pruned call graph"
        );

        let preamble = self.backend.preamble(&self.entry_point)?;
        let (bytes, symbols) = layout::collapse(preamble, &kept)?;
        Ok(CompiledProgram {
            target: self.backend.target(),
            bytes,
            symbols,
        })
    }
}

/// Compile `unit` for `target` with default settings
pub fn compile(unit: &CompilationUnit, target: Target) -> CodegenResult<CompiledProgram> {
    match target {
        Target::Register => {
            let mut generator = CodeGenerator::new(RegisterBackend::new()?);
            generator.compile_unit(unit)?;
            generator.finish()
        }
        Target::Stack => {
            let mut generator = CodeGenerator::new(StackBackend::new()?);
            generator.compile_unit(unit)?;
            generator.finish()
        }
    }
}
