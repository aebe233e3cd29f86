pub mod ast;
pub mod codegen;
pub mod driver;

pub use ast::*;
pub use codegen::{compile, CodeGenerator, CodegenError, CodegenResult, CompiledProgram, Target};
