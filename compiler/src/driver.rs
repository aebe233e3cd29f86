//! File-level entry points: JSON AST in, program image out.

use std::fs;
use std::path::Path;
use anyhow::{Context, Result};
use regstack::ProgramImage;
use crate::ast::CompilationUnit;
use crate::codegen::{compile, Target};

/// Read a JSON-serialized compilation unit
pub fn load_unit<P: AsRef<Path>>(path: P) -> Result<CompilationUnit> {
    let path = path.as_ref();
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("Failed to parse AST in {}", path.display()))
}

/// Compile a JSON AST file into an image named after the file stem
pub fn compile_file<P: AsRef<Path>>(path: P, target: Target) -> Result<ProgramImage> {
    let path = path.as_ref();
    let unit = load_unit(path)?;
    let program = compile(&unit, target)
        .with_context(|| format!("Failed to compile {} for the {} machine", path.display(), target))?;

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("program");
    Ok(program.into_image(name))
}

/// Compile `input` and write the image to `output`
pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q, target: Target) -> Result<ProgramImage> {
    let image = compile_file(input, target)?;
    let output = output.as_ref();
    image
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(image)
}
