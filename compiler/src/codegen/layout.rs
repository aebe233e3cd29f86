//! Call-graph pruning and final collapse.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use regstack::bytecode::{encode, SymbolicInstruction};
use rustc_hash::FxHashMap;
use crate::codegen::{CodegenError, CodegenResult, CompiledFunction};

/// Functions reachable from `entry` through call edges.
///
/// The entry comes first; the others keep their compilation order. Calls to
/// names that were never defined are left for `collapse` to report.
pub(crate) fn reachable<'a>(
    functions: &'a [CompiledFunction],
    index: &HashMap<String, usize>,
    entry: &str,
) -> CodegenResult<Vec<&'a CompiledFunction>> {
    let entry_index = *index
        .get(entry)
        .ok_or_else(|| CodegenError::MissingEntryPoint(entry.to_string()))?;

    let mut seen = HashSet::from([entry_index]);
    let mut queue = VecDeque::from([entry_index]);
    while let Some(current) = queue.pop_front() {
        for callee in functions[current].callees() {
            if let Some(&next) = index.get(callee) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }

    let mut kept = vec![&functions[entry_index]];
    kept.extend(
        functions
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != entry_index && seen.contains(i))
            .map(|(_, function)| function),
    );
    Ok(kept)
}

/// Lay out the preamble and `functions` back to back, resolve every call
/// target to its absolute offset, and encode
pub(crate) fn collapse(
    preamble: Vec<SymbolicInstruction>,
    functions: &[&CompiledFunction],
) -> CodegenResult<(Vec<u8>, BTreeMap<String, usize>)> {
    let mut offset: usize = preamble.iter().map(|i| i.encoded_len()).sum();
    let mut symbols = FxHashMap::default();
    let mut offsets = BTreeMap::new();
    for function in functions {
        symbols.insert(function.name.clone(), offset as i64);
        offsets.insert(function.name.clone(), offset);
        offset += function.encoded_len();
    }

    let mut code = preamble;
    for function in functions {
        code.extend(function.body.iter().cloned());
    }
    for instruction in &mut code {
        instruction
            .resolve(&symbols)
            .map_err(CodegenError::UndefinedFunction)?;
    }

    Ok((encode(&code)?, offsets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regstack::bytecode::Operand;
    use regstack::vm::stack::opcodes;
    use regstack::vm::{Machine, StackMachine};

    fn call(name: &str) -> SymbolicInstruction {
        let table = StackMachine::instruction_table().unwrap();
        SymbolicInstruction::new(
            *table.get(opcodes::CALL).unwrap(),
            vec![Operand::Unresolved(name.to_string())],
        )
    }

    fn ret() -> SymbolicInstruction {
        let table = StackMachine::instruction_table().unwrap();
        SymbolicInstruction::with_values(*table.get(opcodes::RET).unwrap(), &[])
    }

    fn function(name: &str, calls: &[&str]) -> CompiledFunction {
        let mut body: Vec<_> = calls.iter().map(|c| call(c)).collect();
        body.push(ret());
        CompiledFunction {
            name: name.to_string(),
            arity: 0,
            body,
        }
    }

    fn index_of(functions: &[CompiledFunction]) -> HashMap<String, usize> {
        functions.iter().enumerate().map(|(i, f)| (f.name.clone(), i)).collect()
    }

    #[test]
    fn test_reachable_puts_entry_first_and_drops_dead_code() {
        let functions = vec![
            function("helper", &["leaf"]),
            function("unused", &["helper"]),
            function("main", &["helper"]),
            function("leaf", &[]),
        ];
        let kept = reachable(&functions, &index_of(&functions), "main").unwrap();
        let names: Vec<&str> = kept.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["main", "helper", "leaf"]);
    }

    #[test]
    fn test_reachable_handles_recursion() {
        let functions = vec![function("main", &["main", "even"]), function("even", &["odd"]), function("odd", &["even"])];
        let kept = reachable(&functions, &index_of(&functions), "main").unwrap();
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_missing_entry_point() {
        let functions = vec![function("helper", &[])];
        let result = reachable(&functions, &index_of(&functions), "main");
        assert_eq!(result.unwrap_err(), CodegenError::MissingEntryPoint("main".to_string()));
    }

    #[test]
    fn test_collapse_resolves_offsets() {
        let main = function("main", &["helper"]);
        let helper = function("helper", &[]);
        let (bytes, symbols) = collapse(vec![call("main")], &[&main, &helper]).unwrap();

        assert_eq!(symbols["main"], 5);
        assert_eq!(symbols["helper"], 11);
        assert_eq!(bytes.len(), 5 + 6 + 1);
        assert_eq!(&bytes[1..5], &5i32.to_le_bytes());
        assert_eq!(&bytes[6..10], &11i32.to_le_bytes());
    }

    #[test]
    fn test_collapse_reports_undefined_callee() {
        let main = function("main", &["ghost"]);
        let result = collapse(vec![call("main")], &[&main]);
        assert_eq!(result.unwrap_err(), CodegenError::UndefinedFunction("ghost".to_string()));
    }
}
