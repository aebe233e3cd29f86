use std::fmt;
use byteorder::{ByteOrder, LittleEndian};
use rustc_hash::FxHashMap;
use crate::bytecode::{AssemblyError, InstructionDescriptor};

/// An immediate operand before final encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A concrete value, already normalized to its encoded width
    Value(i64),
    /// A symbolic reference, typically a function name awaiting its offset
    Unresolved(String),
}

/// A decoded or not-yet-encoded instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicInstruction {
    descriptor: InstructionDescriptor,
    operands: Vec<Operand>,
}

impl SymbolicInstruction {
    pub fn new(descriptor: InstructionDescriptor, operands: Vec<Operand>) -> Self {
        debug_assert_eq!(descriptor.immediate_sizes().len(), operands.len());
        Self { descriptor, operands }
    }

    /// Build an instruction whose operands are all concrete values
    pub fn with_values(descriptor: InstructionDescriptor, values: &[i64]) -> Self {
        let operands = descriptor
            .immediate_sizes()
            .iter()
            .zip(values)
            .map(|(&size, &value)| Operand::Value(normalize(size, value)))
            .collect();
        Self::new(descriptor, operands)
    }

    pub fn descriptor(&self) -> &InstructionDescriptor {
        &self.descriptor
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Encoded size in bytes; placeholders occupy their declared width
    pub fn encoded_len(&self) -> usize {
        self.descriptor.encoded_len()
    }

    /// Names referenced by unresolved operands
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.operands.iter().filter_map(|operand| match operand {
            Operand::Unresolved(name) => Some(name.as_str()),
            Operand::Value(_) => None,
        })
    }

    /// Replace placeholders with their addresses.
    ///
    /// Returns the first name missing from `symbols`.
    pub fn resolve(&mut self, symbols: &FxHashMap<String, i64>) -> Result<(), String> {
        let sizes = self.descriptor.immediate_sizes();
        for (operand, &size) in self.operands.iter_mut().zip(sizes) {
            if let Operand::Unresolved(name) = operand {
                let address = *symbols.get(name.as_str()).ok_or_else(|| name.clone())?;
                *operand = Operand::Value(normalize(size, address));
            }
        }
        Ok(())
    }

    /// Append the encoded bytes to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), AssemblyError> {
        out.push(self.descriptor.opcode());
        for (operand, &size) in self.operands.iter().zip(self.descriptor.immediate_sizes()) {
            match operand {
                Operand::Value(value) => write_immediate(out, size, *value),
                Operand::Unresolved(name) => {
                    return Err(AssemblyError::UnresolvedSymbol(name.clone()))
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SymbolicInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor.name())?;
        for operand in &self.operands {
            match operand {
                Operand::Value(value) => write!(f, " {}", value)?,
                Operand::Unresolved(name) => write!(f, " <{}>", name)?,
            }
        }
        Ok(())
    }
}

/// Whether `value` is representable in `size` bytes, signed or unsigned
pub(crate) fn fits(size: u8, value: i64) -> bool {
    if size >= 8 {
        return true;
    }
    let bits = size as u32 * 8;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << bits) - 1;
    (min..=max).contains(&value)
}

/// Truncate to `size` bytes and sign-extend, matching what decoding yields
pub(crate) fn normalize(size: u8, value: i64) -> i64 {
    match size {
        1 => value as i8 as i64,
        2 => value as i16 as i64,
        4 => value as i32 as i64,
        _ => value,
    }
}

pub(crate) fn write_immediate(out: &mut Vec<u8>, size: u8, value: i64) {
    let mut buf = [0u8; 8];
    match size {
        1 => buf[0] = value as u8,
        2 => LittleEndian::write_i16(&mut buf[..2], value as i16),
        4 => LittleEndian::write_i32(&mut buf[..4], value as i32),
        _ => LittleEndian::write_i64(&mut buf, value),
    }
    out.extend_from_slice(&buf[..size as usize]);
}

/// Decode a sign-extended immediate; `bytes` must hold at least `size` bytes
pub(crate) fn read_immediate(bytes: &[u8], size: u8) -> i64 {
    match size {
        1 => bytes[0] as i8 as i64,
        2 => LittleEndian::read_i16(bytes) as i64,
        4 => LittleEndian::read_i32(bytes) as i64,
        _ => LittleEndian::read_i64(bytes),
    }
}
