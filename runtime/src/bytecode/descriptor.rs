use std::fmt;
use byteorder::{ByteOrder, LittleEndian};
use crate::vm::{MachineState, VMResult};

/// State transition applied when an opcode is dispatched.
///
/// On entry the program counter already points past the opcode byte; the
/// handler consumes its own immediates or overwrites the counter.
pub type Apply = fn(&mut MachineState) -> VMResult<()>;

/// Describes one opcode of a machine's instruction set
#[derive(Clone, Copy)]
pub struct InstructionDescriptor {
    name: &'static str,
    opcode: u8,
    immediate_sizes: &'static [u8],
    apply: Apply,
}

impl InstructionDescriptor {
    pub fn new(
        name: &'static str,
        opcode: u8,
        immediate_sizes: &'static [u8],
        apply: Apply,
    ) -> Self {
        Self {
            name,
            opcode,
            immediate_sizes,
            apply,
        }
    }

    /// Mnemonic used by the assembler
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Byte widths of the immediates, in encoding order
    pub fn immediate_sizes(&self) -> &'static [u8] {
        self.immediate_sizes
    }

    /// Total encoded size: opcode byte plus immediates
    pub fn encoded_len(&self) -> usize {
        1 + self.immediate_sizes.iter().map(|&size| size as usize).sum::<usize>()
    }

    pub fn apply(&self, state: &mut MachineState) -> VMResult<()> {
        (self.apply)(state)
    }
}

impl fmt::Debug for InstructionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstructionDescriptor")
            .field("name", &self.name)
            .field("opcode", &self.opcode)
            .field("immediate_sizes", &self.immediate_sizes)
            .finish()
    }
}

impl PartialEq for InstructionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.opcode == other.opcode
            && self.name == other.name
            && self.immediate_sizes == other.immediate_sizes
    }
}

impl Eq for InstructionDescriptor {}

/// A typed immediate operand accepted by the fluent builders
pub trait Immediate: Copy {
    /// Encoded width in bytes
    const WIDTH: u8;

    fn write_le(self, out: &mut Vec<u8>);
}

impl Immediate for u8 {
    const WIDTH: u8 = 1;

    fn write_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}

impl Immediate for i32 {
    const WIDTH: u8 = 4;

    fn write_le(self, out: &mut Vec<u8>) {
        let mut buf = [0u8; 4];
        LittleEndian::write_i32(&mut buf, self);
        out.extend_from_slice(&buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_state: &mut MachineState) -> VMResult<()> {
        Ok(())
    }

    #[test]
    fn test_encoded_len_counts_opcode_and_immediates() {
        let descriptor = InstructionDescriptor::new("cjump", 10, &[1, 4], noop);
        assert_eq!(descriptor.encoded_len(), 6);

        let bare = InstructionDescriptor::new("ret", 19, &[], noop);
        assert_eq!(bare.encoded_len(), 1);
    }

    #[test]
    fn test_descriptor_equality_ignores_handler() {
        let a = InstructionDescriptor::new("push", 0, &[4], noop);
        let b = InstructionDescriptor::new("push", 0, &[4], noop);
        let c = InstructionDescriptor::new("push", 1, &[4], noop);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_immediate_little_endian() {
        let mut out = Vec::new();
        0x0102_0304i32.write_le(&mut out);
        7u8.write_le(&mut out);
        assert_eq!(out, vec![0x04, 0x03, 0x02, 0x01, 0x07]);
        assert_eq!(<u8 as Immediate>::WIDTH, 1);
        assert_eq!(<i32 as Immediate>::WIDTH, 4);
    }
}
