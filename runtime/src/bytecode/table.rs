use rustc_hash::FxHashMap;
use thiserror::Error;
use crate::bytecode::{InstructionDescriptor, MachineKind};

/// Immediate widths an instruction may declare
pub const IMMEDIATE_SIZES: [u8; 4] = [1, 2, 4, 8];

/// Errors raised while registering an instruction set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IsaError {
    #[error("Opcode 0x{opcode:02X} registered by both '{first}' and '{second}'")]
    DuplicateOpcode {
        opcode: u8,
        first: &'static str,
        second: &'static str,
    },

    #[error("Mnemonic '{0}' registered twice")]
    DuplicateMnemonic(String),

    #[error("Instruction '{name}' declares unsupported immediate size {size}")]
    InvalidImmediateSize { name: &'static str, size: u8 },
}

/// Dense opcode-indexed instruction table for one machine.
///
/// Fixed once built; slots between registered opcodes stay empty and decode
/// as unknown.
#[derive(Debug, Clone)]
pub struct InstructionTable {
    kind: MachineKind,
    slots: Vec<Option<InstructionDescriptor>>,
    by_name: FxHashMap<String, u8>,
}

impl InstructionTable {
    pub fn new(kind: MachineKind, descriptors: Vec<InstructionDescriptor>) -> Result<Self, IsaError> {
        let max_opcode = descriptors.iter().map(|d| d.opcode()).max();
        let mut slots: Vec<Option<InstructionDescriptor>> =
            vec![None; max_opcode.map_or(0, |op| op as usize + 1)];
        let mut by_name = FxHashMap::default();

        for descriptor in descriptors {
            if let Some(&size) = descriptor
                .immediate_sizes()
                .iter()
                .find(|size| !IMMEDIATE_SIZES.contains(size))
            {
                return Err(IsaError::InvalidImmediateSize {
                    name: descriptor.name(),
                    size,
                });
            }

            let slot = &mut slots[descriptor.opcode() as usize];
            if let Some(existing) = slot {
                return Err(IsaError::DuplicateOpcode {
                    opcode: descriptor.opcode(),
                    first: existing.name(),
                    second: descriptor.name(),
                });
            }

            let key = descriptor.name().to_ascii_lowercase();
            if by_name.insert(key.clone(), descriptor.opcode()).is_some() {
                return Err(IsaError::DuplicateMnemonic(key));
            }
            *slot = Some(descriptor);
        }

        Ok(Self { kind, slots, by_name })
    }

    /// The machine this table drives
    pub fn kind(&self) -> MachineKind {
        self.kind
    }

    /// Look up a descriptor by opcode byte
    pub fn get(&self, opcode: u8) -> Option<&InstructionDescriptor> {
        self.slots.get(opcode as usize).and_then(|slot| slot.as_ref())
    }

    /// Look up a descriptor by mnemonic, ignoring case
    pub fn lookup(&self, mnemonic: &str) -> Option<&InstructionDescriptor> {
        let opcode = *self.by_name.get(&mnemonic.to_ascii_lowercase())?;
        self.get(opcode)
    }

    /// Registered descriptors in opcode order
    pub fn descriptors(&self) -> impl Iterator<Item = &InstructionDescriptor> {
        self.slots.iter().flatten()
    }

    /// Number of registered instructions
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
