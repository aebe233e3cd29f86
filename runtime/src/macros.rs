//! Declarative instruction-set registry.

/// Declares one machine's instruction set from a single list.
///
/// Each entry names the opcode constant, its byte value, the mnemonic, the
/// builder method with its typed immediates, and the handler that applies it
/// to a [`MachineState`](crate::vm::MachineState). The macro generates:
/// - an `opcodes` module with one constant per instruction
/// - `descriptors()`, the ordered descriptor list fed to
///   [`InstructionTable::new`](crate::bytecode::InstructionTable::new)
/// - a fluent builder with one method per instruction
macro_rules! instruction_set {
    (
        $(#[$builder_meta:meta])*
        builder $builder:ident;
        $(
            $(#[$doc:meta])*
            $konst:ident = $opcode:literal => $mnemonic:literal, $method:ident($($arg:ident: $ty:ty),*), $handler:ident;
        )+
    ) => {
        /// Opcode byte values.
        pub mod opcodes {
            $( pub const $konst: u8 = $opcode; )+
        }

        pub(crate) fn descriptors() -> Vec<$crate::bytecode::InstructionDescriptor> {
            vec![
                $(
                    $crate::bytecode::InstructionDescriptor::new(
                        $mnemonic,
                        $opcode,
                        {
                            const SIZES: &[u8] = &[$(<$ty as $crate::bytecode::Immediate>::WIDTH),*];
                            SIZES
                        },
                        $handler,
                    ),
                )+
            ]
        }

        $(#[$builder_meta])*
        #[derive(Debug, Clone, Default)]
        pub struct $builder {
            bytes: Vec<u8>,
        }

        impl $builder {
            pub fn new() -> Self {
                Self::default()
            }

            $(
                $(#[$doc])*
                pub fn $method(mut self, $($arg: $ty),*) -> Self {
                    self.bytes.push($opcode);
                    $( $crate::bytecode::Immediate::write_le($arg, &mut self.bytes); )*
                    self
                }
            )+

            /// Number of bytes emitted so far
            pub fn len(&self) -> usize {
                self.bytes.len()
            }

            pub fn is_empty(&self) -> bool {
                self.bytes.is_empty()
            }

            /// Finish the program
            pub fn build(self) -> Vec<u8> {
                self.bytes
            }
        }
    };
}
