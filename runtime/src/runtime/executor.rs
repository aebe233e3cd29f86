use std::path::Path;
use tracing::debug;
use crate::bytecode::{MachineKind, ProgramImage};
use crate::runtime::{RuntimeConfig, RuntimeError, RuntimeResult};
use crate::vm::{Machine, MachineState, RegisterMachine, StackMachine, VM};

/// The Runtime is the main entry point for running programs on either machine
#[derive(Clone, Debug)]
pub struct Runtime {
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a new runtime with default configuration
    pub fn new() -> RuntimeResult<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> RuntimeResult<Self> {
        if config.register_count == 0 {
            return Err(RuntimeError::ConfigError(
                "register_count must be at least 1".to_string(),
            ));
        }
        if config.register_count > u8::MAX as usize + 1 {
            return Err(RuntimeError::ConfigError(format!(
                "register_count {} exceeds the 256 addressable registers",
                config.register_count
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run `program` on a fresh machine of the given kind
    pub fn execute(&self, kind: MachineKind, program: &[u8]) -> RuntimeResult<MachineState> {
        match kind {
            MachineKind::Register => self.run_on::<RegisterMachine>(program),
            MachineKind::Stack => self.run_on::<StackMachine>(program),
        }
    }

    /// Run a program image on the machine it targets
    pub fn execute_image(&self, image: &ProgramImage) -> RuntimeResult<MachineState> {
        if self.config.debug_mode {
            debug!(name = %image.name, machine = %image.kind, bytes = image.code.len(), "executing image");
        }
        self.execute(image.kind, &image.code)
    }

    /// Load an image file and execute it
    pub fn execute_file<P: AsRef<Path>>(&self, path: P) -> RuntimeResult<MachineState> {
        let image = ProgramImage::load(path)?;
        self.execute_image(&image)
    }

    fn run_on<M: Machine>(&self, program: &[u8]) -> RuntimeResult<MachineState> {
        let mut vm = VM::<M>::with_config(self.config.clone())?;
        vm.load_program(program.to_vec());
        vm.run()?;
        Ok(vm.into_state())
    }
}
