//! Runtime configuration options

/// Configuration options for the regstack runtime
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Size of the register machine's register file
    pub register_count: usize,
    /// Emit a `trace!` event for every executed instruction
    pub trace_execution: bool,
    /// Emit `debug!` summaries for loads, runs and faults
    pub debug_mode: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            register_count: 8,
            trace_execution: false,
            debug_mode: false,
        }
    }
}

impl RuntimeConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of registers
    pub fn with_register_count(mut self, register_count: usize) -> Self {
        self.register_count = register_count;
        self
    }

    /// Enable or disable per-instruction tracing
    pub fn with_trace_execution(mut self, trace_execution: bool) -> Self {
        self.trace_execution = trace_execution;
        self
    }

    /// Enable or disable debug mode
    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }
}
