mod error;
pub mod frame;
pub mod interpreter;
pub mod runtime;
mod stack;

pub use error::RuntimeError;
pub use frame::{Activation, NO_FRAME, RECORD_WORDS};
pub use interpreter::Interpreter;
pub use runtime::{BufferConsole, Console, StdConsole};
pub use stack::Stack;

use heap::HeapSettings;
use object::INT_MAX;

/// Operand stack bound used when none is configured, in words.
pub const DEFAULT_STACK_WORDS: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct VmSettings {
    /// Fixed bound of the operand stack, in words.
    pub stack_words: usize,
    pub heap: HeapSettings,
}

impl Default for VmSettings {
    fn default() -> Self {
        Self {
            stack_words: DEFAULT_STACK_WORDS,
            heap: HeapSettings::default(),
        }
    }
}

impl VmSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.stack_words == 0 {
            return Err("stack_words must be > 0");
        }
        // Activation records store stack indices as unboxed integers.
        if self.stack_words > INT_MAX as usize {
            return Err("stack_words must fit in an unboxed integer");
        }
        self.heap.validate()
    }
}
