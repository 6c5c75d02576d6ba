//! Per-frame machine state, built on revm's stack, shared memory and jump table analysis.

use alloy_primitives::{Bytes, U256};
use revm::{
    bytecode::LegacyAnalyzedBytecode,
    interpreter::{interpreter_types::StackTr, num_words, SharedMemory, Stack},
};

use super::{frame::StackFault, opcode};

/// The state of one running frame.
#[derive(Debug)]
pub(crate) struct Machine {
    code: LegacyAnalyzedBytecode,
    pub(crate) input: Bytes,
    pub(crate) pc: usize,
    pub(crate) stack: Stack,
    /// This frame's context of the memory shared by the whole call stack.
    pub(crate) memory: SharedMemory,
    /// Return data of the most recent child frame.
    pub(crate) return_data: Bytes,
}

impl Machine {
    pub(crate) fn new(code: Bytes, input: Bytes, memory: SharedMemory) -> Self {
        Self {
            code: LegacyAnalyzedBytecode::analyze(code),
            input,
            pc: 0,
            stack: Stack::new(),
            memory,
            return_data: Bytes::new(),
        }
    }

    /// The code as it was deployed, without analysis padding.
    pub(crate) fn code(&self) -> &[u8] {
        self.code.original_byte_slice()
    }

    /// The opcode at the program counter. Running off the end of the code is a `STOP`.
    pub(crate) fn opcode(&self) -> u8 {
        self.code().get(self.pc).copied().unwrap_or(opcode::STOP)
    }

    /// Reads the `len` immediate bytes after the program counter, zero-padded on the right.
    pub(crate) fn immediate(&self, len: usize) -> U256 {
        let mut word = [0u8; 32];
        let code = self.code();
        let start = (self.pc + 1).min(code.len());
        let end = (self.pc + 1 + len).min(code.len());
        word[32 - len..32 - len + (end - start)].copy_from_slice(&code[start..end]);
        U256::from_be_bytes(word)
    }

    pub(crate) fn is_jumpdest(&self, dest: usize) -> bool {
        self.code.jump_table().is_valid(dest)
    }

    pub(crate) fn push(&mut self, value: U256) -> Result<(), StackFault> {
        if self.stack.push(value) {
            Ok(())
        } else {
            Err(StackFault)
        }
    }

    pub(crate) fn pop(&mut self) -> Result<U256, StackFault> {
        self.stack.pop().map_err(|_| StackFault)
    }

    /// Pops `N` words, the top of the stack first.
    pub(crate) fn pop_n<const N: usize>(&mut self) -> Result<[U256; N], StackFault> {
        StackTr::popn::<N>(&mut self.stack).ok_or(StackFault)
    }

    /// Duplicates the `n`th word from the top, 1-based.
    pub(crate) fn dup(&mut self, n: usize) -> Result<(), StackFault> {
        if n > 0 && self.stack.dup(n) {
            Ok(())
        } else {
            Err(StackFault)
        }
    }

    /// Swaps the top word with the `n`th word below it.
    pub(crate) fn swap(&mut self, n: usize) -> Result<(), StackFault> {
        if n > 0 && self.stack.swap(n) {
            Ok(())
        } else {
            Err(StackFault)
        }
    }

    /// The size of this frame's memory in words.
    pub(crate) fn memory_words(&self) -> usize {
        num_words(self.memory.len())
    }

    /// Copies `len` bytes of memory at `offset`. The caller must have expanded memory to cover
    /// a non-empty range.
    pub(crate) fn read_memory(&self, offset: usize, len: usize) -> Bytes {
        if len == 0 {
            return Bytes::new();
        }
        Bytes::copy_from_slice(&self.memory.slice_len(offset, len))
    }

    /// Copies `len` bytes of `data` starting at `data_offset` to memory at `offset`,
    /// zero-filling whatever lies past the end of `data`.
    pub(crate) fn write_memory(&mut self, offset: usize, data: &[u8], data_offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.memory.set_data(offset, data_offset, len, data);
    }

    /// `CALLDATACOPY`: like [`Machine::write_memory`] with the frame's input as the source.
    pub(crate) fn copy_input(&mut self, offset: usize, input_offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.memory.set_data(offset, input_offset, len, &self.input);
    }

    /// `CODECOPY`: like [`Machine::write_memory`] with the frame's code as the source.
    pub(crate) fn copy_code(&mut self, offset: usize, code_offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.memory.set_data(offset, code_offset, len, self.code.original_byte_slice());
    }
}

/// Converts a word to `usize`, saturating at `usize::MAX`.
pub(crate) fn as_usize_saturated(value: U256) -> usize {
    value.saturating_to()
}

/// Converts a word to `u64`, saturating at `u64::MAX`.
pub(crate) fn as_u64_saturated(value: U256) -> u64 {
    value.saturating_to()
}

/// The cost of copying `len` bytes.
pub(crate) const fn copy_cost(len: usize) -> u64 {
    revm::interpreter::gas::COPY.saturating_mul(num_words(len) as u64)
}
