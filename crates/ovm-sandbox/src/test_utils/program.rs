//! A builder for guest programs.

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::opcode::{
    CALL, CODECOPY, CREATE, CREATE2, DELEGATECALL, MSTORE, POP, PUSH0, PUSH2, RETURN,
    RETURNDATACOPY, RETURNDATASIZE, REVERT, SLOAD, SSTORE, STATICCALL, STOP,
};

/// A builder for assembling guest bytecode.
#[derive(Debug, Default, Clone)]
pub struct ProgramBuilder {
    code: Vec<u8>,
}

impl ProgramBuilder {
    /// Build the bytecode.
    pub fn build(self) -> Bytes {
        self.code.into()
    }

    /// Get the length of the bytecode.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Check if the bytecode is empty.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Append a single opcode or byte.
    pub fn append(mut self, opcode: u8) -> Self {
        self.code.push(opcode);
        self
    }

    /// Append a series of opcodes or bytes.
    pub fn append_many(mut self, items: impl IntoIterator<Item = u8>) -> Self {
        self.code.extend(items);
        self
    }

    /// Append a PUSH opcode and the bytes to push.
    pub fn push_bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        assert!(bytes.len() <= 32);
        self.code.push(PUSH0 + bytes.len() as u8);
        self.code.extend_from_slice(bytes);
        self
    }

    /// Append the shortest PUSH of `number`.
    pub fn push_number(self, number: u64) -> Self {
        if number == 0 {
            return self.append(PUSH0);
        }
        let bytes = number.to_be_bytes();
        let skip = bytes.iter().take_while(|byte| **byte == 0).count();
        self.push_bytes(&bytes[skip..])
    }

    /// Append a PUSH20 of `address`.
    pub fn push_address(self, address: Address) -> Self {
        self.push_bytes(address)
    }

    /// Append a PUSH32 of `value`.
    pub fn push_u256(self, value: U256) -> Self {
        self.push_bytes(value.to_be_bytes::<32>())
    }

    /// Append a PUSH32 of `value`.
    pub fn push_b256(self, value: B256) -> Self {
        self.push_bytes(value)
    }

    /// Store `bytes` in memory at `offset`, one zero-padded word at a time.
    pub fn mstore(mut self, offset: u64, bytes: impl AsRef<[u8]>) -> Self {
        for (i, chunk) in bytes.as_ref().chunks(32).enumerate() {
            let mut word = [0u8; 32];
            word[..chunk.len()].copy_from_slice(chunk);
            self = self.push_bytes(word).push_number(offset + 32 * i as u64).append(MSTORE);
        }
        self
    }

    /// Store `value` at `slot` of the executing account.
    pub fn sstore(self, slot: u64, value: U256) -> Self {
        self.push_u256(value).push_number(slot).append(SSTORE)
    }

    /// Push the value at `slot` of the executing account.
    pub fn sload(self, slot: u64) -> Self {
        self.push_number(slot).append(SLOAD)
    }

    /// Store the top of the stack at `slot`.
    pub fn sstore_top(self, slot: u64) -> Self {
        self.push_number(slot).append(SSTORE)
    }

    /// `CALL` `target` with `gas`, `value` and no call data, leaving the success bit on the
    /// stack. Return data is not copied to memory.
    pub fn call(self, gas: u64, target: Address, value: U256) -> Self {
        self.push_number(0)
            .push_number(0)
            .push_number(0)
            .push_number(0)
            .push_u256(value)
            .push_address(target)
            .push_number(gas)
            .append(CALL)
    }

    /// `STATICCALL` `target` with `gas` and no call data.
    pub fn static_call(self, gas: u64, target: Address) -> Self {
        self.push_number(0)
            .push_number(0)
            .push_number(0)
            .push_number(0)
            .push_address(target)
            .push_number(gas)
            .append(STATICCALL)
    }

    /// `DELEGATECALL` `target` with `gas` and no call data.
    pub fn delegate_call(self, gas: u64, target: Address) -> Self {
        self.push_number(0)
            .push_number(0)
            .push_number(0)
            .push_number(0)
            .push_address(target)
            .push_number(gas)
            .append(DELEGATECALL)
    }

    /// `CREATE` with `init_code`, leaving the new address (or zero) on the stack.
    pub fn create(self, value: U256, init_code: impl AsRef<[u8]>) -> Self {
        let len = init_code.as_ref().len() as u64;
        self.mstore(0, init_code).push_number(len).push_number(0).push_u256(value).append(CREATE)
    }

    /// `CREATE2` with `init_code` and `salt`, leaving the new address (or zero) on the stack.
    pub fn create2(self, value: U256, init_code: impl AsRef<[u8]>, salt: B256) -> Self {
        let len = init_code.as_ref().len() as u64;
        self.mstore(0, init_code)
            .push_b256(salt)
            .push_number(len)
            .push_number(0)
            .push_u256(value)
            .append(CREATE2)
    }

    /// Discard the top of the stack.
    pub fn pop(self) -> Self {
        self.append(POP)
    }

    /// Append a STOP opcode.
    pub fn stop(self) -> Self {
        self.append(STOP)
    }

    /// Return the top of the stack as a single word.
    pub fn return_top(self) -> Self {
        self.push_number(0).append(MSTORE).append_many([PUSH0 + 1, 32, PUSH0, RETURN])
    }

    /// Return the return data of the last call.
    pub fn return_return_data(self) -> Self {
        self.append_many([RETURNDATASIZE, PUSH0, PUSH0, RETURNDATACOPY, RETURNDATASIZE, PUSH0, RETURN])
    }

    /// Append a RETURN opcode with empty return data.
    pub fn return_empty(self) -> Self {
        self.append_many([PUSH0, PUSH0, RETURN])
    }

    /// Append a RETURN opcode with the given return data.
    pub fn return_with_data(self, data: impl AsRef<[u8]>) -> Self {
        let len = data.as_ref().len() as u64;
        self.mstore(0, data).push_number(len).push_number(0).append(RETURN)
    }

    /// Append a REVERT opcode with empty return data.
    pub fn revert(self) -> Self {
        self.append_many([PUSH0, PUSH0, REVERT])
    }

    /// Append a REVERT opcode with the given return data.
    pub fn revert_with_data(self, data: impl AsRef<[u8]>) -> Self {
        let len = data.as_ref().len() as u64;
        self.mstore(0, data).push_number(len).push_number(0).append(REVERT)
    }
}

/// Wraps `runtime` in init code that deploys it unchanged.
pub fn init_code(runtime: impl AsRef<[u8]>) -> Bytes {
    const PREFIX_LEN: u16 = 13;
    let runtime = runtime.as_ref();
    let len = u16::try_from(runtime.len()).unwrap().to_be_bytes();
    let offset = PREFIX_LEN.to_be_bytes();
    let prefix = [
        PUSH2, len[0], len[1], PUSH2, offset[0], offset[1], PUSH0, CODECOPY, PUSH2, len[0],
        len[1], PUSH0, RETURN,
    ];
    debug_assert_eq!(prefix.len(), PREFIX_LEN as usize);
    [&prefix[..], runtime].concat().into()
}
