//! Creation-time gates: the bytecode safety predicate and the deployer allow-list.

use alloy_primitives::{map::HashSet, Address};
use auto_impl::auto_impl;
use tracing::debug;

use crate::opcode;

/// A pure predicate over candidate code, consulted before newly created code becomes callable.
///
/// Implementations must judge the exact bytes they are given and must not have side effects:
/// the original execution and every disputed replay consult the gate with the same input and
/// must get the same answer.
#[auto_impl(&, Box, Arc)]
pub trait SafetyGate {
    /// Returns whether `code` may be deployed.
    fn is_bytecode_safe(&self, code: &[u8]) -> bool;
}

/// The default [`SafetyGate`]: every opcode outside push data must belong to the sandbox's
/// instruction set.
///
/// Opcodes that would let guest code observe or change anything the sandbox does not mediate
/// (`BALANCE`, `ORIGIN`, `BLOCKHASH`, `SELFDESTRUCT`, ...) are rejected, as is every unassigned
/// byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpcodeSafetyGate;

impl SafetyGate for OpcodeSafetyGate {
    fn is_bytecode_safe(&self, code: &[u8]) -> bool {
        let mut pc = 0;
        while pc < code.len() {
            let op = code[pc];
            if !opcode::is_supported(op) {
                debug!(pc, op, "Unsafe opcode");
                return false;
            }
            // truncated push data at the end of the code is treated as zero-padded
            pc += 1 + opcode::immediate_size(op);
        }
        true
    }
}

/// A gate that accepts all code. Intended for tests and trusted replays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissiveSafetyGate;

impl SafetyGate for PermissiveSafetyGate {
    fn is_bytecode_safe(&self, _code: &[u8]) -> bool {
        true
    }
}

/// The capability table deciding which accounts may create code.
///
/// It is handed to the [`ExecutionManager`](crate::ExecutionManager) explicitly rather than
/// read from shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeployerAllowList {
    /// Any account may deploy.
    #[default]
    Open,
    /// Only the listed accounts may deploy.
    Restricted(HashSet<Address>),
}

impl DeployerAllowList {
    /// Creates a restricted allow-list.
    pub fn restricted(deployers: impl IntoIterator<Item = Address>) -> Self {
        Self::Restricted(deployers.into_iter().collect())
    }

    /// Grants deployment rights to `deployer`. A no-op for an open list.
    pub fn allow(&mut self, deployer: Address) {
        if let Self::Restricted(set) = self {
            set.insert(deployer);
        }
    }

    /// Returns whether `deployer` may create code.
    pub fn is_allowed(&self, deployer: &Address) -> bool {
        match self {
            Self::Open => true,
            Self::Restricted(set) => set.contains(deployer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use revm::bytecode::opcode::{ADD, BALANCE, PUSH1, PUSH2, SELFDESTRUCT, SSTORE, STOP};

    #[test]
    fn test_safe_code() {
        let code = [PUSH1, 0x01, PUSH1, 0x02, ADD, PUSH1, 0x00, SSTORE, STOP];
        assert!(OpcodeSafetyGate.is_bytecode_safe(&code));
    }

    #[test]
    fn test_empty_code_is_safe() {
        assert!(OpcodeSafetyGate.is_bytecode_safe(&[]));
    }

    #[test]
    fn test_unsafe_opcodes_rejected() {
        assert!(!OpcodeSafetyGate.is_bytecode_safe(&[PUSH1, 0x00, BALANCE]));
        assert!(!OpcodeSafetyGate.is_bytecode_safe(&[SELFDESTRUCT]));
        assert!(!OpcodeSafetyGate.is_bytecode_safe(&[0x0c]));
    }

    #[test]
    fn test_push_data_is_not_scanned() {
        // the pushed bytes are SELFDESTRUCT and BALANCE, which are data here
        assert!(OpcodeSafetyGate.is_bytecode_safe(&[PUSH2, SELFDESTRUCT, BALANCE, STOP]));
        assert!(OpcodeSafetyGate.is_bytecode_safe(&[PUSH2, SELFDESTRUCT]));
    }

    #[test]
    fn test_sandbox_opcodes_are_safe() {
        let code = [opcode::GETNONCE, opcode::INCREMENTNONCE, opcode::QUEUEORIGIN, STOP];
        assert!(OpcodeSafetyGate.is_bytecode_safe(&code));
    }

    #[test]
    fn test_allow_list() {
        let alice = address!("0x00000000000000000000000000000000000a11ce");
        let bob = address!("0x0000000000000000000000000000000000000b0b");
        assert!(DeployerAllowList::Open.is_allowed(&alice));

        let mut list = DeployerAllowList::restricted([alice]);
        assert!(list.is_allowed(&alice));
        assert!(!list.is_allowed(&bob));
        list.allow(bob);
        assert!(list.is_allowed(&bob));
    }
}
