//! The guest instruction set.
//!
//! Guest code uses the EVM encoding for every instruction the sandbox shares with it and the
//! otherwise unassigned `0xb0..=0xb4` range for the sandbox-only instructions.

pub use revm::bytecode::opcode::*;

/// Pushes the tag of the queue the transaction was ordered through.
pub const QUEUEORIGIN: u8 = 0xb0;
/// Pushes the origin address of the transaction.
pub const L1TXORIGIN: u8 = 0xb1;
/// Pushes the nonce of the executing account.
pub const GETNONCE: u8 = 0xb2;
/// Increments the nonce of the executing account.
pub const INCREMENTNONCE: u8 = 0xb3;
/// Pops `(hash, v, r, s)` and installs an externally-owned proxy at the recovered signer.
pub const CREATEEOA: u8 = 0xb4;

/// Returns whether `op` belongs to the guest instruction set.
pub const fn is_supported(op: u8) -> bool {
    matches!(
        op,
        STOP | ADD |
            MUL |
            SUB |
            DIV |
            MOD |
            LT |
            GT |
            EQ |
            ISZERO |
            AND |
            OR |
            XOR |
            NOT |
            SHL |
            SHR |
            KECCAK256 |
            ADDRESS |
            CALLER |
            CALLVALUE |
            CALLDATALOAD |
            CALLDATASIZE |
            CALLDATACOPY |
            CODESIZE |
            CODECOPY |
            EXTCODESIZE |
            EXTCODECOPY |
            RETURNDATASIZE |
            RETURNDATACOPY |
            EXTCODEHASH |
            TIMESTAMP |
            NUMBER |
            CHAINID |
            POP |
            MLOAD |
            MSTORE |
            MSTORE8 |
            SLOAD |
            SSTORE |
            JUMP |
            JUMPI |
            PC |
            MSIZE |
            GAS |
            JUMPDEST |
            PUSH0..=PUSH32 |
            DUP1..=DUP16 |
            SWAP1..=SWAP16 |
            LOG0..=LOG4 |
            QUEUEORIGIN..=CREATEEOA |
            CREATE |
            CALL |
            RETURN |
            DELEGATECALL |
            CREATE2 |
            STATICCALL |
            REVERT |
            INVALID
    )
}

/// Returns the number of immediate bytes following `op`.
pub const fn immediate_size(op: u8) -> usize {
    match op {
        PUSH1..=PUSH32 => (op - PUSH0) as usize,
        _ => 0,
    }
}
