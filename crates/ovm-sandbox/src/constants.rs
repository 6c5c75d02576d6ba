//! Constants for the sandbox.
//!
//! It groups the constants by the concern they configure as sub-modules.

/// Nuisance gas schedule.
pub mod nuisance {
    /// The flat nuisance cost of the first load or first change of an account.
    pub const MIN_NUISANCE_GAS_PER_CONTRACT: u64 = 30_000;
    /// The nuisance cost per byte of code of an account on its first load or first change, and
    /// per byte of newly instantiated code.
    pub const NUISANCE_GAS_PER_BYTE: u64 = 100;
    /// The flat nuisance cost of the first load of a storage slot.
    pub const NUISANCE_GAS_SLOAD: u64 = 20_000;
    /// The flat nuisance cost of the first change of a storage slot.
    pub const NUISANCE_GAS_SSTORE: u64 = 20_000;
}

/// Ordinary (computational) gas schedule.
pub mod gas {
    /// Stock opcode costs and the memory expansion formula, inherited from `revm`.
    pub use revm::interpreter::gas::{
        memory_gas, BASE, CALLVALUE, CODEDEPOSIT, COLD_ACCOUNT_ACCESS_COST, COLD_SLOAD_COST, COPY,
        CREATE, HIGH, JUMPDEST, KECCAK256, KECCAK256WORD, LOG, LOGDATA, LOGTOPIC, LOW, MID,
        SSTORE_RESET, SSTORE_SET, VERYLOW,
    };

    /// Fixed cost of the sandbox-only context opcodes, priced like the stock context queries.
    pub const SANDBOX_CONTEXT: u64 = BASE;
    /// Cost of `CREATEEOA` before any nuisance charges. Installing a proxy writes a fresh
    /// account record, so it is priced like setting a fresh storage slot.
    pub const CREATE_EOA: u64 = SSTORE_SET;
}

/// Execution limits.
pub mod limits {
    /// The default maximum call depth.
    pub const MAX_CALL_DEPTH: usize = 256;
    /// The default maximum size of deployed code.
    pub const MAX_CODE_SIZE: usize = 24 * 1024;
    /// The default minimum gas limit of a top-level transaction.
    pub const MIN_TRANSACTION_GAS_LIMIT: u64 = 0;
    /// The default maximum gas limit of a top-level transaction.
    pub const MAX_TRANSACTION_GAS_LIMIT: u64 = 15_000_000;
    /// Memory offsets above this bound always run out of gas.
    pub const MAX_MEMORY_OFFSET: usize = u32::MAX as usize;
}

/// Well-known values used by the sandbox.
pub mod system {
    use alloy_primitives::{address, b256, Address, B256};

    /// The default chain id.
    pub const CHAIN_ID: u64 = 420;

    /// The default address of the account implementation every externally-owned proxy
    /// delegates to.
    pub const EOA_IMPLEMENTATION: Address = address!("0x4200000000000000000000000000000000000003");

    /// The root of an empty storage trie.
    pub const EMPTY_STORAGE_ROOT: B256 =
        b256!("0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");
}
