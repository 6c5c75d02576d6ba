use alloy_primitives::{Address, Bytes};
use revm::Database;

use crate::{
    ExecutionManager, ExecutionResult, SandboxConfig, SandboxError, StateStore, StateWitness,
    Transaction,
};

/// The gas limit [`transaction`] gives a transaction.
pub const TEST_GAS_LIMIT: u64 = 10_000_000;

/// A transaction calling `entrypoint` from `caller` with [`TEST_GAS_LIMIT`].
pub fn transaction(caller: Address, entrypoint: Address, data: Bytes) -> Transaction {
    Transaction {
        caller_address: caller,
        origin_address: caller,
        entrypoint,
        gas_limit: TEST_GAS_LIMIT,
        data,
        ..Default::default()
    }
}

/// Executes a transaction against `state` with the default gates and `config`.
pub fn transact<DB, W>(
    config: SandboxConfig,
    state: &mut StateStore<DB, W>,
    caller: Address,
    entrypoint: Address,
    data: Bytes,
) -> Result<ExecutionResult, SandboxError<DB::Error>>
where
    DB: Database,
    W: StateWitness,
{
    ExecutionManager::new(config).run(&transaction(caller, entrypoint, data), state)
}
