//! The execution manager: runs transactions inside the sandbox.

mod context;
mod eoa;
mod execution;
mod frame;
mod machine;
pub mod opcode;

pub use context::*;
pub use eoa::*;
pub use frame::{FrameInput, FrameOutcome};

use alloy_primitives::{Bytes, U256};
use revm::Database;
use tracing::debug;

use crate::{
    DeployerAllowList, ExecutionResult, MessageRecord, OpcodeSafetyGate, RevertRecord,
    SafetyGate, SandboxConfig, SandboxError, StateStore, StateWitness, Transaction,
};
use execution::Execution;
use frame::Interrupt;

/// Runs transactions against a [`StateStore`].
///
/// The manager holds no per-transaction state: every call to [`run`](Self::run) starts from a
/// fresh message record and a fresh context stack, so the same manager can replay any number of
/// transactions, against any number of stores.
#[derive(Debug, Clone)]
pub struct ExecutionManager<G = OpcodeSafetyGate> {
    config: SandboxConfig,
    safety_gate: G,
    deployers: DeployerAllowList,
}

impl ExecutionManager {
    /// Creates a manager with the default [`OpcodeSafetyGate`] and an open allow-list.
    pub fn new(config: SandboxConfig) -> Self {
        Self::with_safety_gate(config, OpcodeSafetyGate)
    }
}

impl<G: SafetyGate> ExecutionManager<G> {
    /// Creates a manager with a custom safety gate.
    pub fn with_safety_gate(config: SandboxConfig, safety_gate: G) -> Self {
        Self { config, safety_gate, deployers: DeployerAllowList::default() }
    }

    /// Replaces the deployer allow-list.
    pub fn with_deployers(mut self, deployers: DeployerAllowList) -> Self {
        self.deployers = deployers;
        self
    }

    /// Returns the configuration.
    pub const fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Returns the safety gate.
    pub const fn safety_gate(&self) -> &G {
        &self.safety_gate
    }

    /// Returns the deployer allow-list.
    pub const fn deployers(&self) -> &DeployerAllowList {
        &self.deployers
    }

    /// Returns the deployer allow-list, mutably.
    pub fn deployers_mut(&mut self) -> &mut DeployerAllowList {
        &mut self.deployers
    }

    /// Executes `tx` against `state`.
    ///
    /// The entrypoint is called by `tx.caller_address` with no value. Guest failures of any kind,
    /// including the transaction-fatal ones, are reported in the returned [`ExecutionResult`]
    /// and leave `state` as it was before the call; writes of a successful transaction stay in
    /// the store and can be read back through [`StateStore::state_diff`]. An `Err` is returned
    /// only when the transaction cannot be run at all or the backing database fails; a database
    /// failure also rolls back whatever the transaction wrote before it.
    pub fn run<DB, W>(
        &self,
        tx: &Transaction,
        state: &mut StateStore<DB, W>,
    ) -> Result<ExecutionResult, SandboxError<DB::Error>>
    where
        DB: Database,
        W: StateWitness,
    {
        self.config.validate()?;
        let (min, max) =
            (self.config.min_transaction_gas_limit, self.config.max_transaction_gas_limit);
        if !(min..=max).contains(&tx.gas_limit) {
            return Err(SandboxError::GasLimitOutOfBounds { gas_limit: tx.gas_limit, min, max });
        }

        state.begin_transaction();
        let budget = self.config.nuisance_budget(tx.gas_limit);
        debug!(
            entrypoint = %tx.entrypoint,
            caller = %tx.caller_address,
            gas_limit = tx.gas_limit,
            nuisance_gas_limit = budget,
            "Running transaction"
        );
        let checkpoint = state.checkpoint();
        let mut execution = Execution::new(self, tx, state, MessageRecord::new(budget));
        let input = FrameInput::Call {
            target: tx.entrypoint,
            value: U256::ZERO,
            data: tx.data.clone(),
            gas_limit: tx.gas_limit,
        };
        let outcome = match execution.execute(input) {
            Ok(outcome) => outcome,
            Err(Interrupt::Backend(err)) => {
                drop(execution);
                state.revert_to(checkpoint);
                return Err(SandboxError::Database(err));
            }
            Err(Interrupt::Signal(flag)) => execution.failure(flag, 0, Bytes::new()),
            Err(Interrupt::Fault) => FrameOutcome::Failure { output: Bytes::new() },
        };
        let (mut message, logs) = execution.finish();

        let result = match outcome {
            FrameOutcome::Success { output, gas_left, .. } => ExecutionResult {
                success: true,
                return_data: output,
                gas_used: tx.gas_limit - gas_left,
                nuisance_gas_used: budget - message.nuisance_gas_left(),
                flag: None,
                logs,
            },
            FrameOutcome::Failure { output } => {
                let record = RevertRecord::decode(&output);
                message.adopt_nuisance_gas_left(record.nuisance_gas_left);
                state.revert_to(checkpoint);
                let refund =
                    if record.flag.refunds_gas() { record.gas_refund.min(tx.gas_limit) } else { 0 };
                ExecutionResult {
                    success: false,
                    return_data: record.data,
                    gas_used: tx.gas_limit - refund,
                    nuisance_gas_used: budget - message.nuisance_gas_left(),
                    flag: Some(record.flag),
                    logs: Vec::new(),
                }
            }
        };
        debug!(
            success = result.success,
            flag = ?result.flag,
            gas_used = result.gas_used,
            nuisance_gas_used = result.nuisance_gas_used,
            "Transaction finished"
        );
        Ok(result)
    }
}
