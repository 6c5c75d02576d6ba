use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{constants, NuisanceGasSchedule};

/// Configuration of an [`ExecutionManager`](crate::ExecutionManager).
///
/// Every field has a default, so a partial JSON document deserializes into a complete
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SandboxConfig {
    /// The value returned by `CHAINID`.
    pub chain_id: u64,
    /// The nuisance gas schedule.
    pub nuisance: NuisanceGasSchedule,
    /// Overrides the nuisance gas budget of every transaction. When unset the budget equals the
    /// transaction gas limit.
    pub nuisance_gas_limit: Option<u64>,
    /// Transactions with a smaller gas limit are rejected before execution.
    pub min_transaction_gas_limit: u64,
    /// Transactions with a larger gas limit are rejected before execution.
    pub max_transaction_gas_limit: u64,
    /// Nested calls beyond this depth fail without executing.
    pub max_call_depth: usize,
    /// Creations returning more code than this fail.
    pub max_code_size: usize,
    /// The message-relay account. Delegate calls into it are reserved no-ops.
    pub message_relay: Option<Address>,
    /// The account implementation installed externally-owned proxies delegate to.
    pub eoa_implementation: Address,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            chain_id: constants::system::CHAIN_ID,
            nuisance: NuisanceGasSchedule::default(),
            nuisance_gas_limit: None,
            min_transaction_gas_limit: constants::limits::MIN_TRANSACTION_GAS_LIMIT,
            max_transaction_gas_limit: constants::limits::MAX_TRANSACTION_GAS_LIMIT,
            max_call_depth: constants::limits::MAX_CALL_DEPTH,
            max_code_size: constants::limits::MAX_CODE_SIZE,
            message_relay: None,
            eoa_implementation: constants::system::EOA_IMPLEMENTATION,
        }
    }
}

impl SandboxConfig {
    /// Sets the chain id.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the nuisance gas schedule.
    pub fn with_nuisance_schedule(mut self, schedule: NuisanceGasSchedule) -> Self {
        self.nuisance = schedule;
        self
    }

    /// Overrides the per-transaction nuisance gas budget.
    pub fn with_nuisance_gas_limit(mut self, limit: u64) -> Self {
        self.nuisance_gas_limit = Some(limit);
        self
    }

    /// Sets the accepted range of transaction gas limits.
    pub fn with_transaction_gas_limits(mut self, min: u64, max: u64) -> Self {
        self.min_transaction_gas_limit = min;
        self.max_transaction_gas_limit = max;
        self
    }

    /// Sets the maximum call depth.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Sets the maximum deployed code size.
    pub fn with_max_code_size(mut self, size: usize) -> Self {
        self.max_code_size = size;
        self
    }

    /// Sets the message-relay account.
    pub fn with_message_relay(mut self, relay: Address) -> Self {
        self.message_relay = Some(relay);
        self
    }

    /// Sets the account implementation used by externally-owned proxies.
    pub fn with_eoa_implementation(mut self, implementation: Address) -> Self {
        self.eoa_implementation = implementation;
        self
    }

    /// Returns the nuisance gas budget of a transaction with the given gas limit.
    pub fn nuisance_budget(&self, gas_limit: u64) -> u64 {
        self.nuisance_gas_limit.unwrap_or(gas_limit)
    }

    /// Checks the configuration for internally inconsistent values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_transaction_gas_limit > self.max_transaction_gas_limit {
            return Err(ConfigError::GasLimitRange {
                min: self.min_transaction_gas_limit,
                max: self.max_transaction_gas_limit,
            });
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::ZeroCallDepth);
        }
        if self.message_relay == Some(self.eoa_implementation) {
            return Err(ConfigError::RelayIsEoaImplementation(self.eoa_implementation));
        }
        Ok(())
    }
}

/// Errors reported by [`SandboxConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The minimum transaction gas limit exceeds the maximum.
    #[error("transaction gas limit range is empty: min {min} > max {max}")]
    GasLimitRange {
        /// Configured minimum.
        min: u64,
        /// Configured maximum.
        max: u64,
    },
    /// No frame could ever execute.
    #[error("maximum call depth must be at least 1")]
    ZeroCallDepth,
    /// The relay account would swallow every proxy delegate call.
    #[error("message relay {0} cannot also be the EOA implementation")]
    RelayIsEoaImplementation(Address),
}
