//! Nuisance gas metering.
//!
//! Nuisance gas is a second budget, independent of ordinary gas, that bounds how much state a
//! transaction can force a replay to fetch and verify. It is charged once per transaction for
//! the first load and the first change of every account and storage slot, and once per byte of
//! newly instantiated code. Unlike ordinary gas it is never returned when a frame reverts, and an
//! overdraw fails the whole transaction.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{constants, RevertFlag};

/// The costs charged against the nuisance gas budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NuisanceGasSchedule {
    /// Flat cost of the first load or first change of an account.
    pub min_nuisance_gas_per_contract: u64,
    /// Cost per byte of the account's code on first load or first change, and per byte of newly
    /// instantiated code.
    pub nuisance_gas_per_byte: u64,
    /// Flat cost of the first load of a storage slot.
    pub nuisance_gas_sload: u64,
    /// Flat cost of the first change of a storage slot.
    pub nuisance_gas_sstore: u64,
}

impl Default for NuisanceGasSchedule {
    fn default() -> Self {
        Self {
            min_nuisance_gas_per_contract: constants::nuisance::MIN_NUISANCE_GAS_PER_CONTRACT,
            nuisance_gas_per_byte: constants::nuisance::NUISANCE_GAS_PER_BYTE,
            nuisance_gas_sload: constants::nuisance::NUISANCE_GAS_SLOAD,
            nuisance_gas_sstore: constants::nuisance::NUISANCE_GAS_SSTORE,
        }
    }
}

impl NuisanceGasSchedule {
    /// Cost of the first load or first change of an account holding `code_size` bytes of code.
    pub const fn account_cost(&self, code_size: usize) -> u64 {
        (code_size as u64)
            .saturating_mul(self.nuisance_gas_per_byte)
            .saturating_add(self.min_nuisance_gas_per_contract)
    }

    /// Cost of instantiating `code_size` bytes of new code.
    pub const fn code_cost(&self, code_size: usize) -> u64 {
        (code_size as u64).saturating_mul(self.nuisance_gas_per_byte)
    }
}

/// The per-transaction message record.
///
/// Created when a transaction enters the sandbox and handed back to the driver, via the
/// [`ExecutionResult`](crate::ExecutionResult), when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRecord {
    /// The part of the nuisance gas budget nothing has consumed yet.
    nuisance_gas_left: u64,
    /// The ordinary gas handed back to callers by frames that failed with a structured flag.
    gas_refund: u64,
}

impl MessageRecord {
    /// Creates a record with the given nuisance gas budget.
    pub const fn new(nuisance_gas_limit: u64) -> Self {
        Self { nuisance_gas_left: nuisance_gas_limit, gas_refund: 0 }
    }

    /// Returns the nuisance gas left.
    pub const fn nuisance_gas_left(&self) -> u64 {
        self.nuisance_gas_left
    }

    /// Returns the total ordinary gas refunded to callers by failed frames.
    pub const fn gas_refund(&self) -> u64 {
        self.gas_refund
    }

    /// Consumes `amount` nuisance gas.
    ///
    /// An overdraw consumes everything that is left and signals
    /// [`RevertFlag::ExceedsNuisanceGas`].
    pub fn use_nuisance_gas(&mut self, amount: u64) -> Result<(), RevertFlag> {
        if amount > self.nuisance_gas_left {
            debug!(requested = amount, left = self.nuisance_gas_left, "Nuisance gas exhausted");
            self.nuisance_gas_left = 0;
            return Err(RevertFlag::ExceedsNuisanceGas);
        }
        self.nuisance_gas_left -= amount;
        Ok(())
    }

    /// Adopts the nuisance gas reported by a child frame's revert record.
    ///
    /// The budget never increases, so a report above the current value is ignored.
    pub fn adopt_nuisance_gas_left(&mut self, reported: u64) {
        self.nuisance_gas_left = self.nuisance_gas_left.min(reported);
    }

    /// Records ordinary gas handed back to a caller by a failed frame.
    pub fn record_gas_refund(&mut self, refund: u64) {
        self.gas_refund = self.gas_refund.saturating_add(refund);
    }
}
