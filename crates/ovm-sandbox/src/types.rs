use alloy_primitives::{Address, Bytes, Log};
use serde::{Deserialize, Serialize};

use crate::RevertFlag;

/// The queue a transaction was ordered through before it reached the sandbox.
#[repr(u8)]
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum QueueOrigin {
    /// Submitted directly by the sequencer.
    #[default]
    Sequencer = 0,
    /// Enqueued from layer 1.
    L1ToL2Queue = 1,
}

/// The transaction descriptor a driver hands to the sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The value returned by `TIMESTAMP`.
    pub timestamp: u64,
    /// The value returned by `NUMBER`.
    pub block_number: u64,
    /// The value returned by `QUEUEORIGIN`.
    pub queue_origin: QueueOrigin,
    /// The target of the initial call.
    pub entrypoint: Address,
    /// The value returned by `L1TXORIGIN`.
    pub origin_address: Address,
    /// The caller of the initial call.
    pub caller_address: Address,
    /// Ordinary gas available to the initial call.
    pub gas_limit: u64,
    /// Call data of the initial call.
    pub data: Bytes,
}

/// The outcome of a transaction, handed back to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Whether the initial call succeeded.
    pub success: bool,
    /// Return data of the initial call, or the guest payload of an intentional revert.
    pub return_data: Bytes,
    /// Ordinary gas consumed.
    pub gas_used: u64,
    /// Nuisance gas consumed.
    pub nuisance_gas_used: u64,
    /// Why the transaction failed. `None` on success.
    pub flag: Option<RevertFlag>,
    /// Logs emitted by frames that did not revert.
    pub logs: Vec<Log>,
}

impl ExecutionResult {
    /// Returns `true` if the transaction succeeded.
    pub const fn is_success(&self) -> bool {
        self.success
    }
}
