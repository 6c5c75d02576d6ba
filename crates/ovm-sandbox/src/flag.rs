//! The revert-flag protocol.
//!
//! A frame that fails does not unwind natively. It returns a [`RevertRecord`], ABI-encoded as
//! `(uint8 flag, uint64 nuisanceGasLeft, uint64 gasRefund, bytes data)`, in place of its return
//! data. The parent decodes the record to learn why the child failed, how much nuisance gas the
//! transaction has left and how much ordinary gas the child hands back.
//!
//! Failure output that is empty or does not decode is treated as a fault with no structured
//! payload: [`RevertFlag::UnknownFault`], no nuisance gas left and no refund.

use alloy_primitives::Bytes;
use alloy_sol_types::{sol_data, SolType};
use serde::{Deserialize, Serialize};

/// The ABI shape of an encoded record.
type RecordSol = (sol_data::Uint<8>, sol_data::Uint<64>, sol_data::Uint<64>, sol_data::Bytes);

/// The tag of a structured failure.
#[repr(u8)]
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
pub enum RevertFlag {
    /// A guest fault with no structured payload (invalid opcode, stack error, out of gas).
    /// Consumes the remaining nuisance gas budget.
    #[display("UNKNOWN_FAULT")]
    UnknownFault = 0,
    /// The guest requested an unwind with a payload.
    #[display("INTENTIONAL_REVERT")]
    IntentionalRevert = 1,
    /// The transaction-wide nuisance gas budget is exhausted.
    #[display("EXCEEDS_NUISANCE_GAS")]
    ExceedsNuisanceGas = 2,
    /// The guest touched state that has no record or whose witness does not verify.
    #[display("INVALID_STATE_ACCESS")]
    InvalidStateAccess = 3,
    /// A creation targeted an address that already holds a non-empty account.
    #[display("CREATE_COLLISION")]
    CreateCollision = 4,
    /// A static frame attempted a mutation.
    #[display("STATIC_VIOLATION")]
    StaticViolation = 5,
    /// The deployer allow-list or the safety gate rejected a creation.
    #[display("CREATOR_NOT_ALLOWED")]
    CreatorNotAllowed = 6,
}

impl RevertFlag {
    /// All flags, in tag order.
    pub const ALL: [Self; 7] = [
        Self::UnknownFault,
        Self::IntentionalRevert,
        Self::ExceedsNuisanceGas,
        Self::InvalidStateAccess,
        Self::CreateCollision,
        Self::StaticViolation,
        Self::CreatorNotAllowed,
    ];

    /// Returns the flag with the given tag.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::UnknownFault),
            1 => Some(Self::IntentionalRevert),
            2 => Some(Self::ExceedsNuisanceGas),
            3 => Some(Self::InvalidStateAccess),
            4 => Some(Self::CreateCollision),
            5 => Some(Self::StaticViolation),
            6 => Some(Self::CreatorNotAllowed),
            _ => None,
        }
    }

    /// Returns the tag of the flag.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Whether the flag aborts the whole transaction regardless of which frame raised it.
    pub const fn is_transaction_fatal(self) -> bool {
        matches!(self, Self::ExceedsNuisanceGas | Self::InvalidStateAccess)
    }

    /// Whether the failed frame hands its unused gas back to its caller.
    pub const fn refunds_gas(self) -> bool {
        matches!(
            self,
            Self::IntentionalRevert |
                Self::CreateCollision |
                Self::StaticViolation |
                Self::CreatorNotAllowed
        )
    }
}

/// A decoded revert record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertRecord {
    /// Why the frame failed.
    pub flag: RevertFlag,
    /// The transaction's nuisance gas budget when the frame failed.
    pub nuisance_gas_left: u64,
    /// The ordinary gas the failed frame hands back to its caller.
    pub gas_refund: u64,
    /// The guest payload. Only meaningful for [`RevertFlag::IntentionalRevert`].
    pub data: Bytes,
}

impl RevertRecord {
    /// Creates a record.
    pub const fn new(flag: RevertFlag, nuisance_gas_left: u64, gas_refund: u64, data: Bytes) -> Self {
        Self { flag, nuisance_gas_left, gas_refund, data }
    }

    /// The record recovered from failure output without a structured payload.
    pub const fn unknown_fault() -> Self {
        Self::new(RevertFlag::UnknownFault, 0, 0, Bytes::new())
    }

    /// Encodes the record as frame output.
    pub fn encode(&self) -> Bytes {
        RecordSol::abi_encode_params(&(
            self.flag.tag(),
            self.nuisance_gas_left,
            self.gas_refund,
            self.data.clone(),
        ))
        .into()
    }

    /// Decodes the output of a failed frame.
    ///
    /// This never fails: output that is not a well-formed record is an unknown fault.
    pub fn decode(output: &[u8]) -> Self {
        if output.is_empty() {
            return Self::unknown_fault();
        }
        let Ok((tag, nuisance_gas_left, gas_refund, data)) =
            RecordSol::abi_decode_params(output)
        else {
            return Self::unknown_fault();
        };
        match RevertFlag::from_tag(tag) {
            Some(flag) => Self::new(flag, nuisance_gas_left, gas_refund, data),
            None => Self::unknown_fault(),
        }
    }
}
