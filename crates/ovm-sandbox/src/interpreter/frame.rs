use alloy_primitives::{Address, Bytes, B256, U256};

use crate::{RevertFlag, StateError};

/// A request to open a frame.
///
/// Every way of entering guest code is one variant, handled by its own function in the
/// interpreter. The executing context supplies whatever a variant does not carry: the caller of
/// a call is always the active account, and a delegate call inherits the active identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameInput {
    /// A call that may transfer value.
    Call {
        /// The account to call.
        target: Address,
        /// The value to transfer.
        value: U256,
        /// The call data.
        data: Bytes,
        /// The gas handed to the frame.
        gas_limit: u64,
    },
    /// A call in which every mutation fails.
    StaticCall {
        /// The account to call.
        target: Address,
        /// The call data.
        data: Bytes,
        /// The gas handed to the frame.
        gas_limit: u64,
    },
    /// Runs the target's code under the active identity.
    DelegateCall {
        /// The account whose code runs.
        target: Address,
        /// The call data.
        data: Bytes,
        /// The gas handed to the frame.
        gas_limit: u64,
    },
    /// Creates an account at the address derived from the creator's nonce.
    Create {
        /// The value to endow the new account with.
        value: U256,
        /// The init code.
        init_code: Bytes,
        /// The gas handed to the frame.
        gas_limit: u64,
    },
    /// Creates an account at the address derived from a salt and the init code.
    Create2 {
        /// The value to endow the new account with.
        value: U256,
        /// The init code.
        init_code: Bytes,
        /// The salt.
        salt: B256,
        /// The gas handed to the frame.
        gas_limit: u64,
    },
}

impl FrameInput {
    /// The gas handed to the frame.
    pub const fn gas_limit(&self) -> u64 {
        match self {
            Self::Call { gas_limit, .. } |
            Self::StaticCall { gas_limit, .. } |
            Self::DelegateCall { gas_limit, .. } |
            Self::Create { gas_limit, .. } |
            Self::Create2 { gas_limit, .. } => *gas_limit,
        }
    }
}

/// What a finished frame hands back to its caller.
///
/// A failed frame has no fields besides its output: why it failed, the nuisance gas left and
/// the gas it returns all travel in the encoded [`RevertRecord`](crate::RevertRecord).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame stopped or returned.
    Success {
        /// Return data. Empty for creations.
        output: Bytes,
        /// Unused gas.
        gas_left: u64,
        /// The created account, for creations.
        created: Option<Address>,
    },
    /// The frame failed.
    Failure {
        /// The encoded revert record, or nothing for a fault.
        output: Bytes,
    },
}

impl FrameOutcome {
    /// Returns `true` for [`FrameOutcome::Success`].
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// How a frame's code stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Halt {
    Stop,
    Return(Bytes),
    Revert(Bytes),
    Signal(RevertFlag),
    /// A fault with no structured payload.
    Fault,
}

/// Aborts the instruction being executed.
#[derive(Debug)]
pub(crate) enum Interrupt<E> {
    /// The frame fails with a protocol flag.
    Signal(RevertFlag),
    /// The frame faults.
    Fault,
    /// The backing database failed. Ends the transaction with an error.
    Backend(E),
}

/// A stack underflow, overflow or out-of-range `DUP`/`SWAP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StackFault;

impl<E> From<StackFault> for Interrupt<E> {
    fn from(_: StackFault) -> Self {
        Self::Fault
    }
}

impl<E> From<RevertFlag> for Interrupt<E> {
    fn from(flag: RevertFlag) -> Self {
        Self::Signal(flag)
    }
}

impl<E> From<StateError<E>> for Interrupt<E> {
    fn from(err: StateError<E>) -> Self {
        match err {
            StateError::Signal(flag) => Self::Signal(flag),
            StateError::Database(err) => Self::Backend(err),
        }
    }
}
