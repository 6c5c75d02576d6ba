//! Driver-level errors.
//!
//! These never cross a call-frame boundary. Guest-visible failures travel as
//! [`RevertRecord`](crate::RevertRecord)s; the errors here stop the driver itself.

use crate::{ConfigError, RevertFlag};

/// Errors returned by [`ExecutionManager::run`](crate::ExecutionManager::run).
#[derive(Debug, thiserror::Error)]
pub enum SandboxError<DBError> {
    /// The backing database failed.
    #[error("backing database error: {0}")]
    Database(DBError),
    /// The transaction's gas limit is outside the configured bounds.
    #[error("transaction gas limit {gas_limit} outside [{min}, {max}]")]
    GasLimitOutOfBounds {
        /// The transaction's gas limit.
        gas_limit: u64,
        /// Configured minimum.
        min: u64,
        /// Configured maximum.
        max: u64,
    },
    /// The configuration is inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors returned by the gated [`StateStore`](crate::StateStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError<DBError> {
    /// The access failed with a protocol flag, either
    /// [`RevertFlag::InvalidStateAccess`] or [`RevertFlag::ExceedsNuisanceGas`].
    #[error("state access failed: {0}")]
    Signal(RevertFlag),
    /// The backing database failed.
    #[error("backing database error: {0}")]
    Database(DBError),
}

impl<DBError> StateError<DBError> {
    /// Returns the protocol flag, if the error carries one.
    pub const fn flag(&self) -> Option<RevertFlag> {
        match self {
            Self::Signal(flag) => Some(*flag),
            Self::Database(_) => None,
        }
    }
}

impl<DBError> From<RevertFlag> for StateError<DBError> {
    fn from(flag: RevertFlag) -> Self {
        Self::Signal(flag)
    }
}
