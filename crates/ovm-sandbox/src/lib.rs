//! A replay-deterministic call execution sandbox for optimistic layer-2 execution.
//!
//! The crate pairs a nested-call interpreter ([`ExecutionManager`]) with a lazily-loaded,
//! witness-verified account/storage store ([`StateStore`]). Every first touch of state within a
//! transaction is charged against a second, transaction-wide budget (nuisance gas) that bounds
//! the cost of adversarial replay, and failures cross call-frame boundaries as encoded
//! [`RevertRecord`]s rather than native errors.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod flag;
pub use flag::*;

mod interpreter;
pub use interpreter::*;

mod nuisance;
pub use nuisance::*;

mod safety;
pub use safety::*;

mod state;
pub use state::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod types;
pub use types::*;
