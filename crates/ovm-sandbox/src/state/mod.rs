//! The state store: the only reader and writer of account and storage data.
//!
//! State is loaded lazily from a backing [`revm::Database`], which holds the pre-state of the
//! transaction being replayed. The first load of every account and slot within a transaction is
//! checked against a [`StateWitness`] and flagged, so the interpreter can charge nuisance gas
//! exactly once per key.

mod account;
mod journal;
mod slot;
mod store;
mod witness;

pub use account::*;
pub use journal::Checkpoint;
pub use slot::*;
pub use store::*;
pub use witness::*;
