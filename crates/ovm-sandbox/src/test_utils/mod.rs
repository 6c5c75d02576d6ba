//! Test utilities for the sandbox.

mod database;
mod program;
mod sandbox;

pub use database::*;
pub use program::*;
pub use sandbox::*;
