//! cfv-testkit
//!
//! In-memory implementations of every engine port plus ledger fixtures.
//! Scenario tests under `tests/` drive the real engine against [`MemStore`].

mod fixtures;
mod mem_store;

pub use fixtures::*;
pub use mem_store::MemStore;
