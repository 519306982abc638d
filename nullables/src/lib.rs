//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the governance service (clock, storage, chain
//! balances) sits behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod chain;
pub mod clock;
pub mod store;

pub use chain::{NullBalanceOracle, OracleMode};
pub use clock::NullClock;
pub use store::NullProposalStore;
