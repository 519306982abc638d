//! Chain API access.
//!
//! The governance service never talks to a chain node directly. It asks a
//! [`BalanceOracle`] for a wallet's balance and for upstream health. The
//! production oracle is [`ChainClient`], which speaks a small HTTP contract:
//!
//! - `GET {base}/balance/{address}` → `{"address": str, "balance": u64 | "123"}`
//!   (404 means the chain has never seen the address: balance 0)
//! - `GET {base}/health` → any 2xx status

pub mod client;
pub mod error;
pub mod oracle;

pub use client::ChainClient;
pub use error::ChainError;
pub use oracle::BalanceOracle;
