//! Abstract storage traits for Agora.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod error;
pub mod ids;
pub mod proposal;

pub use error::StoreError;
pub use ids::IdGenerator;
pub use proposal::{receipt_key, ProposalStore};
