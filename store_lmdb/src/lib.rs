//! LMDB storage backend for Agora.
//!
//! Implements [`agora_store::ProposalStore`] using the `heed` LMDB bindings.
//! Proposals and receipts are JSON documents in two named databases within a
//! single environment.

pub mod environment;
pub mod error;
pub mod proposal;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use proposal::LmdbProposalStore;
