//! Cryptographic primitives for Agora wallets.
//!
//! - **Ed25519** for ballot signing and signature verification
//! - Wallet addresses for signed ballots are the hex-encoded public key
//! - Ballots sign a fixed, versioned message binding proposal id and vote

pub mod address;
pub mod ballot;
pub mod keys;
pub mod sign;

pub use address::{address_from_public_key, public_key_from_address};
pub use ballot::{ballot_message, sign_ballot, verify_ballot};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
