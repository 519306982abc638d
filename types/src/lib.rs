//! Fundamental types for Agora.
//!
//! This crate defines the data model shared across every other crate in the
//! workspace: proposal ids, wallet addresses, keys, timestamps, proposals and
//! their tallies, ballots, and the realtime wire events.

pub mod address;
pub mod error;
pub mod event;
pub mod id;
pub mod keys;
pub mod proposal;
pub mod time;
pub mod vote;

pub use address::WalletAddress;
pub use error::ParseError;
pub use event::{ClientCommand, ServerEvent};
pub use id::ProposalId;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use proposal::{NewProposal, Proposal, ProposalContent};
pub use time::{Clock, SystemClock, Timestamp};
pub use vote::{TallyIncrement, VoteReceipt, VoteType, VotingStats};
