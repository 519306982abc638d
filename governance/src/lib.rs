//! Proposal governance for Agora.
//!
//! [`ProposalService`] is the only writer of proposals. It validates content,
//! verifies signed ballots, derives vote weight from the configured
//! [`WeightPolicy`], and hands each tally update to the store as one atomic
//! operation.
//!
//! Key principle: the server decides who voted and how much the vote weighs.
//! Client-reported weights are checked, never applied.

pub mod error;
pub mod policy;
pub mod service;
pub mod validation;

pub use error::GovernanceError;
pub use policy::{VotePolicy, WeightPolicy};
pub use service::{Ballot, BallotOutcome, ProposalService, VoterProof};
pub use validation::{validate_proposal, ContentLimits};
