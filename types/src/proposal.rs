//! Governance proposals.

use serde::{Deserialize, Serialize};

use crate::{ProposalId, Timestamp, VotingStats, WalletAddress};

/// Descriptive text of a proposal. Immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalContent {
    pub title: String,
    pub summary: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub full_proposal: String,
}

/// A stored proposal with its running tally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(alias = "_id")]
    pub id: ProposalId,
    pub content: ProposalContent,
    pub voting_stats: VotingStats,
    pub creator: WalletAddress,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A validated proposal that has not been stored yet.
///
/// The store assigns the id, zeroed tally and timestamps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewProposal {
    pub content: ProposalContent,
    pub creator: WalletAddress,
}
