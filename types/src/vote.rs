//! Vote types, tallies and receipts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{ParseError, ProposalId, Timestamp, WalletAddress};

/// The three options a ballot can choose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Yes,
    No,
    Abstain,
}

impl VoteType {
    pub const ALL: [VoteType; 3] = [VoteType::Yes, VoteType::No, VoteType::Abstain];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Abstain => "abstain",
        }
    }
}

impl FromStr for VoteType {
    type Err = ParseError;

    /// Exact, case-sensitive match on the wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "abstain" => Ok(Self::Abstain),
            other => Err(ParseError::InvalidVoteType(other.to_string())),
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running tally of a proposal.
///
/// `total_votes` always equals `yes + no + abstain`. With unweighted voting
/// this is a count; with balance weighting it is a sum of weights.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStats {
    pub yes: u64,
    pub no: u64,
    pub abstain: u64,
    pub total_votes: u64,
}

impl VotingStats {
    /// Return the tally after adding `weight` to `vote`, or `None` on overflow.
    pub fn with_vote(&self, vote: VoteType, weight: u64) -> Option<VotingStats> {
        let mut next = *self;
        let slot = match vote {
            VoteType::Yes => &mut next.yes,
            VoteType::No => &mut next.no,
            VoteType::Abstain => &mut next.abstain,
        };
        *slot = slot.checked_add(weight)?;
        next.total_votes = next.total_votes.checked_add(weight)?;
        Some(next)
    }

    pub fn get(&self, vote: VoteType) -> u64 {
        match vote {
            VoteType::Yes => self.yes,
            VoteType::No => self.no,
            VoteType::Abstain => self.abstain,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.yes
            .checked_add(self.no)
            .and_then(|s| s.checked_add(self.abstain))
            == Some(self.total_votes)
    }

    /// Share of `vote` in percent. A zero total counts as 1.
    pub fn percentage(&self, vote: VoteType) -> f64 {
        let total = self.total_votes.max(1) as f64;
        self.get(vote) as f64 / total * 100.0
    }
}

/// One atomic tally update handed to the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TallyIncrement {
    pub vote: VoteType,
    pub weight: u64,
    /// Verified voter. When set the store records a receipt in the same
    /// write and refuses a second increment for the same wallet.
    pub voter: Option<WalletAddress>,
}

/// Durable record that a wallet voted on a proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub proposal_id: ProposalId,
    pub voter: WalletAddress,
    pub vote: VoteType,
    pub weight: u64,
    pub cast_at: Timestamp,
}
