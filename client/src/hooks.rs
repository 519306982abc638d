//! Client-side state holders for proposal lists, details and voting.
//!
//! Each hook owns plain state (`loading`, `error`, data) that a view renders.
//! Network results and realtime events are applied by the caller's loop, one
//! at a time, through `&mut self`.

use agora_types::{Proposal, ProposalId, ServerEvent, VoteType};
use tracing::debug;

use crate::{ApiClient, BallotRequest, ClientError, Wallet};

/// Replace `current`'s tally with `incoming`'s unless `incoming` is older.
///
/// Tallies only grow, so a smaller total means a stale event.
fn merge_tally(current: &mut Proposal, incoming: &Proposal) -> bool {
    if incoming.voting_stats.total_votes < current.voting_stats.total_votes {
        return false;
    }
    current.voting_stats = incoming.voting_stats;
    current.updated_at = current.updated_at.max(incoming.updated_at);
    true
}

/// Every proposal, in creation order.
#[derive(Debug, Default)]
pub struct ProposalList {
    pub proposals: Vec<Proposal>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ProposalList {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&mut self, api: &ApiClient) {
        self.loading = true;
        match api.list_proposals().await {
            Ok(proposals) => {
                self.proposals = proposals;
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self.loading = false;
    }

    /// Fold a realtime event into the list. Returns whether anything changed.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::ProposalCreated(proposal) => {
                if self.proposals.iter().any(|p| p.id == proposal.id) {
                    return false;
                }
                self.proposals.push(proposal.clone());
                true
            }
            ServerEvent::VoteUpdate(proposal) => self
                .proposals
                .iter_mut()
                .find(|p| p.id == proposal.id)
                .is_some_and(|p| merge_tally(p, proposal)),
            _ => false,
        }
    }

    pub fn get(&self, id: &ProposalId) -> Option<&Proposal> {
        self.proposals.iter().find(|p| &p.id == id)
    }
}

/// One proposal, addressed by the id from the route.
#[derive(Debug)]
pub struct ProposalDetail {
    pub id: String,
    pub proposal: Option<Proposal>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ProposalDetail {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            proposal: None,
            loading: false,
            error: None,
        }
    }

    pub async fn load(&mut self, api: &ApiClient) {
        self.loading = true;
        match api.get_proposal(&self.id).await {
            Ok(proposal) => {
                self.proposal = Some(proposal);
                self.error = None;
            }
            Err(e) => self.error = Some(e.to_string()),
        }
        self.loading = false;
    }

    /// Merge a `voteUpdate` for this proposal. Returns whether anything changed.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        let ServerEvent::VoteUpdate(incoming) = event else {
            return false;
        };
        match &mut self.proposal {
            Some(current) if current.id == incoming.id => merge_tally(current, incoming),
            _ => false,
        }
    }
}

/// Casts signed ballots.
#[derive(Debug, Default)]
pub struct VoteAction {
    pub loading: bool,
    pub error: Option<String>,
}

impl VoteAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign and submit `vote` on `proposal_id`.
    ///
    /// Without a wallet this fails with [`ClientError::WalletNotConnected`]
    /// and sends nothing. `claimed_weight` is checked by the server against
    /// the weight it derives itself.
    pub async fn vote(
        &mut self,
        api: &ApiClient,
        proposal_id: &ProposalId,
        vote: VoteType,
        wallet: Option<&Wallet>,
        claimed_weight: Option<u64>,
    ) -> Result<Proposal, ClientError> {
        let Some(wallet) = wallet else {
            let err = ClientError::WalletNotConnected;
            self.error = Some(err.to_string());
            return Err(err);
        };

        let ballot = BallotRequest {
            vote: vote.as_str().to_string(),
            wallet: Some(wallet.address().to_string()),
            signature: Some(wallet.sign_ballot(proposal_id, vote).to_hex()),
            weight: claimed_weight,
        };

        self.loading = true;
        self.error = None;
        let result = api.cast_vote(&proposal_id.to_string(), &ballot).await;
        self.loading = false;

        if let Err(e) = &result {
            debug!(proposal = %proposal_id, error = %e, "vote failed");
            self.error = Some(e.to_string());
        }
        result
    }
}
