//! Voting panel state machine.
//!
//! `NotVoted -> Voting -> Voted`, with `Voting -> NotVoted` when the request
//! fails. `Voted` is terminal for a given ledger.

use agora_types::{Proposal, ProposalId, Timestamp, VoteReceipt, VoteType};
use tracing::warn;

use crate::{ApiClient, ClientError, VoteAction, VoteLedger, Wallet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelState {
    NotVoted,
    /// A ballot is in flight.
    Voting(VoteType),
    /// The vote is known, when this client cast it or a receipt said so.
    Voted(Option<VoteType>),
}

#[derive(Debug)]
pub struct VotingPanel {
    proposal_id: ProposalId,
    state: PanelState,
}

impl VotingPanel {
    /// Start from what the local ledger remembers for this proposal.
    pub fn new(proposal_id: ProposalId, ledger: &VoteLedger) -> Self {
        let state = match ledger.entry(&proposal_id) {
            Some(entry) => PanelState::Voted(Some(entry.vote)),
            None => PanelState::NotVoted,
        };
        Self { proposal_id, state }
    }

    pub fn proposal_id(&self) -> &ProposalId {
        &self.proposal_id
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn can_vote(&self) -> bool {
        self.state == PanelState::NotVoted
    }

    /// `NotVoted -> Voting`.
    pub fn begin(&mut self, vote: VoteType) -> Result<(), ClientError> {
        match self.state {
            PanelState::NotVoted => {
                self.state = PanelState::Voting(vote);
                Ok(())
            }
            PanelState::Voted(_) => Err(ClientError::AlreadyVoted),
            PanelState::Voting(_) => Err(ClientError::VoteInFlight),
        }
    }

    /// Settle an in-flight vote. Success, or the server saying the wallet
    /// already voted, ends in `Voted` and is recorded in the ledger; any
    /// other failure returns to `NotVoted`. A ledger that cannot be written
    /// is logged and otherwise ignored: the server's answer stands.
    pub fn finish(
        &mut self,
        result: &Result<Proposal, ClientError>,
        ledger: &mut VoteLedger,
        now: Timestamp,
    ) {
        let PanelState::Voting(vote) = self.state else {
            return;
        };
        match result {
            Ok(_) => {
                self.state = PanelState::Voted(Some(vote));
                remember(ledger, self.proposal_id, vote, now);
            }
            Err(ClientError::AlreadyVoted) => self.state = PanelState::Voted(None),
            Err(_) => self.state = PanelState::NotVoted,
        }
    }

    /// Adopt the server's receipt for the connected wallet.
    pub fn adopt_receipt(&mut self, receipt: &VoteReceipt, ledger: &mut VoteLedger) {
        if receipt.proposal_id != self.proposal_id {
            return;
        }
        self.state = PanelState::Voted(Some(receipt.vote));
        remember(ledger, receipt.proposal_id, receipt.vote, receipt.cast_at);
    }

    /// Ask the server whether `wallet` voted here and adopt the answer.
    pub async fn sync_with_server(
        &mut self,
        api: &ApiClient,
        wallet: &Wallet,
        ledger: &mut VoteLedger,
    ) -> Result<(), ClientError> {
        if matches!(self.state, PanelState::Voted(Some(_))) {
            return Ok(());
        }
        let receipt = api
            .receipt(&self.proposal_id.to_string(), wallet.address().as_str())
            .await?;
        if let Some(receipt) = receipt {
            self.adopt_receipt(&receipt, ledger);
        }
        Ok(())
    }

    /// Run one vote through the state machine.
    pub async fn submit(
        &mut self,
        action: &mut VoteAction,
        api: &ApiClient,
        vote: VoteType,
        wallet: Option<&Wallet>,
        claimed_weight: Option<u64>,
        ledger: &mut VoteLedger,
    ) -> Result<Proposal, ClientError> {
        self.begin(vote)?;
        let result = action
            .vote(api, &self.proposal_id, vote, wallet, claimed_weight)
            .await;
        self.finish(&result, ledger, Timestamp::now());
        result
    }
}

fn remember(ledger: &mut VoteLedger, id: ProposalId, vote: VoteType, at: Timestamp) {
    if let Err(e) = ledger.record(id, vote, at) {
        warn!(proposal = %id, error = %e, "vote counted but not saved to the local ledger");
    }
}
