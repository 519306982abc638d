//! Proposal storage trait.

use agora_types::{
    NewProposal, Proposal, ProposalId, TallyIncrement, VoteReceipt, WalletAddress,
};

use crate::StoreError;

/// Persistent record of proposals, their tallies, and vote receipts.
///
/// Implementations assign ids and timestamps. `apply_vote` must be atomic
/// with respect to concurrent callers: the tally read, the receipt check, the
/// increment and both writes happen as one unit, so no increment is lost and
/// no wallet is counted twice.
pub trait ProposalStore: Send + Sync {
    /// Persist a new proposal with a zeroed tally and return the stored record.
    fn insert_proposal(&self, proposal: NewProposal) -> Result<Proposal, StoreError>;

    /// Get a proposal by id. `StoreError::NotFound` if absent.
    fn get_proposal(&self, id: &ProposalId) -> Result<Proposal, StoreError>;

    /// All proposals in creation order.
    fn list_proposals(&self) -> Result<Vec<Proposal>, StoreError>;

    /// Number of stored proposals.
    fn proposal_count(&self) -> Result<u64, StoreError>;

    /// Atomically add `increment.weight` to the chosen tally and to
    /// `total_votes`, bump `updated_at`, and (for verified voters) record a
    /// receipt.
    ///
    /// Errors: `NotFound` if the proposal is absent, `Duplicate` if the voter
    /// already holds a receipt, `Overflow` if a counter would wrap. On error
    /// nothing is written.
    fn apply_vote(
        &self,
        id: &ProposalId,
        increment: &TallyIncrement,
    ) -> Result<Proposal, StoreError>;

    /// The receipt of `voter` on proposal `id`, if any.
    fn get_receipt(
        &self,
        id: &ProposalId,
        voter: &WalletAddress,
    ) -> Result<Option<VoteReceipt>, StoreError>;
}

/// Key under which a receipt is stored: `{proposal_id}/{voter}`.
///
/// Wallet addresses never contain `/`, so the key is unambiguous.
pub fn receipt_key(id: &ProposalId, voter: &WalletAddress) -> String {
    format!("{id}/{voter}")
}
