//! Ballot signatures.
//!
//! A signed ballot proves that the holder of a wallet key chose `vote` on
//! one specific proposal. The message is versioned so the format can change
//! without old signatures being replayable under a new meaning.

use agora_types::{PrivateKey, ProposalId, PublicKey, Signature, VoteType};

use crate::sign::{sign_message, verify_signature};

const BALLOT_DOMAIN: &str = "agora-ballot:v1";

/// Canonical bytes signed for a ballot: `agora-ballot:v1:{proposal_id}:{vote}`.
pub fn ballot_message(proposal_id: &ProposalId, vote: VoteType) -> Vec<u8> {
    format!("{BALLOT_DOMAIN}:{proposal_id}:{vote}").into_bytes()
}

pub fn sign_ballot(proposal_id: &ProposalId, vote: VoteType, private_key: &PrivateKey) -> Signature {
    sign_message(&ballot_message(proposal_id, vote), private_key)
}

pub fn verify_ballot(
    proposal_id: &ProposalId,
    vote: VoteType,
    signature: &Signature,
    public_key: &PublicKey,
) -> bool {
    verify_signature(&ballot_message(proposal_id, vote), signature, public_key)
}
