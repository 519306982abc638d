//! Parse errors for the textual forms of Agora types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid vote type: {0:?} (expected \"yes\", \"no\" or \"abstain\")")]
    InvalidVoteType(String),

    #[error("invalid proposal id: {0}")]
    InvalidProposalId(String),

    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}
