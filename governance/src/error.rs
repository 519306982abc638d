use agora_chain::ChainError;
use agora_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("{0}")]
    Validation(String),

    #[error("proposal {0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidVote(String),

    #[error("wallet {0} has already voted on this proposal")]
    AlreadyVoted(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("storage error: {0}")]
    Store(StoreError),

    #[error("chain API unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("chain API failed: {0}")]
    UpstreamFailed(String),
}

impl From<StoreError> for GovernanceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => Self::NotFound(key),
            other => Self::Store(other),
        }
    }
}

impl From<ChainError> for GovernanceError {
    fn from(e: ChainError) -> Self {
        if e.is_unavailable() {
            Self::UpstreamUnavailable(e.to_string())
        } else {
            Self::UpstreamFailed(e.to_string())
        }
    }
}
