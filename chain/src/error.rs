use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain API unreachable: {0}")]
    Unreachable(String),

    #[error("chain API request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response from chain API: {0}")]
    InvalidResponse(String),

    #[error("no chain API configured")]
    NotConfigured,

    #[error("cannot build chain API client: {0}")]
    Client(String),
}

impl ChainError {
    /// True when the upstream could not be reached at all, as opposed to
    /// answering with something unusable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::NotConfigured)
    }
}
