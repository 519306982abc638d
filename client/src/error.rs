use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-2xx answer. `message` is the server's `error` text, verbatim.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("connect a wallet to vote")]
    WalletNotConnected,

    #[error("this wallet has already voted on the proposal")]
    AlreadyVoted,

    #[error("a vote is already being submitted")]
    VoteInFlight,

    #[error("realtime channel error: {0}")]
    Realtime(String),

    #[error("vote ledger error: {0}")]
    Ledger(String),

    #[error("wallet key error: {0}")]
    Key(String),
}

impl ClientError {
    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Realtime(e.to_string())
    }
}
