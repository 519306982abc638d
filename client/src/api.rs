//! Typed HTTP client for the Agora API.

use agora_types::{Proposal, ProposalContent, VoteReceipt};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::ClientError;

/// Per-request timeout used by [`ApiClient::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of `POST /api/proposals`.
#[derive(Debug, Serialize)]
struct CreateProposalBody<'a> {
    content: &'a ProposalContent,
    creator: &'a str,
}

/// Body of `PUT /api/proposals/:id/vote`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BallotRequest {
    pub vote: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
}

impl BallotRequest {
    /// An unsigned ballot.
    pub fn anonymous(vote: impl Into<String>) -> Self {
        Self {
            vote: vote.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WalletBalance {
    pub address: String,
    pub balance: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client bound to one Agora server.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:5001`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the realtime channel served next to the API.
    pub fn realtime_url(&self) -> String {
        let rest = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{rest}/ws")
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn create_proposal(
        &self,
        content: &ProposalContent,
        creator: &str,
    ) -> Result<Proposal, ClientError> {
        let response = self
            .http
            .post(self.url("/api/proposals"))
            .json(&CreateProposalBody { content, creator })
            .send()
            .await?;
        decode(response).await
    }

    pub async fn list_proposals(&self) -> Result<Vec<Proposal>, ClientError> {
        let response = self.http.get(self.url("/api/proposals")).send().await?;
        decode(response).await
    }

    pub async fn get_proposal(&self, id: &str) -> Result<Proposal, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/api/proposals/{id}")))
            .send()
            .await?;
        decode(response).await
    }

    /// Submit a ballot. A 409 answer becomes [`ClientError::AlreadyVoted`].
    pub async fn cast_vote(&self, id: &str, ballot: &BallotRequest) -> Result<Proposal, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/api/proposals/{id}/vote")))
            .json(ballot)
            .send()
            .await?;
        match decode(response).await {
            Err(ClientError::Api { status: 409, .. }) => Err(ClientError::AlreadyVoted),
            other => other,
        }
    }

    /// The server's receipt for `wallet` on proposal `id`, if it voted.
    pub async fn receipt(&self, id: &str, wallet: &str) -> Result<Option<VoteReceipt>, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/api/proposals/{id}/votes/{wallet}")))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(response).await.map(Some)
    }

    pub async fn balance(&self, wallet: &str) -> Result<WalletBalance, ClientError> {
        let response = self
            .http
            .get(self.url(&format!("/api/wallets/{wallet}/balance")))
            .send()
            .await?;
        decode(response).await
    }

    pub async fn health(&self) -> Result<(), ClientError> {
        let response = self.http.get(self.url("/health")).send().await?;
        decode::<serde_json::Value>(response).await.map(|_| ())
    }
}

/// Parse a 2xx body as `T`, or turn the error body into [`ClientError::Api`].
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.error,
        Err(_) if !text.trim().is_empty() => text,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    debug!(status = status.as_u16(), %message, "API request failed");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
