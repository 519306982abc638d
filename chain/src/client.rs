//! HTTP client for the chain API.

use agora_types::WalletAddress;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{BalanceOracle, ChainError};

/// Default timeout for chain API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a chain API base URL.
#[derive(Clone)]
pub struct ChainClient {
    base_url: String,
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
}

/// `GET /balance/{address}` body. Some chain APIs send balances that exceed
/// JSON's safe integer range as decimal strings.
#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[allow(dead_code)]
    address: Option<String>,
    balance: RawBalance,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBalance {
    Number(u64),
    Text(String),
}

impl RawBalance {
    fn into_u64(self) -> Result<u64, ChainError> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| ChainError::InvalidResponse(format!("balance {s:?} is not a u64"))),
        }
    }
}

fn classify(e: reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Unreachable(format!("request timed out: {e}"))
    } else if e.is_connect() {
        ChainError::Unreachable(format!("connection failed: {e}"))
    } else {
        ChainError::RequestFailed(e.to_string())
    }
}

impl ChainClient {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ChainError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| ChainError::Client(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BalanceOracle for ChainClient {
    /// `GET {base}/balance/{address}`
    async fn balance(&self, address: &WalletAddress) -> Result<u64, ChainError> {
        let url = format!("{}/balance/{}", self.base_url, address);
        let response = self.http_client.get(&url).send().await.map_err(classify)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%address, "address unknown to chain, balance 0");
            return Ok(0);
        }
        if !status.is_success() {
            return Err(ChainError::RequestFailed(format!("HTTP status {status}")));
        }

        let body: BalanceResponse = response.json().await.map_err(|e| {
            ChainError::InvalidResponse(format!("failed to parse balance response: {e}"))
        })?;
        body.balance.into_u64()
    }

    /// `GET {base}/health`
    async fn health(&self) -> Result<(), ChainError> {
        let url = format!("{}/health", self.base_url);
        let response = self.http_client.get(&url).send().await.map_err(classify)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ChainError::RequestFailed(format!(
                "HTTP status {}",
                response.status()
            )))
        }
    }
}
