use agora_types::WalletAddress;
use async_trait::async_trait;

use crate::ChainError;

/// Source of wallet balances used for vote weighting.
#[async_trait]
pub trait BalanceOracle: Send + Sync {
    /// Current balance of `address` in the chain's smallest unit.
    async fn balance(&self, address: &WalletAddress) -> Result<u64, ChainError>;

    /// Succeeds when the upstream chain API is answering.
    async fn health(&self) -> Result<(), ChainError>;
}
