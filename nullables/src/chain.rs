//! Nullable balance oracle: canned balances, switchable failures.

use agora_chain::{BalanceOracle, ChainError};
use agora_types::WalletAddress;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How the oracle answers every call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OracleMode {
    #[default]
    Healthy,
    /// Behave like a chain API that cannot be reached.
    Unreachable,
    /// Behave like a chain API that answers with garbage.
    Broken,
}

/// An in-memory balance oracle. Unknown addresses have balance 0.
#[derive(Default)]
pub struct NullBalanceOracle {
    balances: Mutex<HashMap<WalletAddress, u64>>,
    mode: Mutex<OracleMode>,
    delay: Mutex<Duration>,
    lookups: AtomicUsize,
}

impl NullBalanceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, address: &WalletAddress, balance: u64) -> Self {
        self.set_balance(address, balance);
        self
    }

    pub fn set_balance(&self, address: &WalletAddress, balance: u64) {
        if let Ok(mut balances) = self.balances.lock() {
            balances.insert(address.clone(), balance);
        }
    }

    pub fn set_mode(&self, mode: OracleMode) {
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }

    /// Hold every answer back by `delay`, like a slow chain API.
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut current) = self.delay.lock() {
            *current = delay;
        }
    }

    async fn wait(&self) {
        let delay = self.delay.lock().map(|d| *d).unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Number of balance lookups served so far (for assertions).
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check_mode(&self) -> Result<(), ChainError> {
        let mode = self.mode.lock().map(|m| *m).unwrap_or_default();
        match mode {
            OracleMode::Healthy => Ok(()),
            OracleMode::Unreachable => Err(ChainError::Unreachable("null oracle offline".into())),
            OracleMode::Broken => Err(ChainError::InvalidResponse("null oracle broken".into())),
        }
    }
}

#[async_trait]
impl BalanceOracle for NullBalanceOracle {
    async fn balance(&self, address: &WalletAddress) -> Result<u64, ChainError> {
        self.wait().await;
        self.check_mode()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let balances = self
            .balances
            .lock()
            .map_err(|_| ChainError::RequestFailed("null oracle lock poisoned".into()))?;
        Ok(balances.get(address).copied().unwrap_or(0))
    }

    async fn health(&self) -> Result<(), ChainError> {
        self.wait().await;
        self.check_mode()
    }
}
