//! Wallet address type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ParseError;

/// A wallet address as reported by a client.
///
/// Proposal creators may use any address format their wallet produces; signed
/// ballots use the hex-encoded Ed25519 public key of the voter as address
/// (see `agora_crypto::address`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Longest accepted address, in bytes.
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap an address. Surrounding whitespace is trimmed.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, ParseError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(ParseError::InvalidAddress("address is empty".into()));
        }
        if s.len() > Self::MAX_LEN {
            return Err(ParseError::InvalidAddress(format!(
                "address is longer than {} bytes",
                Self::MAX_LEN
            )));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control() || c == '/') {
            return Err(ParseError::InvalidAddress(format!(
                "address contains forbidden characters: {s:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for display, e.g. `0x1234...abcd`. Counts characters,
    /// not bytes.
    pub fn abbreviated(&self) -> String {
        let count = self.0.chars().count();
        if count <= 12 {
            return self.0.clone();
        }
        let head: String = self.0.chars().take(6).collect();
        let tail: String = self.0.chars().skip(count - 4).collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<WalletAddress> for String {
    fn from(addr: WalletAddress) -> Self {
        addr.0
    }
}
